//! The operation set exposed to the transport layer.

use tracing::{instrument, warn};

use storefront_auth::CustomerPrincipal;
use storefront_cart::LineState;
use storefront_core::{CartLine, Customer, CustomerId, NewCustomer, NewProduct, Product, ProductId};

use crate::cart::CartManager;
use crate::catalog::{CatalogError, CatalogStore};
use crate::router::{QueryError, QueryRouter};
use crate::search::SearchIndex;
use crate::sync::{BootstrapReport, IndexSynchronizer, SyncError};

/// Wires one catalog store and one search index together.
///
/// `C` and `I` are usually `Arc`s so the collaborators can share them.
#[derive(Debug, Clone)]
pub struct Storefront<C, I> {
    catalog: C,
    sync: IndexSynchronizer<C, I>,
    router: QueryRouter<C, I>,
    cart: CartManager<C>,
}

impl<C, I> Storefront<C, I>
where
    C: CatalogStore + Clone,
    I: SearchIndex + Clone,
{
    pub fn new(catalog: C, index: I) -> Self {
        Self {
            sync: IndexSynchronizer::new(catalog.clone(), index.clone()),
            router: QueryRouter::new(catalog.clone(), index),
            cart: CartManager::new(catalog.clone()),
            catalog,
        }
    }

    /// Rebuild the search index from the catalog. Used at startup.
    pub async fn bootstrap_index(&self) -> Result<BootstrapReport, SyncError> {
        self.sync.bootstrap().await
    }

    pub async fn register_customer(
        &self,
        email: &str,
        name: &str,
        password_hash: &str,
    ) -> Result<Customer, CatalogError> {
        let customer = NewCustomer::new(email, name, password_hash)?;
        self.catalog.create_customer(customer).await
    }

    pub async fn customer(&self, id: CustomerId) -> Result<Customer, CatalogError> {
        self.catalog.get_customer(id).await
    }

    pub async fn customer_by_email(&self, email: &str) -> Result<Customer, CatalogError> {
        self.catalog.get_customer_by_email(email).await
    }

    /// Create a product and push it to the search index.
    ///
    /// An indexing failure does not fail the call: the product exists and will
    /// become searchable by prefix after the next bootstrap.
    #[instrument(skip(self), err)]
    pub async fn add_product(&self, name: &str, price: u64) -> Result<Product, CatalogError> {
        let product = self.catalog.add_product(NewProduct::new(name, price)?).await?;

        if let Err(err) = self.sync.propagate(&product).await {
            warn!(
                product_id = %product.id,
                error = %err,
                "product not indexed; searchable after next bootstrap"
            );
        }
        Ok(product)
    }

    pub async fn search_products(&self, filter: Option<&str>) -> Result<Vec<Product>, QueryError> {
        self.router.search_products(filter).await
    }

    pub async fn add_to_cart(
        &self,
        principal: &CustomerPrincipal,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Vec<CartLine>, CatalogError> {
        self.cart.add(principal, product_id, quantity).await
    }

    pub async fn remove_from_cart(
        &self,
        principal: &CustomerPrincipal,
        product_id: ProductId,
    ) -> Result<Vec<CartLine>, CatalogError> {
        self.cart.remove(principal, product_id).await
    }

    pub async fn cart(&self, principal: &CustomerPrincipal) -> Result<Vec<CartLine>, CatalogError> {
        self.cart.lines(principal).await
    }

    /// Whether `product_id` is in the customer's cart, and with what quantity.
    pub async fn cart_line(
        &self,
        principal: &CustomerPrincipal,
        product_id: ProductId,
    ) -> Result<LineState, CatalogError> {
        self.cart.line_state(principal, product_id).await
    }
}
