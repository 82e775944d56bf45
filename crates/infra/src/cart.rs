//! Cart operations on behalf of an authenticated customer.
//!
//! Mutations return the refreshed line sequence, read fresh from the catalog
//! store. Nothing is cached between calls.

use tracing::instrument;

use storefront_auth::CustomerPrincipal;
use storefront_cart::LineState;
use storefront_core::{CartLine, ProductId};

use crate::catalog::{CatalogError, CatalogStore};

#[derive(Debug, Clone)]
pub struct CartManager<C> {
    catalog: C,
}

impl<C> CartManager<C>
where
    C: CatalogStore,
{
    pub fn new(catalog: C) -> Self {
        Self { catalog }
    }

    #[instrument(skip(self), fields(customer = %principal, product_id = %product_id), err)]
    pub async fn add(
        &self,
        principal: &CustomerPrincipal,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<Vec<CartLine>, CatalogError> {
        self.catalog
            .add_to_cart(principal.customer_id(), product_id, quantity)
            .await?;
        self.lines(principal).await
    }

    #[instrument(skip(self), fields(customer = %principal, product_id = %product_id), err)]
    pub async fn remove(
        &self,
        principal: &CustomerPrincipal,
        product_id: ProductId,
    ) -> Result<Vec<CartLine>, CatalogError> {
        self.catalog
            .remove_from_cart(principal.customer_id(), product_id)
            .await?;
        self.lines(principal).await
    }

    pub async fn lines(&self, principal: &CustomerPrincipal) -> Result<Vec<CartLine>, CatalogError> {
        self.catalog.get_cart_items(principal.customer_id()).await
    }

    /// Current state of one (customer, product) line.
    pub async fn line_state(
        &self,
        principal: &CustomerPrincipal,
        product_id: ProductId,
    ) -> Result<LineState, CatalogError> {
        let quantity = self
            .lines(principal)
            .await?
            .into_iter()
            .find(|line| line.product_id() == product_id)
            .map_or(0, |line| line.quantity);
        Ok(LineState::from_quantity(quantity))
    }
}
