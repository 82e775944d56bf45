use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::Utc;

use storefront_cart::{LineState, LineWrite};
use storefront_core::{
    CartLine, Customer, CustomerId, NewCustomer, NewProduct, Product, ProductId,
};

use super::r#trait::{effective_filter, CatalogError, CatalogStore, Missing};

#[derive(Debug, Default)]
struct CatalogState {
    last_customer_id: i64,
    last_product_id: i64,
    customers: BTreeMap<CustomerId, Customer>,
    emails: HashMap<String, CustomerId>,
    products: BTreeMap<ProductId, Product>,
    cart: BTreeMap<(CustomerId, ProductId), LineState>,
}

/// In-memory catalog store.
///
/// Intended for tests/dev. Every mutation runs under one write lock.
#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    state: RwLock<CatalogState>,
    unavailable: AtomicBool,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an unreachable store: every operation fails with `Storage`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), CatalogError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CatalogError::storage("catalog store unavailable"));
        }
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, CatalogState>, CatalogError> {
        self.ensure_available()?;
        self.state
            .read()
            .map_err(|_| CatalogError::storage("lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, CatalogState>, CatalogError> {
        self.ensure_available()?;
        self.state
            .write()
            .map_err(|_| CatalogError::storage("lock poisoned"))
    }
}

fn apply_line_write(
    cart: &mut BTreeMap<(CustomerId, ProductId), LineState>,
    key: (CustomerId, ProductId),
    write: Option<LineWrite>,
) {
    match write {
        Some(LineWrite::Insert(q)) | Some(LineWrite::Update(q)) => {
            cart.insert(key, LineState::Present(q));
        }
        Some(LineWrite::Delete) => {
            cart.remove(&key);
        }
        None => {}
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn create_customer(&self, customer: NewCustomer) -> Result<Customer, CatalogError> {
        let mut state = self.write()?;

        if state.emails.contains_key(customer.email()) {
            return Err(CatalogError::DuplicateEmail(customer.email().to_string()));
        }

        state.last_customer_id += 1;
        let id = CustomerId::new(state.last_customer_id);
        let customer = customer.into_customer(id, Utc::now());

        state.emails.insert(customer.email.clone(), id);
        state.customers.insert(id, customer.clone());
        Ok(customer)
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Customer, CatalogError> {
        let state = self.read()?;
        state
            .customers
            .get(&id)
            .cloned()
            .ok_or(CatalogError::NotFound(Missing::Customer(id)))
    }

    async fn get_customer_by_email(&self, email: &str) -> Result<Customer, CatalogError> {
        let state = self.read()?;
        state
            .emails
            .get(email)
            .and_then(|id| state.customers.get(id))
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(Missing::CustomerEmail(email.to_string())))
    }

    async fn add_product(&self, product: NewProduct) -> Result<Product, CatalogError> {
        let mut state = self.write()?;

        state.last_product_id += 1;
        let product = product.into_product(ProductId::new(state.last_product_id));
        state.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn search_products(
        &self,
        name_filter: Option<&str>,
    ) -> Result<Vec<Product>, CatalogError> {
        let state = self.read()?;
        let products = match effective_filter(name_filter) {
            None => state.products.values().cloned().collect(),
            Some(filter) => state
                .products
                .values()
                .filter(|p| p.name_contains(filter))
                .cloned()
                .collect(),
        };
        Ok(products)
    }

    async fn add_to_cart(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), CatalogError> {
        let mut state = self.write()?;

        if !state.customers.contains_key(&customer_id) {
            return Err(CatalogError::NotFound(Missing::Customer(customer_id)));
        }
        if !state.products.contains_key(&product_id) {
            return Err(CatalogError::NotFound(Missing::Product(product_id)));
        }

        let key = (customer_id, product_id);
        let current = state.cart.get(&key).copied().unwrap_or_default();
        let next = current.add(quantity)?;
        apply_line_write(&mut state.cart, key, current.write_to(next));
        Ok(())
    }

    async fn remove_from_cart(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> Result<(), CatalogError> {
        let mut state = self.write()?;

        let key = (customer_id, product_id);
        let current = state.cart.get(&key).copied().unwrap_or_default();
        let next = current.remove().map_err(|_| {
            CatalogError::NotFound(Missing::CartLine {
                customer: customer_id,
                product: product_id,
            })
        })?;
        apply_line_write(&mut state.cart, key, current.write_to(next));
        Ok(())
    }

    async fn get_cart_items(&self, customer_id: CustomerId) -> Result<Vec<CartLine>, CatalogError> {
        let state = self.read()?;

        let mut lines = Vec::new();
        for ((owner, product_id), line) in state.cart.range((customer_id, ProductId::new(i64::MIN))..) {
            if *owner != customer_id {
                break;
            }
            let product = state.products.get(product_id).cloned().ok_or_else(|| {
                CatalogError::storage(format!("cart references missing product {product_id}"))
            })?;
            lines.push(CartLine {
                customer_id,
                product,
                quantity: line.quantity(),
            });
        }
        Ok(lines)
    }
}
