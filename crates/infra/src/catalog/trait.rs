use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use storefront_core::{
    CartLine, Customer, CustomerId, DomainError, NewCustomer, NewProduct, Product, ProductId,
};

/// The record a [`CatalogError::NotFound`] refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Missing {
    Customer(CustomerId),
    CustomerEmail(String),
    Product(ProductId),
    CartLine {
        customer: CustomerId,
        product: ProductId,
    },
}

impl core::fmt::Display for Missing {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Missing::Customer(id) => write!(f, "customer {id}"),
            Missing::CustomerEmail(email) => write!(f, "customer with email {email}"),
            Missing::Product(id) => write!(f, "product {id}"),
            Missing::CartLine { customer, product } => {
                write!(f, "cart line (customer {customer}, product {product})")
            }
        }
    }
}

/// Catalog store operation error.
///
/// `NotFound`, `DuplicateEmail` and `Validation` are ordinary outcomes a caller
/// presents to the user. `Storage` covers connectivity and unexpected
/// constraint failures; the store never retries internally.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("not found: {0}")]
    NotFound(Missing),

    #[error("email already registered: {0}")]
    DuplicateEmail(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl CatalogError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<DomainError> for CatalogError {
    fn from(err: DomainError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Canonical relational store of customers, products and cart lines.
///
/// This is the system of record. Every search document is derived from it.
///
/// ## Cart semantics
///
/// - `add_to_cart` merges into an existing (customer, product) line or creates
///   it. The read-increment-write is atomic per pair, so concurrent adds never
///   lose an increment.
/// - `remove_from_cart` decrements by one and deletes the line when it reaches
///   zero. Removing a line that does not exist is `NotFound`, not a no-op.
/// - No operation ever leaves a zero or negative quantity behind.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Register a customer. Fails with `DuplicateEmail` if the email is taken.
    async fn create_customer(&self, customer: NewCustomer) -> Result<Customer, CatalogError>;

    async fn get_customer(&self, id: CustomerId) -> Result<Customer, CatalogError>;

    async fn get_customer_by_email(&self, email: &str) -> Result<Customer, CatalogError>;

    /// Insert a product and assign it a fresh, never reused identity.
    async fn add_product(&self, product: NewProduct) -> Result<Product, CatalogError>;

    /// All products when `name_filter` is `None` or empty, otherwise products
    /// whose name contains the filter (case-insensitive). Ordered by id.
    async fn search_products(&self, name_filter: Option<&str>)
    -> Result<Vec<Product>, CatalogError>;

    async fn add_to_cart(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), CatalogError>;

    async fn remove_from_cart(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> Result<(), CatalogError>;

    /// Every line in the customer's cart, joined with the current product
    /// record. Empty when the customer has no lines.
    async fn get_cart_items(&self, customer_id: CustomerId) -> Result<Vec<CartLine>, CatalogError>;
}

#[async_trait]
impl<S> CatalogStore for Arc<S>
where
    S: CatalogStore + ?Sized,
{
    async fn create_customer(&self, customer: NewCustomer) -> Result<Customer, CatalogError> {
        (**self).create_customer(customer).await
    }

    async fn get_customer(&self, id: CustomerId) -> Result<Customer, CatalogError> {
        (**self).get_customer(id).await
    }

    async fn get_customer_by_email(&self, email: &str) -> Result<Customer, CatalogError> {
        (**self).get_customer_by_email(email).await
    }

    async fn add_product(&self, product: NewProduct) -> Result<Product, CatalogError> {
        (**self).add_product(product).await
    }

    async fn search_products(
        &self,
        name_filter: Option<&str>,
    ) -> Result<Vec<Product>, CatalogError> {
        (**self).search_products(name_filter).await
    }

    async fn add_to_cart(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), CatalogError> {
        (**self).add_to_cart(customer_id, product_id, quantity).await
    }

    async fn remove_from_cart(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> Result<(), CatalogError> {
        (**self).remove_from_cart(customer_id, product_id).await
    }

    async fn get_cart_items(&self, customer_id: CustomerId) -> Result<Vec<CartLine>, CatalogError> {
        (**self).get_cart_items(customer_id).await
    }
}

/// Normalize an optional name filter: `None` and `""` both mean "no filter".
pub(crate) fn effective_filter(name_filter: Option<&str>) -> Option<&str> {
    name_filter.filter(|f| !f.is_empty())
}
