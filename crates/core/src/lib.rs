//! `storefront-core`: catalog and cart domain primitives.
//!
//! This crate contains **pure domain** records and validation (no infrastructure concerns).

pub mod catalog;
pub mod error;
pub mod id;

pub use catalog::{CartLine, Customer, NewCustomer, NewProduct, Product};
pub use error::{DomainError, DomainResult};
pub use id::{CustomerId, ProductId};
