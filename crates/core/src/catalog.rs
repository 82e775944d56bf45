//! Catalog and cart records.
//!
//! These are plain data records: the catalog store assigns identities, the
//! search index holds derived copies of [`Product`], and cart lines join a
//! product snapshot at read time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};
use crate::id::{CustomerId, ProductId};

/// A catalog product. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Price in the smallest currency unit (e.g. cents).
    pub price: u64,
}

impl Product {
    /// Case-insensitive substring match on the product name.
    ///
    /// An empty needle matches every product.
    pub fn name_contains(&self, needle: &str) -> bool {
        self.name.to_lowercase().contains(&needle.to_lowercase())
    }
}

/// Validated input for creating a product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    name: String,
    price: u64,
}

impl NewProduct {
    pub fn new(name: impl Into<String>, price: u64) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        // Stored in a signed 64-bit column.
        if i64::try_from(price).is_err() {
            return Err(DomainError::validation(format!(
                "product price {price} exceeds the supported range"
            )));
        }
        Ok(Self { name, price })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn price(&self) -> u64 {
        self.price
    }

    /// Attach the identity assigned by the store.
    pub fn into_product(self, id: ProductId) -> Product {
        Product {
            id,
            name: self.name,
            price: self.price,
        }
    }
}

/// A registered customer.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: CustomerId,
    pub email: String,
    pub name: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl core::fmt::Debug for Customer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Customer")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("name", &self.name)
            .field("password_hash", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Validated input for registering a customer.
///
/// The password arrives already hashed; this crate never sees credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct NewCustomer {
    email: String,
    name: String,
    password_hash: String,
}

impl NewCustomer {
    pub fn new(
        email: impl Into<String>,
        name: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> DomainResult<Self> {
        let email = email.into();
        let password_hash = password_hash.into();
        if email.trim().is_empty() {
            return Err(DomainError::validation("email cannot be empty"));
        }
        if password_hash.is_empty() {
            return Err(DomainError::validation("password hash cannot be empty"));
        }
        Ok(Self {
            email,
            name: name.into(),
            password_hash,
        })
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    pub fn into_customer(self, id: CustomerId, created_at: DateTime<Utc>) -> Customer {
        Customer {
            id,
            email: self.email,
            name: self.name,
            password_hash: self.password_hash,
            created_at,
        }
    }
}

impl core::fmt::Debug for NewCustomer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NewCustomer")
            .field("email", &self.email)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// One cart entry: a customer's quantity of a product, joined with the
/// product snapshot at read time.
///
/// `quantity` is always >= 1; a line that would drop to zero is deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub customer_id: CustomerId,
    pub product: Product,
    pub quantity: u32,
}

impl CartLine {
    pub fn product_id(&self) -> ProductId {
        self.product.id
    }
}
