use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use storefront_core::{Product, ProductId};

/// Search index operation error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// The index backend could not be reached.
    #[error("search index unavailable: {0}")]
    Unavailable(String),

    /// The backend rejected the command or the term is not searchable.
    #[error("search query failed: {0}")]
    Query(String),

    /// A stored document could not be turned back into a product.
    #[error("malformed search document: {0}")]
    MalformedDocument(String),
}

/// The derived copy of a product held by the index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub id: ProductId,
    pub name: String,
    pub price: u64,
}

impl From<&Product> for SearchDocument {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            price: product.price,
        }
    }
}

impl From<SearchDocument> for Product {
    fn from(doc: SearchDocument) -> Self {
        Product {
            id: doc.id,
            name: doc.name,
            price: doc.price,
        }
    }
}

/// Derived, rebuildable prefix index over product names.
///
/// The index is a cache of the catalog store and may be thrown away at any
/// time. Documents are keyed by product id, so indexing the same product twice
/// leaves one document.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Drop all existing content, recreate the schema and index `products`.
    async fn bootstrap(&self, products: &[Product]) -> Result<(), IndexError>;

    /// Add or overwrite the document for one product.
    async fn index_one(&self, product: &Product) -> Result<(), IndexError>;

    /// Products whose name matches `term` as a case-insensitive prefix.
    ///
    /// No matches is `Ok(vec![])`. Results are ordered by product id.
    async fn search_by_name_prefix(&self, term: &str) -> Result<Vec<Product>, IndexError>;
}

#[async_trait]
impl<S> SearchIndex for Arc<S>
where
    S: SearchIndex + ?Sized,
{
    async fn bootstrap(&self, products: &[Product]) -> Result<(), IndexError> {
        (**self).bootstrap(products).await
    }

    async fn index_one(&self, product: &Product) -> Result<(), IndexError> {
        (**self).index_one(product).await
    }

    async fn search_by_name_prefix(&self, term: &str) -> Result<Vec<Product>, IndexError> {
        (**self).search_by_name_prefix(term).await
    }
}
