use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use async_trait::async_trait;

use storefront_core::{Product, ProductId};

use super::query::PrefixQuery;
use super::r#trait::{IndexError, SearchDocument, SearchIndex};

/// In-memory search index with the same prefix semantics as the RediSearch
/// backend. Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemorySearchIndex {
    documents: RwLock<BTreeMap<ProductId, SearchDocument>>,
    unavailable: AtomicBool,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an unreachable index: every operation fails with `Unavailable`.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    #[cfg(test)]
    pub(crate) fn document_count(&self) -> usize {
        self.documents.read().map(|d| d.len()).unwrap_or(0)
    }

    #[cfg(test)]
    pub(crate) fn contains(&self, id: ProductId) -> bool {
        self.documents
            .read()
            .map(|d| d.contains_key(&id))
            .unwrap_or(false)
    }

    fn ensure_available(&self) -> Result<(), IndexError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(IndexError::Unavailable("search index unavailable".into()));
        }
        Ok(())
    }
}

fn poisoned<T>(_: T) -> IndexError {
    IndexError::Unavailable("lock poisoned".into())
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn bootstrap(&self, products: &[Product]) -> Result<(), IndexError> {
        self.ensure_available()?;
        let rebuilt: BTreeMap<ProductId, SearchDocument> = products
            .iter()
            .map(|p| (p.id, SearchDocument::from(p)))
            .collect();
        *self.documents.write().map_err(poisoned)? = rebuilt;
        Ok(())
    }

    async fn index_one(&self, product: &Product) -> Result<(), IndexError> {
        self.ensure_available()?;
        self.documents
            .write()
            .map_err(poisoned)?
            .insert(product.id, SearchDocument::from(product));
        Ok(())
    }

    async fn search_by_name_prefix(&self, term: &str) -> Result<Vec<Product>, IndexError> {
        self.ensure_available()?;
        let query = PrefixQuery::parse(term)?;
        let documents = self.documents.read().map_err(poisoned)?;
        Ok(documents
            .values()
            .filter(|doc| query.matches(&doc.name))
            .cloned()
            .map(Product::from)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: i64, name: &str, price: u64) -> Product {
        Product {
            id: ProductId::new(id),
            name: name.to_string(),
            price,
        }
    }

    #[tokio::test]
    async fn bootstrap_replaces_previous_content() {
        let index = InMemorySearchIndex::new();
        index.index_one(&product(9, "Stale", 1)).await.unwrap();

        index
            .bootstrap(&[product(1, "Bread", 4), product(2, "Apples", 6)])
            .await
            .unwrap();

        assert_eq!(index.document_count(), 2);
        assert!(!index.contains(ProductId::new(9)));
    }

    #[tokio::test]
    async fn index_one_overwrites_by_id() {
        let index = InMemorySearchIndex::new();
        index.index_one(&product(1, "Bread", 4)).await.unwrap();
        index.index_one(&product(1, "Bread", 4)).await.unwrap();
        assert_eq!(index.document_count(), 1);
    }

    #[tokio::test]
    async fn prefix_search_is_case_insensitive() {
        let index = InMemorySearchIndex::new();
        index
            .bootstrap(&[product(1, "Bread", 4), product(2, "Apples", 6)])
            .await
            .unwrap();

        let hits = index.search_by_name_prefix("AP").await.unwrap();
        assert_eq!(hits, vec![product(2, "Apples", 6)]);
        assert!(index.search_by_name_prefix("zz").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn unavailable_index_fails_every_operation() {
        let index = InMemorySearchIndex::new();
        index.set_unavailable(true);

        assert!(matches!(
            index.search_by_name_prefix("ap").await,
            Err(IndexError::Unavailable(_))
        ));
        assert!(index.index_one(&product(1, "Bread", 4)).await.is_err());
        assert!(index.bootstrap(&[]).await.is_err());
    }
}
