//! Keeps the search index derived from the catalog store.
//!
//! - **Bootstrap** rebuilds the index from a full catalog scan. It is all or
//!   nothing: any failure fails the whole rebuild.
//! - **Propagate** pushes one freshly added product. A failure leaves the
//!   product canonical but unsearchable by prefix until the next bootstrap.

use thiserror::Error;
use tracing::{info, instrument};

use storefront_core::Product;

use crate::catalog::{CatalogError, CatalogStore};
use crate::search::{IndexError, SearchIndex};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyncError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),
}

/// Outcome of a successful bootstrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct BootstrapReport {
    pub indexed: usize,
}

#[derive(Debug, Clone)]
pub struct IndexSynchronizer<C, I> {
    catalog: C,
    index: I,
}

impl<C, I> IndexSynchronizer<C, I>
where
    C: CatalogStore,
    I: SearchIndex,
{
    pub fn new(catalog: C, index: I) -> Self {
        Self { catalog, index }
    }

    /// Rebuild the index from the complete, unfiltered product set.
    #[instrument(skip(self), err)]
    pub async fn bootstrap(&self) -> Result<BootstrapReport, SyncError> {
        let products = self.catalog.search_products(None).await?;
        self.index.bootstrap(&products).await?;

        let report = BootstrapReport {
            indexed: products.len(),
        };
        info!(indexed = report.indexed, "search index rebuilt");
        Ok(report)
    }

    /// Index a product that the catalog store has just accepted.
    ///
    /// Failures are returned, not logged; the caller decides whether to absorb them.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn propagate(&self, product: &Product) -> Result<(), SyncError> {
        self.index.index_one(product).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use storefront_core::NewProduct;

    use super::*;
    use crate::catalog::InMemoryCatalogStore;
    use crate::search::InMemorySearchIndex;

    fn setup() -> (
        Arc<InMemoryCatalogStore>,
        Arc<InMemorySearchIndex>,
        IndexSynchronizer<Arc<InMemoryCatalogStore>, Arc<InMemorySearchIndex>>,
    ) {
        let catalog = Arc::new(InMemoryCatalogStore::new());
        let index = Arc::new(InMemorySearchIndex::new());
        let sync = IndexSynchronizer::new(catalog.clone(), index.clone());
        (catalog, index, sync)
    }

    #[tokio::test]
    async fn bootstrap_indexes_every_catalog_product() {
        let (catalog, index, sync) = setup();
        for (name, price) in [("Bread", 4), ("Apples", 6), ("Milk", 1)] {
            catalog
                .add_product(NewProduct::new(name, price).unwrap())
                .await
                .unwrap();
        }

        let report = sync.bootstrap().await.unwrap();
        assert_eq!(report, BootstrapReport { indexed: 3 });
        assert_eq!(index.document_count(), 3);
    }

    #[tokio::test]
    async fn bootstrap_fails_when_catalog_is_unreachable() {
        let (catalog, _, sync) = setup();
        catalog.set_unavailable(true);
        assert!(matches!(sync.bootstrap().await, Err(SyncError::Catalog(_))));
    }

    #[tokio::test]
    async fn bootstrap_fails_when_index_is_unreachable() {
        let (_, index, sync) = setup();
        index.set_unavailable(true);
        assert!(matches!(sync.bootstrap().await, Err(SyncError::Index(_))));
    }

    #[tokio::test]
    async fn propagate_twice_keeps_one_document() {
        let (catalog, index, sync) = setup();
        let product = catalog
            .add_product(NewProduct::new("Apples", 6).unwrap())
            .await
            .unwrap();

        sync.propagate(&product).await.unwrap();
        sync.propagate(&product).await.unwrap();
        assert_eq!(index.document_count(), 1);
        assert!(index.contains(product.id));
    }
}
