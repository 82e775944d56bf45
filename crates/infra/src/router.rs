//! Product listing routing.
//!
//! No filter (or an empty one) scans the catalog store, so listing never
//! depends on index health. A non-empty filter is a prefix search against the
//! index. Index failures are returned as-is: prefix and substring matching
//! select different products, so there is no fallback to the catalog.

use thiserror::Error;
use tracing::instrument;

use storefront_core::Product;

use crate::catalog::{CatalogError, CatalogStore};
use crate::search::{IndexError, SearchIndex};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),
}

/// Which backend answers a product query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProductSource<'a> {
    IndexBacked { term: &'a str },
    ScanBacked,
}

impl<'a> ProductSource<'a> {
    pub fn for_filter(filter: Option<&'a str>) -> Self {
        match filter {
            Some(term) if !term.is_empty() => Self::IndexBacked { term },
            _ => Self::ScanBacked,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryRouter<C, I> {
    catalog: C,
    index: I,
}

impl<C, I> QueryRouter<C, I>
where
    C: CatalogStore,
    I: SearchIndex,
{
    pub fn new(catalog: C, index: I) -> Self {
        Self { catalog, index }
    }

    pub fn route<'a>(&self, filter: Option<&'a str>) -> ProductSource<'a> {
        ProductSource::for_filter(filter)
    }

    #[instrument(skip(self), err)]
    pub async fn search_products(&self, filter: Option<&str>) -> Result<Vec<Product>, QueryError> {
        match self.route(filter) {
            ProductSource::ScanBacked => Ok(self.catalog.search_products(None).await?),
            ProductSource::IndexBacked { term } => {
                Ok(self.index.search_by_name_prefix(term).await?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use storefront_core::NewProduct;

    use super::*;
    use crate::catalog::InMemoryCatalogStore;
    use crate::search::InMemorySearchIndex;

    #[test]
    fn routes_missing_and_empty_filters_to_scan() {
        assert_eq!(ProductSource::for_filter(None), ProductSource::ScanBacked);
        assert_eq!(ProductSource::for_filter(Some("")), ProductSource::ScanBacked);
        assert_eq!(
            ProductSource::for_filter(Some("ap")),
            ProductSource::IndexBacked { term: "ap" }
        );
        // Whitespace is still a filter; the index decides whether it is searchable.
        assert_eq!(
            ProductSource::for_filter(Some(" ")),
            ProductSource::IndexBacked { term: " " }
        );
    }

    #[tokio::test]
    async fn scan_ignores_index_health() {
        let catalog = Arc::new(InMemoryCatalogStore::new());
        let index = Arc::new(InMemorySearchIndex::new());
        catalog
            .add_product(NewProduct::new("Bread", 4).unwrap())
            .await
            .unwrap();
        index.set_unavailable(true);

        let router = QueryRouter::new(catalog, index);
        assert_eq!(router.search_products(None).await.unwrap().len(), 1);
        assert_eq!(router.search_products(Some("")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn index_failure_is_not_masked_by_catalog() {
        let catalog = Arc::new(InMemoryCatalogStore::new());
        let index = Arc::new(InMemorySearchIndex::new());
        catalog
            .add_product(NewProduct::new("Apples", 6).unwrap())
            .await
            .unwrap();
        index.set_unavailable(true);

        let router = QueryRouter::new(catalog, index);
        assert!(matches!(
            router.search_products(Some("ap")).await,
            Err(QueryError::Index(IndexError::Unavailable(_)))
        ));
    }
}
