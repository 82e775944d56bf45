//! Storefront infrastructure: catalog store, search index and the services
//! that keep them consistent.
//!
//! - [`catalog`]: system of record (in-memory and Postgres)
//! - [`search`]: derived prefix index (in-memory and RediSearch)
//! - [`sync`]: bootstrap and propagation from catalog to index
//! - [`router`]: chooses the backend for a product query
//! - [`cart`]: cart operations for an authenticated customer
//! - [`storefront`]: the facade wiring all of the above

pub mod cart;
pub mod catalog;
pub mod config;
pub mod router;
pub mod search;
pub mod storefront;
pub mod sync;


pub use cart::CartManager;
pub use catalog::{CatalogError, CatalogStore, InMemoryCatalogStore, Missing, PostgresCatalogStore};
pub use config::{ConfigError, StorefrontConfig};
pub use router::{ProductSource, QueryError, QueryRouter};
#[cfg(feature = "redis")]
pub use search::RediSearchIndex;
pub use search::{InMemorySearchIndex, IndexError, SearchIndex};
pub use storefront::Storefront;
pub use sync::{BootstrapReport, IndexSynchronizer, SyncError};
