//! Search index: a derived prefix index over product names.

pub mod in_memory;
pub mod query;
#[cfg(feature = "redis")]
pub mod redisearch;
pub mod r#trait;

pub use in_memory::InMemorySearchIndex;
pub use query::PrefixQuery;
#[cfg(feature = "redis")]
pub use redisearch::RediSearchIndex;
pub use r#trait::{IndexError, SearchDocument, SearchIndex};
