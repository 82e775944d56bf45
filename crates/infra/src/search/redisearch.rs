//! RediSearch-backed search index.
//!
//! ## Layout
//!
//! - **Index**: `<index_name>`, `ON HASH PREFIX 1 <index_name>:product:`
//! - **Schema**: `id NUMERIC SORTABLE`, `name TEXT SORTABLE`, `price NUMERIC`
//! - **Documents**: one hash per product at `<index_name>:product:<id>`, so
//!   re-indexing a product overwrites its hash
//!
//! Bootstrap drops the index together with its documents (`FT.DROPINDEX .. DD`)
//! before recreating it. The index is created with `STOPWORDS 0`, so words
//! like "the" stay searchable. RediSearch ignores prefix terms shorter than
//! two characters, so a one-letter term may return fewer matches than the
//! in-memory backend.

use std::sync::Arc;

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::Value;
use tracing::{debug, instrument};

use storefront_core::{Product, ProductId};

use super::query::PrefixQuery;
use super::r#trait::{IndexError, SearchDocument, SearchIndex};

/// Number of `HSET` commands sent per pipeline during bootstrap.
const INDEX_BATCH_SIZE: usize = 500;

#[derive(Debug, Clone)]
pub struct RediSearchIndex {
    client: Arc<redis::Client>,
    index_name: String,
    page_size: usize,
}

impl RediSearchIndex {
    /// # Arguments
    ///
    /// * `redis_url` - Redis connection URL (e.g., "redis://localhost:6379")
    /// * `index_name` - RediSearch index name, also the document key prefix
    /// * `page_size` - `LIMIT` page size used to drain search results
    pub fn new(
        redis_url: impl AsRef<str>,
        index_name: impl Into<String>,
        page_size: usize,
    ) -> Result<Self, IndexError> {
        let client = redis::Client::open(redis_url.as_ref()).map_err(map_redis_error)?;
        Ok(Self {
            client: Arc::new(client),
            index_name: index_name.into(),
            page_size: page_size.max(1),
        })
    }

    fn document_prefix(&self) -> String {
        format!("{}:product:", self.index_name)
    }

    fn document_key(&self, id: ProductId) -> String {
        format!("{}{}", self.document_prefix(), id)
    }

    async fn connection(&self) -> Result<MultiplexedConnection, IndexError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(map_redis_error)
    }

    /// Arguments of `FT.CREATE`. Stopwords are disabled so every word of a
    /// name is prefix-searchable.
    fn create_index_args(&self) -> Vec<String> {
        let mut args = vec![
            self.index_name.clone(),
            "ON".into(),
            "HASH".into(),
            "PREFIX".into(),
            "1".into(),
            self.document_prefix(),
            "STOPWORDS".into(),
            "0".into(),
            "SCHEMA".into(),
        ];
        args.extend(
            ["id", "NUMERIC", "SORTABLE", "name", "TEXT", "SORTABLE", "price", "NUMERIC"]
                .map(String::from),
        );
        args
    }

    fn hset(&self, pipe: &mut redis::Pipeline, doc: &SearchDocument) {
        pipe.cmd("HSET")
            .arg(self.document_key(doc.id))
            .arg("id")
            .arg(doc.id.get())
            .arg("name")
            .arg(&doc.name)
            .arg("price")
            .arg(doc.price)
            .ignore();
    }
}

#[async_trait]
impl SearchIndex for RediSearchIndex {
    #[instrument(
        skip(self, products),
        fields(index = %self.index_name, product_count = products.len()),
        err
    )]
    async fn bootstrap(&self, products: &[Product]) -> Result<(), IndexError> {
        let mut conn = self.connection().await?;

        let dropped: redis::RedisResult<Value> = redis::cmd("FT.DROPINDEX")
            .arg(&self.index_name)
            .arg("DD")
            .query_async(&mut conn)
            .await;
        match dropped {
            Ok(_) => debug!("dropped existing index"),
            Err(e) if is_unknown_index(&e) => debug!("no existing index to drop"),
            Err(e) => return Err(map_redis_error(e)),
        }

        redis::cmd("FT.CREATE")
            .arg(self.create_index_args())
            .query_async::<_, ()>(&mut conn)
            .await
            .map_err(map_redis_error)?;

        for batch in products.chunks(INDEX_BATCH_SIZE) {
            let mut pipe = redis::pipe();
            for product in batch {
                self.hset(&mut pipe, &SearchDocument::from(product));
            }
            pipe.query_async::<_, ()>(&mut conn)
                .await
                .map_err(map_redis_error)?;
        }

        Ok(())
    }

    #[instrument(
        skip(self, product),
        fields(index = %self.index_name, product_id = %product.id),
        err
    )]
    async fn index_one(&self, product: &Product) -> Result<(), IndexError> {
        let mut conn = self.connection().await?;
        let mut pipe = redis::pipe();
        self.hset(&mut pipe, &SearchDocument::from(product));
        pipe.query_async::<_, ()>(&mut conn)
            .await
            .map_err(map_redis_error)
    }

    #[instrument(skip(self), fields(index = %self.index_name), err)]
    async fn search_by_name_prefix(&self, term: &str) -> Result<Vec<Product>, IndexError> {
        let query = PrefixQuery::parse(term)?.to_redisearch("name");
        let mut conn = self.connection().await?;

        let mut products = Vec::new();
        let mut offset = 0usize;
        loop {
            let reply: Value = redis::cmd("FT.SEARCH")
                .arg(&self.index_name)
                .arg(&query)
                .arg("RETURN")
                .arg(3)
                .arg("id")
                .arg("name")
                .arg("price")
                .arg("SORTBY")
                .arg("id")
                .arg("ASC")
                .arg("LIMIT")
                .arg(offset)
                .arg(self.page_size)
                .query_async(&mut conn)
                .await
                .map_err(map_redis_error)?;

            let (total, page) = parse_search_reply(reply)?;
            let fetched = page.len();
            products.extend(page.into_iter().map(Product::from));
            offset += fetched;

            if fetched == 0 || offset >= total {
                break;
            }
        }

        Ok(products)
    }
}

fn map_redis_error(err: redis::RedisError) -> IndexError {
    if err.is_io_error()
        || err.is_connection_refusal()
        || err.is_timeout()
        || err.is_connection_dropped()
    {
        IndexError::Unavailable(err.to_string())
    } else {
        IndexError::Query(err.to_string())
    }
}

fn is_unknown_index(err: &redis::RedisError) -> bool {
    let msg = err.to_string().to_lowercase();
    msg.contains("unknown index") || msg.contains("no such index")
}

/// Parse an `FT.SEARCH` reply: `[total, key, [field, value, ..], key, [..], ..]`.
fn parse_search_reply(reply: Value) -> Result<(usize, Vec<SearchDocument>), IndexError> {
    let items = match reply {
        Value::Bulk(items) => items,
        other => {
            return Err(IndexError::MalformedDocument(format!(
                "expected array reply, got {other:?}"
            )));
        }
    };

    let mut items = items.into_iter();
    let total = match items.next() {
        Some(Value::Int(n)) => usize::try_from(n).unwrap_or(0),
        other => {
            return Err(IndexError::MalformedDocument(format!(
                "expected result count, got {other:?}"
            )));
        }
    };

    let mut documents = Vec::new();
    while let Some(key) = items.next() {
        let key = value_to_string(&key)?;
        let fields = match items.next() {
            Some(Value::Bulk(fields)) => fields,
            other => {
                return Err(IndexError::MalformedDocument(format!(
                    "document {key} has no field list, got {other:?}"
                )));
            }
        };
        documents.push(parse_document(&key, &fields)?);
    }

    Ok((total, documents))
}

fn parse_document(key: &str, fields: &[Value]) -> Result<SearchDocument, IndexError> {
    let mut id = None;
    let mut name = None;
    let mut price = None;

    for pair in fields.chunks(2) {
        let [field, value] = pair else {
            return Err(IndexError::MalformedDocument(format!(
                "document {key} has an odd field list"
            )));
        };
        match value_to_string(field)?.as_str() {
            "id" => id = Some(value_to_string(value)?),
            "name" => name = Some(value_to_string(value)?),
            "price" => price = Some(value_to_string(value)?),
            _ => {}
        }
    }

    let missing = |field: &str| IndexError::MalformedDocument(format!("document {key} has no {field}"));
    let id = id.ok_or_else(|| missing("id"))?;
    let name = name.ok_or_else(|| missing("name"))?;
    let price = price.ok_or_else(|| missing("price"))?;

    Ok(SearchDocument {
        id: id
            .parse::<ProductId>()
            .map_err(|e| IndexError::MalformedDocument(format!("document {key}: {e}")))?,
        name,
        price: price.parse::<u64>().map_err(|e| {
            IndexError::MalformedDocument(format!("document {key}: invalid price {price:?}: {e}"))
        })?,
    })
}

fn value_to_string(value: &Value) -> Result<String, IndexError> {
    match value {
        Value::Data(data) => Ok(String::from_utf8_lossy(data).into_owned()),
        Value::Status(s) => Ok(s.clone()),
        Value::Int(n) => Ok(n.to_string()),
        other => Err(IndexError::MalformedDocument(format!(
            "expected string, got {other:?}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(s: &str) -> Value {
        Value::Data(s.as_bytes().to_vec())
    }

    fn doc(key: &str, id: &str, name: &str, price: &str) -> [Value; 2] {
        [
            data(key),
            Value::Bulk(vec![
                data("id"),
                data(id),
                data("name"),
                data(name),
                data("price"),
                data(price),
            ]),
        ]
    }

    #[test]
    fn parses_search_reply_documents() {
        let mut items = vec![Value::Int(2)];
        items.extend(doc("products:product:1", "1", "Apples", "6"));
        items.extend(doc("products:product:4", "4", "Apricots", "9"));

        let (total, docs) = parse_search_reply(Value::Bulk(items)).unwrap();
        assert_eq!(total, 2);
        assert_eq!(
            docs,
            vec![
                SearchDocument {
                    id: ProductId::new(1),
                    name: "Apples".into(),
                    price: 6
                },
                SearchDocument {
                    id: ProductId::new(4),
                    name: "Apricots".into(),
                    price: 9
                },
            ]
        );
    }

    #[test]
    fn empty_result_is_not_an_error() {
        let (total, docs) = parse_search_reply(Value::Bulk(vec![Value::Int(0)])).unwrap();
        assert_eq!(total, 0);
        assert!(docs.is_empty());
    }

    #[test]
    fn rejects_documents_with_bad_fields() {
        let mut items = vec![Value::Int(1)];
        items.extend(doc("products:product:1", "one", "Apples", "6"));
        assert!(matches!(
            parse_search_reply(Value::Bulk(items)),
            Err(IndexError::MalformedDocument(_))
        ));

        let mut items = vec![Value::Int(1)];
        items.extend(doc("products:product:1", "1", "Apples", "-6"));
        assert!(parse_search_reply(Value::Bulk(items)).is_err());
    }

    #[test]
    fn rejects_non_array_reply() {
        assert!(matches!(
            parse_search_reply(Value::Okay),
            Err(IndexError::MalformedDocument(_))
        ));
    }

    #[test]
    fn document_keys_share_the_index_prefix() {
        let index = RediSearchIndex::new("redis://127.0.0.1:6379", "products", 100).unwrap();
        assert_eq!(index.document_key(ProductId::new(7)), "products:product:7");
        assert!(index.document_key(ProductId::new(7)).starts_with(&index.document_prefix()));
    }

    #[test]
    fn create_index_disables_stopwords() {
        let index = RediSearchIndex::new("redis://127.0.0.1:6379", "products", 100).unwrap();
        let args = index.create_index_args();

        assert_eq!(args[..6], ["products", "ON", "HASH", "PREFIX", "1", "products:product:"]);
        let stopwords = args.iter().position(|a| a == "STOPWORDS").unwrap();
        assert_eq!(args[stopwords + 1], "0");
        let schema = args.iter().position(|a| a == "SCHEMA").unwrap();
        assert!(stopwords < schema);
        assert_eq!(
            args[schema + 1..],
            ["id", "NUMERIC", "SORTABLE", "name", "TEXT", "SORTABLE", "price", "NUMERIC"]
        );
    }

    #[test]
    fn unknown_index_reply_is_recognised() {
        let err = redis::RedisError::from((
            redis::ErrorKind::ResponseError,
            "An error was signalled by the server",
            "Unknown Index name".to_string(),
        ));
        assert!(is_unknown_index(&err));
        assert!(matches!(map_redis_error(err), IndexError::Query(_)));
    }
}
