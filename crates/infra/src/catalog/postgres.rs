//! Postgres-backed catalog store.
//!
//! ## Error Mapping
//!
//! | PostgreSQL Error Code | CatalogError | Scenario |
//! |----------------------|--------------|----------|
//! | `23505` (unique violation) | `DuplicateEmail` | Registering an email that is already taken |
//! | `23503` (foreign key violation) | `NotFound` | Cart line for an unknown customer or product |
//! | `23514` (check violation) | `Validation` | Quantity overflow, blank product name |
//! | Any other / pool / network | `Storage` | Connectivity and unexpected failures |
//!
//! ## Cart concurrency
//!
//! `add_to_cart` is a single `INSERT .. ON CONFLICT DO UPDATE`, so concurrent
//! adds to the same line serialize on the row and never lose an increment.
//! `remove_from_cart` locks the row with `SELECT .. FOR UPDATE` inside a
//! transaction before deciding between decrement and delete.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{instrument, Span};

use storefront_cart::{LineState, LineWrite};
use storefront_core::{
    CartLine, Customer, CustomerId, NewCustomer, NewProduct, Product, ProductId,
};

use super::r#trait::{effective_filter, CatalogError, CatalogStore, Missing};

const CUSTOMER_FK: &str = "cart_items_customer_fk";
const PRODUCT_FK: &str = "cart_items_product_fk";

/// Schema statements, executed one by one by [`PostgresCatalogStore::init`].
const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS customers (
        id            BIGSERIAL PRIMARY KEY,
        email         TEXT NOT NULL UNIQUE,
        name          TEXT NOT NULL,
        password_hash TEXT NOT NULL,
        created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id    BIGSERIAL PRIMARY KEY,
        name  TEXT NOT NULL CHECK (btrim(name) <> ''),
        price BIGINT NOT NULL CHECK (price >= 0)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS cart_items (
        customer_id BIGINT NOT NULL,
        product_id  BIGINT NOT NULL,
        quantity    BIGINT NOT NULL CHECK (quantity >= 1 AND quantity <= 4294967295),
        PRIMARY KEY (customer_id, product_id),
        CONSTRAINT cart_items_customer_fk FOREIGN KEY (customer_id) REFERENCES customers (id),
        CONSTRAINT cart_items_product_fk FOREIGN KEY (product_id) REFERENCES products (id)
    )
    "#,
];

/// Postgres-backed catalog store.
///
/// `Send + Sync` and cheap to clone; all access goes through the SQLx pool.
#[derive(Debug, Clone)]
pub struct PostgresCatalogStore {
    pool: Arc<PgPool>,
}

impl PostgresCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    /// Create the tables if they do not exist yet.
    #[instrument(skip(self), err)]
    pub async fn init(&self) -> Result<(), CatalogError> {
        for statement in SCHEMA {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("init_schema", e))?;
        }
        Ok(())
    }
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    #[instrument(skip(self, customer), fields(email = %customer.email()), err)]
    async fn create_customer(&self, customer: NewCustomer) -> Result<Customer, CatalogError> {
        let row = sqlx::query(
            r#"
            INSERT INTO customers (email, name, password_hash)
            VALUES ($1, $2, $3)
            RETURNING id, created_at
            "#,
        )
        .bind(customer.email())
        .bind(customer.name())
        .bind(customer.password_hash())
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                CatalogError::DuplicateEmail(customer.email().to_string())
            } else {
                map_sqlx_error("create_customer", e)
            }
        })?;

        let id: i64 = row
            .try_get("id")
            .map_err(|e| map_sqlx_error("create_customer", e))?;
        let created_at: DateTime<Utc> = row
            .try_get("created_at")
            .map_err(|e| map_sqlx_error("create_customer", e))?;

        Ok(customer.into_customer(CustomerId::new(id), created_at))
    }

    #[instrument(skip(self), fields(customer_id = %id), err)]
    async fn get_customer(&self, id: CustomerId) -> Result<Customer, CatalogError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r#"
            SELECT id, email, name, password_hash, created_at
            FROM customers
            WHERE id = $1
            "#,
        )
        .bind(id.get())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_customer", e))?;

        row.map(Customer::from)
            .ok_or(CatalogError::NotFound(Missing::Customer(id)))
    }

    #[instrument(skip(self), err)]
    async fn get_customer_by_email(&self, email: &str) -> Result<Customer, CatalogError> {
        let row = sqlx::query_as::<_, CustomerRow>(
            r#"
            SELECT id, email, name, password_hash, created_at
            FROM customers
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_customer_by_email", e))?;

        row.map(Customer::from)
            .ok_or_else(|| CatalogError::NotFound(Missing::CustomerEmail(email.to_string())))
    }

    #[instrument(
        skip(self, product),
        fields(name = %product.name(), product_id = tracing::field::Empty),
        err
    )]
    async fn add_product(&self, product: NewProduct) -> Result<Product, CatalogError> {
        let price = price_to_column(product.price())?;

        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO products (name, price)
            VALUES ($1, $2)
            RETURNING id
            "#,
        )
        .bind(product.name())
        .bind(price)
        .fetch_one(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("add_product", e))?;

        Span::current().record("product_id", id);
        Ok(product.into_product(ProductId::new(id)))
    }

    #[instrument(skip(self), err)]
    async fn search_products(
        &self,
        name_filter: Option<&str>,
    ) -> Result<Vec<Product>, CatalogError> {
        let rows = match effective_filter(name_filter) {
            None => {
                sqlx::query_as::<_, ProductRow>("SELECT id, name, price FROM products ORDER BY id")
                    .fetch_all(&*self.pool)
                    .await
            }
            Some(filter) => {
                sqlx::query_as::<_, ProductRow>(
                    r#"
                    SELECT id, name, price
                    FROM products
                    WHERE strpos(lower(name), lower($1)) > 0
                    ORDER BY id
                    "#,
                )
                .bind(filter)
                .fetch_all(&*self.pool)
                .await
            }
        }
        .map_err(|e| map_sqlx_error("search_products", e))?;

        rows.into_iter().map(ProductRow::into_product).collect()
    }

    #[instrument(
        skip(self),
        fields(customer_id = %customer_id, product_id = %product_id),
        err
    )]
    async fn add_to_cart(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
        quantity: u32,
    ) -> Result<(), CatalogError> {
        // Rejects zero before touching the database.
        LineState::Absent.add(quantity)?;

        sqlx::query(
            r#"
            INSERT INTO cart_items (customer_id, product_id, quantity)
            VALUES ($1, $2, $3)
            ON CONFLICT (customer_id, product_id)
            DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity
            "#,
        )
        .bind(customer_id.get())
        .bind(product_id.get())
        .bind(i64::from(quantity))
        .execute(&*self.pool)
        .await
        .map_err(|e| map_cart_error("add_to_cart", e, customer_id, product_id))?;

        Ok(())
    }

    #[instrument(
        skip(self),
        fields(customer_id = %customer_id, product_id = %product_id),
        err
    )]
    async fn remove_from_cart(
        &self,
        customer_id: CustomerId,
        product_id: ProductId,
    ) -> Result<(), CatalogError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let stored: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT quantity
            FROM cart_items
            WHERE customer_id = $1 AND product_id = $2
            FOR UPDATE
            "#,
        )
        .bind(customer_id.get())
        .bind(product_id.get())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("remove_from_cart", e))?;

        let current = LineState::from_quantity(quantity_from_column(stored.unwrap_or(0))?);
        let next = current.remove().map_err(|_| {
            CatalogError::NotFound(Missing::CartLine {
                customer: customer_id,
                product: product_id,
            })
        })?;

        match current.write_to(next) {
            Some(LineWrite::Update(q)) | Some(LineWrite::Insert(q)) => {
                sqlx::query(
                    r#"
                    UPDATE cart_items SET quantity = $3
                    WHERE customer_id = $1 AND product_id = $2
                    "#,
                )
                .bind(customer_id.get())
                .bind(product_id.get())
                .bind(i64::from(q.get()))
                .execute(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("remove_from_cart", e))?;
            }
            Some(LineWrite::Delete) => {
                sqlx::query("DELETE FROM cart_items WHERE customer_id = $1 AND product_id = $2")
                    .bind(customer_id.get())
                    .bind(product_id.get())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| map_sqlx_error("remove_from_cart", e))?;
            }
            None => {}
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(customer_id = %customer_id), err)]
    async fn get_cart_items(&self, customer_id: CustomerId) -> Result<Vec<CartLine>, CatalogError> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r#"
            SELECT c.quantity, p.id, p.name, p.price
            FROM cart_items c
            JOIN products p ON p.id = c.product_id
            WHERE c.customer_id = $1
            ORDER BY p.id
            "#,
        )
        .bind(customer_id.get())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_cart_items", e))?;

        rows.into_iter()
            .map(|row| {
                Ok(CartLine {
                    customer_id,
                    quantity: quantity_from_column(row.quantity)?,
                    product: product_from_columns(row.id, row.name, row.price)?,
                })
            })
            .collect()
    }
}

// SQLx row types

#[derive(Debug)]
struct CustomerRow {
    id: i64,
    email: String,
    name: String,
    password_hash: String,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, PgRow> for CustomerRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(CustomerRow {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            name: row.try_get("name")?,
            password_hash: row.try_get("password_hash")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<CustomerRow> for Customer {
    fn from(row: CustomerRow) -> Self {
        Customer {
            id: CustomerId::new(row.id),
            email: row.email,
            name: row.name,
            password_hash: row.password_hash,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug)]
struct ProductRow {
    id: i64,
    name: String,
    price: i64,
}

impl<'r> sqlx::FromRow<'r, PgRow> for ProductRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            price: row.try_get("price")?,
        })
    }
}

impl ProductRow {
    fn into_product(self) -> Result<Product, CatalogError> {
        product_from_columns(self.id, self.name, self.price)
    }
}

#[derive(Debug)]
struct CartLineRow {
    quantity: i64,
    id: i64,
    name: String,
    price: i64,
}

impl<'r> sqlx::FromRow<'r, PgRow> for CartLineRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(CartLineRow {
            quantity: row.try_get("quantity")?,
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            price: row.try_get("price")?,
        })
    }
}

fn product_from_columns(id: i64, name: String, price: i64) -> Result<Product, CatalogError> {
    let price = u64::try_from(price)
        .map_err(|_| CatalogError::storage(format!("product {id} has negative price {price}")))?;
    Ok(Product {
        id: ProductId::new(id),
        name,
        price,
    })
}

fn price_to_column(price: u64) -> Result<i64, CatalogError> {
    i64::try_from(price)
        .map_err(|_| CatalogError::Validation(format!("price {price} exceeds the supported range")))
}

fn quantity_from_column(quantity: i64) -> Result<u32, CatalogError> {
    u32::try_from(quantity)
        .map_err(|_| CatalogError::storage(format!("stored quantity {quantity} is out of range")))
}

/// Which side of a cart line a foreign key constraint guards.
fn missing_for_constraint(
    constraint: Option<&str>,
    customer_id: CustomerId,
    product_id: ProductId,
) -> Option<Missing> {
    match constraint? {
        CUSTOMER_FK => Some(Missing::Customer(customer_id)),
        PRODUCT_FK => Some(Missing::Product(product_id)),
        _ => None,
    }
}

fn map_cart_error(
    operation: &str,
    err: sqlx::Error,
    customer_id: CustomerId,
    product_id: ProductId,
) -> CatalogError {
    if let sqlx::Error::Database(db_err) = &err {
        match db_err.code().as_deref() {
            Some("23503") => {
                if let Some(missing) =
                    missing_for_constraint(db_err.constraint(), customer_id, product_id)
                {
                    return CatalogError::NotFound(missing);
                }
            }
            Some("23514") => {
                return CatalogError::Validation("cart quantity overflow".to_string());
            }
            _ => {}
        }
    }
    map_sqlx_error(operation, err)
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> CatalogError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23514") => CatalogError::Validation(msg),
                _ => CatalogError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            CatalogError::storage(format!("connection pool closed in {operation}"))
        }
        _ => CatalogError::storage(format!("sqlx error in {operation}: {err}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}
