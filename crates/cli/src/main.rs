//! Storefront CLI.
//!
//! Commands:
//! - `storefront bootstrap` (default) - create the schema and rebuild the search index
//! - `storefront seed` - insert the demo products

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sqlx::postgres::PgPoolOptions;
use tracing::{error, info};

use storefront_infra::{PostgresCatalogStore, RediSearchIndex, Storefront, StorefrontConfig};
use storefront_observability::LogFormat;

const DEMO_PRODUCTS: &[(&str, u64)] = &[
    ("Bread", 4),
    ("Meat", 16),
    ("Rice", 5),
    ("Eggs", 4),
    ("Apples", 6),
    ("Potato", 4),
    ("Tomato", 6),
    ("Onion", 4),
    ("Chicken", 13),
    ("Milk", 1),
];

type PgStorefront = Storefront<Arc<PostgresCatalogStore>, Arc<RediSearchIndex>>;

/// Catalog, cart and product search backend
#[derive(Parser)]
#[command(name = "storefront")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log output format (`json` or `pretty`); falls back to `LOG_FORMAT`
    #[arg(long, global = true)]
    log_format: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy, Debug, PartialEq, Eq)]
enum Commands {
    /// Create the catalog schema and rebuild the search index
    Bootstrap,

    /// Insert the demo products into the catalog and the index
    Seed,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let format = cli
        .log_format
        .or_else(|| std::env::var("LOG_FORMAT").ok());
    storefront_observability::tracing::init(LogFormat::from_env_value(format.as_deref()));

    let result = run(cli.command.unwrap_or(Commands::Bootstrap)).await;
    if let Err(err) = &result {
        error!(error = %format!("{err:#}"), "storefront command failed");
    }
    result
}

async fn run(command: Commands) -> Result<()> {
    let config = StorefrontConfig::from_env().context("loading configuration")?;
    let storefront = connect(&config).await?;

    match command {
        Commands::Bootstrap => {
            let report = storefront
                .bootstrap_index()
                .await
                .context("rebuilding search index")?;
            info!(indexed = report.indexed, "bootstrap complete");
        }
        Commands::Seed => seed(&storefront).await,
    }
    Ok(())
}

async fn connect(config: &StorefrontConfig) -> Result<PgStorefront> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("connecting to Postgres")?;

    let catalog = PostgresCatalogStore::new(pool);
    catalog.init().await.context("creating catalog schema")?;

    let index = RediSearchIndex::new(
        &config.redis_url,
        config.search_index_name.clone(),
        config.search_page_size,
    )
    .context("configuring search index")?;

    Ok(Storefront::new(Arc::new(catalog), Arc::new(index)))
}

/// Insert the demo products one by one; a failed insert is logged and skipped.
async fn seed(storefront: &PgStorefront) {
    let mut inserted = 0usize;
    for (name, price) in DEMO_PRODUCTS {
        match storefront.add_product(name, *price).await {
            Ok(product) => {
                inserted += 1;
                info!(product_id = %product.id, name = %product.name, "seeded product");
            }
            Err(err) => error!(name = %name, error = %err, "failed to seed product"),
        }
    }
    info!(inserted, total = DEMO_PRODUCTS.len(), "seeding finished");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bootstrap_is_the_default_command() {
        let cli = Cli::parse_from(["storefront"]);
        assert_eq!(cli.command, None);

        let cli = Cli::parse_from(["storefront", "seed", "--log-format", "pretty"]);
        assert_eq!(cli.command, Some(Commands::Seed));
        assert_eq!(cli.log_format.as_deref(), Some("pretty"));
    }

    #[test]
    fn demo_products_are_valid() {
        assert_eq!(DEMO_PRODUCTS.len(), 10);
        assert!(DEMO_PRODUCTS.iter().all(|(name, _)| !name.is_empty()));
    }
}
