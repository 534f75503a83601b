use std::sync::Arc;

use anyhow::Context;
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use tracing::info;

use painterp_infra::{
    BillingService, CatalogStore, InMemoryCatalogStore, InventoryService, PostgresCatalogStore,
};

use crate::config::AppConfig;

/// Application services shared by every handler.
#[derive(Clone)]
pub struct AppServices {
    pub inventory: InventoryService,
    pub billing: BillingService,
}

impl AppServices {
    pub fn new(store: Arc<dyn CatalogStore>, default_tax_rate: Decimal) -> Self {
        Self {
            inventory: InventoryService::new(store.clone()),
            billing: BillingService::new(store).with_default_tax_rate(default_tax_rate),
        }
    }

    /// Postgres when `DATABASE_URL` is configured, the in-memory store otherwise.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let store: Arc<dyn CatalogStore> = match &config.database_url {
            Some(url) => {
                let pool = PgPoolOptions::new()
                    .max_connections(config.database_max_connections)
                    .connect(url)
                    .await
                    .context("failed to connect to DATABASE_URL")?;
                let store = PostgresCatalogStore::new(pool);
                store
                    .ensure_schema()
                    .await
                    .context("failed to bootstrap database schema")?;
                info!(
                    max_connections = config.database_max_connections,
                    "using postgres catalog store"
                );
                Arc::new(store)
            }
            None => {
                info!("DATABASE_URL not set; using in-memory catalog store");
                Arc::new(InMemoryCatalogStore::new())
            }
        };

        Ok(Self::new(store, config.default_tax_rate))
    }
}
