use std::time::Duration;

use anyhow::Context;
use serde::Serialize;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::config::AppConfig;

/// Builds the pool without touching the network; availability is checked
/// separately by [`probe`].
pub fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_secs))
        .connect_lazy(&config.database_url)
        .context("configure database pool")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Readiness {
    Ready,
    Unavailable { reason: String },
}

pub async fn probe(db: &PgPool) -> Readiness {
    match sqlx::query("SELECT 1").execute(db).await {
        Ok(_) => Readiness::Ready,
        Err(e) => {
            tracing::warn!(error = %e, "database probe failed");
            Readiness::Unavailable {
                reason: e.to_string(),
            }
        }
    }
}
