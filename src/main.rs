mod app;
mod auth;
mod config;
mod db;
mod day;
mod error;
mod foods;
mod slots;
mod state;
mod targets;

use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "mealplan=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let app_state = AppState::init()?;

    // The service starts even when the database is down; reads degrade to defaults.
    match db::probe(&app_state.db).await {
        db::Readiness::Ready => {
            if let Err(e) = sqlx::migrate!("./migrations").run(&app_state.db).await {
                tracing::warn!(error = %e, "migration failed; continuing");
            }
        }
        db::Readiness::Unavailable { reason } => {
            tracing::warn!(%reason, "database unavailable at startup; skipping migrations");
        }
    }

    app::serve(app::build_app(app_state)).await
}
