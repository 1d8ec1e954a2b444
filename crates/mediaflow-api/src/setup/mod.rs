//! Application startup: telemetry, database, storage, services and routes.

pub mod database;
pub mod routes;
pub mod server;
pub mod services;
pub mod storage;

pub use server::start_server;
pub use services::BackgroundTasks;

use anyhow::Result;
use axum::Router;
use mediaflow_core::Config;
use std::sync::Arc;

use crate::state::AppState;
use crate::telemetry::init_telemetry;

/// A fully wired application, ready to serve.
pub struct App {
    pub state: Arc<AppState>,
    pub router: Router,
    pub background: BackgroundTasks,
}

pub async fn initialize_app(config: Config) -> Result<App> {
    init_telemetry(config.log_format())?;

    tracing::info!(
        environment = %config.environment(),
        port = config.server_port(),
        "Starting Mediaflow API"
    );

    let pool = database::setup_database(&config).await?;
    let storage = storage::setup_storage(&config).await?;
    let (state, background) = services::setup_services(&config, pool, storage)?;
    let router = routes::setup_routes(state.clone());

    Ok(App {
        state,
        router,
        background,
    })
}
