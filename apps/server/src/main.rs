#![warn(clippy::all, clippy::pedantic)]

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use homewatch_service::Config;
use homewatch_service::monitoring::{MonitoringEngine, SweepScheduler};
use tracing::info;

mod error;
mod models;
mod routes;
mod state;

use error::AppError;
use logger::init_tracing;
use state::AppState;

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    dotenv().ok();
    init_tracing();

    let config_path = env::var_os("HOMEWATCH_CONFIG").map(PathBuf::from);
    let mut config = Config::from_config(config_path.as_deref())?;
    config.apply_env_overrides(|key| env::var(key).ok())?;

    let engine = Arc::new(MonitoringEngine::new());
    let scheduler =
        SweepScheduler::from_config(Arc::clone(&engine), &config).map_err(AppError::Scheduler)?;
    let sweeps = scheduler.start();

    let result = run_server(web::Data::new(AppState::new(engine, config))).await;
    sweeps.abort();

    result
}

async fn run_server(state: web::Data<AppState>) -> Result<(), AppError> {
    let bind = state.config.server.bind.clone();
    let port = state.config.server.port;
    info!("Serving query API on {}:{}", bind, port);

    HttpServer::new(move || App::new().app_data(state.clone()).configure(routes::routes))
        .bind((bind.as_str(), port))?
        .run()
        .await?;

    Ok(())
}
