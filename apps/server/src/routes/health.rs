use actix_web::{HttpResponse, Responder, get, web};

use crate::models::HealthResponse;
use crate::state::AppState;

macros_utils::routes! {
    route health_route,
}

/// Liveness of the server itself, plus how much the engine tracks
#[get("/health")]
pub async fn health_route(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        services_tracked: state.engine.tracked_services().await,
        sweep_running: state.engine.is_sweep_running(),
    })
}
