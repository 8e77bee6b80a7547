use actix_web::{HttpResponse, get, web};

use super::WindowQuery;
use crate::error::ApiError;
use crate::state::AppState;

macros_utils::routes! {
    route list_downtime,
}

/// Incidents that started within the window, newest first
#[get("/downtime")]
pub async fn list_downtime(
    state: web::Data<AppState>,
    query: web::Query<WindowQuery>,
) -> Result<HttpResponse, ApiError> {
    let hours = query.hours()?;
    Ok(HttpResponse::Ok().json(state.engine.recent_downtime_events(hours).await))
}
