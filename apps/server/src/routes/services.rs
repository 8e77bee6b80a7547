use std::collections::HashMap;

use actix_web::{HttpResponse, get, web};
use tracing::debug;

use super::{DEFAULT_WINDOW_HOURS, WindowQuery};
use crate::error::ApiError;
use crate::models::{HistoryEntry, HistoryResponse, ServiceEntry, ServicesResponse};
use crate::state::AppState;

// `history` must be registered before `{name}` or it is shadowed
macros_utils::routes! {
    route service_history,
    route list_services,
    route get_service,
}

/// Every configured instance ordered by name, with the last day of incidents
#[get("/services")]
pub async fn list_services(state: web::Data<AppState>) -> HttpResponse {
    let snapshots: HashMap<String, _> = state
        .engine
        .service_snapshots()
        .await
        .into_iter()
        .map(|snapshot| (snapshot.name.clone(), snapshot))
        .collect();

    let mut services: Vec<ServiceEntry> = state
        .config
        .instances
        .iter()
        .map(|instance| ServiceEntry::new(instance, snapshots.get(&instance.name)))
        .collect();
    services.sort_by(|a, b| a.name.cmp(&b.name));
    debug!("Returning {} services, {} checked", services.len(), snapshots.len());

    HttpResponse::Ok().json(ServicesResponse {
        services,
        downtime_events: state.engine.recent_downtime_events(DEFAULT_WINDOW_HOURS).await,
        categories: state.config.categories.clone(),
    })
}

#[get("/services/history")]
pub async fn service_history(
    state: web::Data<AppState>,
    query: web::Query<WindowQuery>,
) -> Result<HttpResponse, ApiError> {
    let hours = query.hours()?;
    let history = state.engine.history(hours).await.into_iter().map(HistoryEntry::from).collect();

    Ok(HttpResponse::Ok().json(HistoryResponse {
        history,
        downtime_events: state.engine.recent_downtime_events(hours).await,
    }))
}

#[get("/services/{name}")]
pub async fn get_service(
    state: web::Data<AppState>,
    name: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let name = name.into_inner();
    let instance = state.config.instance(&name).ok_or_else(|| ApiError::ServiceNotFound(name.clone()))?;
    let snapshot = state.engine.snapshot(&name).await;

    Ok(HttpResponse::Ok().json(ServiceEntry::new(instance, snapshot.as_ref())))
}
