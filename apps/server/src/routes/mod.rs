use actix_web::web;
use serde::Deserialize;

use crate::error::ApiError;

mod downtime;
mod health;
mod services;


/// Look-back window used when a request does not pass `hours`
pub const DEFAULT_WINDOW_HOURS: u32 = 24;
pub const MAX_WINDOW_HOURS: u32 = 168;

pub fn routes(cfg: &mut web::ServiceConfig) {
    health::routes(cfg);
    cfg.service(
        web::scope("/api/v1")
            .configure(services::routes)
            .configure(downtime::routes),
    );
}

/// `?hours=N` on windowed endpoints
#[derive(Debug, Default, Deserialize)]
pub struct WindowQuery {
    hours: Option<String>,
}

impl WindowQuery {
    pub fn hours(&self) -> Result<u32, ApiError> {
        let Some(raw) = self.hours.as_deref() else {
            return Ok(DEFAULT_WINDOW_HOURS);
        };

        raw.trim()
            .parse::<u32>()
            .ok()
            .filter(|hours| (1..=MAX_WINDOW_HOURS).contains(hours))
            .ok_or_else(|| ApiError::InvalidWindow {
                raw: raw.to_string(),
                min: 1,
                max: MAX_WINDOW_HOURS,
            })
    }
}
