use std::sync::Arc;

use actix_web::{HttpResponse, Responder, get, web};

pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::Config;
pub use services::{AuthService, OvertimeService};

use database::SubmissionStore;
use middleware::CacheLayer;
use services::Notifier;

#[get("/health")]
async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "timestamp": chrono::Utc::now()
    }))
}

/// Everything a worker needs; cloned into each `App`.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub service: OvertimeService,
    pub cache_layer: CacheLayer,
}

impl AppState {
    pub fn new(config: Config, store: Arc<dyn SubmissionStore>, notifier: Notifier) -> Self {
        let cache_layer = CacheLayer::new(config.cache_max_capacity, config.cache_ttl_seconds);
        let service = OvertimeService::new(store, notifier, cache_layer.clone());
        Self {
            config,
            service,
            cache_layer,
        }
    }
}

/// App data and routes, shared by the server binary and the integration tests.
pub fn configure_app(cfg: &mut web::ServiceConfig, state: &AppState) {
    cfg.app_data(web::Data::new(state.config.clone()))
        .app_data(web::Data::new(state.service.clone()))
        .service(health)
        .configure(|cfg| routes::configure(cfg, state.cache_layer.clone()));
}
