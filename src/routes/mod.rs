use actix_web::web;

use crate::middleware::CacheLayer;

pub mod overtime;

pub fn configure(cfg: &mut web::ServiceConfig, cache_layer: CacheLayer) {
    cfg.service(
        web::scope("/api/v1").configure(|cfg| overtime::configure(cfg, cache_layer)),
    );
}
