// API route configuration

use crate::api::handlers;
use actix_web::web;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Health check (no auth required)
        .route("/health", web::get().to(handlers::health_check))
        .route("/", web::get().to(handlers::health_check))
        // API v1 routes (all require the shared secret)
        .service(
            web::scope("/api/v1")
                .route("/sync/trigger", web::post().to(handlers::trigger_sync))
                .route("/sync/status", web::get().to(handlers::sync_status))
                .route("/metrics/{sku}", web::get().to(handlers::get_metric)),
        );
}
