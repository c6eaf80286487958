use actix_web::web;

use crate::handlers::overtime;
use crate::middleware::{CacheLayer, ResponseCacheMiddleware};

/// The cache layer is shared with `OvertimeService`, which invalidates it
/// after every mutation.
pub fn configure(cfg: &mut web::ServiceConfig, cache_layer: CacheLayer) {
    cfg.service(
        web::scope("/overtime-submissions")
            .wrap(ResponseCacheMiddleware::new(cache_layer))
            .route("", web::post().to(overtime::insert_submission))
            .route("", web::get().to(overtime::get_submissions))
            .route("/summary", web::get().to(overtime::get_hours_summary))
            .route("/bulk/approve", web::post().to(overtime::bulk_approve))
            .route("/bulk/reject", web::post().to(overtime::bulk_reject))
            .route(
                "/bulk/accounted",
                web::post().to(overtime::bulk_mark_as_accounted),
            )
            .route("/bulk/cancel", web::post().to(overtime::bulk_cancel))
            .route("/{id}", web::get().to(overtime::get_submission))
            .route("/{id}", web::put().to(overtime::update_submission))
            .route("/{id}", web::delete().to(overtime::delete_submission))
            .route("/{id}/approve", web::post().to(overtime::approve_submission))
            .route("/{id}/reject", web::post().to(overtime::reject_submission))
            .route("/{id}/accounted", web::post().to(overtime::mark_as_accounted))
            .route("/{id}/cancel", web::post().to(overtime::cancel_submission))
            .route("/{id}/correct", web::post().to(overtime::correct_submission))
            .route("/{id}/complete", web::post().to(overtime::complete_submission))
            .route(
                "/{id}/employees-day-off",
                web::post().to(overtime::add_employee_day_off),
            )
            .route(
                "/{id}/employees-day-off/{identifier}",
                web::delete().to(overtime::remove_employee_day_off),
            ),
    );
}
