//! # mw-api
//!
//! The HTTP surface of the memory wall.

pub mod error;
pub mod handlers;
pub mod identity;
pub mod middleware;
pub mod state;

pub use state::AppState;

use actix_web::web;

/// Configures the routes for the wall.
///
/// Mounted by the binary at the root; media files are served separately.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/healthz", web::get().to(handlers::healthz)).service(
        web::scope("/api")
            .route("/identity", web::get().to(handlers::identity))
            .route("/entries", web::get().to(handlers::list_entries))
            .route("/entries", web::post().to(handlers::create_entry))
            .route("/entries/live", web::get().to(handlers::live_entries))
            .route("/entries/{id}", web::delete().to(handlers::delete_entry)),
    );
}
