//! HTTP request handlers

pub mod admin;
pub mod auth;
pub mod middleware;
pub mod penduduk;
pub mod surat;

pub use admin::*;
pub use auth::*;
pub use penduduk::*;
pub use surat::*;

use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};

/// API routes with authentication and security headers applied. Transport
/// layers (tracing, body limit, CORS) are added by the caller.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/surat", post(submit_surat))
        .route("/surat/track/:tracking_code", get(track_surat))
        .route("/auth/login", post(login));

    let staff_routes = Router::new()
        .route("/auth/me", get(me))
        .route("/surat", get(list_surat))
        .route("/surat/:id", get(get_surat))
        .route("/surat/:id/process", post(process_surat))
        .route("/surat/:id/approve", post(approve_surat))
        .route("/surat/:id/reject", post(reject_surat))
        .route("/surat/:id/complete", post(complete_surat))
        .route("/dashboard", get(dashboard))
        .route("/penduduk", get(list_penduduk).post(create_penduduk))
        .route("/penduduk/:id", get(get_penduduk).put(update_penduduk))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_staff));

    // require_admin runs after require_staff has attached the user
    let admin_routes = Router::new()
        .route("/penduduk/:id", axum::routing::delete(delete_penduduk))
        .route("/admin/staff", get(list_staff).post(create_staff))
        .route_layer(from_fn(middleware::require_admin))
        .route_layer(from_fn_with_state(state.clone(), middleware::require_staff));

    let api_routes = public_routes.merge(staff_routes).merge(admin_routes);

    Router::new()
        .nest("/api", api_routes)
        .layer(from_fn_with_state(state.clone(), middleware::security_headers))
        .with_state(state)
}
