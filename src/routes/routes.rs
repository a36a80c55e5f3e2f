//! Defines routes for the stamp catalog API.
//!
//! ## Structure
//! - **Probes**
//!   - `GET    /`        — liveness string
//!   - `GET    /healthz` — liveness JSON
//!   - `GET    /readyz`  — DB + image store checks
//!
//! - **Catalog**
//!   - `GET    /api/stamps?category=` — list stamps
//!   - `POST   /api/stamps/add`       — create stamp (multipart)
//!   - `PUT    /api/stamps/{id}`      — partial update (JSON)
//!   - `DELETE /api/stamps/{id}`      — delete stamp
//!
//! - **Admin**
//!   - `GET    /api/admin/details` — bearer-token protected
//!
//! - **Static**
//!   - `GET    /uploads/{name}` — locally stored images

use crate::{
    cors::build_cors_layer,
    handlers::{
        admin_handlers::get_admin_details,
        health_handlers::{healthz, readyz, root},
        stamp_handlers::{add_stamp, delete_stamp, list_stamps, update_stamp},
    },
    services::image_store::UPLOADS_PREFIX,
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post, put},
};
use std::path::Path;
use tower_http::services::ServeDir;

/// Build the router for all API routes. Handlers share `AppState`.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // catalog
        .route("/api/stamps", get(list_stamps))
        .route("/api/stamps/add", post(add_stamp))
        .route("/api/stamps/{id}", put(update_stamp).delete(delete_stamp))
        // admin
        .route("/api/admin/details", get(get_admin_details))
}

/// The complete application: API routes, static uploads, body limit and CORS.
pub fn app(state: AppState, upload_dir: &Path, max_upload_bytes: usize) -> Router {
    routes()
        .nest_service(UPLOADS_PREFIX, ServeDir::new(upload_dir))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(build_cors_layer())
        .with_state(state)
}
