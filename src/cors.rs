use axum::http::{Method, header};
use tower_http::cors::{Any, CorsLayer};

/// Any origin may call the API with the catalog's four verbs.
pub fn build_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}
