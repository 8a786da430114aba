//! Page descriptors for the public pages, the 404 fallback, and the health probe.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};

use super::auth::Caller;

/// `GET /`: home.
pub async fn home(Caller(auth): Caller) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "page": "home",
        "title": "Welcome to your authenticated dashboard!",
        "userId": auth.user_id,
        "links": ["/profile", "/about"],
    }))
}

/// `GET /about`
pub async fn about() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "page": "about",
        "title": "About",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(serde_json::json!({ "error": "Not Found" })))
}

pub async fn healthz() -> StatusCode {
    StatusCode::OK
}
