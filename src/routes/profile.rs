//! Profile routes. Every operation is scoped to the calling user.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::Form;
use serde::Serialize;

use super::auth::Caller;
use crate::services::profile::{self, Profile, ProfileError, ProfileFields};
use crate::state::AppState;

#[derive(Serialize)]
pub struct ProfileResponse {
    pub data: Option<Profile>,
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct MutationResponse {
    pub success: bool,
    pub error: Option<String>,
}

pub(crate) fn profile_error_to_status(err: &ProfileError) -> StatusCode {
    match err {
        ProfileError::Unauthenticated => StatusCode::UNAUTHORIZED,
        ProfileError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn log_store_error(err: &ProfileError) {
    if let ProfileError::Store(e) = err {
        tracing::error!(error = %e, "profile store operation failed");
    }
}

fn mutation_failed(err: &ProfileError) -> Response {
    log_store_error(err);
    let body = MutationResponse { success: false, error: Some(err.to_string()) };
    (profile_error_to_status(err), Json(body)).into_response()
}

/// `GET /api/profile`: the caller's profile, or `data: null` if none saved.
pub async fn get_profile(State(state): State<AppState>, Caller(auth): Caller) -> Response {
    match profile::get_profile(state.profiles.as_ref(), &auth).await {
        Ok(data) => Json(ProfileResponse { data, error: None }).into_response(),
        Err(e) => {
            log_store_error(&e);
            let body = ProfileResponse { data: None, error: Some(e.to_string()) };
            (profile_error_to_status(&e), Json(body)).into_response()
        }
    }
}

/// `POST /api/profile`: create or update the caller's profile.
pub async fn save_profile(
    State(state): State<AppState>,
    Caller(auth): Caller,
    Form(fields): Form<ProfileFields>,
) -> Response {
    match profile::create_or_update_profile(state.profiles.as_ref(), &auth, fields).await {
        Ok(outcome) => {
            tracing::debug!(user_id = ?auth.user_id, ?outcome, "profile saved");
            Json(MutationResponse { success: true, error: None }).into_response()
        }
        Err(e) => mutation_failed(&e),
    }
}

/// `DELETE /api/profile`: delete the caller's profile.
pub async fn delete_profile(State(state): State<AppState>, Caller(auth): Caller) -> Response {
    match profile::delete_profile(state.profiles.as_ref(), &auth).await {
        Ok(()) => Json(MutationResponse { success: true, error: None }).into_response(),
        Err(e) => mutation_failed(&e),
    }
}

/// `GET /profile`: profile page descriptor with the stored profile.
pub async fn profile_page(State(state): State<AppState>, Caller(auth): Caller) -> Response {
    match profile::get_profile(state.profiles.as_ref(), &auth).await {
        Ok(data) => Json(serde_json::json!({
            "page": "profile",
            "title": "Update Profile",
            "fields": ["full_name", "phone", "address", "bio", "avatar_url"],
            "profile": data,
        }))
        .into_response(),
        Err(e) => {
            log_store_error(&e);
            (profile_error_to_status(&e), Json(serde_json::json!({ "error": e.to_string() }))).into_response()
        }
    }
}
