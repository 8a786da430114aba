//! Onboarding routes.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::Form;

use super::auth::Caller;
use crate::services::onboarding::{self, OnboardingError, OnboardingForm};
use crate::state::AppState;

pub(crate) fn onboarding_error_to_status(err: &OnboardingError) -> StatusCode {
    match err {
        OnboardingError::Unauthenticated => StatusCode::UNAUTHORIZED,
        OnboardingError::Metadata(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// `GET /onboarding`: onboarding form descriptor.
pub async fn onboarding_page(Caller(auth): Caller) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "page": "onboarding",
        "title": "Welcome",
        "fields": ["applicationName", "applicationType"],
        "applicationTypes": ["B2C", "B2B"],
        "onboardingComplete": auth.onboarding_complete(),
    }))
}

/// `POST /onboarding`: complete onboarding from the submitted form.
pub async fn complete(State(state): State<AppState>, Caller(auth): Caller, Form(form): Form<OnboardingForm>) -> Response {
    match onboarding::complete_onboarding(state.identity.as_ref(), &auth, form).await {
        Ok(message) => Json(serde_json::json!({ "message": message })).into_response(),
        Err(e) => {
            if let OnboardingError::Metadata(source) = &e {
                tracing::error!(error = %source, "onboarding metadata update failed");
            }
            (onboarding_error_to_status(&e), Json(serde_json::json!({ "error": e.to_string() }))).into_response()
        }
    }
}
