//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every route sits behind the gate middleware, which redirects callers who
//! are signed out or not yet onboarded before any handler runs. Static assets,
//! the health probe, and sign-out pass through the middleware untouched.

pub mod auth;
pub mod gate;
pub mod onboarding;
pub mod pages;
pub mod profile;

use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    let assets = ServeDir::new(&state.config.static_dir);

    Router::new()
        .route("/", get(pages::home))
        .route("/about", get(pages::about))
        .route("/sign-up", get(auth::sign_up_page).post(auth::sign_up))
        .route("/sign-in", get(auth::sign_in_page).post(auth::sign_in))
        .route("/sign-out", post(auth::sign_out))
        .route("/onboarding", get(onboarding::onboarding_page).post(onboarding::complete))
        .route("/profile", get(profile::profile_page))
        .route("/api/me", get(auth::me))
        .route(
            "/api/profile",
            get(profile::get_profile)
                .post(profile::save_profile)
                .delete(profile::delete_profile),
        )
        .route("/healthz", get(pages::healthz))
        .nest_service("/assets", assets)
        .fallback(pages::not_found)
        .layer(middleware::from_fn_with_state(state.clone(), gate::gate))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
