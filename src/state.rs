//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor and
//! into the gate middleware via `from_fn_with_state`. The identity provider
//! and profile store are trait objects, so the whole router runs against
//! in-memory fakes in tests.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::gate::Gate;
use crate::services::identity::IdentityProvider;
use crate::services::profile::ProfileStore;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub gate: Gate,
    pub identity: Arc<dyn IdentityProvider>,
    pub profiles: Arc<dyn ProfileStore>,
}

impl AppState {
    #[must_use]
    pub fn new(config: AppConfig, identity: Arc<dyn IdentityProvider>, profiles: Arc<dyn ProfileStore>) -> Self {
        Self { config: Arc::new(config), gate: Gate::new(), identity, profiles }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
