//! Onboarding completion: records the onboarding form in the caller's
//! public metadata and flips `onboardingComplete`.

use serde::Deserialize;

use super::identity::{AuthContext, IdentityError, IdentityProvider, PublicMetadata};

pub const COMPLETE_MESSAGE: &str = "Onboarding Complete";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardingForm {
    #[serde(default)]
    pub application_name: Option<String>,
    #[serde(default)]
    pub application_type: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum OnboardingError {
    #[error("No Logged In User")]
    Unauthenticated,
    #[error("There was an error updating the user metadata.")]
    Metadata(#[source] IdentityError),
}

/// Mark the caller as onboarded. The next context issued for them carries
/// `onboardingComplete = true`.
///
/// # Errors
///
/// Returns [`OnboardingError::Unauthenticated`] without a caller, or
/// [`OnboardingError::Metadata`] if the identity store rejects the update.
pub async fn complete_onboarding(
    identity: &dyn IdentityProvider,
    auth: &AuthContext,
    form: OnboardingForm,
) -> Result<&'static str, OnboardingError> {
    let user_id = auth.user_id.ok_or(OnboardingError::Unauthenticated)?;

    let metadata = PublicMetadata {
        onboarding_complete: Some(true),
        application_name: form.application_name,
        application_type: form.application_type,
    };

    identity
        .update_public_metadata(user_id, &metadata)
        .await
        .map_err(|e| match e {
            IdentityError::Unauthenticated => OnboardingError::Unauthenticated,
            other => OnboardingError::Metadata(other),
        })?;

    tracing::info!(%user_id, "onboarding complete");
    Ok(COMPLETE_MESSAGE)
}

#[cfg(test)]
#[path = "onboarding_test.rs"]
mod tests;
