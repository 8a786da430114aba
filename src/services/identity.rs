//! Identity provider: sign-up, sign-in, session verification, and the
//! per-user public metadata that carries the onboarding flag.
//!
//! ARCHITECTURE
//! ============
//! Everything the gate and the handlers know about the caller flows through
//! [`AuthContext`], which only an [`IdentityProvider`] produces. The trait is
//! the seam: [`PgIdentity`] backs it with the `users` and `sessions` tables,
//! and tests swap in an in-memory fake.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::{password, session};

// =============================================================================
// CLAIMS
// =============================================================================

/// Public metadata stored per user. A merge leaves `onboardingComplete`
/// alone when it is `None`, but always writes both application fields, so a
/// missing form value is stored as null. Keys outside this struct are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onboarding_complete: Option<bool>,
    #[serde(default)]
    pub application_name: Option<String>,
    #[serde(default)]
    pub application_type: Option<String>,
}

/// Verified claims carried by a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionClaims {
    pub metadata: Option<PublicMetadata>,
}

/// The caller as seen by the gate and the handlers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthContext {
    pub user_id: Option<Uuid>,
    pub session_claims: Option<SessionClaims>,
}

impl AuthContext {
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn signed_in(user_id: Uuid, metadata: PublicMetadata) -> Self {
        Self { user_id: Some(user_id), session_claims: Some(SessionClaims { metadata: Some(metadata) }) }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.user_id.is_some()
    }

    /// Missing claims or metadata count as not onboarded.
    #[must_use]
    pub fn onboarding_complete(&self) -> bool {
        self.session_claims
            .as_ref()
            .and_then(|c| c.metadata.as_ref())
            .and_then(|m| m.onboarding_complete)
            .unwrap_or(false)
    }
}

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub name: Option<String>,
}

/// A freshly issued session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionGrant {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IdentityUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub image_url: Option<String>,
    pub public_metadata: PublicMetadata,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("not signed in")]
    Unauthenticated,
    #[error("invalid email")]
    InvalidEmail,
    #[error("password must be at least {} characters", password::MIN_PASSWORD_LEN)]
    WeakPassword,
    #[error("an account with this email already exists")]
    EmailTaken,
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("password error: {0}")]
    Password(#[from] password::PasswordError),
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

// =============================================================================
// PROVIDER TRAIT
// =============================================================================

#[async_trait::async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Resolve a session token into an auth context. A missing, unknown, or
    /// expired token yields an anonymous context, not an error.
    ///
    /// # Errors
    ///
    /// Returns an error only if the backing store cannot be reached.
    async fn authenticate(&self, session_token: Option<&str>) -> Result<AuthContext, IdentityError>;

    /// Create an account and open a session for it.
    async fn sign_up(&self, new_user: &NewUser) -> Result<SessionGrant, IdentityError>;

    /// Verify credentials and open a session.
    async fn sign_in(&self, email: &str, password: &str) -> Result<SessionGrant, IdentityError>;

    /// Close a session. Unknown tokens are ignored.
    async fn sign_out(&self, session_token: &str) -> Result<(), IdentityError>;

    /// Merge `metadata` into the user's public metadata.
    async fn update_public_metadata(&self, user_id: Uuid, metadata: &PublicMetadata) -> Result<(), IdentityError>;

    async fn user(&self, user_id: Uuid) -> Result<Option<IdentityUser>, IdentityError>;
}

// =============================================================================
// HELPERS
// =============================================================================

#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(normalized)
}

fn name_from_email(email: &str) -> String {
    email
        .split('@')
        .next()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or("user")
        .to_owned()
}

/// Decode a stored metadata column. Malformed JSON is treated as empty.
pub(crate) fn decode_metadata(raw: serde_json::Value) -> PublicMetadata {
    serde_json::from_value(raw).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "malformed public metadata, treating as empty");
        PublicMetadata::default()
    })
}

/// Validate sign-up input, returning the normalized email and display name.
///
/// # Errors
///
/// Returns [`IdentityError::InvalidEmail`] or [`IdentityError::WeakPassword`].
pub fn validate_new_user(new_user: &NewUser) -> Result<(String, String), IdentityError> {
    let email = normalize_email(&new_user.email).ok_or(IdentityError::InvalidEmail)?;
    if !password::is_acceptable(&new_user.password) {
        return Err(IdentityError::WeakPassword);
    }
    let name = new_user
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .map_or_else(|| name_from_email(&email), str::to_owned);
    Ok((email, name))
}

// =============================================================================
// POSTGRES PROVIDER
// =============================================================================

pub struct PgIdentity {
    pool: PgPool,
    session_ttl_hours: i64,
}

impl PgIdentity {
    #[must_use]
    pub fn new(pool: PgPool, session_ttl_hours: i64) -> Self {
        Self { pool, session_ttl_hours }
    }
}

#[async_trait::async_trait]
impl IdentityProvider for PgIdentity {
    async fn authenticate(&self, session_token: Option<&str>) -> Result<AuthContext, IdentityError> {
        let Some(token) = session_token.filter(|t| !t.is_empty()) else {
            return Ok(AuthContext::anonymous());
        };
        let Some(user) = session::validate_session(&self.pool, token).await? else {
            return Ok(AuthContext::anonymous());
        };
        Ok(AuthContext::signed_in(user.id, decode_metadata(user.public_metadata)))
    }

    async fn sign_up(&self, new_user: &NewUser) -> Result<SessionGrant, IdentityError> {
        let (email, name) = validate_new_user(new_user)?;
        let password_hash = password::hash_password(&new_user.password)?;

        let row = sqlx::query(
            r"INSERT INTO users (email, name, password_hash)
              VALUES ($1, $2, $3)
              ON CONFLICT (email) DO NOTHING
              RETURNING id",
        )
        .bind(&email)
        .bind(&name)
        .bind(&password_hash)
        .fetch_optional(&self.pool)
        .await?;
        let user_id: Uuid = row.ok_or(IdentityError::EmailTaken)?.get("id");

        let token = session::create_session(&self.pool, user_id, self.session_ttl_hours).await?;
        tracing::info!(%user_id, "user signed up");
        Ok(SessionGrant { user_id, token })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<SessionGrant, IdentityError> {
        let email = normalize_email(email).ok_or(IdentityError::InvalidCredentials)?;
        let row = sqlx::query("SELECT id, password_hash FROM users WHERE email = $1")
            .bind(&email)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(IdentityError::InvalidCredentials)?;

        let stored_hash: String = row.get("password_hash");
        if !password::verify_password(password, &stored_hash)? {
            return Err(IdentityError::InvalidCredentials);
        }

        let user_id: Uuid = row.get("id");
        let token = session::create_session(&self.pool, user_id, self.session_ttl_hours).await?;
        Ok(SessionGrant { user_id, token })
    }

    async fn sign_out(&self, session_token: &str) -> Result<(), IdentityError> {
        session::delete_session(&self.pool, session_token).await?;
        Ok(())
    }

    async fn update_public_metadata(&self, user_id: Uuid, metadata: &PublicMetadata) -> Result<(), IdentityError> {
        let patch = serde_json::to_value(metadata).unwrap_or_else(|_| serde_json::json!({}));
        let result = sqlx::query("UPDATE users SET public_metadata = public_metadata || $2 WHERE id = $1")
            .bind(user_id)
            .bind(patch)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(IdentityError::Unauthenticated);
        }
        Ok(())
    }

    async fn user(&self, user_id: Uuid) -> Result<Option<IdentityUser>, IdentityError> {
        let row = sqlx::query("SELECT id, email, name, image_url, public_metadata FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| IdentityUser {
            id: r.get("id"),
            email: r.get("email"),
            name: r.get("name"),
            image_url: r.get("image_url"),
            public_metadata: decode_metadata(r.get("public_metadata")),
        }))
    }
}

#[cfg(test)]
#[path = "identity_test.rs"]
mod tests;
