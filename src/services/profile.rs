//! Profile service: one editable profile record per signed-in user.
//!
//! DESIGN
//! ======
//! Storage sits behind [`ProfileStore`] so the upsert policy here can be
//! exercised against an in-memory store. Upsert is lookup-then-write; the
//! `UNIQUE (user_id)` constraint in the migration turns a lost race between
//! two concurrent first saves into a store error instead of a second row.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use super::identity::AuthContext;

// =============================================================================
// TYPES
// =============================================================================

/// A stored profile. Mirrors the `profiles` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User-editable profile fields, as submitted by the profile form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProfileFields {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

impl ProfileFields {
    /// Blank form values are stored as null.
    #[must_use]
    pub fn normalized(self) -> Self {
        fn blank_to_none(v: Option<String>) -> Option<String> {
            v.filter(|s| !s.is_empty())
        }
        Self {
            full_name: blank_to_none(self.full_name),
            bio: blank_to_none(self.bio),
            phone: blank_to_none(self.phone),
            address: blank_to_none(self.address),
            avatar_url: blank_to_none(self.avatar_url),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("Unauthorized")]
    Unauthenticated,
    #[error(transparent)]
    Store(#[from] StoreError),
}

// =============================================================================
// STORE TRAIT
// =============================================================================

#[async_trait::async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError>;
    async fn exists(&self, user_id: Uuid) -> Result<bool, StoreError>;
    async fn insert(&self, user_id: Uuid, fields: &ProfileFields) -> Result<(), StoreError>;
    async fn update(&self, user_id: Uuid, fields: &ProfileFields) -> Result<(), StoreError>;
    async fn delete(&self, user_id: Uuid) -> Result<(), StoreError>;
}

// =============================================================================
// OPERATIONS
// =============================================================================

fn caller_id(auth: &AuthContext) -> Result<Uuid, ProfileError> {
    auth.user_id.ok_or(ProfileError::Unauthenticated)
}

/// Fetch the caller's profile. `Ok(None)` when no profile has been saved yet.
///
/// # Errors
///
/// Returns [`ProfileError::Unauthenticated`] without a caller, or a store error.
pub async fn get_profile(store: &dyn ProfileStore, auth: &AuthContext) -> Result<Option<Profile>, ProfileError> {
    let user_id = caller_id(auth)?;
    Ok(store.find(user_id).await?)
}

/// Save the caller's profile, updating it if one exists and creating it otherwise.
///
/// # Errors
///
/// Returns [`ProfileError::Unauthenticated`] without a caller, or a store error.
pub async fn create_or_update_profile(
    store: &dyn ProfileStore,
    auth: &AuthContext,
    fields: ProfileFields,
) -> Result<UpsertOutcome, ProfileError> {
    let user_id = caller_id(auth)?;
    let fields = fields.normalized();

    if store.exists(user_id).await? {
        store.update(user_id, &fields).await?;
        Ok(UpsertOutcome::Updated)
    } else {
        store.insert(user_id, &fields).await?;
        Ok(UpsertOutcome::Created)
    }
}

/// Delete the caller's profile. Deleting a missing profile succeeds.
///
/// # Errors
///
/// Returns [`ProfileError::Unauthenticated`] without a caller, or a store error.
pub async fn delete_profile(store: &dyn ProfileStore, auth: &AuthContext) -> Result<(), ProfileError> {
    let user_id = caller_id(auth)?;
    store.delete(user_id).await?;
    Ok(())
}

// =============================================================================
// POSTGRES STORE
// =============================================================================

pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn profile_from_row(r: &PgRow) -> Profile {
    Profile {
        id: r.get("id"),
        user_id: r.get("user_id"),
        full_name: r.get("full_name"),
        avatar_url: r.get("avatar_url"),
        bio: r.get("bio"),
        phone: r.get("phone"),
        address: r.get("address"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

#[async_trait::async_trait]
impl ProfileStore for PgProfileStore {
    async fn find(&self, user_id: Uuid) -> Result<Option<Profile>, StoreError> {
        let row = sqlx::query(
            r"SELECT id, user_id, full_name, avatar_url, bio, phone, address, created_at, updated_at
              FROM profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(profile_from_row))
    }

    async fn exists(&self, user_id: Uuid) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT id FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn insert(&self, user_id: Uuid, fields: &ProfileFields) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO profiles (user_id, full_name, bio, phone, address, avatar_url)
              VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(user_id)
        .bind(&fields.full_name)
        .bind(&fields.bio)
        .bind(&fields.phone)
        .bind(&fields.address)
        .bind(&fields.avatar_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update(&self, user_id: Uuid, fields: &ProfileFields) -> Result<(), StoreError> {
        sqlx::query(
            r"UPDATE profiles
              SET full_name = $2, bio = $3, phone = $4, address = $5, avatar_url = $6, updated_at = now()
              WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(&fields.full_name)
        .bind(&fields.bio)
        .bind(&fields.phone)
        .bind(&fields.address)
        .bind(&fields.avatar_url)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete(&self, user_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM profiles WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "profile_test.rs"]
mod tests;
