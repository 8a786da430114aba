//! Domain services used by the HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own business logic and persistence concerns so route
//! handlers can stay focused on protocol translation and auth plumbing.
//! External collaborators (identity, profile storage) are reached through
//! traits so the logic here runs against fakes in tests.

pub mod identity;
pub mod onboarding;
pub mod password;
pub mod profile;
pub mod session;
