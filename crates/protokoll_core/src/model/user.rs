//! User domain model.
//!
//! # Invariants
//! - `username`, `email`, and `password` are required.
//! - `organization_id` must reference an existing organization; the
//!   repository probes it before insert/update.

use crate::model::{require, EntityId, ValidationError};
use serde::{Deserialize, Serialize};

/// An account belonging to exactly one organization.
///
/// `password` holds whatever the adapter layer hands over; hashing is an
/// adapter concern, this layer only persists the value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// Server-assigned id. Zero on records not yet persisted.
    pub id: EntityId,
    pub username: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
    pub password: String,
    /// Epoch milliseconds of the last password change, if any.
    pub last_password_change_date: Option<i64>,
    pub password_change_required: Option<bool>,
    /// Epoch milliseconds, re-stamped on every create and update.
    pub created_or_edited: i64,
    /// Owning organization.
    pub organization_id: EntityId,
    /// Optimistic-concurrency token. Starts at 1, bumped per update.
    pub row_version: i64,
}

impl User {
    /// Creates an unpersisted user with required fields set.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
        organization_id: EntityId,
    ) -> Self {
        Self {
            id: 0,
            username: username.into(),
            first_name: None,
            last_name: None,
            email: email.into(),
            password: password.into(),
            last_password_change_date: None,
            password_change_required: None,
            created_or_edited: 0,
            organization_id,
            row_version: 0,
        }
    }

    /// Checks required fields. Called by repositories before any write.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("user", "username", &self.username)?;
        require("user", "email", &self.email)?;
        require("user", "password", &self.password)?;
        Ok(())
    }
}
