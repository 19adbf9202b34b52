//! Organization domain model.
//!
//! # Responsibility
//! - Define the top-level aggregate that owns users (and, transitively,
//!   protocols and templates).
//!
//! # Invariants
//! - `name` and `organization_type` are required.
//! - `id` is immutable after creation; updates are full replaces keyed on it.

use crate::model::{require, EntityId, ValidationError};
use serde::{Deserialize, Serialize};

/// A clinic, chapter, or other organizational unit.
///
/// Deleting an organization cascades to its users, their protocols, and all
/// dependent join rows; the organization subtree is the unit of lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    /// Server-assigned id. Zero on records not yet persisted.
    pub id: EntityId,
    /// Id of the parent organization; zero when there is none.
    pub parent_id: EntityId,
    pub name: String,
    pub address: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub organization_type: String,
    /// Epoch milliseconds, re-stamped on every create and update.
    pub created_or_edited: i64,
    /// Optimistic-concurrency token. Starts at 1, bumped per update.
    pub row_version: i64,
}

impl Organization {
    /// Creates an unpersisted organization with required fields set.
    pub fn new(name: impl Into<String>, organization_type: impl Into<String>) -> Self {
        Self {
            id: 0,
            parent_id: 0,
            name: name.into(),
            address: None,
            postal_code: None,
            city: None,
            country: None,
            organization_type: organization_type.into(),
            created_or_edited: 0,
            row_version: 0,
        }
    }

    /// Checks required fields. Called by repositories before any write.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("organization", "name", &self.name)?;
        require("organization", "organization_type", &self.organization_type)?;
        Ok(())
    }
}
