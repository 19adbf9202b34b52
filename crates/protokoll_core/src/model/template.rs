//! Protocol template domain model.
//!
//! # Invariants
//! - `name` and `template` are required.
//! - `organization_id` must reference an existing organization.

use crate::model::{require, EntityId, ValidationError};
use serde::{Deserialize, Serialize};

/// A reusable protocol body owned by one organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolTemplate {
    /// Server-assigned id. Zero on records not yet persisted.
    pub id: EntityId,
    pub name: String,
    pub description: Option<String>,
    /// Template body text.
    pub template: String,
    /// Epoch milliseconds, re-stamped on every create and update.
    pub created_or_edited: i64,
    /// Owning organization.
    pub organization_id: EntityId,
    /// Optimistic-concurrency token. Starts at 1, bumped per update.
    pub row_version: i64,
}

impl ProtocolTemplate {
    /// Creates an unpersisted template with required fields set.
    pub fn new(
        name: impl Into<String>,
        template: impl Into<String>,
        organization_id: EntityId,
    ) -> Self {
        Self {
            id: 0,
            name: name.into(),
            description: None,
            template: template.into(),
            created_or_edited: 0,
            organization_id,
            row_version: 0,
        }
    }

    /// Checks required fields. Called by repositories before any write.
    pub fn validate(&self) -> Result<(), ValidationError> {
        require("protocol_template", "name", &self.name)?;
        require("protocol_template", "template", &self.template)?;
        Ok(())
    }
}
