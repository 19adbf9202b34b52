//! Protocol domain model and the additional-user participation join.
//!
//! # Invariants
//! - `user_id` must reference an existing user (owning author).
//! - `(user_id, protocol_id)` pairs in the join are unique; the join is
//!   accessed only through protocol repository operations.
//!
//! The source system disagrees with itself on closed/reviewed state
//! (`is_closed` in the model, `is_reviewed` only in the migration), so this
//! model carries the union and leaves state coupling to domain policy.

use crate::model::{EntityId, ValidationError};
use serde::{Deserialize, Serialize};

/// A reviewable record owned by one user, progressing through
/// draft/review/closed states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Protocol {
    /// Server-assigned id. Zero on records not yet persisted.
    pub id: EntityId,
    pub is_draft: bool,
    pub is_reviewed: bool,
    pub review_comment: Option<String>,
    pub is_closed: bool,
    /// Epoch milliseconds of closing. `None` while never closed.
    pub closed_at: Option<i64>,
    /// Epoch milliseconds, re-stamped on every create and update.
    pub created_or_edited: i64,
    /// Owning user (author).
    pub user_id: EntityId,
    /// Optimistic-concurrency token. Starts at 1, bumped per update.
    pub row_version: i64,
}

impl Protocol {
    /// Creates an unpersisted draft protocol for the given owner.
    pub fn new_draft(user_id: EntityId) -> Self {
        Self {
            id: 0,
            is_draft: true,
            is_reviewed: false,
            review_comment: None,
            is_closed: false,
            closed_at: None,
            created_or_edited: 0,
            user_id,
            row_version: 0,
        }
    }

    /// Checks required fields. Protocols have no required text fields; the
    /// owning user reference is probed by the repository instead.
    pub fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// Participation grant: a secondary user attached to a protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalUser {
    pub user_id: EntityId,
    pub protocol_id: EntityId,
}
