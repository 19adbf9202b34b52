//! Entity models for the protokoll domain.
//!
//! # Responsibility
//! - Define the canonical data structures shared by repository and adapter
//!   layers.
//! - Declare required-field validation consulted by every write path.
//!
//! # Invariants
//! - Every root entity is identified by a server-assigned `i64` id.
//! - Relationships are foreign-key ids, never embedded object references.
//! - `row_version` is the optimistic-concurrency token; repositories bump
//!   it on every successful update.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod organization;
pub mod protocol;
pub mod template;
pub mod user;

/// Stable identifier for every persisted entity.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type EntityId = i64;

/// Required-field validation failure raised before any SQL mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationError {
    /// Entity the failing record belongs to (`organization`, `user`, ...).
    pub entity: &'static str,
    /// Field that is missing or empty.
    pub field: &'static str,
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{} is required", self.entity, self.field)
    }
}

impl Error for ValidationError {}

pub(crate) fn require(
    entity: &'static str,
    field: &'static str,
    value: &str,
) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError { entity, field });
    }
    Ok(())
}
