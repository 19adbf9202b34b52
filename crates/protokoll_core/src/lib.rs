//! Storage-and-access core for the protokoll record-management system.
//! This crate is the single source of truth for referential integrity and
//! concurrency invariants; HTTP adapters translate its typed outcomes into
//! status codes.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::organization::Organization;
pub use model::protocol::{AdditionalUser, Protocol};
pub use model::template::ProtocolTemplate;
pub use model::user::User;
pub use model::{EntityId, ValidationError};
pub use repo::organization_repo::{OrganizationRepository, SqliteOrganizationRepository};
pub use repo::protocol_repo::{ProtocolRepository, SqliteProtocolRepository};
pub use repo::template_repo::{SqliteTemplateRepository, TemplateRepository};
pub use repo::user_repo::{SqliteUserRepository, UserRepository};
pub use repo::{RepoError, RepoResult};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
