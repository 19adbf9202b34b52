//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define CRUD contracts per entity with optimistic-concurrency updates.
//! - Isolate SQL details from adapter layers.
//!
//! # Invariants
//! - Repository writes enforce model `validate()` before persistence.
//! - Foreign keys are probed before insert/update so violations surface as
//!   `ForeignKeyViolation`, not as opaque constraint errors.
//! - A conditional update that changes zero rows is re-probed for
//!   existence: absent rows report `NotFound`, present rows report
//!   `ConcurrencyConflict`. The layer never retries on its own.

use crate::db::DbError;
use crate::model::{EntityId, ValidationError};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod organization_repo;
pub mod protocol_repo;
pub mod template_repo;
pub mod user_repo;

pub type RepoResult<T> = Result<T, RepoError>;

/// Typed outcome for every repository operation.
///
/// Each variant carries the entity name and id needed for an adapter to
/// pick a precise status code without re-querying.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Required field missing or empty.
    Validation(ValidationError),
    /// No row with the requested id.
    NotFound { entity: &'static str, id: EntityId },
    /// A referenced parent row does not exist.
    ForeignKeyViolation {
        entity: &'static str,
        column: &'static str,
        referenced_id: EntityId,
    },
    /// Version token mismatch on update while the row still exists.
    ConcurrencyConflict { entity: &'static str, id: EntityId },
    /// Caller-supplied id does not match the record's id.
    IdMismatch {
        path_id: EntityId,
        record_id: EntityId,
    },
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::NotFound { entity, id } => write!(f, "{entity} not found: {id}"),
            Self::ForeignKeyViolation {
                entity,
                column,
                referenced_id,
            } => write!(
                f,
                "{entity}.{column} references missing row {referenced_id}"
            ),
            Self::ConcurrencyConflict { entity, id } => {
                write!(f, "{entity} {id} was modified by another writer")
            }
            Self::IdMismatch { path_id, record_id } => write!(
                f,
                "record id {record_id} does not match requested id {path_id}"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "repository requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<ValidationError> for RepoError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Current wall-clock time in epoch milliseconds.
///
/// Stamped into `created_or_edited` on every create and update.
pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

/// Verifies the connection is migrated and carries the expected table shape.
pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    table: &'static str,
    columns: &[&'static str],
) -> RepoResult<()> {
    let expected_version = crate::db::migrations::latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, table)? {
        return Err(RepoError::MissingRequiredTable(table));
    }

    for column in columns.iter().copied() {
        if !table_has_column(conn, table, column)? {
            return Err(RepoError::MissingRequiredColumn { table, column });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}

pub(crate) fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}

pub(crate) fn int_to_bool(
    value: i64,
    table: &'static str,
    column: &'static str,
) -> RepoResult<bool> {
    match value {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid boolean value `{other}` in {table}.{column}"
        ))),
    }
}
