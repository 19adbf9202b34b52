//! Protocol repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide stable CRUD APIs over canonical `protocols` storage.
//! - Own additional-user participation: the `additional_users` join table
//!   is read and written only through this module.
//!
//! # Invariants
//! - The owning user probe and the write run in one immediate transaction.
//! - `set_additional_users` replaces the whole participant set atomically;
//!   a rejected user id leaves the previous set intact.
//! - Participant ids are deduplicated before persistence.

use crate::model::protocol::Protocol;
use crate::model::EntityId;
use crate::repo::user_repo::user_exists_on;
use crate::repo::{
    bool_to_int, ensure_connection_ready, int_to_bool, now_epoch_ms, RepoError, RepoResult,
};
use rusqlite::{params, Connection, Row, TransactionBehavior};
use std::collections::BTreeSet;

const PROTOCOL_SELECT_SQL: &str = "SELECT
    id,
    is_draft,
    is_reviewed,
    review_comment,
    is_closed,
    closed_at,
    created_or_edited,
    user_id,
    row_version
FROM protocols";

const PROTOCOL_COLUMNS: &[&str] = &[
    "id",
    "is_draft",
    "is_reviewed",
    "review_comment",
    "is_closed",
    "closed_at",
    "created_or_edited",
    "user_id",
    "row_version",
];

/// Repository interface for protocol CRUD and participation operations.
pub trait ProtocolRepository {
    /// Lists all protocols in insertion order.
    fn list_protocols(&self) -> RepoResult<Vec<Protocol>>;
    /// Loads one protocol or reports `NotFound`.
    fn get_protocol(&self, id: EntityId) -> RepoResult<Protocol>;
    /// Persists a new protocol and returns it with assigned id.
    fn create_protocol(&mut self, record: &Protocol) -> RepoResult<Protocol>;
    /// Fully replaces one protocol under optimistic concurrency.
    fn update_protocol(&mut self, id: EntityId, record: &Protocol) -> RepoResult<()>;
    /// Deletes one protocol; the schema cascades to join rows.
    fn delete_protocol(&mut self, id: EntityId) -> RepoResult<()>;
    /// Existence probe.
    fn protocol_exists(&self, id: EntityId) -> RepoResult<bool>;
    /// Lists participant user ids for one protocol.
    fn additional_users(&self, protocol_id: EntityId) -> RepoResult<Vec<EntityId>>;
    /// Replaces the participant set for one protocol atomically.
    fn set_additional_users(
        &mut self,
        protocol_id: EntityId,
        user_ids: &[EntityId],
    ) -> RepoResult<()>;
}

/// SQLite-backed protocol repository.
pub struct SqliteProtocolRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteProtocolRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, "protocols", PROTOCOL_COLUMNS)?;
        ensure_connection_ready(conn, "additional_users", &["user_id", "protocol_id"])?;
        Ok(Self { conn })
    }
}

impl ProtocolRepository for SqliteProtocolRepository<'_> {
    fn list_protocols(&self) -> RepoResult<Vec<Protocol>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PROTOCOL_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut protocols = Vec::new();
        while let Some(row) = rows.next()? {
            protocols.push(parse_protocol_row(row)?);
        }
        Ok(protocols)
    }

    fn get_protocol(&self, id: EntityId) -> RepoResult<Protocol> {
        let mut stmt = self
            .conn
            .prepare(&format!("{PROTOCOL_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return parse_protocol_row(row);
        }
        Err(RepoError::NotFound {
            entity: "protocol",
            id,
        })
    }

    fn create_protocol(&mut self, record: &Protocol) -> RepoResult<Protocol> {
        record.validate()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !user_exists_on(&tx, record.user_id)? {
            return Err(RepoError::ForeignKeyViolation {
                entity: "protocol",
                column: "user_id",
                referenced_id: record.user_id,
            });
        }

        let now = now_epoch_ms();
        tx.execute(
            "INSERT INTO protocols (
                is_draft,
                is_reviewed,
                review_comment,
                is_closed,
                closed_at,
                created_or_edited,
                user_id,
                row_version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 1);",
            params![
                bool_to_int(record.is_draft),
                bool_to_int(record.is_reviewed),
                record.review_comment.as_deref(),
                bool_to_int(record.is_closed),
                record.closed_at,
                now,
                record.user_id,
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        let mut created = record.clone();
        created.id = id;
        created.created_or_edited = now;
        created.row_version = 1;
        Ok(created)
    }

    fn update_protocol(&mut self, id: EntityId, record: &Protocol) -> RepoResult<()> {
        if record.id != id {
            return Err(RepoError::IdMismatch {
                path_id: id,
                record_id: record.id,
            });
        }
        record.validate()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        // Full replace may reassign the owning user.
        if !user_exists_on(&tx, record.user_id)? {
            return Err(RepoError::ForeignKeyViolation {
                entity: "protocol",
                column: "user_id",
                referenced_id: record.user_id,
            });
        }

        let changed = tx.execute(
            "UPDATE protocols
             SET
                is_draft = ?1,
                is_reviewed = ?2,
                review_comment = ?3,
                is_closed = ?4,
                closed_at = ?5,
                created_or_edited = ?6,
                user_id = ?7,
                row_version = row_version + 1
             WHERE id = ?8 AND row_version = ?9;",
            params![
                bool_to_int(record.is_draft),
                bool_to_int(record.is_reviewed),
                record.review_comment.as_deref(),
                bool_to_int(record.is_closed),
                record.closed_at,
                now_epoch_ms(),
                record.user_id,
                id,
                record.row_version,
            ],
        )?;

        if changed == 0 {
            if protocol_exists_on(&tx, id)? {
                return Err(RepoError::ConcurrencyConflict {
                    entity: "protocol",
                    id,
                });
            }
            return Err(RepoError::NotFound {
                entity: "protocol",
                id,
            });
        }

        tx.commit()?;
        Ok(())
    }

    fn delete_protocol(&mut self, id: EntityId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM protocols WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "protocol",
                id,
            });
        }
        Ok(())
    }

    fn protocol_exists(&self, id: EntityId) -> RepoResult<bool> {
        protocol_exists_on(self.conn, id)
    }

    fn additional_users(&self, protocol_id: EntityId) -> RepoResult<Vec<EntityId>> {
        if !protocol_exists_on(self.conn, protocol_id)? {
            return Err(RepoError::NotFound {
                entity: "protocol",
                id: protocol_id,
            });
        }

        let mut stmt = self.conn.prepare(
            "SELECT user_id
             FROM additional_users
             WHERE protocol_id = ?1
             ORDER BY user_id ASC;",
        )?;
        let mut rows = stmt.query([protocol_id])?;
        let mut user_ids = Vec::new();
        while let Some(row) = rows.next()? {
            user_ids.push(row.get(0)?);
        }
        Ok(user_ids)
    }

    fn set_additional_users(
        &mut self,
        protocol_id: EntityId,
        user_ids: &[EntityId],
    ) -> RepoResult<()> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !protocol_exists_on(&tx, protocol_id)? {
            return Err(RepoError::NotFound {
                entity: "protocol",
                id: protocol_id,
            });
        }

        let replacement: BTreeSet<EntityId> = user_ids.iter().copied().collect();
        for user_id in &replacement {
            if !user_exists_on(&tx, *user_id)? {
                return Err(RepoError::ForeignKeyViolation {
                    entity: "additional_user",
                    column: "user_id",
                    referenced_id: *user_id,
                });
            }
        }

        tx.execute(
            "DELETE FROM additional_users WHERE protocol_id = ?1;",
            [protocol_id],
        )?;
        for user_id in &replacement {
            tx.execute(
                "INSERT INTO additional_users (user_id, protocol_id) VALUES (?1, ?2);",
                params![user_id, protocol_id],
            )?;
        }

        tx.commit()?;
        Ok(())
    }
}

pub(crate) fn protocol_exists_on(conn: &Connection, id: EntityId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM protocols
            WHERE id = ?1
        );",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn parse_protocol_row(row: &Row<'_>) -> RepoResult<Protocol> {
    Ok(Protocol {
        id: row.get("id")?,
        is_draft: int_to_bool(row.get("is_draft")?, "protocols", "is_draft")?,
        is_reviewed: int_to_bool(row.get("is_reviewed")?, "protocols", "is_reviewed")?,
        review_comment: row.get("review_comment")?,
        is_closed: int_to_bool(row.get("is_closed")?, "protocols", "is_closed")?,
        closed_at: row.get("closed_at")?,
        created_or_edited: row.get("created_or_edited")?,
        user_id: row.get("user_id")?,
        row_version: row.get("row_version")?,
    })
}
