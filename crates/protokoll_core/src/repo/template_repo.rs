//! Protocol template repository contracts and SQLite implementation.
//!
//! # Invariants
//! - Write paths call `ProtocolTemplate::validate()` before SQL mutations.
//! - The owning organization probe and the write run in one immediate
//!   transaction.

use crate::model::template::ProtocolTemplate;
use crate::model::EntityId;
use crate::repo::organization_repo::organization_exists_on;
use crate::repo::{ensure_connection_ready, now_epoch_ms, RepoError, RepoResult};
use rusqlite::{params, Connection, Row, TransactionBehavior};

const TEMPLATE_SELECT_SQL: &str = "SELECT
    id,
    name,
    description,
    template,
    created_or_edited,
    organization_id,
    row_version
FROM protocol_templates";

const TEMPLATE_COLUMNS: &[&str] = &[
    "id",
    "name",
    "description",
    "template",
    "created_or_edited",
    "organization_id",
    "row_version",
];

/// Repository interface for protocol template CRUD operations.
pub trait TemplateRepository {
    /// Lists all templates in insertion order.
    fn list_templates(&self) -> RepoResult<Vec<ProtocolTemplate>>;
    /// Loads one template or reports `NotFound`.
    fn get_template(&self, id: EntityId) -> RepoResult<ProtocolTemplate>;
    /// Persists a new template and returns it with assigned id.
    fn create_template(&mut self, record: &ProtocolTemplate) -> RepoResult<ProtocolTemplate>;
    /// Fully replaces one template under optimistic concurrency.
    fn update_template(&mut self, id: EntityId, record: &ProtocolTemplate) -> RepoResult<()>;
    /// Deletes one template.
    fn delete_template(&mut self, id: EntityId) -> RepoResult<()>;
    /// Existence probe.
    fn template_exists(&self, id: EntityId) -> RepoResult<bool>;
}

/// SQLite-backed protocol template repository.
pub struct SqliteTemplateRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteTemplateRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, "protocol_templates", TEMPLATE_COLUMNS)?;
        Ok(Self { conn })
    }
}

impl TemplateRepository for SqliteTemplateRepository<'_> {
    fn list_templates(&self) -> RepoResult<Vec<ProtocolTemplate>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TEMPLATE_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut templates = Vec::new();
        while let Some(row) = rows.next()? {
            templates.push(parse_template_row(row)?);
        }
        Ok(templates)
    }

    fn get_template(&self, id: EntityId) -> RepoResult<ProtocolTemplate> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TEMPLATE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return parse_template_row(row);
        }
        Err(RepoError::NotFound {
            entity: "protocol_template",
            id,
        })
    }

    fn create_template(&mut self, record: &ProtocolTemplate) -> RepoResult<ProtocolTemplate> {
        record.validate()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !organization_exists_on(&tx, record.organization_id)? {
            return Err(RepoError::ForeignKeyViolation {
                entity: "protocol_template",
                column: "organization_id",
                referenced_id: record.organization_id,
            });
        }

        let now = now_epoch_ms();
        tx.execute(
            "INSERT INTO protocol_templates (
                name,
                description,
                template,
                created_or_edited,
                organization_id,
                row_version
            ) VALUES (?1, ?2, ?3, ?4, ?5, 1);",
            params![
                record.name.as_str(),
                record.description.as_deref(),
                record.template.as_str(),
                now,
                record.organization_id,
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

    fn update_template(&mut self, id: EntityId, record: &ProtocolTemplate) -> RepoResult<()> {
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
        if !organization_exists_on(&tx, record.organization_id)? {
            return Err(RepoError::ForeignKeyViolation {
                entity: "protocol_template",
                column: "organization_id",
                referenced_id: record.organization_id,
            });
        }

        let changed = tx.execute(
            "UPDATE protocol_templates
             SET
                name = ?1,
                description = ?2,
                template = ?3,
                created_or_edited = ?4,
                organization_id = ?5,
                row_version = row_version + 1
             WHERE id = ?6 AND row_version = ?7;",
            params![
                record.name.as_str(),
                record.description.as_deref(),
                record.template.as_str(),
                now_epoch_ms(),
                record.organization_id,
                id,
                record.row_version,
            ],
        )?;

        if changed == 0 {
            if template_exists_on(&tx, id)? {
                return Err(RepoError::ConcurrencyConflict {
                    entity: "protocol_template",
                    id,
                });
            }
            return Err(RepoError::NotFound {
                entity: "protocol_template",
                id,
            });
        }

        tx.commit()?;
        Ok(())
    }

    fn delete_template(&mut self, id: EntityId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM protocol_templates WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "protocol_template",
                id,
            });
        }
        Ok(())
    }

    fn template_exists(&self, id: EntityId) -> RepoResult<bool> {
        template_exists_on(self.conn, id)
    }
}

fn template_exists_on(conn: &Connection, id: EntityId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM protocol_templates
            WHERE id = ?1
        );",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn parse_template_row(row: &Row<'_>) -> RepoResult<ProtocolTemplate> {
    Ok(ProtocolTemplate {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        template: row.get("template")?,
        created_or_edited: row.get("created_or_edited")?,
        organization_id: row.get("organization_id")?,
        row_version: row.get("row_version")?,
    })
}
