//! Organization repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide stable CRUD APIs over canonical `organizations` storage.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths call `Organization::validate()` before SQL mutations.
//! - Updates are full replaces, conditional on the caller's `row_version`.
//! - Deletes cascade to users, protocols, templates, and join rows via the
//!   schema; this module never orphans a foreign key.

use crate::model::organization::Organization;
use crate::model::EntityId;
use crate::repo::{
    ensure_connection_ready, now_epoch_ms, RepoError, RepoResult,
};
use rusqlite::{params, Connection, Row, TransactionBehavior};

const ORGANIZATION_SELECT_SQL: &str = "SELECT
    id,
    parent_id,
    name,
    address,
    postal_code,
    city,
    country,
    organization_type,
    created_or_edited,
    row_version
FROM organizations";

const ORGANIZATION_COLUMNS: &[&str] = &[
    "id",
    "parent_id",
    "name",
    "address",
    "postal_code",
    "city",
    "country",
    "organization_type",
    "created_or_edited",
    "row_version",
];

/// Repository interface for organization CRUD operations.
pub trait OrganizationRepository {
    /// Lists all organizations in insertion order.
    fn list_organizations(&self) -> RepoResult<Vec<Organization>>;
    /// Loads one organization or reports `NotFound`.
    fn get_organization(&self, id: EntityId) -> RepoResult<Organization>;
    /// Persists a new organization and returns it with assigned id.
    fn create_organization(&mut self, record: &Organization) -> RepoResult<Organization>;
    /// Fully replaces one organization under optimistic concurrency.
    fn update_organization(&mut self, id: EntityId, record: &Organization) -> RepoResult<()>;
    /// Deletes one organization; the schema cascades to dependents.
    fn delete_organization(&mut self, id: EntityId) -> RepoResult<()>;
    /// Existence probe.
    fn organization_exists(&self, id: EntityId) -> RepoResult<bool>;
}

/// SQLite-backed organization repository.
pub struct SqliteOrganizationRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteOrganizationRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, "organizations", ORGANIZATION_COLUMNS)?;
        Ok(Self { conn })
    }
}

impl OrganizationRepository for SqliteOrganizationRepository<'_> {
    fn list_organizations(&self) -> RepoResult<Vec<Organization>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ORGANIZATION_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut organizations = Vec::new();
        while let Some(row) = rows.next()? {
            organizations.push(parse_organization_row(row)?);
        }
        Ok(organizations)
    }

    fn get_organization(&self, id: EntityId) -> RepoResult<Organization> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ORGANIZATION_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return parse_organization_row(row);
        }
        Err(RepoError::NotFound {
            entity: "organization",
            id,
        })
    }

    fn create_organization(&mut self, record: &Organization) -> RepoResult<Organization> {
        record.validate()?;

        let now = now_epoch_ms();
        self.conn.execute(
            "INSERT INTO organizations (
                parent_id,
                name,
                address,
                postal_code,
                city,
                country,
                organization_type,
                created_or_edited,
                row_version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1);",
            params![
                record.parent_id,
                record.name.as_str(),
                record.address.as_deref(),
                record.postal_code.as_deref(),
                record.city.as_deref(),
                record.country.as_deref(),
                record.organization_type.as_str(),
                now,
            ],
        )?;

        let mut created = record.clone();
        created.id = self.conn.last_insert_rowid();
        created.created_or_edited = now;
        created.row_version = 1;
        Ok(created)
    }

    fn update_organization(&mut self, id: EntityId, record: &Organization) -> RepoResult<()> {
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
        let changed = tx.execute(
            "UPDATE organizations
             SET
                parent_id = ?1,
                name = ?2,
                address = ?3,
                postal_code = ?4,
                city = ?5,
                country = ?6,
                organization_type = ?7,
                created_or_edited = ?8,
                row_version = row_version + 1
             WHERE id = ?9 AND row_version = ?10;",
            params![
                record.parent_id,
                record.name.as_str(),
                record.address.as_deref(),
                record.postal_code.as_deref(),
                record.city.as_deref(),
                record.country.as_deref(),
                record.organization_type.as_str(),
                now_epoch_ms(),
                id,
                record.row_version,
            ],
        )?;

        if changed == 0 {
            // Token mismatch and vanished row look identical here; re-probe
            // so concurrent deletion surfaces as NotFound.
            if organization_exists_on(&tx, id)? {
                return Err(RepoError::ConcurrencyConflict {
                    entity: "organization",
                    id,
                });
            }
            return Err(RepoError::NotFound {
                entity: "organization",
                id,
            });
        }

        tx.commit()?;
        Ok(())
    }

    fn delete_organization(&mut self, id: EntityId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM organizations WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "organization",
                id,
            });
        }
        Ok(())
    }

    fn organization_exists(&self, id: EntityId) -> RepoResult<bool> {
        organization_exists_on(self.conn, id)
    }
}

pub(crate) fn organization_exists_on(conn: &Connection, id: EntityId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM organizations
            WHERE id = ?1
        );",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn parse_organization_row(row: &Row<'_>) -> RepoResult<Organization> {
    Ok(Organization {
        id: row.get("id")?,
        parent_id: row.get("parent_id")?,
        name: row.get("name")?,
        address: row.get("address")?,
        postal_code: row.get("postal_code")?,
        city: row.get("city")?,
        country: row.get("country")?,
        organization_type: row.get("organization_type")?,
        created_or_edited: row.get("created_or_edited")?,
        row_version: row.get("row_version")?,
    })
}
