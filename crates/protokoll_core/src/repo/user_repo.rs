//! User repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide stable CRUD APIs over canonical `users` storage.
//! - Classify missing organization references as `ForeignKeyViolation`
//!   before the constraint layer can reject them opaquely.
//!
//! # Invariants
//! - Write paths call `User::validate()` before SQL mutations.
//! - The organization probe and the write run in one immediate transaction,
//!   so a failed create leaves no row behind.

use crate::model::user::User;
use crate::model::EntityId;
use crate::repo::organization_repo::organization_exists_on;
use crate::repo::{
    bool_to_int, ensure_connection_ready, int_to_bool, now_epoch_ms, RepoError, RepoResult,
};
use rusqlite::{params, Connection, Row, TransactionBehavior};

const USER_SELECT_SQL: &str = "SELECT
    id,
    username,
    first_name,
    last_name,
    email,
    password,
    last_password_change_date,
    password_change_required,
    created_or_edited,
    organization_id,
    row_version
FROM users";

const USER_COLUMNS: &[&str] = &[
    "id",
    "username",
    "first_name",
    "last_name",
    "email",
    "password",
    "last_password_change_date",
    "password_change_required",
    "created_or_edited",
    "organization_id",
    "row_version",
];

/// Repository interface for user CRUD operations.
pub trait UserRepository {
    /// Lists all users in insertion order.
    fn list_users(&self) -> RepoResult<Vec<User>>;
    /// Loads one user or reports `NotFound`.
    fn get_user(&self, id: EntityId) -> RepoResult<User>;
    /// Persists a new user and returns it with assigned id.
    fn create_user(&mut self, record: &User) -> RepoResult<User>;
    /// Fully replaces one user under optimistic concurrency.
    fn update_user(&mut self, id: EntityId, record: &User) -> RepoResult<()>;
    /// Deletes one user; the schema cascades to protocols and join rows.
    fn delete_user(&mut self, id: EntityId) -> RepoResult<()>;
    /// Existence probe.
    fn user_exists(&self, id: EntityId) -> RepoResult<bool>;
}

/// SQLite-backed user repository.
pub struct SqliteUserRepository<'conn> {
    conn: &'conn mut Connection,
}

impl<'conn> SqliteUserRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn mut Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, "users", USER_COLUMNS)?;
        Ok(Self { conn })
    }
}

impl UserRepository for SqliteUserRepository<'_> {
    fn list_users(&self) -> RepoResult<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} ORDER BY id ASC;"))?;
        let mut rows = stmt.query([])?;
        let mut users = Vec::new();
        while let Some(row) = rows.next()? {
            users.push(parse_user_row(row)?);
        }
        Ok(users)
    }

    fn get_user(&self, id: EntityId) -> RepoResult<User> {
        let mut stmt = self
            .conn
            .prepare(&format!("{USER_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return parse_user_row(row);
        }
        Err(RepoError::NotFound {
            entity: "user",
            id,
        })
    }

    fn create_user(&mut self, record: &User) -> RepoResult<User> {
        record.validate()?;

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        if !organization_exists_on(&tx, record.organization_id)? {
            return Err(RepoError::ForeignKeyViolation {
                entity: "user",
                column: "organization_id",
                referenced_id: record.organization_id,
            });
        }

        let now = now_epoch_ms();
        tx.execute(
            "INSERT INTO users (
                username,
                first_name,
                last_name,
                email,
                password,
                last_password_change_date,
                password_change_required,
                created_or_edited,
                organization_id,
                row_version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, 1);",
            params![
                record.username.as_str(),
                record.first_name.as_deref(),
                record.last_name.as_deref(),
                record.email.as_str(),
                record.password.as_str(),
                record.last_password_change_date,
                record.password_change_required.map(bool_to_int),
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

    fn update_user(&mut self, id: EntityId, record: &User) -> RepoResult<()> {
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
        // Full replace may move the user to another organization.
        if !organization_exists_on(&tx, record.organization_id)? {
            return Err(RepoError::ForeignKeyViolation {
                entity: "user",
                column: "organization_id",
                referenced_id: record.organization_id,
            });
        }

        let changed = tx.execute(
            "UPDATE users
             SET
                username = ?1,
                first_name = ?2,
                last_name = ?3,
                email = ?4,
                password = ?5,
                last_password_change_date = ?6,
                password_change_required = ?7,
                created_or_edited = ?8,
                organization_id = ?9,
                row_version = row_version + 1
             WHERE id = ?10 AND row_version = ?11;",
            params![
                record.username.as_str(),
                record.first_name.as_deref(),
                record.last_name.as_deref(),
                record.email.as_str(),
                record.password.as_str(),
                record.last_password_change_date,
                record.password_change_required.map(bool_to_int),
                now_epoch_ms(),
                record.organization_id,
                id,
                record.row_version,
            ],
        )?;

        if changed == 0 {
            if user_exists_on(&tx, id)? {
                return Err(RepoError::ConcurrencyConflict {
                    entity: "user",
                    id,
                });
            }
            return Err(RepoError::NotFound {
                entity: "user",
                id,
            });
        }

        tx.commit()?;
        Ok(())
    }

    fn delete_user(&mut self, id: EntityId) -> RepoResult<()> {
        let changed = self.conn.execute("DELETE FROM users WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound {
                entity: "user",
                id,
            });
        }
        Ok(())
    }

    fn user_exists(&self, id: EntityId) -> RepoResult<bool> {
        user_exists_on(self.conn, id)
    }
}

pub(crate) fn user_exists_on(conn: &Connection, id: EntityId) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM users
            WHERE id = ?1
        );",
        [id],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn parse_user_row(row: &Row<'_>) -> RepoResult<User> {
    let password_change_required = match row.get::<_, Option<i64>>("password_change_required")? {
        Some(value) => Some(int_to_bool(value, "users", "password_change_required")?),
        None => None,
    };

    Ok(User {
        id: row.get("id")?,
        username: row.get("username")?,
        first_name: row.get("first_name")?,
        last_name: row.get("last_name")?,
        email: row.get("email")?,
        password: row.get("password")?,
        last_password_change_date: row.get("last_password_change_date")?,
        password_change_required,
        created_or_edited: row.get("created_or_edited")?,
        organization_id: row.get("organization_id")?,
        row_version: row.get("row_version")?,
    })
}
