//! The `users` table: who may act, and in which role.
//!
//! Credentials live elsewhere; this directory only maps users to roles.

use crate::db::Database;
use crate::error::{CharacterError, Result};
use crate::policy::{ActorRole, RoleLookup};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub role: ActorRole,
}

impl User {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let role: String = row.get(2)?;
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            role: role.parse().map_err(|_| {
                rusqlite::Error::InvalidColumnType(2, "role".into(), rusqlite::types::Type::Text)
            })?,
        })
    }
}

/// User lookup backed by the character database
#[derive(Clone)]
pub struct UserDirectory {
    db: Arc<Database>,
}

impl UserDirectory {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    /// Register a user. Usernames are unique.
    pub fn add_user(&self, username: &str, role: ActorRole) -> Result<User> {
        let username = username.trim();
        if username.is_empty() {
            return Err(CharacterError::validation("username", "must not be empty"));
        }
        if self.find_by_name(username)?.is_some() {
            return Err(CharacterError::validation(
                "username",
                format!("'{username}' is already taken"),
            ));
        }

        let conn = self.db.conn();
        conn.execute(
            "INSERT INTO users (username, role) VALUES (?1, ?2)",
            params![username, role.as_str()],
        )?;
        let user = User {
            id: conn.last_insert_rowid(),
            username: username.to_string(),
            role,
        };
        info!("added {} '{}' with id {}", user.role, user.username, user.id);
        Ok(user)
    }

    pub fn find_by_name(&self, username: &str) -> Result<Option<User>> {
        Ok(self
            .db
            .conn()
            .query_row(
                "SELECT id, username, role FROM users WHERE username = ?1",
                [username],
                User::from_row,
            )
            .optional()?)
    }

    pub fn get(&self, user_id: i64) -> Result<User> {
        self.db
            .conn()
            .query_row(
                "SELECT id, username, role FROM users WHERE id = ?1",
                [user_id],
                User::from_row,
            )
            .optional()?
            .ok_or_else(|| CharacterError::NotFound {
                resource: "user".into(),
                id: user_id.to_string(),
            })
    }

    /// All users, ascending by id
    pub fn list_users(&self) -> Result<Vec<User>> {
        let conn = self.db.conn();
        let mut stmt = conn.prepare("SELECT id, username, role FROM users ORDER BY id")?;
        let users = stmt
            .query_map([], User::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }
}

impl RoleLookup for UserDirectory {
    fn get_role(&self, user_id: i64) -> Result<ActorRole> {
        self.get(user_id).map(|user| user.role)
    }
}
