//! Rows from the `users` table.

use sqlx::FromRow;

use assetdesk_core::error::CoreError;
use assetdesk_core::types::{DbId, Timestamp};
use assetdesk_core::user::{User, UserRole};

/// A row from the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: DbId,
    pub branch_id: Option<DbId>,
    pub full_name: String,
    pub email: String,
    pub role: String,
    pub active: bool,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: i32,
}

impl TryFrom<UserRow> for User {
    type Error = CoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(User {
            id: row.id,
            branch_id: row.branch_id,
            full_name: row.full_name,
            email: row.email,
            role: UserRole::from_str(&row.role)?,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version,
        })
    }
}
