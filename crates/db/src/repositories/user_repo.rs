//! Repository for the `users` table.

use sqlx::PgConnection;

use assetdesk_core::types::DbId;
use assetdesk_core::user::{User, UserFilter};

use super::{contains_pattern, live_where};
use crate::models::user::UserRow;

/// Column list for `users` queries.
const COLUMNS: &str = "\
    id, branch_id, full_name, email, role, active, created_at, updated_at, version";

/// Provides data access for the `users` table.
pub struct UserRepo;

impl UserRepo {
    /// Insert a user. A duplicate email among live users violates
    /// `uq_users_email`.
    pub async fn insert(conn: &mut PgConnection, user: &User) -> Result<UserRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO users \
                (id, branch_id, full_name, email, role, active, created_at, updated_at, version) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserRow>(&query)
            .bind(user.id)
            .bind(user.branch_id)
            .bind(&user.full_name)
            .bind(&user.email)
            .bind(user.role.as_str())
            .bind(user.active)
            .bind(user.created_at)
            .bind(user.updated_at)
            .bind(user.version)
            .fetch_one(conn)
            .await
    }

    pub async fn find_by_id(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<UserRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, UserRow>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    pub async fn list(
        conn: &mut PgConnection,
        filter: &UserFilter,
    ) -> Result<Vec<UserRow>, sqlx::Error> {
        let mut conditions = Vec::new();
        let mut bind_idx = 1u32;

        if filter.role.is_some() {
            conditions.push(format!("role = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.branch_id.is_some() {
            conditions.push(format!("branch_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.email.is_some() {
            conditions.push(format!("lower(email) = lower(${bind_idx})"));
            bind_idx += 1;
        }
        if filter.name.is_some() {
            conditions.push(format!("full_name ILIKE ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.active.is_some() {
            conditions.push(format!("active = ${bind_idx}"));
        }

        let query = format!(
            "SELECT {COLUMNS} FROM users {} ORDER BY seq",
            live_where(&conditions)
        );
        let mut q = sqlx::query_as::<_, UserRow>(&query);

        if let Some(role) = filter.role {
            q = q.bind(role.as_str());
        }
        if let Some(branch_id) = filter.branch_id {
            q = q.bind(branch_id);
        }
        if let Some(ref email) = filter.email {
            q = q.bind(email);
        }
        if let Some(ref name) = filter.name {
            q = q.bind(contains_pattern(name));
        }
        if let Some(active) = filter.active {
            q = q.bind(active);
        }
        q.fetch_all(conn).await
    }

    /// Replace a user if `user.version` is still current.
    pub async fn update(conn: &mut PgConnection, user: &User) -> Result<Option<UserRow>, sqlx::Error> {
        let query = format!(
            "UPDATE users SET \
                branch_id = $3, full_name = $4, email = $5, role = $6, active = $7, \
                updated_at = $8, version = version + 1 \
             WHERE id = $1 AND version = $2 AND deleted_at IS NULL \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, UserRow>(&query)
            .bind(user.id)
            .bind(user.version)
            .bind(user.branch_id)
            .bind(&user.full_name)
            .bind(&user.email)
            .bind(user.role.as_str())
            .bind(user.active)
            .bind(user.updated_at)
            .fetch_optional(conn)
            .await
    }

    pub async fn soft_delete(conn: &mut PgConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE users SET deleted_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
