//! Repositories for tickets and their audit trail.

use sqlx::PgConnection;

use assetdesk_core::ticket::{Ticket, TicketFilter, TicketUpdate, TicketUpdateFilter};
use assetdesk_core::types::{day_bounds, DbId};

use super::{contains_pattern, live_where};
use crate::models::ticket::{TicketRow, TicketUpdateRow};

/// Column list for `tickets` queries.
const TICKET_COLUMNS: &str = "\
    id, title, description, status, priority, asset_id, created_by_id, \
    assigned_to_id, resolved_at, closed_at, created_at, updated_at, version";

/// Column list for `ticket_updates` queries.
const UPDATE_COLUMNS: &str = "\
    id, ticket_id, user_id, comment, old_status, new_status, photo_url, \
    created_at, version";

// ---------------------------------------------------------------------------
// Tickets
// ---------------------------------------------------------------------------

/// Provides data access for the `tickets` table.
pub struct TicketRepo;

impl TicketRepo {
    pub async fn insert(conn: &mut PgConnection, ticket: &Ticket) -> Result<TicketRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO tickets (\
                id, title, description, status, priority, asset_id, created_by_id, \
                assigned_to_id, resolved_at, closed_at, created_at, updated_at, version\
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {TICKET_COLUMNS}"
        );
        sqlx::query_as::<_, TicketRow>(&query)
            .bind(ticket.id)
            .bind(&ticket.title)
            .bind(&ticket.description)
            .bind(ticket.status.as_str())
            .bind(ticket.priority.as_str())
            .bind(ticket.asset_id)
            .bind(ticket.created_by_id)
            .bind(ticket.assigned_to_id)
            .bind(ticket.resolved_at)
            .bind(ticket.closed_at)
            .bind(ticket.created_at)
            .bind(ticket.updated_at)
            .bind(ticket.version)
            .fetch_one(conn)
            .await
    }

    pub async fn find_by_id(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<TicketRow>, sqlx::Error> {
        let query = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1 AND deleted_at IS NULL"
        );
        sqlx::query_as::<_, TicketRow>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// List live tickets matching every supplied filter field.
    ///
    /// `activity_on` matches tickets created, resolved, or closed on that
    /// UTC date.
    pub async fn list(
        conn: &mut PgConnection,
        filter: &TicketFilter,
    ) -> Result<Vec<TicketRow>, sqlx::Error> {
        let mut conditions = Vec::new();
        let mut bind_idx = 1u32;

        if filter.status.is_some() {
            conditions.push(format!("status = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.priority.is_some() {
            conditions.push(format!("priority = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.assigned_to_id.is_some() {
            conditions.push(format!("assigned_to_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.created_by_id.is_some() {
            conditions.push(format!("created_by_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.asset_id.is_some() {
            conditions.push(format!("asset_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.title.is_some() {
            conditions.push(format!("title ILIKE ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.activity_on.is_some() {
            let (start, end) = (bind_idx, bind_idx + 1);
            conditions.push(format!(
                "((created_at >= ${start} AND created_at < ${end}) \
                  OR (resolved_at >= ${start} AND resolved_at < ${end}) \
                  OR (closed_at >= ${start} AND closed_at < ${end}))"
            ));
        }

        let query = format!(
            "SELECT {TICKET_COLUMNS} FROM tickets {} ORDER BY seq",
            live_where(&conditions)
        );
        let mut q = sqlx::query_as::<_, TicketRow>(&query);

        if let Some(status) = filter.status {
            q = q.bind(status.as_str());
        }
        if let Some(priority) = filter.priority {
            q = q.bind(priority.as_str());
        }
        if let Some(assigned_to_id) = filter.assigned_to_id {
            q = q.bind(assigned_to_id);
        }
        if let Some(created_by_id) = filter.created_by_id {
            q = q.bind(created_by_id);
        }
        if let Some(asset_id) = filter.asset_id {
            q = q.bind(asset_id);
        }
        if let Some(ref title) = filter.title {
            q = q.bind(contains_pattern(title));
        }
        if let Some(date) = filter.activity_on {
            let (start, end) = day_bounds(date);
            q = q.bind(start).bind(end);
        }
        q.fetch_all(conn).await
    }

    /// Replace a ticket if `ticket.version` is still current.
    ///
    /// Two writers holding the same version serialize on the row lock; the
    /// second one matches no row once the first commits.
    pub async fn update(
        conn: &mut PgConnection,
        ticket: &Ticket,
    ) -> Result<Option<TicketRow>, sqlx::Error> {
        let query = format!(
            "UPDATE tickets SET \
                title = $3, description = $4, status = $5, priority = $6, \
                asset_id = $7, assigned_to_id = $8, resolved_at = $9, closed_at = $10, \
                updated_at = $11, version = version + 1 \
             WHERE id = $1 AND version = $2 AND deleted_at IS NULL \
             RETURNING {TICKET_COLUMNS}"
        );
        sqlx::query_as::<_, TicketRow>(&query)
            .bind(ticket.id)
            .bind(ticket.version)
            .bind(&ticket.title)
            .bind(&ticket.description)
            .bind(ticket.status.as_str())
            .bind(ticket.priority.as_str())
            .bind(ticket.asset_id)
            .bind(ticket.assigned_to_id)
            .bind(ticket.resolved_at)
            .bind(ticket.closed_at)
            .bind(ticket.updated_at)
            .fetch_optional(conn)
            .await
    }

    pub async fn soft_delete(conn: &mut PgConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE tickets SET deleted_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ---------------------------------------------------------------------------
// Ticket updates
// ---------------------------------------------------------------------------

/// Provides data access for the `ticket_updates` table.
pub struct TicketUpdateRepo;

impl TicketUpdateRepo {
    pub async fn insert(
        conn: &mut PgConnection,
        update: &TicketUpdate,
    ) -> Result<TicketUpdateRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO ticket_updates (\
                id, ticket_id, user_id, comment, old_status, new_status, photo_url, \
                created_at, version\
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {UPDATE_COLUMNS}"
        );
        sqlx::query_as::<_, TicketUpdateRow>(&query)
            .bind(update.id)
            .bind(update.ticket_id)
            .bind(update.user_id)
            .bind(update.comment.as_deref())
            .bind(update.old_status.map(|s| s.as_str()))
            .bind(update.new_status.map(|s| s.as_str()))
            .bind(update.photo_url.as_deref())
            .bind(update.created_at)
            .bind(update.version)
            .fetch_one(conn)
            .await
    }

    pub async fn find_by_id(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<TicketUpdateRow>, sqlx::Error> {
        let query = format!(
            "SELECT {UPDATE_COLUMNS} FROM ticket_updates WHERE id = $1 AND deleted_at IS NULL"
        );
        sqlx::query_as::<_, TicketUpdateRow>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// List audit rows, oldest first.
    pub async fn list(
        conn: &mut PgConnection,
        filter: &TicketUpdateFilter,
    ) -> Result<Vec<TicketUpdateRow>, sqlx::Error> {
        let mut conditions = Vec::new();
        let mut bind_idx = 1u32;

        if filter.ticket_id.is_some() {
            conditions.push(format!("ticket_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.user_id.is_some() {
            conditions.push(format!("user_id = ${bind_idx}"));
        }

        let query = format!(
            "SELECT {UPDATE_COLUMNS} FROM ticket_updates {} ORDER BY seq",
            live_where(&conditions)
        );
        let mut q = sqlx::query_as::<_, TicketUpdateRow>(&query);
        if let Some(ticket_id) = filter.ticket_id {
            q = q.bind(ticket_id);
        }
        if let Some(user_id) = filter.user_id {
            q = q.bind(user_id);
        }
        q.fetch_all(conn).await
    }

    /// Audit rows are append-only apart from the comment text.
    pub async fn update(
        conn: &mut PgConnection,
        update: &TicketUpdate,
    ) -> Result<Option<TicketUpdateRow>, sqlx::Error> {
        let query = format!(
            "UPDATE ticket_updates SET comment = $3, photo_url = $4, version = version + 1 \
             WHERE id = $1 AND version = $2 AND deleted_at IS NULL \
             RETURNING {UPDATE_COLUMNS}"
        );
        sqlx::query_as::<_, TicketUpdateRow>(&query)
            .bind(update.id)
            .bind(update.version)
            .bind(update.comment.as_deref())
            .bind(update.photo_url.as_deref())
            .fetch_optional(conn)
            .await
    }

    pub async fn soft_delete(conn: &mut PgConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE ticket_updates SET deleted_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
