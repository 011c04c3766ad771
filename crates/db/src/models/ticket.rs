//! Rows from the `tickets` and `ticket_updates` tables.

use sqlx::FromRow;

use assetdesk_core::error::CoreError;
use assetdesk_core::ticket::{Ticket, TicketPriority, TicketStatus, TicketUpdate};
use assetdesk_core::types::{DbId, Timestamp};

/// A row from the `tickets` table.
#[derive(Debug, Clone, FromRow)]
pub struct TicketRow {
    pub id: DbId,
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub asset_id: DbId,
    pub created_by_id: DbId,
    pub assigned_to_id: Option<DbId>,
    pub resolved_at: Option<Timestamp>,
    pub closed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: i32,
}

impl TryFrom<TicketRow> for Ticket {
    type Error = CoreError;

    fn try_from(row: TicketRow) -> Result<Self, Self::Error> {
        Ok(Ticket {
            id: row.id,
            title: row.title,
            description: row.description,
            status: TicketStatus::from_str(&row.status)?,
            priority: TicketPriority::from_str(&row.priority)?,
            asset_id: row.asset_id,
            created_by_id: row.created_by_id,
            assigned_to_id: row.assigned_to_id,
            resolved_at: row.resolved_at,
            closed_at: row.closed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version,
        })
    }
}

/// A row from the `ticket_updates` table.
#[derive(Debug, Clone, FromRow)]
pub struct TicketUpdateRow {
    pub id: DbId,
    pub ticket_id: DbId,
    pub user_id: DbId,
    pub comment: Option<String>,
    pub old_status: Option<String>,
    pub new_status: Option<String>,
    pub photo_url: Option<String>,
    pub created_at: Timestamp,
    pub version: i32,
}

impl TryFrom<TicketUpdateRow> for TicketUpdate {
    type Error = CoreError;

    fn try_from(row: TicketUpdateRow) -> Result<Self, Self::Error> {
        Ok(TicketUpdate {
            id: row.id,
            ticket_id: row.ticket_id,
            user_id: row.user_id,
            comment: row.comment,
            old_status: row.old_status.as_deref().map(TicketStatus::from_str).transpose()?,
            new_status: row.new_status.as_deref().map(TicketStatus::from_str).transpose()?,
            photo_url: row.photo_url,
            created_at: row.created_at,
            version: row.version,
        })
    }
}
