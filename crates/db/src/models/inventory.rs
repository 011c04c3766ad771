//! Rows from the `parts` and `part_usages` tables.

use sqlx::FromRow;

use assetdesk_core::error::CoreError;
use assetdesk_core::inventory::{Part, PartUsage};
use assetdesk_core::types::{DbId, Timestamp};

/// A row from the `parts` table.
#[derive(Debug, Clone, FromRow)]
pub struct PartRow {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub quantity_on_hand: i32,
    pub reorder_level: i32,
    pub last_restocked_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: i32,
}

impl TryFrom<PartRow> for Part {
    type Error = CoreError;

    fn try_from(row: PartRow) -> Result<Self, Self::Error> {
        Ok(Part {
            id: row.id,
            name: row.name,
            description: row.description,
            location: row.location,
            quantity_on_hand: row.quantity_on_hand,
            reorder_level: row.reorder_level,
            last_restocked_at: row.last_restocked_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version,
        })
    }
}

/// A row from the `part_usages` table.
#[derive(Debug, Clone, FromRow)]
pub struct PartUsageRow {
    pub id: DbId,
    pub part_id: DbId,
    pub maintenance_record_id: Option<DbId>,
    pub ticket_id: Option<DbId>,
    pub quantity: i32,
    pub created_at: Timestamp,
    pub version: i32,
}

impl TryFrom<PartUsageRow> for PartUsage {
    type Error = CoreError;

    fn try_from(row: PartUsageRow) -> Result<Self, Self::Error> {
        Ok(PartUsage {
            id: row.id,
            part_id: row.part_id,
            maintenance_record_id: row.maintenance_record_id,
            ticket_id: row.ticket_id,
            quantity: row.quantity,
            created_at: row.created_at,
            version: row.version,
        })
    }
}
