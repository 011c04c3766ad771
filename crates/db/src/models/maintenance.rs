//! Rows from the `maintenance_schedules` and `maintenance_records` tables.

use sqlx::FromRow;

use assetdesk_core::error::CoreError;
use assetdesk_core::maintenance::{
    MaintenanceFrequency, MaintenanceRecord, MaintenanceSchedule, MaintenanceStatus,
    MaintenanceType,
};
use assetdesk_core::types::{DbId, Timestamp};

/// A row from the `maintenance_schedules` table.
#[derive(Debug, Clone, FromRow)]
pub struct MaintenanceScheduleRow {
    pub id: DbId,
    pub asset_id: DbId,
    pub assigned_to_id: DbId,
    pub frequency: String,
    pub last_performed_at: Option<Timestamp>,
    pub next_due_at: Timestamp,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: i32,
}

impl TryFrom<MaintenanceScheduleRow> for MaintenanceSchedule {
    type Error = CoreError;

    fn try_from(row: MaintenanceScheduleRow) -> Result<Self, Self::Error> {
        Ok(MaintenanceSchedule {
            id: row.id,
            asset_id: row.asset_id,
            assigned_to_id: row.assigned_to_id,
            frequency: MaintenanceFrequency::from_str(&row.frequency)?,
            last_performed_at: row.last_performed_at,
            next_due_at: row.next_due_at,
            status: MaintenanceStatus::from_str(&row.status)?,
            notes: row.notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version,
        })
    }
}

/// A row from the `maintenance_records` table.
#[derive(Debug, Clone, FromRow)]
pub struct MaintenanceRecordRow {
    pub id: DbId,
    pub asset_id: DbId,
    pub performed_by_id: DbId,
    pub schedule_id: Option<DbId>,
    pub ticket_id: Option<DbId>,
    pub maintenance_type: String,
    pub notes: Option<String>,
    pub performed_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: i32,
}

impl TryFrom<MaintenanceRecordRow> for MaintenanceRecord {
    type Error = CoreError;

    fn try_from(row: MaintenanceRecordRow) -> Result<Self, Self::Error> {
        Ok(MaintenanceRecord {
            id: row.id,
            asset_id: row.asset_id,
            performed_by_id: row.performed_by_id,
            schedule_id: row.schedule_id,
            ticket_id: row.ticket_id,
            maintenance_type: MaintenanceType::from_str(&row.maintenance_type)?,
            notes: row.notes,
            performed_at: row.performed_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version,
        })
    }
}
