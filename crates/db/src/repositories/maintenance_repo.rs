//! Repositories for maintenance schedules and the work records they produce.

use sqlx::PgConnection;

use assetdesk_core::maintenance::{
    MaintenanceRecord, MaintenanceRecordFilter, MaintenanceSchedule, MaintenanceScheduleFilter,
};
use assetdesk_core::types::{day_bounds, DbId};

use super::live_where;
use crate::models::maintenance::{MaintenanceRecordRow, MaintenanceScheduleRow};

/// Column list for `maintenance_schedules` queries.
const SCHEDULE_COLUMNS: &str = "\
    id, asset_id, assigned_to_id, frequency, last_performed_at, next_due_at, \
    status, notes, created_at, updated_at, version";

/// Column list for `maintenance_records` queries.
const RECORD_COLUMNS: &str = "\
    id, asset_id, performed_by_id, schedule_id, ticket_id, maintenance_type, \
    notes, performed_at, completed_at, created_at, updated_at, version";

// ---------------------------------------------------------------------------
// Schedules
// ---------------------------------------------------------------------------

/// Provides data access for the `maintenance_schedules` table.
pub struct MaintenanceScheduleRepo;

impl MaintenanceScheduleRepo {
    pub async fn insert(
        conn: &mut PgConnection,
        schedule: &MaintenanceSchedule,
    ) -> Result<MaintenanceScheduleRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO maintenance_schedules (\
                id, asset_id, assigned_to_id, frequency, last_performed_at, next_due_at, \
                status, notes, created_at, updated_at, version\
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             RETURNING {SCHEDULE_COLUMNS}"
        );
        sqlx::query_as::<_, MaintenanceScheduleRow>(&query)
            .bind(schedule.id)
            .bind(schedule.asset_id)
            .bind(schedule.assigned_to_id)
            .bind(schedule.frequency.as_str())
            .bind(schedule.last_performed_at)
            .bind(schedule.next_due_at)
            .bind(schedule.status.as_str())
            .bind(schedule.notes.as_deref())
            .bind(schedule.created_at)
            .bind(schedule.updated_at)
            .bind(schedule.version)
            .fetch_one(conn)
            .await
    }

    pub async fn find_by_id(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<MaintenanceScheduleRow>, sqlx::Error> {
        let query = format!(
            "SELECT {SCHEDULE_COLUMNS} FROM maintenance_schedules \
             WHERE id = $1 AND deleted_at IS NULL"
        );
        sqlx::query_as::<_, MaintenanceScheduleRow>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// List live schedules. `due_by` selects schedules whose `next_due_at`
    /// is at or before the given instant.
    pub async fn list(
        conn: &mut PgConnection,
        filter: &MaintenanceScheduleFilter,
    ) -> Result<Vec<MaintenanceScheduleRow>, sqlx::Error> {
        let mut conditions = Vec::new();
        let mut bind_idx = 1u32;

        if filter.asset_id.is_some() {
            conditions.push(format!("asset_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.assigned_to_id.is_some() {
            conditions.push(format!("assigned_to_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.status.is_some() {
            conditions.push(format!("status = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.status_not.is_some() {
            conditions.push(format!("status <> ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.due_by.is_some() {
            conditions.push(format!("next_due_at <= ${bind_idx}"));
        }

        let query = format!(
            "SELECT {SCHEDULE_COLUMNS} FROM maintenance_schedules {} ORDER BY seq",
            live_where(&conditions)
        );
        let mut q = sqlx::query_as::<_, MaintenanceScheduleRow>(&query);

        if let Some(asset_id) = filter.asset_id {
            q = q.bind(asset_id);
        }
        if let Some(assigned_to_id) = filter.assigned_to_id {
            q = q.bind(assigned_to_id);
        }
        if let Some(status) = filter.status {
            q = q.bind(status.as_str());
        }
        if let Some(status) = filter.status_not {
            q = q.bind(status.as_str());
        }
        if let Some(due_by) = filter.due_by {
            q = q.bind(due_by);
        }
        q.fetch_all(conn).await
    }

    pub async fn update(
        conn: &mut PgConnection,
        schedule: &MaintenanceSchedule,
    ) -> Result<Option<MaintenanceScheduleRow>, sqlx::Error> {
        let query = format!(
            "UPDATE maintenance_schedules SET \
                asset_id = $3, assigned_to_id = $4, frequency = $5, \
                last_performed_at = $6, next_due_at = $7, status = $8, notes = $9, \
                updated_at = $10, version = version + 1 \
             WHERE id = $1 AND version = $2 AND deleted_at IS NULL \
             RETURNING {SCHEDULE_COLUMNS}"
        );
        sqlx::query_as::<_, MaintenanceScheduleRow>(&query)
            .bind(schedule.id)
            .bind(schedule.version)
            .bind(schedule.asset_id)
            .bind(schedule.assigned_to_id)
            .bind(schedule.frequency.as_str())
            .bind(schedule.last_performed_at)
            .bind(schedule.next_due_at)
            .bind(schedule.status.as_str())
            .bind(schedule.notes.as_deref())
            .bind(schedule.updated_at)
            .fetch_optional(conn)
            .await
    }

    pub async fn soft_delete(conn: &mut PgConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE maintenance_schedules SET deleted_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// Provides data access for the `maintenance_records` table.
pub struct MaintenanceRecordRepo;

impl MaintenanceRecordRepo {
    pub async fn insert(
        conn: &mut PgConnection,
        record: &MaintenanceRecord,
    ) -> Result<MaintenanceRecordRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO maintenance_records (\
                id, asset_id, performed_by_id, schedule_id, ticket_id, maintenance_type, \
                notes, performed_at, completed_at, created_at, updated_at, version\
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING {RECORD_COLUMNS}"
        );
        sqlx::query_as::<_, MaintenanceRecordRow>(&query)
            .bind(record.id)
            .bind(record.asset_id)
            .bind(record.performed_by_id)
            .bind(record.schedule_id)
            .bind(record.ticket_id)
            .bind(record.maintenance_type.as_str())
            .bind(record.notes.as_deref())
            .bind(record.performed_at)
            .bind(record.completed_at)
            .bind(record.created_at)
            .bind(record.updated_at)
            .bind(record.version)
            .fetch_one(conn)
            .await
    }

    pub async fn find_by_id(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<MaintenanceRecordRow>, sqlx::Error> {
        let query = format!(
            "SELECT {RECORD_COLUMNS} FROM maintenance_records \
             WHERE id = $1 AND deleted_at IS NULL"
        );
        sqlx::query_as::<_, MaintenanceRecordRow>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    pub async fn list(
        conn: &mut PgConnection,
        filter: &MaintenanceRecordFilter,
    ) -> Result<Vec<MaintenanceRecordRow>, sqlx::Error> {
        let mut conditions = Vec::new();
        let mut bind_idx = 1u32;

        if filter.asset_id.is_some() {
            conditions.push(format!("asset_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.performed_by_id.is_some() {
            conditions.push(format!("performed_by_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.schedule_id.is_some() {
            conditions.push(format!("schedule_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.ticket_id.is_some() {
            conditions.push(format!("ticket_id = ${bind_idx}"));
            bind_idx += 1;
        }
        match filter.open {
            Some(true) => conditions.push("completed_at IS NULL".to_string()),
            Some(false) => conditions.push("completed_at IS NOT NULL".to_string()),
            None => {}
        }
        if filter.performed_on.is_some() {
            conditions.push(format!(
                "performed_at >= ${bind_idx} AND performed_at < ${}",
                bind_idx + 1
            ));
        }

        let query = format!(
            "SELECT {RECORD_COLUMNS} FROM maintenance_records {} ORDER BY seq",
            live_where(&conditions)
        );
        let mut q = sqlx::query_as::<_, MaintenanceRecordRow>(&query);

        if let Some(asset_id) = filter.asset_id {
            q = q.bind(asset_id);
        }
        if let Some(performed_by_id) = filter.performed_by_id {
            q = q.bind(performed_by_id);
        }
        if let Some(schedule_id) = filter.schedule_id {
            q = q.bind(schedule_id);
        }
        if let Some(ticket_id) = filter.ticket_id {
            q = q.bind(ticket_id);
        }
        if let Some(date) = filter.performed_on {
            let (start, end) = day_bounds(date);
            q = q.bind(start).bind(end);
        }
        q.fetch_all(conn).await
    }

    pub async fn update(
        conn: &mut PgConnection,
        record: &MaintenanceRecord,
    ) -> Result<Option<MaintenanceRecordRow>, sqlx::Error> {
        let query = format!(
            "UPDATE maintenance_records SET \
                asset_id = $3, performed_by_id = $4, schedule_id = $5, ticket_id = $6, \
                maintenance_type = $7, notes = $8, performed_at = $9, completed_at = $10, \
                updated_at = $11, version = version + 1 \
             WHERE id = $1 AND version = $2 AND deleted_at IS NULL \
             RETURNING {RECORD_COLUMNS}"
        );
        sqlx::query_as::<_, MaintenanceRecordRow>(&query)
            .bind(record.id)
            .bind(record.version)
            .bind(record.asset_id)
            .bind(record.performed_by_id)
            .bind(record.schedule_id)
            .bind(record.ticket_id)
            .bind(record.maintenance_type.as_str())
            .bind(record.notes.as_deref())
            .bind(record.performed_at)
            .bind(record.completed_at)
            .bind(record.updated_at)
            .fetch_optional(conn)
            .await
    }

    pub async fn soft_delete(conn: &mut PgConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE maintenance_records SET deleted_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
