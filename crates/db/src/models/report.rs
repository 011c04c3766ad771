//! Rows from the `daily_reports` table.

use chrono::NaiveDate;
use sqlx::FromRow;

use assetdesk_core::error::CoreError;
use assetdesk_core::report::DailyReport;
use assetdesk_core::types::{DbId, Timestamp};

/// A row from the `daily_reports` table.
#[derive(Debug, Clone, FromRow)]
pub struct DailyReportRow {
    pub id: DbId,
    pub report_date: NaiveDate,
    pub tickets_created: i32,
    pub tickets_resolved: i32,
    pub tickets_closed: i32,
    pub maintenance_performed: i32,
    pub parts_consumed: i32,
    pub avg_resolution_minutes: Option<f64>,
    pub summary: serde_json::Value,
    pub generated_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: i32,
}

impl TryFrom<DailyReportRow> for DailyReport {
    type Error = CoreError;

    fn try_from(row: DailyReportRow) -> Result<Self, Self::Error> {
        Ok(DailyReport {
            id: row.id,
            report_date: row.report_date,
            tickets_created: row.tickets_created,
            tickets_resolved: row.tickets_resolved,
            tickets_closed: row.tickets_closed,
            maintenance_performed: row.maintenance_performed,
            parts_consumed: row.parts_consumed,
            avg_resolution_minutes: row.avg_resolution_minutes,
            summary: row.summary,
            generated_at: row.generated_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version,
        })
    }
}
