//! Repository for the `daily_reports` table.

use sqlx::PgConnection;

use assetdesk_core::report::{DailyReport, DailyReportFilter};
use assetdesk_core::types::DbId;

use super::live_where;
use crate::models::report::DailyReportRow;

/// Column list for `daily_reports` queries.
const COLUMNS: &str = "\
    id, report_date, tickets_created, tickets_resolved, tickets_closed, \
    maintenance_performed, parts_consumed, avg_resolution_minutes, summary, \
    generated_at, created_at, updated_at, version";

/// Provides data access for the `daily_reports` table.
pub struct DailyReportRepo;

impl DailyReportRepo {
    /// Insert a report. A second live report for the same date violates
    /// `uq_daily_reports_date`.
    pub async fn insert(
        conn: &mut PgConnection,
        report: &DailyReport,
    ) -> Result<DailyReportRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO daily_reports (\
                id, report_date, tickets_created, tickets_resolved, tickets_closed, \
                maintenance_performed, parts_consumed, avg_resolution_minutes, summary, \
                generated_at, created_at, updated_at, version\
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DailyReportRow>(&query)
            .bind(report.id)
            .bind(report.report_date)
            .bind(report.tickets_created)
            .bind(report.tickets_resolved)
            .bind(report.tickets_closed)
            .bind(report.maintenance_performed)
            .bind(report.parts_consumed)
            .bind(report.avg_resolution_minutes)
            .bind(&report.summary)
            .bind(report.generated_at)
            .bind(report.created_at)
            .bind(report.updated_at)
            .bind(report.version)
            .fetch_one(conn)
            .await
    }

    pub async fn find_by_id(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<DailyReportRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM daily_reports WHERE id = $1 AND deleted_at IS NULL"
        );
        sqlx::query_as::<_, DailyReportRow>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// List reports; `from` and `to` are inclusive date bounds.
    pub async fn list(
        conn: &mut PgConnection,
        filter: &DailyReportFilter,
    ) -> Result<Vec<DailyReportRow>, sqlx::Error> {
        let mut conditions = Vec::new();
        let mut bind_idx = 1u32;

        if filter.report_date.is_some() {
            conditions.push(format!("report_date = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.from.is_some() {
            conditions.push(format!("report_date >= ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.to.is_some() {
            conditions.push(format!("report_date <= ${bind_idx}"));
        }

        let query = format!(
            "SELECT {COLUMNS} FROM daily_reports {} ORDER BY seq",
            live_where(&conditions)
        );
        let mut q = sqlx::query_as::<_, DailyReportRow>(&query);
        if let Some(date) = filter.report_date {
            q = q.bind(date);
        }
        if let Some(from) = filter.from {
            q = q.bind(from);
        }
        if let Some(to) = filter.to {
            q = q.bind(to);
        }
        q.fetch_all(conn).await
    }

    /// Overwrite a report's figures if `report.version` is still current.
    pub async fn update(
        conn: &mut PgConnection,
        report: &DailyReport,
    ) -> Result<Option<DailyReportRow>, sqlx::Error> {
        let query = format!(
            "UPDATE daily_reports SET \
                tickets_created = $3, tickets_resolved = $4, tickets_closed = $5, \
                maintenance_performed = $6, parts_consumed = $7, \
                avg_resolution_minutes = $8, summary = $9, generated_at = $10, \
                updated_at = $11, version = version + 1 \
             WHERE id = $1 AND version = $2 AND deleted_at IS NULL \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, DailyReportRow>(&query)
            .bind(report.id)
            .bind(report.version)
            .bind(report.tickets_created)
            .bind(report.tickets_resolved)
            .bind(report.tickets_closed)
            .bind(report.maintenance_performed)
            .bind(report.parts_consumed)
            .bind(report.avg_resolution_minutes)
            .bind(&report.summary)
            .bind(report.generated_at)
            .bind(report.updated_at)
            .fetch_optional(conn)
            .await
    }

    pub async fn soft_delete(conn: &mut PgConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE daily_reports SET deleted_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
