//! Repository layer: one zero-sized struct per table with async query methods.
//!
//! Every method takes the connection it runs on, so the same queries serve a
//! pooled connection or an open transaction. Reads skip soft-deleted rows and
//! lists come back in insertion order (`seq`).

pub mod asset_repo;
pub mod inventory_repo;
pub mod maintenance_repo;
pub mod report_repo;
pub mod ticket_repo;
pub mod user_repo;

pub use asset_repo::{AssetCategoryRepo, AssetRepo, BranchRepo};
pub use inventory_repo::{PartRepo, PartUsageRepo};
pub use maintenance_repo::{MaintenanceRecordRepo, MaintenanceScheduleRepo};
pub use report_repo::DailyReportRepo;
pub use ticket_repo::{TicketRepo, TicketUpdateRepo};
pub use user_repo::UserRepo;

use sqlx::PgConnection;

use assetdesk_core::types::DbId;

/// Take a row lock on a live row of `table` until the transaction ends.
///
/// Returns `false` when the row is missing or soft-deleted, including when a
/// concurrent transaction deleted it while this one waited for the lock.
pub async fn lock_live_row(
    conn: &mut PgConnection,
    table: &str,
    id: DbId,
) -> Result<bool, sqlx::Error> {
    let query = format!("SELECT id FROM {table} WHERE id = $1 AND deleted_at IS NULL FOR UPDATE");
    let row: Option<(DbId,)> = sqlx::query_as(&query).bind(id).fetch_optional(conn).await?;
    Ok(row.is_some())
}

/// Build an `ILIKE` pattern matching `needle` anywhere, with wildcards escaped.
pub(crate) fn contains_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Render collected conditions as a `WHERE` clause over live rows.
pub(crate) fn live_where(conditions: &[String]) -> String {
    if conditions.is_empty() {
        "WHERE deleted_at IS NULL".to_string()
    } else {
        format!("WHERE deleted_at IS NULL AND {}", conditions.join(" AND "))
    }
}
