//! Repositories for parts and part usage.

use sqlx::PgConnection;

use assetdesk_core::inventory::{Part, PartFilter, PartUsage, PartUsageFilter};
use assetdesk_core::types::{day_bounds, DbId};

use super::{contains_pattern, live_where};
use crate::models::inventory::{PartRow, PartUsageRow};

/// Column list for `parts` queries.
const PART_COLUMNS: &str = "\
    id, name, description, location, quantity_on_hand, reorder_level, \
    last_restocked_at, created_at, updated_at, version";

/// Column list for `part_usages` queries.
const USAGE_COLUMNS: &str = "\
    id, part_id, maintenance_record_id, ticket_id, quantity, created_at, version";

// ---------------------------------------------------------------------------
// Parts
// ---------------------------------------------------------------------------

/// Provides data access for the `parts` table.
pub struct PartRepo;

impl PartRepo {
    pub async fn insert(conn: &mut PgConnection, part: &Part) -> Result<PartRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO parts (\
                id, name, description, location, quantity_on_hand, reorder_level, \
                last_restocked_at, created_at, updated_at, version\
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             RETURNING {PART_COLUMNS}"
        );
        sqlx::query_as::<_, PartRow>(&query)
            .bind(part.id)
            .bind(&part.name)
            .bind(part.description.as_deref())
            .bind(part.location.as_deref())
            .bind(part.quantity_on_hand)
            .bind(part.reorder_level)
            .bind(part.last_restocked_at)
            .bind(part.created_at)
            .bind(part.updated_at)
            .bind(part.version)
            .fetch_one(conn)
            .await
    }

    pub async fn find_by_id(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<PartRow>, sqlx::Error> {
        let query = format!("SELECT {PART_COLUMNS} FROM parts WHERE id = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, PartRow>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    pub async fn list(
        conn: &mut PgConnection,
        filter: &PartFilter,
    ) -> Result<Vec<PartRow>, sqlx::Error> {
        let mut conditions = Vec::new();
        let mut bind_idx = 1u32;

        if filter.name.is_some() {
            conditions.push(format!("name ILIKE ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.location.is_some() {
            conditions.push(format!("location ILIKE ${bind_idx}"));
        }
        match filter.low_stock {
            Some(true) => conditions.push("quantity_on_hand <= reorder_level".to_string()),
            Some(false) => conditions.push("quantity_on_hand > reorder_level".to_string()),
            None => {}
        }

        let query = format!(
            "SELECT {PART_COLUMNS} FROM parts {} ORDER BY seq",
            live_where(&conditions)
        );
        let mut q = sqlx::query_as::<_, PartRow>(&query);
        if let Some(ref name) = filter.name {
            q = q.bind(contains_pattern(name));
        }
        if let Some(ref location) = filter.location {
            q = q.bind(contains_pattern(location));
        }
        q.fetch_all(conn).await
    }

    /// Replace a part if `part.version` is still current.
    ///
    /// Stock decrements go through here, so two units decrementing the same
    /// part cannot both succeed from the same read.
    pub async fn update(conn: &mut PgConnection, part: &Part) -> Result<Option<PartRow>, sqlx::Error> {
        let query = format!(
            "UPDATE parts SET \
                name = $3, description = $4, location = $5, quantity_on_hand = $6, \
                reorder_level = $7, last_restocked_at = $8, updated_at = $9, \
                version = version + 1 \
             WHERE id = $1 AND version = $2 AND deleted_at IS NULL \
             RETURNING {PART_COLUMNS}"
        );
        sqlx::query_as::<_, PartRow>(&query)
            .bind(part.id)
            .bind(part.version)
            .bind(&part.name)
            .bind(part.description.as_deref())
            .bind(part.location.as_deref())
            .bind(part.quantity_on_hand)
            .bind(part.reorder_level)
            .bind(part.last_restocked_at)
            .bind(part.updated_at)
            .fetch_optional(conn)
            .await
    }

    pub async fn soft_delete(conn: &mut PgConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE parts SET deleted_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ---------------------------------------------------------------------------
// Part usage
// ---------------------------------------------------------------------------

/// Provides data access for the `part_usages` table.
pub struct PartUsageRepo;

impl PartUsageRepo {
    pub async fn insert(
        conn: &mut PgConnection,
        usage: &PartUsage,
    ) -> Result<PartUsageRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO part_usages (\
                id, part_id, maintenance_record_id, ticket_id, quantity, created_at, version\
             ) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {USAGE_COLUMNS}"
        );
        sqlx::query_as::<_, PartUsageRow>(&query)
            .bind(usage.id)
            .bind(usage.part_id)
            .bind(usage.maintenance_record_id)
            .bind(usage.ticket_id)
            .bind(usage.quantity)
            .bind(usage.created_at)
            .bind(usage.version)
            .fetch_one(conn)
            .await
    }

    pub async fn find_by_id(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<PartUsageRow>, sqlx::Error> {
        let query = format!(
            "SELECT {USAGE_COLUMNS} FROM part_usages WHERE id = $1 AND deleted_at IS NULL"
        );
        sqlx::query_as::<_, PartUsageRow>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    pub async fn list(
        conn: &mut PgConnection,
        filter: &PartUsageFilter,
    ) -> Result<Vec<PartUsageRow>, sqlx::Error> {
        let mut conditions = Vec::new();
        let mut bind_idx = 1u32;

        if filter.part_id.is_some() {
            conditions.push(format!("part_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.maintenance_record_id.is_some() {
            conditions.push(format!("maintenance_record_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.ticket_id.is_some() {
            conditions.push(format!("ticket_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.used_on.is_some() {
            conditions.push(format!(
                "created_at >= ${bind_idx} AND created_at < ${}",
                bind_idx + 1
            ));
        }

        let query = format!(
            "SELECT {USAGE_COLUMNS} FROM part_usages {} ORDER BY seq",
            live_where(&conditions)
        );
        let mut q = sqlx::query_as::<_, PartUsageRow>(&query);
        if let Some(part_id) = filter.part_id {
            q = q.bind(part_id);
        }
        if let Some(record_id) = filter.maintenance_record_id {
            q = q.bind(record_id);
        }
        if let Some(ticket_id) = filter.ticket_id {
            q = q.bind(ticket_id);
        }
        if let Some(date) = filter.used_on {
            let (start, end) = day_bounds(date);
            q = q.bind(start).bind(end);
        }
        q.fetch_all(conn).await
    }

    pub async fn update(
        conn: &mut PgConnection,
        usage: &PartUsage,
    ) -> Result<Option<PartUsageRow>, sqlx::Error> {
        let query = format!(
            "UPDATE part_usages SET \
                part_id = $3, maintenance_record_id = $4, ticket_id = $5, quantity = $6, \
                version = version + 1 \
             WHERE id = $1 AND version = $2 AND deleted_at IS NULL \
             RETURNING {USAGE_COLUMNS}"
        );
        sqlx::query_as::<_, PartUsageRow>(&query)
            .bind(usage.id)
            .bind(usage.version)
            .bind(usage.part_id)
            .bind(usage.maintenance_record_id)
            .bind(usage.ticket_id)
            .bind(usage.quantity)
            .fetch_optional(conn)
            .await
    }

    pub async fn soft_delete(conn: &mut PgConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE part_usages SET deleted_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
