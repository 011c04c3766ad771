//! Repositories for branches, asset categories, and assets.

use sqlx::PgConnection;

use assetdesk_core::asset::{
    Asset, AssetCategory, AssetCategoryFilter, AssetFilter, Branch, BranchFilter,
};
use assetdesk_core::types::DbId;

use super::{contains_pattern, live_where};
use crate::models::asset::{AssetCategoryRow, AssetRow, BranchRow};

/// Column list for `branches` queries.
const BRANCH_COLUMNS: &str = "id, name, address, created_at, updated_at, version";

/// Column list for `asset_categories` queries.
const CATEGORY_COLUMNS: &str = "id, name, description, created_at, updated_at, version";

/// Column list for `assets` queries.
const ASSET_COLUMNS: &str = "\
    id, branch_id, category_id, name, asset_type, status, location, qr_code, \
    model, purchase_date, warranty_expires_on, last_maintenance_at, \
    next_maintenance_at, metadata, created_at, updated_at, version";

// ---------------------------------------------------------------------------
// Branches
// ---------------------------------------------------------------------------

pub struct BranchRepo;

impl BranchRepo {
    pub async fn insert(conn: &mut PgConnection, branch: &Branch) -> Result<BranchRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO branches (id, name, address, created_at, updated_at, version) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {BRANCH_COLUMNS}"
        );
        sqlx::query_as::<_, BranchRow>(&query)
            .bind(branch.id)
            .bind(&branch.name)
            .bind(branch.address.as_deref())
            .bind(branch.created_at)
            .bind(branch.updated_at)
            .bind(branch.version)
            .fetch_one(conn)
            .await
    }

    pub async fn find_by_id(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<BranchRow>, sqlx::Error> {
        let query = format!(
            "SELECT {BRANCH_COLUMNS} FROM branches WHERE id = $1 AND deleted_at IS NULL"
        );
        sqlx::query_as::<_, BranchRow>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    pub async fn list(
        conn: &mut PgConnection,
        filter: &BranchFilter,
    ) -> Result<Vec<BranchRow>, sqlx::Error> {
        let mut conditions = Vec::new();
        if filter.name.is_some() {
            conditions.push("name ILIKE $1".to_string());
        }
        let query = format!(
            "SELECT {BRANCH_COLUMNS} FROM branches {} ORDER BY seq",
            live_where(&conditions)
        );
        let mut q = sqlx::query_as::<_, BranchRow>(&query);
        if let Some(ref name) = filter.name {
            q = q.bind(contains_pattern(name));
        }
        q.fetch_all(conn).await
    }

    /// Replace a branch if `branch.version` is still current.
    pub async fn update(
        conn: &mut PgConnection,
        branch: &Branch,
    ) -> Result<Option<BranchRow>, sqlx::Error> {
        let query = format!(
            "UPDATE branches SET name = $3, address = $4, updated_at = $5, \
                version = version + 1 \
             WHERE id = $1 AND version = $2 AND deleted_at IS NULL \
             RETURNING {BRANCH_COLUMNS}"
        );
        sqlx::query_as::<_, BranchRow>(&query)
            .bind(branch.id)
            .bind(branch.version)
            .bind(&branch.name)
            .bind(branch.address.as_deref())
            .bind(branch.updated_at)
            .fetch_optional(conn)
            .await
    }

    /// Soft-delete a branch. Returns `true` if a live row was marked.
    pub async fn soft_delete(conn: &mut PgConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE branches SET deleted_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ---------------------------------------------------------------------------
// Asset categories
// ---------------------------------------------------------------------------

pub struct AssetCategoryRepo;

impl AssetCategoryRepo {
    pub async fn insert(
        conn: &mut PgConnection,
        category: &AssetCategory,
    ) -> Result<AssetCategoryRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO asset_categories (id, name, description, created_at, updated_at, version) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {CATEGORY_COLUMNS}"
        );
        sqlx::query_as::<_, AssetCategoryRow>(&query)
            .bind(category.id)
            .bind(&category.name)
            .bind(category.description.as_deref())
            .bind(category.created_at)
            .bind(category.updated_at)
            .bind(category.version)
            .fetch_one(conn)
            .await
    }

    pub async fn find_by_id(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<AssetCategoryRow>, sqlx::Error> {
        let query = format!(
            "SELECT {CATEGORY_COLUMNS} FROM asset_categories \
             WHERE id = $1 AND deleted_at IS NULL"
        );
        sqlx::query_as::<_, AssetCategoryRow>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    pub async fn list(
        conn: &mut PgConnection,
        filter: &AssetCategoryFilter,
    ) -> Result<Vec<AssetCategoryRow>, sqlx::Error> {
        let mut conditions = Vec::new();
        if filter.name.is_some() {
            conditions.push("name ILIKE $1".to_string());
        }
        let query = format!(
            "SELECT {CATEGORY_COLUMNS} FROM asset_categories {} ORDER BY seq",
            live_where(&conditions)
        );
        let mut q = sqlx::query_as::<_, AssetCategoryRow>(&query);
        if let Some(ref name) = filter.name {
            q = q.bind(contains_pattern(name));
        }
        q.fetch_all(conn).await
    }

    pub async fn update(
        conn: &mut PgConnection,
        category: &AssetCategory,
    ) -> Result<Option<AssetCategoryRow>, sqlx::Error> {
        let query = format!(
            "UPDATE asset_categories SET name = $3, description = $4, updated_at = $5, \
                version = version + 1 \
             WHERE id = $1 AND version = $2 AND deleted_at IS NULL \
             RETURNING {CATEGORY_COLUMNS}"
        );
        sqlx::query_as::<_, AssetCategoryRow>(&query)
            .bind(category.id)
            .bind(category.version)
            .bind(&category.name)
            .bind(category.description.as_deref())
            .bind(category.updated_at)
            .fetch_optional(conn)
            .await
    }

    pub async fn soft_delete(conn: &mut PgConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE asset_categories SET deleted_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

// ---------------------------------------------------------------------------
// Assets
// ---------------------------------------------------------------------------

/// Provides data access for the `assets` table.
pub struct AssetRepo;

impl AssetRepo {
    pub async fn insert(conn: &mut PgConnection, asset: &Asset) -> Result<AssetRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO assets (\
                id, branch_id, category_id, name, asset_type, status, location, qr_code, \
                model, purchase_date, warranty_expires_on, last_maintenance_at, \
                next_maintenance_at, metadata, created_at, updated_at, version\
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17) \
             RETURNING {ASSET_COLUMNS}"
        );
        sqlx::query_as::<_, AssetRow>(&query)
            .bind(asset.id)
            .bind(asset.branch_id)
            .bind(asset.category_id)
            .bind(&asset.name)
            .bind(asset.asset_type.as_str())
            .bind(asset.status.as_str())
            .bind(&asset.location)
            .bind(&asset.qr_code)
            .bind(asset.model.as_deref())
            .bind(asset.purchase_date)
            .bind(asset.warranty_expires_on)
            .bind(asset.last_maintenance_at)
            .bind(asset.next_maintenance_at)
            .bind(&asset.metadata)
            .bind(asset.created_at)
            .bind(asset.updated_at)
            .bind(asset.version)
            .fetch_one(conn)
            .await
    }

    pub async fn find_by_id(
        conn: &mut PgConnection,
        id: DbId,
    ) -> Result<Option<AssetRow>, sqlx::Error> {
        let query = format!("SELECT {ASSET_COLUMNS} FROM assets WHERE id = $1 AND deleted_at IS NULL");
        sqlx::query_as::<_, AssetRow>(&query)
            .bind(id)
            .fetch_optional(conn)
            .await
    }

    /// List live assets matching every supplied filter field.
    pub async fn list(
        conn: &mut PgConnection,
        filter: &AssetFilter,
    ) -> Result<Vec<AssetRow>, sqlx::Error> {
        let mut conditions = Vec::new();
        let mut bind_idx = 1u32;

        if filter.branch_id.is_some() {
            conditions.push(format!("branch_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.category_id.is_some() {
            conditions.push(format!("category_id = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.asset_type.is_some() {
            conditions.push(format!("asset_type = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.status.is_some() {
            conditions.push(format!("status = ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.name.is_some() {
            conditions.push(format!("name ILIKE ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.location.is_some() {
            conditions.push(format!("location ILIKE ${bind_idx}"));
            bind_idx += 1;
        }
        if filter.qr_code.is_some() {
            conditions.push(format!("qr_code = ${bind_idx}"));
        }

        let query = format!(
            "SELECT {ASSET_COLUMNS} FROM assets {} ORDER BY seq",
            live_where(&conditions)
        );
        let mut q = sqlx::query_as::<_, AssetRow>(&query);

        if let Some(branch_id) = filter.branch_id {
            q = q.bind(branch_id);
        }
        if let Some(category_id) = filter.category_id {
            q = q.bind(category_id);
        }
        if let Some(asset_type) = filter.asset_type {
            q = q.bind(asset_type.as_str());
        }
        if let Some(status) = filter.status {
            q = q.bind(status.as_str());
        }
        if let Some(ref name) = filter.name {
            q = q.bind(contains_pattern(name));
        }
        if let Some(ref location) = filter.location {
            q = q.bind(contains_pattern(location));
        }
        if let Some(ref qr_code) = filter.qr_code {
            q = q.bind(qr_code);
        }
        q.fetch_all(conn).await
    }

    /// Replace an asset if `asset.version` is still current. The QR code is
    /// not part of the `SET` list.
    pub async fn update(
        conn: &mut PgConnection,
        asset: &Asset,
    ) -> Result<Option<AssetRow>, sqlx::Error> {
        let query = format!(
            "UPDATE assets SET \
                branch_id = $3, category_id = $4, name = $5, asset_type = $6, \
                status = $7, location = $8, model = $9, purchase_date = $10, \
                warranty_expires_on = $11, last_maintenance_at = $12, \
                next_maintenance_at = $13, metadata = $14, updated_at = $15, \
                version = version + 1 \
             WHERE id = $1 AND version = $2 AND deleted_at IS NULL \
             RETURNING {ASSET_COLUMNS}"
        );
        sqlx::query_as::<_, AssetRow>(&query)
            .bind(asset.id)
            .bind(asset.version)
            .bind(asset.branch_id)
            .bind(asset.category_id)
            .bind(&asset.name)
            .bind(asset.asset_type.as_str())
            .bind(asset.status.as_str())
            .bind(&asset.location)
            .bind(asset.model.as_deref())
            .bind(asset.purchase_date)
            .bind(asset.warranty_expires_on)
            .bind(asset.last_maintenance_at)
            .bind(asset.next_maintenance_at)
            .bind(&asset.metadata)
            .bind(asset.updated_at)
            .fetch_optional(conn)
            .await
    }

    pub async fn soft_delete(conn: &mut PgConnection, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE assets SET deleted_at = NOW() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
