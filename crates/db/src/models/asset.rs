//! Rows from the `branches`, `asset_categories` and `assets` tables.

use chrono::NaiveDate;
use sqlx::FromRow;

use assetdesk_core::asset::{Asset, AssetCategory, AssetStatus, AssetType, Branch};
use assetdesk_core::error::CoreError;
use assetdesk_core::types::{DbId, Timestamp};

/// A row from the `branches` table.
#[derive(Debug, Clone, FromRow)]
pub struct BranchRow {
    pub id: DbId,
    pub name: String,
    pub address: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: i32,
}

impl TryFrom<BranchRow> for Branch {
    type Error = CoreError;

    fn try_from(row: BranchRow) -> Result<Self, Self::Error> {
        Ok(Branch {
            id: row.id,
            name: row.name,
            address: row.address,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version,
        })
    }
}

/// A row from the `asset_categories` table.
#[derive(Debug, Clone, FromRow)]
pub struct AssetCategoryRow {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: i32,
}

impl TryFrom<AssetCategoryRow> for AssetCategory {
    type Error = CoreError;

    fn try_from(row: AssetCategoryRow) -> Result<Self, Self::Error> {
        Ok(AssetCategory {
            id: row.id,
            name: row.name,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version,
        })
    }
}

/// A row from the `assets` table.
#[derive(Debug, Clone, FromRow)]
pub struct AssetRow {
    pub id: DbId,
    pub branch_id: DbId,
    pub category_id: Option<DbId>,
    pub name: String,
    pub asset_type: String,
    pub status: String,
    pub location: String,
    pub qr_code: String,
    pub model: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub warranty_expires_on: Option<NaiveDate>,
    pub last_maintenance_at: Option<Timestamp>,
    pub next_maintenance_at: Option<Timestamp>,
    pub metadata: serde_json::Value,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: i32,
}

impl TryFrom<AssetRow> for Asset {
    type Error = CoreError;

    fn try_from(row: AssetRow) -> Result<Self, Self::Error> {
        Ok(Asset {
            id: row.id,
            branch_id: row.branch_id,
            category_id: row.category_id,
            name: row.name,
            asset_type: AssetType::from_str(&row.asset_type)?,
            status: AssetStatus::from_str(&row.status)?,
            location: row.location,
            qr_code: row.qr_code,
            model: row.model,
            purchase_date: row.purchase_date,
            warranty_expires_on: row.warranty_expires_on,
            last_maintenance_at: row.last_maintenance_at,
            next_maintenance_at: row.next_maintenance_at,
            metadata: row.metadata,
            created_at: row.created_at,
            updated_at: row.updated_at,
            version: row.version,
        })
    }
}
