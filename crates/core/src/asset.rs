//! Branches, asset categories, and the physical assets tickets are raised against.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::patch::Patch;
use crate::store::{eq_matches, require_text, text_matches, Entity};
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

string_enum! {
    /// Broad kind of physical asset.
    pub enum AssetType("asset type") {
        Equipment => "EQUIPMENT",
        Furniture => "FURNITURE",
        Electronics => "ELECTRONICS",
        Plumbing => "PLUMBING",
        Hvac => "HVAC",
        Other => "OTHER",
    }
}

string_enum! {
    /// Operational condition of an asset.
    pub enum AssetStatus("asset status") {
        Operational => "OPERATIONAL",
        MaintenanceNeeded => "MAINTENANCE_NEEDED",
        OutOfService => "OUT_OF_SERVICE",
        Decommissioned => "DECOMMISSIONED",
    }
}

// ---------------------------------------------------------------------------
// Branch
// ---------------------------------------------------------------------------

/// A physical location owning users and assets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Branch {
    pub id: DbId,
    pub name: String,
    pub address: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BranchFilter {
    pub name: Option<String>,
}

impl Entity for Branch {
    const NAME: &'static str = "Branch";
    type Filter = BranchFilter;

    fn id(&self) -> DbId {
        self.id
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn set_version(&mut self, version: i32) {
        self.version = version;
    }

    fn validate(&self) -> Result<(), CoreError> {
        require_text(&self.name, "name")
    }

    fn matches(&self, filter: &BranchFilter) -> bool {
        text_matches(&self.name, &filter.name)
    }
}

/// DTO for creating a branch.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateBranch {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub address: Option<String>,
}

// ---------------------------------------------------------------------------
// AssetCategory
// ---------------------------------------------------------------------------

/// Free-form grouping of assets, unique by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetCategory {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetCategoryFilter {
    pub name: Option<String>,
}

impl Entity for AssetCategory {
    const NAME: &'static str = "AssetCategory";
    type Filter = AssetCategoryFilter;

    fn id(&self) -> DbId {
        self.id
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn set_version(&mut self, version: i32) {
        self.version = version;
    }

    fn validate(&self) -> Result<(), CoreError> {
        require_text(&self.name, "name")
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("uq_asset_categories_name", self.name.to_lowercase())]
    }

    fn matches(&self, filter: &AssetCategoryFilter) -> bool {
        text_matches(&self.name, &filter.name)
    }
}

/// DTO for creating a category.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAssetCategory {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Asset
// ---------------------------------------------------------------------------

/// A physical item that needs maintenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: DbId,
    pub branch_id: DbId,
    pub category_id: Option<DbId>,
    pub name: String,
    pub asset_type: AssetType,
    pub status: AssetStatus,
    pub location: String,
    /// Unique among live assets and immutable after creation.
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

/// Query parameters for listing assets.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetFilter {
    pub branch_id: Option<DbId>,
    pub category_id: Option<DbId>,
    pub asset_type: Option<AssetType>,
    pub status: Option<AssetStatus>,
    /// Substring of the name.
    pub name: Option<String>,
    /// Substring of the location.
    pub location: Option<String>,
    /// Exact QR code.
    pub qr_code: Option<String>,
}

impl Entity for Asset {
    const NAME: &'static str = "Asset";
    type Filter = AssetFilter;

    fn id(&self) -> DbId {
        self.id
    }

    fn version(&self) -> i32 {
        self.version
    }

    fn set_version(&mut self, version: i32) {
        self.version = version;
    }

    fn validate(&self) -> Result<(), CoreError> {
        require_text(&self.name, "name")?;
        require_text(&self.qr_code, "qr_code")?;
        if let (Some(purchased), Some(warranty)) = (self.purchase_date, self.warranty_expires_on) {
            if warranty < purchased {
                return Err(CoreError::Validation(
                    "warranty_expires_on must not precede purchase_date".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("uq_assets_qr_code", self.qr_code.clone())]
    }

    fn check_replace(&self, current: &Self) -> Result<(), CoreError> {
        if self.qr_code != current.qr_code {
            return Err(CoreError::Validation(format!(
                "qr_code of asset {} is immutable",
                self.id
            )));
        }
        Ok(())
    }

    fn matches(&self, filter: &AssetFilter) -> bool {
        eq_matches(&self.branch_id, &filter.branch_id)
            && filter
                .category_id
                .map_or(true, |c| self.category_id == Some(c))
            && eq_matches(&self.asset_type, &filter.asset_type)
            && eq_matches(&self.status, &filter.status)
            && text_matches(&self.name, &filter.name)
            && text_matches(&self.location, &filter.location)
            && eq_matches(&self.qr_code, &filter.qr_code)
    }
}

/// DTO for registering an asset.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateAsset {
    pub branch_id: DbId,
    pub category_id: Option<DbId>,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub asset_type: AssetType,
    #[validate(length(max = 200))]
    pub location: String,
    #[validate(length(min = 1, max = 128))]
    pub qr_code: String,
    pub model: Option<String>,
    pub purchase_date: Option<NaiveDate>,
    pub warranty_expires_on: Option<NaiveDate>,
    pub metadata: Option<serde_json::Value>,
}

/// DTO for updating an asset. The QR code cannot be patched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateAsset {
    #[serde(default)]
    pub name: Patch<String>,
    #[serde(default)]
    pub category_id: Patch<DbId>,
    #[serde(default)]
    pub asset_type: Patch<AssetType>,
    #[serde(default)]
    pub status: Patch<AssetStatus>,
    #[serde(default)]
    pub location: Patch<String>,
    #[serde(default)]
    pub model: Patch<String>,
    #[serde(default)]
    pub warranty_expires_on: Patch<NaiveDate>,
    #[serde(default)]
    pub metadata: Patch<serde_json::Value>,
}
