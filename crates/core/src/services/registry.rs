//! Record keeping for branches, users, asset categories, assets and parts.
//!
//! Deletes are soft and refuse to leave live rows pointing at the deleted one.

use std::sync::Arc;

use validator::Validate;

use crate::asset::{
    Asset, AssetCategory, AssetCategoryFilter, AssetFilter, AssetStatus, Branch, BranchFilter,
    CreateAsset, CreateAssetCategory, CreateBranch, UpdateAsset,
};
use crate::clock::Clock;
use crate::error::CoreError;
use crate::inventory::{CreatePart, Part, PartFilter, PartUsageFilter};
use crate::maintenance::{MaintenanceRecordFilter, MaintenanceScheduleFilter};
use crate::patch::Patch;
use crate::store::Store;
use crate::ticket::{TicketFilter, TicketUpdateFilter};
use crate::types::DbId;
use crate::user::{CreateUser, UpdateUser, User, UserFilter};

use super::{ensure_unreferenced, resolve};

/// CRUD for the reference data tickets and schedules point at.
pub struct RegistryService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl RegistryService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    // -----------------------------------------------------------------------
    // Branches
    // -----------------------------------------------------------------------

    pub async fn create_branch(&self, input: CreateBranch) -> Result<Branch, CoreError> {
        input.validate()?;
        let now = self.clock.now();
        let mut uow = self.store.begin().await?;
        let branch = uow
            .branches()
            .create(Branch {
                id: crate::types::new_id(),
                name: input.name.trim().to_string(),
                address: input.address,
                created_at: now,
                updated_at: now,
                version: 0,
            })
            .await?;
        uow.commit().await?;
        tracing::info!(branch_id = %branch.id, name = %branch.name, "Branch created");
        Ok(branch)
    }

    pub async fn get_branch(&self, id: DbId) -> Result<Branch, CoreError> {
        let mut uow = self.store.begin().await?;
        uow.branches().get_by_id(id).await
    }

    pub async fn list_branches(&self, filter: BranchFilter) -> Result<Vec<Branch>, CoreError> {
        let mut uow = self.store.begin().await?;
        uow.branches().list(&filter).await
    }

    /// Fails with `Conflict` while users or assets still belong to the branch.
    pub async fn delete_branch(&self, id: DbId) -> Result<(), CoreError> {
        let mut uow = self.store.begin().await?;
        uow.branches().lock(id).await?;
        let users = uow
            .users()
            .list(&UserFilter {
                branch_id: Some(id),
                ..Default::default()
            })
            .await?;
        ensure_unreferenced("Branch", id, "users", users.len())?;
        let assets = uow
            .assets()
            .list(&AssetFilter {
                branch_id: Some(id),
                ..Default::default()
            })
            .await?;
        ensure_unreferenced("Branch", id, "assets", assets.len())?;
        uow.branches().delete(id).await?;
        uow.commit().await?;
        tracing::info!(branch_id = %id, "Branch deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Users
    // -----------------------------------------------------------------------

    /// Register a user. The email is stored trimmed and lowercased.
    pub async fn create_user(&self, input: CreateUser) -> Result<User, CoreError> {
        input.validate()?;
        let now = self.clock.now();
        let mut uow = self.store.begin().await?;
        if let Some(branch_id) = input.branch_id {
            resolve(uow.branches(), branch_id, "branch_id").await?;
        }
        let user = uow
            .users()
            .create(User {
                id: crate::types::new_id(),
                branch_id: input.branch_id,
                full_name: input.full_name.trim().to_string(),
                email: input.email.trim().to_lowercase(),
                role: input.role,
                active: true,
                created_at: now,
                updated_at: now,
                version: 0,
            })
            .await?;
        uow.commit().await?;
        tracing::info!(user_id = %user.id, role = %user.role, "User created");
        Ok(user)
    }

    pub async fn update_user(&self, id: DbId, patch: UpdateUser) -> Result<User, CoreError> {
        let mut uow = self.store.begin().await?;
        let mut user = uow.users().get_by_id(id).await?;
        if let Patch::Value(branch_id) = &patch.branch_id {
            resolve(uow.branches(), *branch_id, "branch_id").await?;
        }
        patch.full_name.apply_required(&mut user.full_name, "full_name")?;
        patch.role.apply_required(&mut user.role, "role")?;
        patch.active.apply_required(&mut user.active, "active")?;
        patch.branch_id.apply_optional(&mut user.branch_id);
        user.updated_at = self.clock.now();
        let user = uow.users().update(user).await?;
        uow.commit().await?;
        tracing::info!(user_id = %id, active = user.active, "User updated");
        Ok(user)
    }

    pub async fn get_user(&self, id: DbId) -> Result<User, CoreError> {
        let mut uow = self.store.begin().await?;
        uow.users().get_by_id(id).await
    }

    pub async fn list_users(&self, filter: UserFilter) -> Result<Vec<User>, CoreError> {
        let mut uow = self.store.begin().await?;
        uow.users().list(&filter).await
    }

    /// Fails with `Conflict` while tickets, ticket history, schedules or
    /// maintenance records reference the user. Deactivate instead.
    pub async fn delete_user(&self, id: DbId) -> Result<(), CoreError> {
        let mut uow = self.store.begin().await?;
        uow.users().lock(id).await?;

        let created = uow
            .tickets()
            .list(&TicketFilter {
                created_by_id: Some(id),
                ..Default::default()
            })
            .await?;
        ensure_unreferenced("User", id, "created tickets", created.len())?;
        let assigned = uow
            .tickets()
            .list(&TicketFilter {
                assigned_to_id: Some(id),
                ..Default::default()
            })
            .await?;
        ensure_unreferenced("User", id, "assigned tickets", assigned.len())?;
        let history = uow
            .ticket_updates()
            .list(&TicketUpdateFilter {
                user_id: Some(id),
                ..Default::default()
            })
            .await?;
        ensure_unreferenced("User", id, "ticket updates", history.len())?;
        let schedules = uow
            .schedules()
            .list(&MaintenanceScheduleFilter {
                assigned_to_id: Some(id),
                ..Default::default()
            })
            .await?;
        ensure_unreferenced("User", id, "maintenance schedules", schedules.len())?;
        let records = uow
            .records()
            .list(&MaintenanceRecordFilter {
                performed_by_id: Some(id),
                ..Default::default()
            })
            .await?;
        ensure_unreferenced("User", id, "maintenance records", records.len())?;

        uow.users().delete(id).await?;
        uow.commit().await?;
        tracing::info!(user_id = %id, "User deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Asset categories
    // -----------------------------------------------------------------------

    pub async fn create_category(
        &self,
        input: CreateAssetCategory,
    ) -> Result<AssetCategory, CoreError> {
        input.validate()?;
        let now = self.clock.now();
        let mut uow = self.store.begin().await?;
        let category = uow
            .categories()
            .create(AssetCategory {
                id: crate::types::new_id(),
                name: input.name.trim().to_string(),
                description: input.description,
                created_at: now,
                updated_at: now,
                version: 0,
            })
            .await?;
        uow.commit().await?;
        tracing::info!(category_id = %category.id, name = %category.name, "Asset category created");
        Ok(category)
    }

    pub async fn list_categories(
        &self,
        filter: AssetCategoryFilter,
    ) -> Result<Vec<AssetCategory>, CoreError> {
        let mut uow = self.store.begin().await?;
        uow.categories().list(&filter).await
    }

    pub async fn delete_category(&self, id: DbId) -> Result<(), CoreError> {
        let mut uow = self.store.begin().await?;
        uow.categories().lock(id).await?;
        let assets = uow
            .assets()
            .list(&AssetFilter {
                category_id: Some(id),
                ..Default::default()
            })
            .await?;
        ensure_unreferenced("AssetCategory", id, "assets", assets.len())?;
        uow.categories().delete(id).await?;
        uow.commit().await?;
        tracing::info!(category_id = %id, "Asset category deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Assets
    // -----------------------------------------------------------------------

    /// Register an asset as `OPERATIONAL`. The QR code must be unique among
    /// live assets and can never change afterwards.
    pub async fn create_asset(&self, input: CreateAsset) -> Result<Asset, CoreError> {
        input.validate()?;
        let now = self.clock.now();
        let mut uow = self.store.begin().await?;
        let branch = resolve(uow.branches(), input.branch_id, "branch_id").await?;
        if let Some(category_id) = input.category_id {
            resolve(uow.categories(), category_id, "category_id").await?;
        }
        let asset = uow
            .assets()
            .create(Asset {
                id: crate::types::new_id(),
                branch_id: branch.id,
                category_id: input.category_id,
                name: input.name.trim().to_string(),
                asset_type: input.asset_type,
                status: AssetStatus::Operational,
                location: input.location,
                qr_code: input.qr_code.trim().to_string(),
                model: input.model,
                purchase_date: input.purchase_date,
                warranty_expires_on: input.warranty_expires_on,
                last_maintenance_at: None,
                next_maintenance_at: None,
                metadata: input.metadata.unwrap_or_else(|| serde_json::json!({})),
                created_at: now,
                updated_at: now,
                version: 0,
            })
            .await?;
        uow.commit().await?;
        tracing::info!(asset_id = %asset.id, qr_code = %asset.qr_code, "Asset registered");
        Ok(asset)
    }

    pub async fn update_asset(&self, id: DbId, patch: UpdateAsset) -> Result<Asset, CoreError> {
        let mut uow = self.store.begin().await?;
        let mut asset = uow.assets().get_by_id(id).await?;
        if let Patch::Value(category_id) = &patch.category_id {
            resolve(uow.categories(), *category_id, "category_id").await?;
        }
        patch.name.apply_required(&mut asset.name, "name")?;
        patch.category_id.apply_optional(&mut asset.category_id);
        patch.asset_type.apply_required(&mut asset.asset_type, "asset_type")?;
        patch.status.apply_required(&mut asset.status, "status")?;
        patch.location.apply_required(&mut asset.location, "location")?;
        patch.model.apply_optional(&mut asset.model);
        patch.warranty_expires_on.apply_optional(&mut asset.warranty_expires_on);
        patch.metadata.apply_required(&mut asset.metadata, "metadata")?;
        asset.updated_at = self.clock.now();
        let asset = uow.assets().update(asset).await?;
        uow.commit().await?;
        tracing::info!(asset_id = %id, status = %asset.status, "Asset updated");
        Ok(asset)
    }

    pub async fn get_asset(&self, id: DbId) -> Result<Asset, CoreError> {
        let mut uow = self.store.begin().await?;
        uow.assets().get_by_id(id).await
    }

    /// Look up a live asset by its QR code.
    pub async fn find_asset_by_qr(&self, qr_code: &str) -> Result<Option<Asset>, CoreError> {
        let mut uow = self.store.begin().await?;
        let assets = uow
            .assets()
            .list(&AssetFilter {
                qr_code: Some(qr_code.trim().to_string()),
                ..Default::default()
            })
            .await?;
        Ok(assets.into_iter().next())
    }

    pub async fn list_assets(&self, filter: AssetFilter) -> Result<Vec<Asset>, CoreError> {
        let mut uow = self.store.begin().await?;
        uow.assets().list(&filter).await
    }

    /// Fails with `Conflict` while tickets, schedules or records reference the asset.
    pub async fn delete_asset(&self, id: DbId) -> Result<(), CoreError> {
        let mut uow = self.store.begin().await?;
        uow.assets().lock(id).await?;
        let tickets = uow
            .tickets()
            .list(&TicketFilter {
                asset_id: Some(id),
                ..Default::default()
            })
            .await?;
        ensure_unreferenced("Asset", id, "tickets", tickets.len())?;
        let schedules = uow
            .schedules()
            .list(&MaintenanceScheduleFilter {
                asset_id: Some(id),
                ..Default::default()
            })
            .await?;
        ensure_unreferenced("Asset", id, "maintenance schedules", schedules.len())?;
        let records = uow
            .records()
            .list(&MaintenanceRecordFilter {
                asset_id: Some(id),
                ..Default::default()
            })
            .await?;
        ensure_unreferenced("Asset", id, "maintenance records", records.len())?;
        uow.assets().delete(id).await?;
        uow.commit().await?;
        tracing::info!(asset_id = %id, "Asset deleted");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Parts
    // -----------------------------------------------------------------------

    pub async fn create_part(&self, input: CreatePart) -> Result<Part, CoreError> {
        input.validate()?;
        let now = self.clock.now();
        let mut uow = self.store.begin().await?;
        let part = uow
            .parts()
            .create(Part {
                id: crate::types::new_id(),
                name: input.name.trim().to_string(),
                description: input.description,
                location: input.location,
                quantity_on_hand: input.quantity_on_hand,
                reorder_level: input.reorder_level,
                last_restocked_at: (input.quantity_on_hand > 0).then_some(now),
                created_at: now,
                updated_at: now,
                version: 0,
            })
            .await?;
        uow.commit().await?;
        tracing::info!(part_id = %part.id, on_hand = part.quantity_on_hand, "Part created");
        Ok(part)
    }

    pub async fn get_part(&self, id: DbId) -> Result<Part, CoreError> {
        let mut uow = self.store.begin().await?;
        uow.parts().get_by_id(id).await
    }

    pub async fn list_parts(&self, filter: PartFilter) -> Result<Vec<Part>, CoreError> {
        let mut uow = self.store.begin().await?;
        uow.parts().list(&filter).await
    }

    /// Fails with `Conflict` once the part has recorded usages.
    pub async fn delete_part(&self, id: DbId) -> Result<(), CoreError> {
        let mut uow = self.store.begin().await?;
        uow.parts().lock(id).await?;
        let usages = uow
            .part_usages()
            .list(&PartUsageFilter {
                part_id: Some(id),
                ..Default::default()
            })
            .await?;
        ensure_unreferenced("Part", id, "usages", usages.len())?;
        uow.parts().delete(id).await?;
        uow.commit().await?;
        tracing::info!(part_id = %id, "Part deleted");
        Ok(())
    }
}
