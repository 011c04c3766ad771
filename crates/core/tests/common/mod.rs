#![allow(dead_code)]

use std::sync::Arc;

use chrono::TimeZone;

use assetdesk_core::asset::{Asset, AssetType, Branch, CreateAsset, CreateBranch};
use assetdesk_core::clock::{Clock, FixedClock};
use assetdesk_core::error::CoreError;
use assetdesk_core::inventory::{CreatePart, Part};
use assetdesk_core::memory::MemoryStore;
use assetdesk_core::services::{
    InventoryService, MaintenanceScheduler, RegistryService, ReportAggregator, TicketService,
};
use assetdesk_core::store::{Store, UnitOfWork};
use assetdesk_core::ticket::{CreateTicket, Ticket, TicketPriority};
use assetdesk_core::types::Timestamp;
use assetdesk_core::user::{CreateUser, User, UserRole};

/// 2026-03-02 09:00 UTC, a Monday.
pub fn start_time() -> Timestamp {
    chrono::Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

/// Services wired to one in-memory store and one fixed clock.
pub struct Fixture {
    pub store: MemoryStore,
    pub clock: Arc<FixedClock>,
    pub tickets: TicketService,
    pub scheduler: MaintenanceScheduler,
    pub reports: ReportAggregator,
    pub registry: RegistryService,
    pub inventory: InventoryService,
}

impl Fixture {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let clock = Arc::new(FixedClock::new(start_time()));
        let shared: Arc<MemoryStore> = Arc::new(store.clone());
        Self {
            tickets: TicketService::new(shared.clone(), clock.clone()),
            scheduler: MaintenanceScheduler::new(shared.clone(), clock.clone()),
            reports: ReportAggregator::new(shared.clone(), clock.clone()),
            registry: RegistryService::new(shared.clone(), clock.clone()),
            inventory: InventoryService::new(shared, clock.clone()),
            store,
            clock,
        }
    }

    pub fn clock_now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn advance(&self, delta: chrono::Duration) {
        self.clock.advance(delta);
    }

    pub async fn branch(&self, name: &str) -> Branch {
        self.registry
            .create_branch(CreateBranch {
                name: name.to_string(),
                address: None,
            })
            .await
            .unwrap()
    }

    pub async fn user(&self, email: &str, role: UserRole) -> User {
        self.registry
            .create_user(CreateUser {
                full_name: "Test User".to_string(),
                email: email.to_string(),
                role,
                branch_id: None,
            })
            .await
            .unwrap()
    }

    pub async fn asset(&self, branch: &Branch, qr_code: &str) -> Asset {
        self.registry
            .create_asset(CreateAsset {
                branch_id: branch.id,
                category_id: None,
                name: format!("Asset {qr_code}"),
                asset_type: AssetType::Equipment,
                location: "Plant room".to_string(),
                qr_code: qr_code.to_string(),
                model: None,
                purchase_date: None,
                warranty_expires_on: None,
                metadata: None,
            })
            .await
            .unwrap()
    }

    pub async fn part(&self, name: &str, on_hand: i32) -> Part {
        self.registry
            .create_part(CreatePart {
                name: name.to_string(),
                description: None,
                location: None,
                quantity_on_hand: on_hand,
                reorder_level: 1,
            })
            .await
            .unwrap()
    }

    pub async fn ticket(&self, asset: &Asset, creator: &User, priority: TicketPriority) -> Ticket {
        self.tickets
            .create_ticket(new_ticket(asset, creator, Some(priority)))
            .await
            .unwrap()
            .ticket
    }
}

pub fn new_ticket(asset: &Asset, creator: &User, priority: Option<TicketPriority>) -> CreateTicket {
    CreateTicket {
        title: "Compressor rattling".to_string(),
        description: "Loud rattle from unit on startup".to_string(),
        priority,
        asset_id: asset.id,
        created_by_id: creator.id,
        assigned_to_id: None,
    }
}

/// A store whose units of work yield once after taking their snapshot, so
/// that futures joined on one task interleave the way concurrent requests do.
pub struct InterleavingStore(pub MemoryStore);

#[async_trait::async_trait]
impl Store for InterleavingStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, CoreError> {
        let uow = self.0.begin().await?;
        tokio::task::yield_now().await;
        Ok(uow)
    }
}

/// A store whose units of work stall after taking their snapshot.
pub struct SlowStore(pub MemoryStore, pub std::time::Duration);

#[async_trait::async_trait]
impl Store for SlowStore {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, CoreError> {
        let uow = self.0.begin().await?;
        tokio::time::sleep(self.1).await;
        Ok(uow)
    }
}
