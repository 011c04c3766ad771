//! Integration tests for `PgStore` against a real database.
//!
//! Run with `DATABASE_URL` pointing at a disposable PostgreSQL server and
//! `cargo test -p assetdesk-db -- --ignored`.

use std::sync::Arc;

use assert_matches::assert_matches;
use chrono::TimeZone;
use sqlx::PgPool;

use assetdesk_core::asset::{AssetType, Branch, CreateAsset, CreateBranch};
use assetdesk_core::clock::{Clock, FixedClock};
use assetdesk_core::error::CoreError;
use assetdesk_core::inventory::{CreatePart, PartRequest};
use assetdesk_core::maintenance::{CreateSchedule, MaintenanceFrequency, PerformMaintenance};
use assetdesk_core::services::{MaintenanceScheduler, RegistryService, ReportAggregator, TicketService};
use assetdesk_core::store::Store;
use assetdesk_core::ticket::{CreateTicket, TicketFilter, TicketPriority, TicketStatus, UpdateTicket};
use assetdesk_core::types::new_id;
use assetdesk_core::user::{CreateUser, User, UserRole};
use assetdesk_db::PgStore;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Services {
    store: Arc<PgStore>,
    clock: Arc<FixedClock>,
    registry: RegistryService,
    tickets: TicketService,
    scheduler: MaintenanceScheduler,
    reports: ReportAggregator,
}

fn services(pool: PgPool) -> Services {
    let store = Arc::new(PgStore::new(pool));
    let clock = Arc::new(FixedClock::new(
        chrono::Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
    ));
    Services {
        registry: RegistryService::new(store.clone(), clock.clone()),
        tickets: TicketService::new(store.clone(), clock.clone()),
        scheduler: MaintenanceScheduler::new(store.clone(), clock.clone()),
        reports: ReportAggregator::new(store.clone(), clock.clone()),
        store,
        clock,
    }
}

async fn branch(svc: &Services) -> Branch {
    svc.registry
        .create_branch(CreateBranch {
            name: "Central".to_string(),
            address: Some("1 Main St".to_string()),
        })
        .await
        .unwrap()
}

async fn user(svc: &Services, email: &str, role: UserRole) -> User {
    svc.registry
        .create_user(CreateUser {
            full_name: "Test User".to_string(),
            email: email.to_string(),
            role,
            branch_id: None,
        })
        .await
        .unwrap()
}

fn new_asset(branch: &Branch, qr_code: &str) -> CreateAsset {
    CreateAsset {
        branch_id: branch.id,
        category_id: None,
        name: format!("Asset {qr_code}"),
        asset_type: AssetType::Hvac,
        location: "Roof".to_string(),
        qr_code: qr_code.to_string(),
        model: None,
        purchase_date: None,
        warranty_expires_on: None,
        metadata: None,
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn test_bootstrap(pool: PgPool) {
    assetdesk_db::health_check(&pool).await.unwrap();

    let tables = [
        "branches",
        "users",
        "asset_categories",
        "assets",
        "tickets",
        "ticket_updates",
        "maintenance_schedules",
        "maintenance_records",
        "parts",
        "part_usages",
        "daily_reports",
    ];
    for table in tables {
        let count: (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(&pool)
            .await
            .unwrap_or_else(|e| panic!("{table} query failed: {e}"));
        assert_eq!(count.0, 0, "{table} should start empty");
    }
}

// ---------------------------------------------------------------------------
// Unit of work
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn test_dropped_unit_rolls_back(pool: PgPool) {
    let svc = services(pool);
    let id = new_id();
    let now = chrono::Utc::now();
    {
        let mut uow = svc.store.begin().await.unwrap();
        uow.branches()
            .create(Branch {
                id,
                name: "Temporary".to_string(),
                address: None,
                created_at: now,
                updated_at: now,
                version: 0,
            })
            .await
            .unwrap();
    }
    assert_matches!(
        svc.registry.get_branch(id).await,
        Err(CoreError::NotFound { entity: "Branch", .. })
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn test_stale_version_is_a_conflict(pool: PgPool) {
    let svc = services(pool);
    let created = branch(&svc).await;

    let mut first = svc.store.begin().await.unwrap();
    let mut second = svc.store.begin().await.unwrap();
    let mut a = first.branches().get_by_id(created.id).await.unwrap();
    let mut b = second.branches().get_by_id(created.id).await.unwrap();

    a.name = "North".to_string();
    let saved = first.branches().update(a).await.unwrap();
    assert_eq!(saved.version, 2);
    first.commit().await.unwrap();

    b.name = "South".to_string();
    assert_matches!(second.branches().update(b).await, Err(CoreError::Conflict(_)));
    drop(second);

    assert_eq!(svc.registry.get_branch(created.id).await.unwrap().name, "North");
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn test_concurrent_transitions_admit_exactly_one(pool: PgPool) {
    let svc = services(pool);
    let central = branch(&svc).await;
    let asset = svc.registry.create_asset(new_asset(&central, "QR-5")).await.unwrap();
    let staff = user(&svc, "staff@example.com", UserRole::Staff).await;
    let ticket = svc
        .tickets
        .create_ticket(CreateTicket {
            title: "Door sticks".to_string(),
            description: "Fire door does not latch".to_string(),
            priority: Some(TicketPriority::High),
            asset_id: asset.id,
            created_by_id: staff.id,
            assigned_to_id: None,
        })
        .await
        .unwrap()
        .ticket;

    let mut first = svc.store.begin().await.unwrap();
    let mut second = svc.store.begin().await.unwrap();
    let mut a = first.tickets().get_by_id(ticket.id).await.unwrap();
    let mut b = second.tickets().get_by_id(ticket.id).await.unwrap();
    let now = svc.clock.now();
    a.transition(TicketStatus::InProgress, now).unwrap();
    b.transition(TicketStatus::InProgress, now).unwrap();

    // `first` holds the row lock; `second` passes its version pre-check and
    // then waits in the guarded UPDATE until `first` commits.
    first.tickets().update(a).await.unwrap();
    let racer = tokio::spawn(async move {
        let result = second.tickets().update(b).await;
        drop(second);
        result
    });
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    first.commit().await.unwrap();

    let lost = racer.await.unwrap();
    assert_matches!(lost, Err(CoreError::Conflict(_)));

    let stored = svc.tickets.get_ticket(ticket.id).await.unwrap();
    assert_eq!(stored.ticket.status, TicketStatus::InProgress);
    assert_eq!(stored.ticket.version, ticket.version + 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn test_user_delete_racing_ticket_creation_never_dangles(pool: PgPool) {
    let svc = services(pool);
    let central = branch(&svc).await;
    let asset = svc.registry.create_asset(new_asset(&central, "QR-6")).await.unwrap();
    let staff = user(&svc, "staff@example.com", UserRole::Staff).await;

    let (deleted, created) = tokio::join!(
        svc.registry.delete_user(staff.id),
        svc.tickets.create_ticket(CreateTicket {
            title: "Flickering light".to_string(),
            description: "Corridor B".to_string(),
            priority: None,
            asset_id: asset.id,
            created_by_id: staff.id,
            assigned_to_id: None,
        }),
    );
    assert_ne!(deleted.is_ok(), created.is_ok(), "exactly one side may win");

    let listed = svc.tickets.list_tickets(TicketFilter::default()).await.unwrap();
    match created {
        Ok(details) => {
            assert_eq!(listed.len(), 1);
            assert_eq!(listed[0].ticket.id, details.ticket.id);
            assert!(svc.registry.get_user(staff.id).await.is_ok());
        }
        Err(_) => assert!(listed.is_empty()),
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn test_unique_email_ignores_case(pool: PgPool) {
    let svc = services(pool);
    user(&svc, "dana@example.com", UserRole::Staff).await;
    let err = svc
        .registry
        .create_user(CreateUser {
            full_name: "Other".to_string(),
            email: "DANA@example.com".to_string(),
            role: UserRole::Staff,
            branch_id: None,
        })
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Conflict(_));
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn test_soft_deleted_rows_are_hidden_and_free_unique_keys(pool: PgPool) {
    let svc = services(pool);
    let central = branch(&svc).await;
    let asset = svc.registry.create_asset(new_asset(&central, "QR-1")).await.unwrap();

    svc.registry.delete_asset(asset.id).await.unwrap();
    assert_matches!(
        svc.registry.get_asset(asset.id).await,
        Err(CoreError::NotFound { entity: "Asset", .. })
    );
    assert!(svc.registry.find_asset_by_qr("QR-1").await.unwrap().is_none());

    let again = svc.registry.create_asset(new_asset(&central, "QR-1")).await.unwrap();
    assert_ne!(again.id, asset.id);
}

// ---------------------------------------------------------------------------
// Services end to end
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn test_ticket_lifecycle_persists_history(pool: PgPool) {
    let svc = services(pool);
    let central = branch(&svc).await;
    let asset = svc.registry.create_asset(new_asset(&central, "QR-2")).await.unwrap();
    let staff = user(&svc, "staff@example.com", UserRole::Staff).await;
    let tech = user(&svc, "tech@example.com", UserRole::Technician).await;

    let created = svc
        .tickets
        .create_ticket(CreateTicket {
            title: "No cooling".to_string(),
            description: "Unit blows warm air".to_string(),
            priority: None,
            asset_id: asset.id,
            created_by_id: staff.id,
            assigned_to_id: Some(tech.id),
        })
        .await
        .unwrap();
    assert_eq!(created.ticket.priority, TicketPriority::Medium);

    let id = created.ticket.id;
    for status in [TicketStatus::InProgress, TicketStatus::Resolved, TicketStatus::Closed] {
        svc.clock.advance(chrono::Duration::minutes(30));
        svc.tickets
            .update_ticket(id, UpdateTicket::by(tech.id).with_status(status))
            .await
            .unwrap();
    }

    let details = svc.tickets.get_ticket(id).await.unwrap();
    assert_eq!(details.ticket.status, TicketStatus::Closed);
    assert!(details.ticket.resolved_at.is_some());
    assert!(details.ticket.closed_at.is_some());
    assert_eq!(details.updates.len(), 3);
    assert_eq!(details.updates[0].new_status, Some(TicketStatus::InProgress));

    assert_matches!(
        svc.tickets
            .update_ticket(id, UpdateTicket::by(tech.id).with_status(TicketStatus::Open))
            .await,
        Err(CoreError::InvalidTransition { .. })
    );

    let closed = svc
        .tickets
        .list_tickets(TicketFilter {
            status: Some(TicketStatus::Closed),
            title: Some("cool".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(closed.len(), 1);
    assert_eq!(closed[0].asset.id, asset.id);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore]
async fn test_maintenance_and_report_round_trip(pool: PgPool) {
    let svc = services(pool);
    let central = branch(&svc).await;
    let asset = svc.registry.create_asset(new_asset(&central, "QR-3")).await.unwrap();
    let tech = user(&svc, "tech@example.com", UserRole::Technician).await;
    let filter = svc
        .registry
        .create_part(CreatePart {
            name: "Air filter".to_string(),
            description: None,
            location: Some("Store room".to_string()),
            quantity_on_hand: 4,
            reorder_level: 1,
        })
        .await
        .unwrap();

    let schedule = svc
        .scheduler
        .create_schedule(CreateSchedule {
            asset_id: asset.id,
            assigned_to_id: tech.id,
            frequency: MaintenanceFrequency::Weekly,
            first_due_at: Some(svc.clock.now()),
            notes: None,
        })
        .await
        .unwrap();

    let outcome = svc.scheduler.tick().await.unwrap();
    assert_eq!(outcome.due, 1);

    let performed = svc
        .scheduler
        .perform_maintenance(
            schedule.id,
            PerformMaintenance {
                performed_by_id: tech.id,
                maintenance_type: None,
                notes: Some("Filters swapped".to_string()),
                parts: vec![PartRequest {
                    part_id: filter.id,
                    quantity: 3,
                }],
                final_run: false,
            },
        )
        .await
        .unwrap();
    assert_eq!(
        performed.schedule.next_due_at,
        svc.clock.now() + chrono::Duration::days(7)
    );
    assert_eq!(svc.registry.get_part(filter.id).await.unwrap().quantity_on_hand, 1);

    let report = svc
        .reports
        .generate(svc.clock.now().date_naive())
        .await
        .unwrap();
    assert_eq!(report.maintenance_performed, 1);
    assert_eq!(report.parts_consumed, 3);

    let again = svc
        .reports
        .generate(svc.clock.now().date_naive())
        .await
        .unwrap();
    assert_eq!(again.version, report.version);
}
