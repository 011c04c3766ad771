//! Maintenance schedules: tick, perform, parts consumption, and status moves.

mod common;

use assert_matches::assert_matches;

use assetdesk_core::error::CoreError;
use assetdesk_core::inventory::{PartRequest, PartUsageFilter};
use assetdesk_core::maintenance::{
    CreateSchedule, MaintenanceFrequency, MaintenanceRecordFilter, MaintenanceScheduleFilter,
    MaintenanceStatus, MaintenanceType, PerformMaintenance,
};
use assetdesk_core::ticket::{TicketPriority, TicketStatus};
use assetdesk_core::user::UserRole;

use common::Fixture;

fn perform(by: uuid::Uuid, parts: Vec<PartRequest>) -> PerformMaintenance {
    PerformMaintenance {
        performed_by_id: by,
        maintenance_type: None,
        notes: Some("Routine check".to_string()),
        parts,
        final_run: false,
    }
}

fn weekly(asset_id: uuid::Uuid, tech_id: uuid::Uuid) -> CreateSchedule {
    CreateSchedule {
        asset_id,
        assigned_to_id: tech_id,
        frequency: MaintenanceFrequency::Weekly,
        first_due_at: None,
        notes: None,
    }
}

#[tokio::test]
async fn new_schedule_is_due_one_interval_out() {
    let fx = Fixture::new();
    let branch = fx.branch("Central").await;
    let asset = fx.asset(&branch, "QR-200").await;
    let tech = fx.user("tech@example.com", UserRole::Technician).await;

    let schedule = fx.scheduler.create_schedule(weekly(asset.id, tech.id)).await.unwrap();
    assert_eq!(schedule.status, MaintenanceStatus::Scheduled);
    assert_eq!(schedule.next_due_at, fx.clock_now() + chrono::Duration::days(7));
    assert_eq!(schedule.last_performed_at, None);

    let asset = fx.registry.get_asset(asset.id).await.unwrap();
    assert_eq!(asset.next_maintenance_at, Some(schedule.next_due_at));
}

#[tokio::test]
async fn tick_marks_only_past_due_scheduled_as_overdue() {
    let fx = Fixture::new();
    let branch = fx.branch("Central").await;
    let asset = fx.asset(&branch, "QR-201").await;
    let tech = fx.user("tech@example.com", UserRole::Technician).await;
    let now = fx.clock_now();

    let mut past = weekly(asset.id, tech.id);
    past.first_due_at = Some(now - chrono::Duration::hours(1));
    let past = fx.scheduler.create_schedule(past).await.unwrap();

    let mut exactly_now = weekly(asset.id, tech.id);
    exactly_now.first_due_at = Some(now);
    let exactly_now = fx.scheduler.create_schedule(exactly_now).await.unwrap();

    let future = fx.scheduler.create_schedule(weekly(asset.id, tech.id)).await.unwrap();

    let mut cancelled = weekly(asset.id, tech.id);
    cancelled.first_due_at = Some(now - chrono::Duration::days(3));
    let cancelled = fx.scheduler.create_schedule(cancelled).await.unwrap();
    fx.scheduler.cancel_schedule(cancelled.id).await.unwrap();

    let outcome = fx.scheduler.tick().await.unwrap();
    assert_eq!(outcome.due, 2);
    assert_eq!(outcome.marked_overdue, 1);

    let scheduler = &fx.scheduler;
    let status = |id| async move { scheduler.get_schedule(id).await.unwrap().status };
    assert_eq!(status(past.id).await, MaintenanceStatus::Overdue);
    assert_eq!(status(exactly_now.id).await, MaintenanceStatus::Scheduled);
    assert_eq!(status(future.id).await, MaintenanceStatus::Scheduled);
    assert_eq!(status(cancelled.id).await, MaintenanceStatus::Cancelled);

    let again = fx.scheduler.tick().await.unwrap();
    assert_eq!(again.marked_overdue, 0);

    let records = fx
        .scheduler
        .list_records(MaintenanceRecordFilter::default())
        .await
        .unwrap();
    assert!(records.is_empty(), "tick never records work");
}

#[tokio::test]
async fn performing_weekly_maintenance_rolls_forward_seven_days() {
    let fx = Fixture::new();
    let branch = fx.branch("Central").await;
    let asset = fx.asset(&branch, "QR-202").await;
    let tech = fx.user("tech@example.com", UserRole::Technician).await;
    let filter = fx.part("Air filter", 5).await;

    let mut input = weekly(asset.id, tech.id);
    input.first_due_at = Some(fx.clock_now() - chrono::Duration::days(10));
    let schedule = fx.scheduler.create_schedule(input).await.unwrap();
    fx.scheduler.tick().await.unwrap();

    fx.advance(chrono::Duration::hours(3));
    let done = fx
        .scheduler
        .perform_maintenance(
            schedule.id,
            perform(
                tech.id,
                vec![PartRequest {
                    part_id: filter.id,
                    quantity: 2,
                }],
            ),
        )
        .await
        .unwrap();

    let day = fx.clock_now();
    assert_eq!(done.schedule.last_performed_at, Some(day));
    assert_eq!(done.schedule.next_due_at, day + chrono::Duration::days(7));
    assert_eq!(done.schedule.status, MaintenanceStatus::Scheduled);
    assert_eq!(done.record.maintenance_type, MaintenanceType::Preventive);
    assert_eq!(done.record.schedule_id, Some(schedule.id));
    assert!(!done.record.is_open());
    assert_eq!(done.usages.len(), 1);
    assert_eq!(done.usages[0].maintenance_record_id, Some(done.record.id));

    assert_eq!(fx.registry.get_part(filter.id).await.unwrap().quantity_on_hand, 3);
    let asset = fx.registry.get_asset(asset.id).await.unwrap();
    assert_eq!(asset.last_maintenance_at, Some(day));
    assert_eq!(asset.next_maintenance_at, Some(day + chrono::Duration::days(7)));
}

#[tokio::test]
async fn insufficient_parts_conflict_and_change_nothing() {
    let fx = Fixture::new();
    let branch = fx.branch("Central").await;
    let asset = fx.asset(&branch, "QR-203").await;
    let tech = fx.user("tech@example.com", UserRole::Technician).await;
    let gasket = fx.part("Gasket", 3).await;
    let seal = fx.part("Seal", 1).await;
    let schedule = fx.scheduler.create_schedule(weekly(asset.id, tech.id)).await.unwrap();

    let err = fx
        .scheduler
        .perform_maintenance(
            schedule.id,
            perform(
                tech.id,
                vec![
                    PartRequest {
                        part_id: gasket.id,
                        quantity: 2,
                    },
                    PartRequest {
                        part_id: seal.id,
                        quantity: 2,
                    },
                ],
            ),
        )
        .await
        .unwrap_err();
    assert_matches!(err, CoreError::Conflict(_));

    assert_eq!(fx.registry.get_part(gasket.id).await.unwrap().quantity_on_hand, 3);
    assert_eq!(fx.registry.get_part(seal.id).await.unwrap().quantity_on_hand, 1);
    let untouched = fx.scheduler.get_schedule(schedule.id).await.unwrap();
    assert_eq!(untouched, schedule);
    let records = fx
        .scheduler
        .list_records(MaintenanceRecordFilter::default())
        .await
        .unwrap();
    assert!(records.is_empty());
    let usages = fx
        .inventory
        .list_usages(PartUsageFilter::default())
        .await
        .unwrap();
    assert!(usages.is_empty());
}

#[tokio::test]
async fn repeated_requests_for_one_part_are_cumulative() {
    let fx = Fixture::new();
    let branch = fx.branch("Central").await;
    let asset = fx.asset(&branch, "QR-204").await;
    let tech = fx.user("tech@example.com", UserRole::Technician).await;
    let bolt = fx.part("Bolt M8", 3).await;
    let schedule = fx.scheduler.create_schedule(weekly(asset.id, tech.id)).await.unwrap();

    let twice = vec![
        PartRequest {
            part_id: bolt.id,
            quantity: 2,
        },
        PartRequest {
            part_id: bolt.id,
            quantity: 2,
        },
    ];
    assert_matches!(
        fx.scheduler
            .perform_maintenance(schedule.id, perform(tech.id, twice))
            .await,
        Err(CoreError::Conflict(_))
    );
    assert_eq!(fx.registry.get_part(bolt.id).await.unwrap().quantity_on_hand, 3);
}

#[tokio::test]
async fn start_cancel_and_final_run() {
    let fx = Fixture::new();
    let branch = fx.branch("Central").await;
    let asset = fx.asset(&branch, "QR-205").await;
    let tech = fx.user("tech@example.com", UserRole::Technician).await;

    let schedule = fx.scheduler.create_schedule(weekly(asset.id, tech.id)).await.unwrap();
    let started = fx.scheduler.start_schedule(schedule.id).await.unwrap();
    assert_eq!(started.status, MaintenanceStatus::InProgress);
    assert_matches!(
        fx.scheduler.start_schedule(schedule.id).await,
        Err(CoreError::InvalidTransition { from: "IN_PROGRESS", to: "IN_PROGRESS", .. })
    );

    let mut last = perform(tech.id, Vec::new());
    last.final_run = true;
    let done = fx.scheduler.perform_maintenance(schedule.id, last).await.unwrap();
    assert_eq!(done.schedule.status, MaintenanceStatus::Completed);
    assert_matches!(
        fx.scheduler
            .perform_maintenance(schedule.id, perform(tech.id, Vec::new()))
            .await,
        Err(CoreError::Conflict(_))
    );
    assert_matches!(
        fx.scheduler.cancel_schedule(schedule.id).await,
        Err(CoreError::InvalidTransition { from: "COMPLETED", .. })
    );

    let asset = fx.registry.get_asset(asset.id).await.unwrap();
    assert_eq!(asset.next_maintenance_at, None);

    let active = fx
        .scheduler
        .list_schedules(MaintenanceScheduleFilter {
            asset_id: Some(asset.id),
            status_not: Some(MaintenanceStatus::Completed),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(active.is_empty());
}

#[tokio::test]
async fn raise_ticket_for_overdue_schedule() {
    let fx = Fixture::new();
    let branch = fx.branch("Central").await;
    let asset = fx.asset(&branch, "QR-206").await;
    let tech = fx.user("tech@example.com", UserRole::Technician).await;
    let manager = fx.user("manager@example.com", UserRole::Manager).await;

    let not_due = fx.scheduler.create_schedule(weekly(asset.id, tech.id)).await.unwrap();
    assert_matches!(
        fx.scheduler.raise_ticket(not_due.id, manager.id).await,
        Err(CoreError::Validation(_))
    );

    let mut input = weekly(asset.id, tech.id);
    input.first_due_at = Some(fx.clock_now() - chrono::Duration::days(1));
    let overdue = fx.scheduler.create_schedule(input).await.unwrap();
    fx.scheduler.tick().await.unwrap();

    let ticket = fx.scheduler.raise_ticket(overdue.id, manager.id).await.unwrap();
    assert_eq!(ticket.status, TicketStatus::Open);
    assert_eq!(ticket.priority, TicketPriority::High);
    assert_eq!(ticket.assigned_to_id, Some(tech.id));
    assert_eq!(ticket.asset_id, asset.id);
    assert!(ticket.title.contains("WEEKLY"));
}

#[tokio::test]
async fn monthly_schedule_clamps_to_month_end() {
    let fx = Fixture::new();
    let branch = fx.branch("Central").await;
    let asset = fx.asset(&branch, "QR-207").await;
    let tech = fx.user("tech@example.com", UserRole::Technician).await;

    let jan_31 = chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 1, 31, 10, 0, 0).unwrap();
    fx.clock.set(jan_31);
    let schedule = fx
        .scheduler
        .create_schedule(CreateSchedule {
            asset_id: asset.id,
            assigned_to_id: tech.id,
            frequency: MaintenanceFrequency::Monthly,
            first_due_at: Some(jan_31),
            notes: None,
        })
        .await
        .unwrap();
    let done = fx
        .scheduler
        .perform_maintenance(schedule.id, perform(tech.id, Vec::new()))
        .await
        .unwrap();
    assert_eq!(
        done.schedule.next_due_at,
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2026, 2, 28, 10, 0, 0).unwrap()
    );
}
