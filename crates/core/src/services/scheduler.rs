//! Preventive-maintenance scheduling.
//!
//! The periodic [`MaintenanceScheduler::tick`] only flags overdue schedules.
//! Work is recorded when an operator performs maintenance, which consumes
//! parts, rolls the schedule forward, and stamps the asset.

use std::sync::Arc;

use serde::Serialize;
use validator::Validate;

use crate::clock::Clock;
use crate::error::CoreError;
use crate::inventory::PartUsage;
use crate::maintenance::{
    CreateSchedule, MaintenanceRecord, MaintenanceRecordFilter, MaintenanceSchedule,
    MaintenanceScheduleFilter, MaintenanceStatus, MaintenanceType, PerformMaintenance,
};
use crate::store::{Store, UnitOfWork};
use crate::ticket::{Ticket, TicketPriority};
use crate::types::{DbId, Timestamp};

use super::inventory::consume_parts;
use super::{resolve, resolve_active_user};

/// Result of one scheduler tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TickOutcome {
    /// Schedules whose due time has been reached.
    pub due: usize,
    /// Schedules moved from `SCHEDULED` to `OVERDUE` by this tick.
    pub marked_overdue: usize,
}

/// Everything written by one maintenance run.
#[derive(Debug, Clone, Serialize)]
pub struct MaintenancePerformed {
    pub schedule: MaintenanceSchedule,
    pub record: MaintenanceRecord,
    pub usages: Vec<PartUsage>,
}

/// Maintenance schedule operations.
pub struct MaintenanceScheduler {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl MaintenanceScheduler {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Create a schedule. Without `first_due_at` the first run is due one
    /// interval from now.
    pub async fn create_schedule(
        &self,
        input: CreateSchedule,
    ) -> Result<MaintenanceSchedule, CoreError> {
        input.validate()?;
        let now = self.clock.now();
        let next_due_at = match input.first_due_at {
            Some(at) => at,
            None => input.frequency.next_due(now)?,
        };

        let mut uow = self.store.begin().await?;
        let asset = resolve(uow.assets(), input.asset_id, "asset_id").await?;
        let assignee =
            resolve_active_user(uow.as_mut(), input.assigned_to_id, "assigned_to_id").await?;

        let schedule = MaintenanceSchedule {
            id: crate::types::new_id(),
            asset_id: asset.id,
            assigned_to_id: assignee.id,
            frequency: input.frequency,
            last_performed_at: None,
            next_due_at,
            status: MaintenanceStatus::Scheduled,
            notes: input.notes,
            created_at: now,
            updated_at: now,
            version: 0,
        };
        let schedule = uow.schedules().create(schedule).await?;
        refresh_asset_next_due(uow.as_mut(), asset.id, now).await?;
        uow.commit().await?;

        tracing::info!(
            schedule_id = %schedule.id,
            asset_id = %schedule.asset_id,
            frequency = %schedule.frequency,
            next_due_at = %schedule.next_due_at,
            "Maintenance schedule created",
        );
        Ok(schedule)
    }

    /// Flag schedules whose due time has passed.
    ///
    /// Lists schedules with `next_due_at <= now` that are not cancelled and
    /// moves the `SCHEDULED` ones strictly past due to `OVERDUE`. Never
    /// creates records or tickets. All changes commit together; a concurrent
    /// write to any of them fails the tick with `Conflict`.
    pub async fn tick(&self) -> Result<TickOutcome, CoreError> {
        let now = self.clock.now();
        let mut uow = self.store.begin().await?;
        let due = uow
            .schedules()
            .list(&MaintenanceScheduleFilter {
                due_by: Some(now),
                status_not: Some(MaintenanceStatus::Cancelled),
                ..Default::default()
            })
            .await?;

        let mut outcome = TickOutcome {
            due: due.len(),
            marked_overdue: 0,
        };
        for mut schedule in due {
            if schedule.status == MaintenanceStatus::Scheduled && schedule.next_due_at < now {
                schedule.status = MaintenanceStatus::Overdue;
                schedule.updated_at = now;
                let schedule = uow.schedules().update(schedule).await?;
                tracing::debug!(
                    schedule_id = %schedule.id,
                    next_due_at = %schedule.next_due_at,
                    "Schedule overdue",
                );
                outcome.marked_overdue += 1;
            }
        }
        if outcome.marked_overdue > 0 {
            uow.commit().await?;
        }

        tracing::info!(
            due = outcome.due,
            marked_overdue = outcome.marked_overdue,
            "Scheduler tick complete",
        );
        Ok(outcome)
    }

    /// Record a maintenance run for a schedule.
    ///
    /// Creates a completed record, consumes the listed parts (fails with
    /// `Conflict` and changes nothing when any part is short), sets
    /// `last_performed_at = now`, and either recomputes `next_due_at` from the
    /// frequency with status `SCHEDULED` or, for a final run, retires the
    /// schedule as `COMPLETED`.
    pub async fn perform_maintenance(
        &self,
        schedule_id: DbId,
        input: PerformMaintenance,
    ) -> Result<MaintenancePerformed, CoreError> {
        input.validate()?;
        let now = self.clock.now();

        let mut uow = self.store.begin().await?;
        let mut schedule = uow.schedules().get_by_id(schedule_id).await?;
        if !schedule.status.is_active() {
            return Err(CoreError::Conflict(format!(
                "schedule {schedule_id} is {}",
                schedule.status
            )));
        }
        let performer =
            resolve_active_user(uow.as_mut(), input.performed_by_id, "performed_by_id").await?;

        let record = MaintenanceRecord {
            id: crate::types::new_id(),
            asset_id: schedule.asset_id,
            performed_by_id: performer.id,
            schedule_id: Some(schedule.id),
            ticket_id: None,
            maintenance_type: input.maintenance_type.unwrap_or(MaintenanceType::Preventive),
            notes: input.notes,
            performed_at: now,
            completed_at: Some(now),
            created_at: now,
            updated_at: now,
            version: 0,
        };
        let record = uow.records().create(record).await?;
        let usages = consume_parts(uow.as_mut(), &input.parts, Some(record.id), None, now).await?;

        schedule.last_performed_at = Some(now);
        if input.final_run {
            schedule.next_due_at = now;
            schedule.status = MaintenanceStatus::Completed;
        } else {
            schedule.next_due_at = schedule.frequency.next_due(now)?;
            schedule.status = MaintenanceStatus::Scheduled;
        }
        schedule.updated_at = now;
        let schedule = uow.schedules().update(schedule).await?;

        let mut asset = uow.assets().get_by_id(schedule.asset_id).await?;
        asset.last_maintenance_at = Some(now);
        asset.updated_at = now;
        uow.assets().update(asset).await?;
        refresh_asset_next_due(uow.as_mut(), schedule.asset_id, now).await?;

        if let Err(e) = uow.commit().await {
            tracing::warn!(%schedule_id, error = %e, "Maintenance run not committed");
            return Err(e);
        }

        tracing::info!(
            %schedule_id,
            record_id = %record.id,
            parts = usages.len(),
            status = %schedule.status,
            next_due_at = %schedule.next_due_at,
            "Maintenance performed",
        );
        Ok(MaintenancePerformed {
            schedule,
            record,
            usages,
        })
    }

    /// Mark a schedule as being worked on.
    pub async fn start_schedule(&self, id: DbId) -> Result<MaintenanceSchedule, CoreError> {
        self.set_status(id, MaintenanceStatus::InProgress, |from| {
            matches!(from, MaintenanceStatus::Scheduled | MaintenanceStatus::Overdue)
        })
        .await
    }

    /// Retire a schedule permanently.
    pub async fn cancel_schedule(&self, id: DbId) -> Result<MaintenanceSchedule, CoreError> {
        self.set_status(id, MaintenanceStatus::Cancelled, MaintenanceStatus::is_active)
            .await
    }

    async fn set_status(
        &self,
        id: DbId,
        to: MaintenanceStatus,
        allowed_from: impl Fn(MaintenanceStatus) -> bool + Send,
    ) -> Result<MaintenanceSchedule, CoreError> {
        let now = self.clock.now();
        let mut uow = self.store.begin().await?;
        let mut schedule = uow.schedules().get_by_id(id).await?;
        let from = schedule.status;
        if !allowed_from(from) {
            return Err(CoreError::InvalidTransition {
                entity: "MaintenanceSchedule",
                from: from.as_str(),
                to: to.as_str(),
            });
        }
        schedule.status = to;
        schedule.updated_at = now;
        let schedule = uow.schedules().update(schedule).await?;
        refresh_asset_next_due(uow.as_mut(), schedule.asset_id, now).await?;
        uow.commit().await?;

        tracing::info!(schedule_id = %id, %from, %to, "Schedule status changed");
        Ok(schedule)
    }

    /// Close an open maintenance record.
    pub async fn complete_record(&self, id: DbId) -> Result<MaintenanceRecord, CoreError> {
        let now = self.clock.now();
        let mut uow = self.store.begin().await?;
        let mut record = uow.records().get_by_id(id).await?;
        if !record.is_open() {
            return Err(CoreError::Conflict(format!(
                "maintenance record {id} is already completed"
            )));
        }
        record.completed_at = Some(now.max(record.performed_at));
        record.updated_at = now;
        let record = uow.records().update(record).await?;
        uow.commit().await?;

        tracing::info!(record_id = %id, "Maintenance record completed");
        Ok(record)
    }

    /// Raise a ticket for a schedule that is due.
    ///
    /// Operator-triggered; the tick never does this. The ticket is assigned
    /// to the schedule's assignee and is `HIGH` priority when overdue.
    pub async fn raise_ticket(
        &self,
        schedule_id: DbId,
        created_by_id: DbId,
    ) -> Result<Ticket, CoreError> {
        let now = self.clock.now();
        let mut uow = self.store.begin().await?;
        let schedule = uow.schedules().get_by_id(schedule_id).await?;
        if !schedule.status.is_active() {
            return Err(CoreError::Conflict(format!(
                "schedule {schedule_id} is {}",
                schedule.status
            )));
        }
        if !schedule.is_due(now) {
            return Err(CoreError::Validation(format!(
                "schedule {schedule_id} is not due until {}",
                schedule.next_due_at
            )));
        }
        let creator = resolve_active_user(uow.as_mut(), created_by_id, "created_by_id").await?;
        let asset = uow.assets().lock(schedule.asset_id).await?;
        uow.users().lock(schedule.assigned_to_id).await?;

        let priority = if schedule.status == MaintenanceStatus::Overdue {
            TicketPriority::High
        } else {
            TicketPriority::Medium
        };
        let ticket = Ticket::open(
            format!("{} maintenance due: {}", schedule.frequency, asset.name),
            format!(
                "Scheduled maintenance for {} ({}) was due at {}.",
                asset.name, asset.qr_code, schedule.next_due_at
            ),
            priority,
            asset.id,
            creator.id,
            Some(schedule.assigned_to_id),
            now,
        );
        let ticket = uow.tickets().create(ticket).await?;
        uow.commit().await?;

        tracing::info!(
            %schedule_id,
            ticket_id = %ticket.id,
            priority = %ticket.priority,
            "Ticket raised for due maintenance",
        );
        Ok(ticket)
    }

    pub async fn get_schedule(&self, id: DbId) -> Result<MaintenanceSchedule, CoreError> {
        let mut uow = self.store.begin().await?;
        uow.schedules().get_by_id(id).await
    }

    pub async fn list_schedules(
        &self,
        filter: MaintenanceScheduleFilter,
    ) -> Result<Vec<MaintenanceSchedule>, CoreError> {
        let mut uow = self.store.begin().await?;
        uow.schedules().list(&filter).await
    }

    pub async fn get_record(&self, id: DbId) -> Result<MaintenanceRecord, CoreError> {
        let mut uow = self.store.begin().await?;
        uow.records().get_by_id(id).await
    }

    pub async fn list_records(
        &self,
        filter: MaintenanceRecordFilter,
    ) -> Result<Vec<MaintenanceRecord>, CoreError> {
        let mut uow = self.store.begin().await?;
        uow.records().list(&filter).await
    }
}

/// Set an asset's `next_maintenance_at` to the earliest due time among its
/// active schedules.
async fn refresh_asset_next_due(
    uow: &mut dyn UnitOfWork,
    asset_id: DbId,
    now: Timestamp,
) -> Result<(), CoreError> {
    let next = uow
        .schedules()
        .list(&MaintenanceScheduleFilter {
            asset_id: Some(asset_id),
            ..Default::default()
        })
        .await?
        .into_iter()
        .filter(|s| s.status.is_active())
        .map(|s| s.next_due_at)
        .min();

    let mut asset = uow.assets().get_by_id(asset_id).await?;
    if asset.next_maintenance_at != next {
        asset.next_maintenance_at = next;
        asset.updated_at = now;
        uow.assets().update(asset).await?;
    }
    Ok(())
}
