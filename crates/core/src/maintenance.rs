//! Preventive-maintenance schedules and the records of work performed.

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::inventory::PartRequest;
use crate::store::{eq_matches, Entity};
use crate::types::{falls_on, DbId, Timestamp};

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

string_enum! {
    /// How often a schedule recurs.
    pub enum MaintenanceFrequency("maintenance frequency") {
        Daily => "DAILY",
        Weekly => "WEEKLY",
        Monthly => "MONTHLY",
        Quarterly => "QUARTERLY",
        Biannual => "BIANNUAL",
        Annual => "ANNUAL",
    }
}

string_enum! {
    pub enum MaintenanceStatus("maintenance status") {
        Scheduled => "SCHEDULED",
        InProgress => "IN_PROGRESS",
        Completed => "COMPLETED",
        Cancelled => "CANCELLED",
        Overdue => "OVERDUE",
    }
}

string_enum! {
    pub enum MaintenanceType("maintenance type") {
        Preventive => "PREVENTIVE",
        Corrective => "CORRECTIVE",
        Predictive => "PREDICTIVE",
        ConditionBased => "CONDITION_BASED",
    }
}

impl MaintenanceFrequency {
    /// The next due time after work performed at `performed_at`.
    ///
    /// Month-based frequencies use calendar months and clamp to the end of
    /// shorter months (Jan 31 + 1 month = Feb 28/29).
    pub fn next_due(self, performed_at: Timestamp) -> Result<Timestamp, CoreError> {
        let next = match self {
            Self::Daily => performed_at.checked_add_signed(chrono::Duration::days(1)),
            Self::Weekly => performed_at.checked_add_signed(chrono::Duration::days(7)),
            Self::Monthly => performed_at.checked_add_months(Months::new(1)),
            Self::Quarterly => performed_at.checked_add_months(Months::new(3)),
            Self::Biannual => performed_at.checked_add_months(Months::new(6)),
            Self::Annual => performed_at.checked_add_months(Months::new(12)),
        };
        next.ok_or_else(|| {
            CoreError::Validation(format!(
                "{self} interval after {performed_at} is out of range"
            ))
        })
    }
}

impl MaintenanceStatus {
    /// Whether maintenance can still be performed against the schedule.
    pub fn is_active(self) -> bool {
        !matches!(self, Self::Cancelled | Self::Completed)
    }
}

// ---------------------------------------------------------------------------
// MaintenanceSchedule
// ---------------------------------------------------------------------------

/// A recurring maintenance plan for one asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceSchedule {
    pub id: DbId,
    pub asset_id: DbId,
    pub assigned_to_id: DbId,
    pub frequency: MaintenanceFrequency,
    pub last_performed_at: Option<Timestamp>,
    pub next_due_at: Timestamp,
    pub status: MaintenanceStatus,
    pub notes: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: i32,
}

impl MaintenanceSchedule {
    /// Whether the schedule is due at `now`.
    pub fn is_due(&self, now: Timestamp) -> bool {
        self.next_due_at <= now
    }
}

/// Query parameters for listing schedules.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MaintenanceScheduleFilter {
    pub asset_id: Option<DbId>,
    pub assigned_to_id: Option<DbId>,
    pub status: Option<MaintenanceStatus>,
    /// Exclude schedules in this status.
    pub status_not: Option<MaintenanceStatus>,
    /// Only schedules with `next_due_at <= due_by`.
    pub due_by: Option<Timestamp>,
}

impl Entity for MaintenanceSchedule {
    const NAME: &'static str = "MaintenanceSchedule";
    type Filter = MaintenanceScheduleFilter;

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
        if let Some(last) = self.last_performed_at {
            if self.next_due_at < last {
                return Err(CoreError::Validation(
                    "next_due_at must not precede last_performed_at".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn matches(&self, filter: &MaintenanceScheduleFilter) -> bool {
        eq_matches(&self.asset_id, &filter.asset_id)
            && eq_matches(&self.assigned_to_id, &filter.assigned_to_id)
            && eq_matches(&self.status, &filter.status)
            && filter.status_not.map_or(true, |s| self.status != s)
            && filter.due_by.map_or(true, |due| self.next_due_at <= due)
    }
}

// ---------------------------------------------------------------------------
// MaintenanceRecord
// ---------------------------------------------------------------------------

/// Work performed on an asset, either for a schedule or against a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceRecord {
    pub id: DbId,
    pub asset_id: DbId,
    pub performed_by_id: DbId,
    pub schedule_id: Option<DbId>,
    pub ticket_id: Option<DbId>,
    pub maintenance_type: MaintenanceType,
    pub notes: Option<String>,
    pub performed_at: Timestamp,
    /// `None` while the work is still open.
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: i32,
}

impl MaintenanceRecord {
    pub fn is_open(&self) -> bool {
        self.completed_at.is_none()
    }
}

/// Query parameters for listing maintenance records.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MaintenanceRecordFilter {
    pub asset_id: Option<DbId>,
    pub performed_by_id: Option<DbId>,
    pub schedule_id: Option<DbId>,
    pub ticket_id: Option<DbId>,
    /// `Some(true)` for open work only, `Some(false)` for completed only.
    pub open: Option<bool>,
    /// Performed on this UTC date.
    pub performed_on: Option<NaiveDate>,
}

impl Entity for MaintenanceRecord {
    const NAME: &'static str = "MaintenanceRecord";
    type Filter = MaintenanceRecordFilter;

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
        if let Some(completed) = self.completed_at {
            if completed < self.performed_at {
                return Err(CoreError::Validation(
                    "completed_at must not precede performed_at".to_string(),
                ));
            }
        }
        Ok(())
    }

    fn matches(&self, filter: &MaintenanceRecordFilter) -> bool {
        eq_matches(&self.asset_id, &filter.asset_id)
            && eq_matches(&self.performed_by_id, &filter.performed_by_id)
            && filter.schedule_id.map_or(true, |s| self.schedule_id == Some(s))
            && filter.ticket_id.map_or(true, |t| self.ticket_id == Some(t))
            && filter.open.map_or(true, |open| self.is_open() == open)
            && filter
                .performed_on
                .map_or(true, |date| falls_on(self.performed_at, date))
    }
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// DTO for creating a schedule.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSchedule {
    pub asset_id: DbId,
    pub assigned_to_id: DbId,
    pub frequency: MaintenanceFrequency,
    /// First due time. Defaults to one interval from now.
    pub first_due_at: Option<Timestamp>,
    #[validate(length(max = 2_000))]
    pub notes: Option<String>,
}

/// DTO for performing scheduled maintenance.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PerformMaintenance {
    pub performed_by_id: DbId,
    /// Defaults to `PREVENTIVE`.
    pub maintenance_type: Option<MaintenanceType>,
    #[validate(length(max = 10_000))]
    pub notes: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub parts: Vec<PartRequest>,
    /// Retire the schedule after this run instead of recomputing the due date.
    #[serde(default)]
    pub final_run: bool,
}

/// DTO for logging corrective work against a ticket.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LogWork {
    pub performed_by_id: DbId,
    #[validate(length(max = 10_000))]
    pub notes: Option<String>,
    /// Defaults to now; must not be in the future.
    pub performed_at: Option<Timestamp>,
    #[serde(default)]
    #[validate(nested)]
    pub parts: Vec<PartRequest>,
    /// Close the record immediately instead of leaving the work open.
    #[serde(default)]
    pub completed: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, m: u32, d: u32) -> Timestamp {
        chrono::Utc.with_ymd_and_hms(y, m, d, 9, 30, 0).unwrap()
    }

    #[test]
    fn weekly_adds_seven_days() {
        let performed = at(2026, 3, 2);
        assert_eq!(
            MaintenanceFrequency::Weekly.next_due(performed).unwrap(),
            at(2026, 3, 9)
        );
    }

    #[test]
    fn daily_adds_one_day() {
        assert_eq!(
            MaintenanceFrequency::Daily.next_due(at(2026, 12, 31)).unwrap(),
            at(2027, 1, 1)
        );
    }

    #[test]
    fn monthly_clamps_to_month_end() {
        assert_eq!(
            MaintenanceFrequency::Monthly.next_due(at(2026, 1, 31)).unwrap(),
            at(2026, 2, 28)
        );
    }

    #[test]
    fn quarterly_biannual_and_annual_use_calendar_months() {
        let performed = at(2026, 5, 15);
        assert_eq!(MaintenanceFrequency::Quarterly.next_due(performed).unwrap(), at(2026, 8, 15));
        assert_eq!(MaintenanceFrequency::Biannual.next_due(performed).unwrap(), at(2026, 11, 15));
        assert_eq!(MaintenanceFrequency::Annual.next_due(performed).unwrap(), at(2027, 5, 15));
    }

    #[test]
    fn next_due_before_last_performed_is_invalid() {
        let now = at(2026, 3, 2);
        let schedule = MaintenanceSchedule {
            id: crate::types::new_id(),
            asset_id: crate::types::new_id(),
            assigned_to_id: crate::types::new_id(),
            frequency: MaintenanceFrequency::Weekly,
            last_performed_at: Some(now),
            next_due_at: now - chrono::Duration::days(1),
            status: MaintenanceStatus::Scheduled,
            notes: None,
            created_at: now,
            updated_at: now,
            version: 1,
        };
        assert!(schedule.validate().is_err());
    }

    #[test]
    fn cancelled_and_completed_are_inactive() {
        assert!(MaintenanceStatus::Scheduled.is_active());
        assert!(MaintenanceStatus::Overdue.is_active());
        assert!(!MaintenanceStatus::Cancelled.is_active());
        assert!(!MaintenanceStatus::Completed.is_active());
    }

    #[test]
    fn due_filter_includes_boundary() {
        let now = at(2026, 3, 2);
        let schedule = MaintenanceSchedule {
            id: crate::types::new_id(),
            asset_id: crate::types::new_id(),
            assigned_to_id: crate::types::new_id(),
            frequency: MaintenanceFrequency::Daily,
            last_performed_at: None,
            next_due_at: now,
            status: MaintenanceStatus::Scheduled,
            notes: None,
            created_at: now,
            updated_at: now,
            version: 1,
        };
        let due_now = MaintenanceScheduleFilter {
            due_by: Some(now),
            status_not: Some(MaintenanceStatus::Cancelled),
            ..Default::default()
        };
        assert!(schedule.matches(&due_now));
        assert!(schedule.is_due(now));
        assert!(!schedule.is_due(now - chrono::Duration::seconds(1)));
    }
}
