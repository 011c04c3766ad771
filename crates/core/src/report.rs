//! Daily operational report rows and the pure roll-up that fills them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::error::CoreError;
use crate::inventory::PartUsage;
use crate::maintenance::{MaintenanceRecord, MaintenanceType};
use crate::store::Entity;
use crate::ticket::{Ticket, TicketPriority};
use crate::types::{falls_on, DbId, Timestamp};

/// One row per calendar date, written only by the report aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub id: DbId,
    pub report_date: NaiveDate,
    pub tickets_created: i32,
    pub tickets_resolved: i32,
    pub tickets_closed: i32,
    pub maintenance_performed: i32,
    pub parts_consumed: i32,
    /// `None` when no ticket was resolved that day.
    pub avg_resolution_minutes: Option<f64>,
    pub summary: Value,
    pub generated_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: i32,
}

impl DailyReport {
    /// Overwrite the figures. Returns `false` when they were already equal.
    pub fn apply(&mut self, figures: ReportFigures, now: Timestamp) -> bool {
        if self.figures() == figures {
            return false;
        }
        self.tickets_created = figures.tickets_created;
        self.tickets_resolved = figures.tickets_resolved;
        self.tickets_closed = figures.tickets_closed;
        self.maintenance_performed = figures.maintenance_performed;
        self.parts_consumed = figures.parts_consumed;
        self.avg_resolution_minutes = figures.avg_resolution_minutes;
        self.summary = figures.summary;
        self.generated_at = now;
        self.updated_at = now;
        true
    }

    /// The computed part of the row.
    pub fn figures(&self) -> ReportFigures {
        ReportFigures {
            tickets_created: self.tickets_created,
            tickets_resolved: self.tickets_resolved,
            tickets_closed: self.tickets_closed,
            maintenance_performed: self.maintenance_performed,
            parts_consumed: self.parts_consumed,
            avg_resolution_minutes: self.avg_resolution_minutes,
            summary: self.summary.clone(),
        }
    }

    /// A fresh row for `date`. `version` is assigned by the repository.
    pub fn new(date: NaiveDate, figures: ReportFigures, now: Timestamp) -> Self {
        Self {
            id: crate::types::new_id(),
            report_date: date,
            tickets_created: figures.tickets_created,
            tickets_resolved: figures.tickets_resolved,
            tickets_closed: figures.tickets_closed,
            maintenance_performed: figures.maintenance_performed,
            parts_consumed: figures.parts_consumed,
            avg_resolution_minutes: figures.avg_resolution_minutes,
            summary: figures.summary,
            generated_at: now,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DailyReportFilter {
    pub report_date: Option<NaiveDate>,
    /// Inclusive lower bound.
    pub from: Option<NaiveDate>,
    /// Inclusive upper bound.
    pub to: Option<NaiveDate>,
}

impl Entity for DailyReport {
    const NAME: &'static str = "DailyReport";
    type Filter = DailyReportFilter;

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
        let counts = [
            self.tickets_created,
            self.tickets_resolved,
            self.tickets_closed,
            self.maintenance_performed,
            self.parts_consumed,
        ];
        if counts.iter().any(|c| *c < 0) {
            return Err(CoreError::Validation(
                "report counts must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        vec![("uq_daily_reports_date", self.report_date.to_string())]
    }

    fn check_replace(&self, current: &Self) -> Result<(), CoreError> {
        if self.report_date != current.report_date {
            return Err(CoreError::Validation(format!(
                "report_date of report {} is immutable",
                self.id
            )));
        }
        Ok(())
    }

    fn matches(&self, filter: &DailyReportFilter) -> bool {
        filter.report_date.map_or(true, |d| self.report_date == d)
            && filter.from.map_or(true, |d| self.report_date >= d)
            && filter.to.map_or(true, |d| self.report_date <= d)
    }
}

/// Figures computed for one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportFigures {
    pub tickets_created: i32,
    pub tickets_resolved: i32,
    pub tickets_closed: i32,
    pub maintenance_performed: i32,
    pub parts_consumed: i32,
    pub avg_resolution_minutes: Option<f64>,
    pub summary: Value,
}

/// Roll up one day of activity.
///
/// `tickets`, `records` and `usages` may contain rows from other dates; only
/// those whose timestamps fall on `date` are counted.
pub fn summarize(
    date: NaiveDate,
    tickets: &[Ticket],
    records: &[MaintenanceRecord],
    usages: &[PartUsage],
) -> ReportFigures {
    let created: Vec<&Ticket> = tickets
        .iter()
        .filter(|t| falls_on(t.created_at, date))
        .collect();
    let resolved: Vec<&Ticket> = tickets
        .iter()
        .filter(|t| t.resolved_at.is_some_and(|at| falls_on(at, date)))
        .collect();
    let closed = tickets
        .iter()
        .filter(|t| t.closed_at.is_some_and(|at| falls_on(at, date)))
        .count();
    let performed: Vec<&MaintenanceRecord> = records
        .iter()
        .filter(|r| falls_on(r.performed_at, date))
        .collect();
    let parts_consumed: i64 = usages
        .iter()
        .filter(|u| falls_on(u.created_at, date))
        .map(|u| i64::from(u.quantity))
        .sum();

    let minutes: Vec<f64> = resolved.iter().filter_map(|t| t.resolution_minutes()).collect();
    let avg_resolution_minutes = if minutes.is_empty() {
        None
    } else {
        let avg = minutes.iter().sum::<f64>() / minutes.len() as f64;
        Some((avg * 100.0).round() / 100.0)
    };

    let mut by_priority = Map::new();
    for priority in TicketPriority::ALL {
        let n = created.iter().filter(|t| t.priority == *priority).count();
        by_priority.insert(priority.as_str().to_string(), json!(n));
    }
    let mut by_type = Map::new();
    for kind in MaintenanceType::ALL {
        let n = performed.iter().filter(|r| r.maintenance_type == *kind).count();
        by_type.insert(kind.as_str().to_string(), json!(n));
    }

    ReportFigures {
        tickets_created: saturating_i32(created.len() as i64),
        tickets_resolved: saturating_i32(resolved.len() as i64),
        tickets_closed: saturating_i32(closed as i64),
        maintenance_performed: saturating_i32(performed.len() as i64),
        parts_consumed: saturating_i32(parts_consumed),
        avg_resolution_minutes,
        summary: json!({
            "tickets_created_by_priority": by_priority,
            "records_by_type": by_type,
        }),
    }
}

fn saturating_i32(n: i64) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::TicketStatus;
    use chrono::TimeZone;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, 10).unwrap()
    }

    fn at(day: u32, hour: u32, minute: u32) -> Timestamp {
        chrono::Utc.with_ymd_and_hms(2026, 6, day, hour, minute, 0).unwrap()
    }

    fn ticket(priority: TicketPriority, created: Timestamp) -> Ticket {
        Ticket::open(
            "Leak".into(),
            "Water under sink".into(),
            priority,
            crate::types::new_id(),
            crate::types::new_id(),
            None,
            created,
        )
    }

    fn resolve(mut t: Ticket, at: Timestamp) -> Ticket {
        t.transition(TicketStatus::InProgress, at).unwrap();
        t.transition(TicketStatus::Resolved, at).unwrap();
        t
    }

    #[test]
    fn empty_day_has_no_average() {
        let figures = summarize(date(), &[], &[], &[]);
        assert_eq!(figures.tickets_created, 0);
        assert_eq!(figures.avg_resolution_minutes, None);
        assert_eq!(figures.summary["tickets_created_by_priority"]["HIGH"], json!(0));
    }

    #[test]
    fn counts_only_activity_on_the_date() {
        let tickets = vec![
            ticket(TicketPriority::High, at(10, 8, 0)),
            ticket(TicketPriority::Low, at(10, 9, 0)),
            ticket(TicketPriority::High, at(9, 9, 0)),
            resolve(ticket(TicketPriority::Medium, at(9, 12, 0)), at(10, 12, 0)),
        ];
        let figures = summarize(date(), &tickets, &[], &[]);
        assert_eq!(figures.tickets_created, 2);
        assert_eq!(figures.tickets_resolved, 1);
        assert_eq!(figures.tickets_closed, 0);
        assert_eq!(figures.summary["tickets_created_by_priority"]["HIGH"], json!(1));
        assert_eq!(figures.summary["tickets_created_by_priority"]["LOW"], json!(1));
    }

    #[test]
    fn average_resolution_is_over_tickets_resolved_that_day() {
        let tickets = vec![
            resolve(ticket(TicketPriority::Medium, at(10, 8, 0)), at(10, 9, 0)),
            resolve(ticket(TicketPriority::Medium, at(10, 8, 0)), at(10, 11, 0)),
            resolve(ticket(TicketPriority::Medium, at(8, 8, 0)), at(9, 8, 0)),
        ];
        let figures = summarize(date(), &tickets, &[], &[]);
        assert_eq!(figures.tickets_resolved, 2);
        assert_eq!(figures.avg_resolution_minutes, Some(120.0));
    }

    #[test]
    fn apply_reports_whether_anything_changed() {
        let now = at(11, 0, 5);
        let figures = summarize(date(), &[], &[], &[]);
        let mut report = DailyReport::new(date(), figures.clone(), now);
        assert!(!report.apply(figures, at(11, 1, 0)));
        assert_eq!(report.generated_at, now);

        let busier = summarize(
            date(),
            &[ticket(TicketPriority::Critical, at(10, 3, 0))],
            &[],
            &[],
        );
        assert!(report.apply(busier, at(11, 1, 0)));
        assert_eq!(report.tickets_created, 1);
        assert_eq!(report.generated_at, at(11, 1, 0));
    }

    #[test]
    fn range_filter_is_inclusive() {
        let report = DailyReport::new(date(), summarize(date(), &[], &[], &[]), at(11, 0, 0));
        let filter = DailyReportFilter {
            from: Some(date()),
            to: Some(date()),
            ..Default::default()
        };
        assert!(report.matches(&filter));
    }
}
