//! Daily report generation.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::clock::Clock;
use crate::error::CoreError;
use crate::inventory::PartUsageFilter;
use crate::maintenance::MaintenanceRecordFilter;
use crate::report::{summarize, DailyReport, DailyReportFilter};
use crate::store::Store;
use crate::ticket::TicketFilter;

/// Rolls up one day of ticket, maintenance and parts activity.
pub struct ReportAggregator {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl ReportAggregator {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Compute and upsert the report for `date`.
    ///
    /// Re-running for the same date overwrites the figures in place. When
    /// nothing changed the stored row is returned untouched.
    pub async fn generate(&self, date: NaiveDate) -> Result<DailyReport, CoreError> {
        let now = self.clock.now();
        let mut uow = self.store.begin().await?;

        let tickets = uow
            .tickets()
            .list(&TicketFilter {
                activity_on: Some(date),
                ..Default::default()
            })
            .await?;
        let records = uow
            .records()
            .list(&MaintenanceRecordFilter {
                performed_on: Some(date),
                ..Default::default()
            })
            .await?;
        let usages = uow
            .part_usages()
            .list(&PartUsageFilter {
                used_on: Some(date),
                ..Default::default()
            })
            .await?;
        let figures = summarize(date, &tickets, &records, &usages);

        let existing = uow
            .daily_reports()
            .list(&DailyReportFilter {
                report_date: Some(date),
                ..Default::default()
            })
            .await?
            .into_iter()
            .next();

        let report = match existing {
            Some(mut report) => {
                if !report.apply(figures, now) {
                    tracing::debug!(%date, "Daily report unchanged");
                    return Ok(report);
                }
                uow.daily_reports().update(report).await?
            }
            None => uow.daily_reports().create(DailyReport::new(date, figures, now)).await?,
        };
        uow.commit().await?;

        tracing::info!(
            %date,
            tickets_created = report.tickets_created,
            tickets_resolved = report.tickets_resolved,
            tickets_closed = report.tickets_closed,
            maintenance_performed = report.maintenance_performed,
            parts_consumed = report.parts_consumed,
            "Daily report generated",
        );
        Ok(report)
    }

    /// Generate the report for the UTC day before now.
    pub async fn generate_for_yesterday(&self) -> Result<DailyReport, CoreError> {
        let today = self.clock.now().date_naive();
        let yesterday = today
            .pred_opt()
            .ok_or_else(|| CoreError::Validation(format!("no day before {today}")))?;
        self.generate(yesterday).await
    }

    /// The stored report for `date`, if one has been generated.
    pub async fn get_report(&self, date: NaiveDate) -> Result<Option<DailyReport>, CoreError> {
        let mut uow = self.store.begin().await?;
        let reports = uow
            .daily_reports()
            .list(&DailyReportFilter {
                report_date: Some(date),
                ..Default::default()
            })
            .await?;
        Ok(reports.into_iter().next())
    }

    /// Reports between `from` and `to` inclusive, oldest first.
    pub async fn list_reports(
        &self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<DailyReport>, CoreError> {
        if let (Some(from), Some(to)) = (from, to) {
            if from > to {
                return Err(CoreError::Validation(format!(
                    "invalid range: {from} is after {to}"
                )));
            }
        }
        let mut uow = self.store.begin().await?;
        let mut reports = uow
            .daily_reports()
            .list(&DailyReportFilter {
                report_date: None,
                from,
                to,
            })
            .await?;
        reports.sort_by_key(|r| r.report_date);
        Ok(reports)
    }
}
