//! Tickets, their audit trail, and the status state machine.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::asset::Asset;
use crate::error::CoreError;
use crate::patch::Patch;
use crate::store::{eq_matches, require_text, text_matches, Entity};
use crate::types::{falls_on, DbId, Timestamp};
use crate::user::User;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

string_enum! {
    /// Lifecycle status of a ticket.
    pub enum TicketStatus("ticket status") {
        Open => "OPEN",
        InProgress => "IN_PROGRESS",
        Resolved => "RESOLVED",
        Closed => "CLOSED",
        Cancelled => "CANCELLED",
    }
}

string_enum! {
    pub enum TicketPriority("ticket priority") {
        Low => "LOW",
        Medium => "MEDIUM",
        High => "HIGH",
        Critical => "CRITICAL",
    }
}

impl Default for TicketPriority {
    fn default() -> Self {
        Self::Medium
    }
}

// ---------------------------------------------------------------------------
// State machine
// ---------------------------------------------------------------------------

impl TicketStatus {
    /// Statuses reachable from `self` in one step.
    ///
    /// `Closed` and `Cancelled` are terminal and return an empty slice.
    pub fn valid_transitions(self) -> &'static [TicketStatus] {
        use TicketStatus::*;
        match self {
            Open => &[InProgress, Cancelled],
            // Reopen goes back to Open.
            InProgress => &[Resolved, Cancelled, Open],
            // Reopen goes back to InProgress.
            Resolved => &[Closed, InProgress],
            Closed | Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, to: TicketStatus) -> bool {
        self.valid_transitions().contains(&to)
    }

    pub fn is_terminal(self) -> bool {
        self.valid_transitions().is_empty()
    }

    /// Whether reaching this status stamps `resolved_at`.
    pub fn marks_resolved(self) -> bool {
        matches!(self, Self::Resolved | Self::Closed)
    }
}

/// Validate a ticket status change.
pub fn validate_transition(from: TicketStatus, to: TicketStatus) -> Result<(), CoreError> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(CoreError::InvalidTransition {
            entity: Ticket::NAME,
            from: from.as_str(),
            to: to.as_str(),
        })
    }
}

// ---------------------------------------------------------------------------
// Ticket
// ---------------------------------------------------------------------------

/// A maintenance or repair request raised against an asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: DbId,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub asset_id: DbId,
    pub created_by_id: DbId,
    pub assigned_to_id: Option<DbId>,
    /// Set the first time the ticket reaches `Resolved` or `Closed`; never cleared.
    pub resolved_at: Option<Timestamp>,
    pub closed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: i32,
}

impl Ticket {
    /// A new `Open` ticket. `version` is assigned by the repository.
    pub fn open(
        title: String,
        description: String,
        priority: TicketPriority,
        asset_id: DbId,
        created_by_id: DbId,
        assigned_to_id: Option<DbId>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: crate::types::new_id(),
            title,
            description,
            status: TicketStatus::Open,
            priority,
            asset_id,
            created_by_id,
            assigned_to_id,
            resolved_at: None,
            closed_at: None,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    /// Move to `to`, stamping resolution/closure times on first arrival.
    pub fn transition(&mut self, to: TicketStatus, now: Timestamp) -> Result<(), CoreError> {
        validate_transition(self.status, to)?;
        if to.marks_resolved() && self.resolved_at.is_none() {
            self.resolved_at = Some(now);
        }
        if to == TicketStatus::Closed && self.closed_at.is_none() {
            self.closed_at = Some(now);
        }
        self.status = to;
        Ok(())
    }

    /// Minutes between creation and resolution, if resolved.
    pub fn resolution_minutes(&self) -> Option<f64> {
        self.resolved_at
            .map(|resolved| (resolved - self.created_at).num_seconds() as f64 / 60.0)
    }
}

/// Query parameters for listing tickets.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketFilter {
    pub status: Option<TicketStatus>,
    pub priority: Option<TicketPriority>,
    pub assigned_to_id: Option<DbId>,
    pub created_by_id: Option<DbId>,
    pub asset_id: Option<DbId>,
    /// Substring of the title.
    pub title: Option<String>,
    /// Tickets created, resolved, or closed on this UTC date.
    pub activity_on: Option<NaiveDate>,
}

impl Entity for Ticket {
    const NAME: &'static str = "Ticket";
    type Filter = TicketFilter;

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
        require_text(&self.title, "title")?;
        require_text(&self.description, "description")?;
        if self.status.marks_resolved() && self.resolved_at.is_none() {
            return Err(CoreError::Validation(format!(
                "{} ticket must have resolved_at",
                self.status
            )));
        }
        if self.status == TicketStatus::Closed && self.closed_at.is_none() {
            return Err(CoreError::Validation(
                "CLOSED ticket must have closed_at".to_string(),
            ));
        }
        Ok(())
    }

    fn matches(&self, filter: &TicketFilter) -> bool {
        eq_matches(&self.status, &filter.status)
            && eq_matches(&self.priority, &filter.priority)
            && filter
                .assigned_to_id
                .map_or(true, |a| self.assigned_to_id == Some(a))
            && eq_matches(&self.created_by_id, &filter.created_by_id)
            && eq_matches(&self.asset_id, &filter.asset_id)
            && text_matches(&self.title, &filter.title)
            && filter.activity_on.map_or(true, |date| {
                falls_on(self.created_at, date)
                    || self.resolved_at.is_some_and(|t| falls_on(t, date))
                    || self.closed_at.is_some_and(|t| falls_on(t, date))
            })
    }
}

// ---------------------------------------------------------------------------
// TicketUpdate (audit trail and comments)
// ---------------------------------------------------------------------------

/// One entry of a ticket's history: a status change, a comment, or both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketUpdate {
    pub id: DbId,
    pub ticket_id: DbId,
    /// The acting user.
    pub user_id: DbId,
    pub comment: Option<String>,
    pub old_status: Option<TicketStatus>,
    pub new_status: Option<TicketStatus>,
    pub photo_url: Option<String>,
    pub created_at: Timestamp,
    pub version: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketUpdateFilter {
    pub ticket_id: Option<DbId>,
    pub user_id: Option<DbId>,
}

impl Entity for TicketUpdate {
    const NAME: &'static str = "TicketUpdate";
    type Filter = TicketUpdateFilter;

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
        match (self.old_status, self.new_status) {
            (Some(from), Some(to)) => validate_transition(from, to),
            (None, None) => Ok(()),
            _ => Err(CoreError::Validation(
                "old_status and new_status must be recorded together".to_string(),
            )),
        }
    }

    fn matches(&self, filter: &TicketUpdateFilter) -> bool {
        eq_matches(&self.ticket_id, &filter.ticket_id) && eq_matches(&self.user_id, &filter.user_id)
    }
}

// ---------------------------------------------------------------------------
// DTOs
// ---------------------------------------------------------------------------

/// DTO for raising a ticket.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTicket {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1))]
    pub description: String,
    /// Defaults to `MEDIUM`.
    pub priority: Option<TicketPriority>,
    pub asset_id: DbId,
    pub created_by_id: DbId,
    pub assigned_to_id: Option<DbId>,
}

/// Partial update of a ticket.
///
/// `assigned_to_id: null` unassigns; required fields reject `null`.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateTicket {
    /// The user performing the change, recorded in the audit row.
    pub actor_id: DbId,
    #[serde(default)]
    pub title: Patch<String>,
    #[serde(default)]
    pub description: Patch<String>,
    #[serde(default)]
    pub status: Patch<TicketStatus>,
    #[serde(default)]
    pub priority: Patch<TicketPriority>,
    #[serde(default)]
    pub assigned_to_id: Patch<DbId>,
    /// Optional note stored with the audit row.
    pub comment: Option<String>,
    pub photo_url: Option<String>,
}

impl UpdateTicket {
    /// An empty patch attributed to `actor_id`.
    pub fn by(actor_id: DbId) -> Self {
        Self {
            actor_id,
            title: Patch::Absent,
            description: Patch::Absent,
            status: Patch::Absent,
            priority: Patch::Absent,
            assigned_to_id: Patch::Absent,
            comment: None,
            photo_url: None,
        }
    }

    pub fn with_status(mut self, status: TicketStatus) -> Self {
        self.status = Patch::Value(status);
        self
    }

    /// Nothing to change and nothing to record.
    pub fn is_empty(&self) -> bool {
        self.title.is_absent()
            && self.description.is_absent()
            && self.status.is_absent()
            && self.priority.is_absent()
            && self.assigned_to_id.is_absent()
            && self.comment.is_none()
            && self.photo_url.is_none()
    }
}

/// DTO for commenting on a ticket without changing it.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateComment {
    pub user_id: DbId,
    #[validate(length(min = 1, max = 10_000))]
    pub comment: String,
    pub photo_url: Option<String>,
}

// ---------------------------------------------------------------------------
// Read models
// ---------------------------------------------------------------------------

/// A ticket with its directly referenced rows, for list views.
#[derive(Debug, Clone, Serialize)]
pub struct TicketSummary {
    pub ticket: Ticket,
    pub asset: Asset,
    pub created_by: User,
    pub assigned_to: Option<User>,
}

/// A fully loaded ticket including its history.
#[derive(Debug, Clone, Serialize)]
pub struct TicketDetails {
    pub ticket: Ticket,
    pub asset: Asset,
    pub created_by: User,
    pub assigned_to: Option<User>,
    pub updates: Vec<TicketUpdate>,
}
