//! Persistence contract consumed by the services.
//!
//! Every logical operation opens one [`UnitOfWork`] through [`Store::begin`],
//! performs its reads and writes through the per-entity [`Repository`]
//! accessors, and commits once. Dropping a unit of work without committing
//! discards everything it wrote.
//!
//! Rows that a unit references from a new or changed row are taken with
//! [`Repository::lock`], and so are rows it deletes after checking for
//! references. A unit that deletes a row and a concurrent unit that locked
//! it cannot both commit.

use async_trait::async_trait;

use crate::asset::{Asset, AssetCategory, Branch};
use crate::error::CoreError;
use crate::inventory::{Part, PartUsage};
use crate::maintenance::{MaintenanceRecord, MaintenanceSchedule};
use crate::report::DailyReport;
use crate::ticket::{Ticket, TicketUpdate};
use crate::types::DbId;
use crate::user::User;

/// A persisted record type.
pub trait Entity: Clone + Send + Sync + 'static {
    /// Human-readable entity name for errors and logs.
    const NAME: &'static str;

    /// Filter accepted by [`Repository::list`]. All fields optional, AND-combined.
    type Filter: Send + Sync;

    fn id(&self) -> DbId;

    /// Optimistic concurrency token. Repositories bump it on every write.
    fn version(&self) -> i32;

    fn set_version(&mut self, version: i32);

    /// Check required fields and per-row invariants.
    fn validate(&self) -> Result<(), CoreError> {
        Ok(())
    }

    /// `(constraint, normalized value)` pairs that must be unique among live rows.
    fn unique_keys(&self) -> Vec<(&'static str, String)> {
        Vec::new()
    }

    /// Reject a whole-record replace that changes immutable fields.
    fn check_replace(&self, _current: &Self) -> Result<(), CoreError> {
        Ok(())
    }

    /// In-process evaluation of [`Entity::Filter`].
    fn matches(&self, filter: &Self::Filter) -> bool;
}

/// Data access for one entity type.
#[async_trait]
pub trait Repository<E: Entity>: Send {
    /// Insert a new row.
    ///
    /// Fails with `Validation` when required fields are missing and `Conflict`
    /// when a unique constraint is violated. The stored row starts at version 1.
    async fn create(&mut self, entity: E) -> Result<E, CoreError>;

    /// Fetch a live row. Soft-deleted rows are `NotFound`.
    async fn get_by_id(&mut self, id: DbId) -> Result<E, CoreError>;

    /// Fetch a live row and hold it until the unit of work ends.
    ///
    /// Used for rows a unit is about to reference or delete. A concurrent
    /// unit that deletes a locked row cannot also commit, so a reference
    /// never ends up pointing at a deleted row.
    async fn lock(&mut self, id: DbId) -> Result<E, CoreError>;

    /// List live rows matching `filter`, in insertion order.
    async fn list(&mut self, filter: &E::Filter) -> Result<Vec<E>, CoreError>;

    /// Replace a whole row.
    ///
    /// `entity.version()` must equal the stored version, otherwise the write
    /// fails with `Conflict`. The returned row carries the bumped version.
    async fn update(&mut self, entity: E) -> Result<E, CoreError>;

    /// Soft-delete a row.
    async fn delete(&mut self, id: DbId) -> Result<(), CoreError>;
}

/// One transaction spanning every repository.
#[async_trait]
pub trait UnitOfWork: Send {
    fn branches(&mut self) -> &mut dyn Repository<Branch>;
    fn users(&mut self) -> &mut dyn Repository<User>;
    fn categories(&mut self) -> &mut dyn Repository<AssetCategory>;
    fn assets(&mut self) -> &mut dyn Repository<Asset>;
    fn tickets(&mut self) -> &mut dyn Repository<Ticket>;
    fn ticket_updates(&mut self) -> &mut dyn Repository<TicketUpdate>;
    fn schedules(&mut self) -> &mut dyn Repository<MaintenanceSchedule>;
    fn records(&mut self) -> &mut dyn Repository<MaintenanceRecord>;
    fn parts(&mut self) -> &mut dyn Repository<Part>;
    fn part_usages(&mut self) -> &mut dyn Repository<PartUsage>;
    fn daily_reports(&mut self) -> &mut dyn Repository<DailyReport>;

    /// Make every write of this unit visible atomically.
    ///
    /// Fails with `Conflict` when a concurrent unit committed a competing
    /// write first; in that case nothing from this unit is applied.
    async fn commit(self: Box<Self>) -> Result<(), CoreError>;
}

/// The persistence collaborator.
#[async_trait]
pub trait Store: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn UnitOfWork>, CoreError>;
}

/// Require a non-blank string field.
pub(crate) fn require_text(value: &str, field: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Check an optional text filter against a value.
pub(crate) fn text_matches(value: &str, filter: &Option<String>) -> bool {
    filter
        .as_deref()
        .map_or(true, |needle| crate::types::contains_ci(value, needle))
}

/// Check an optional equality filter against a value.
pub(crate) fn eq_matches<T: PartialEq>(value: &T, filter: &Option<T>) -> bool {
    filter.as_ref().map_or(true, |wanted| wanted == value)
}
