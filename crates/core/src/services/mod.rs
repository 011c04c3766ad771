//! Operations invoked by the API layer and the worker.
//!
//! Every service holds an `Arc<dyn Store>` and an `Arc<dyn Clock>` and nothing
//! else. Each public method runs in exactly one unit of work and commits at
//! most once, so an error or a dropped future leaves no partial state.

pub mod inventory;
pub mod registry;
pub mod reporting;
pub mod scheduler;
pub mod tickets;

pub use inventory::InventoryService;
pub use registry::RegistryService;
pub use reporting::ReportAggregator;
pub use scheduler::MaintenanceScheduler;
pub use tickets::TicketService;

use crate::error::CoreError;
use crate::store::{Entity, Repository, UnitOfWork};
use crate::ticket::Ticket;
use crate::types::DbId;
use crate::user::User;

/// Lock a row referenced by an input field.
///
/// A missing row is the caller's mistake, so `NotFound` becomes `Validation`.
/// The lock keeps a concurrent delete of the row from committing alongside
/// the reference.
pub(crate) async fn resolve<E: Entity>(
    repo: &mut dyn Repository<E>,
    id: DbId,
    field: &str,
) -> Result<E, CoreError> {
    repo.lock(id)
        .await
        .map_err(|e| e.into_reference_error(field))
}

/// Load a referenced user and require that the account is active.
pub(crate) async fn resolve_active_user(
    uow: &mut dyn UnitOfWork,
    id: DbId,
    field: &str,
) -> Result<User, CoreError> {
    let user = resolve(uow.users(), id, field).await?;
    if !user.active {
        return Err(CoreError::Validation(format!(
            "{field} references inactive user {id}"
        )));
    }
    Ok(user)
}

/// Reject work against a ticket that can no longer change.
pub(crate) fn ensure_workable(ticket: &Ticket) -> Result<(), CoreError> {
    if ticket.status.is_terminal() {
        return Err(CoreError::Conflict(format!(
            "ticket {} is {}",
            ticket.id, ticket.status
        )));
    }
    Ok(())
}

/// Fail with `Conflict` when `count` live rows still reference the target.
pub(crate) fn ensure_unreferenced(
    entity: &'static str,
    id: DbId,
    referrer: &str,
    count: usize,
) -> Result<(), CoreError> {
    if count > 0 {
        tracing::warn!(entity, %id, referrer, count, "Delete blocked by live references");
        return Err(CoreError::Conflict(format!(
            "{entity} {id} is still referenced by {count} {referrer}"
        )));
    }
    Ok(())
}
