//! Ticket lifecycle: creation, partial updates with status transitions,
//! comments, deletion, and corrective work logged against a ticket.

use std::collections::HashMap;
use std::sync::Arc;

use validator::Validate;

use crate::asset::Asset;
use crate::clock::Clock;
use crate::error::CoreError;
use crate::maintenance::{LogWork, MaintenanceRecord, MaintenanceRecordFilter, MaintenanceType};
use crate::patch::Patch;
use crate::store::{Store, UnitOfWork};
use crate::ticket::{
    CreateComment, CreateTicket, Ticket, TicketDetails, TicketFilter, TicketSummary, TicketUpdate,
    TicketUpdateFilter, UpdateTicket,
};
use crate::types::DbId;
use crate::user::User;

use super::inventory::consume_parts;
use super::{ensure_workable, resolve, resolve_active_user};

/// Ticket operations.
pub struct TicketService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl TicketService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Raise a new ticket in `OPEN` status.
    ///
    /// The asset, creator and (optional) assignee must exist; the creator and
    /// assignee must be active. Priority defaults to `MEDIUM`.
    pub async fn create_ticket(&self, input: CreateTicket) -> Result<TicketDetails, CoreError> {
        input.validate()?;

        let mut uow = self.store.begin().await?;
        let asset = resolve(uow.assets(), input.asset_id, "asset_id").await?;
        let created_by = resolve_active_user(uow.as_mut(), input.created_by_id, "created_by_id").await?;
        let assigned_to = match input.assigned_to_id {
            Some(id) => Some(resolve_active_user(uow.as_mut(), id, "assigned_to_id").await?),
            None => None,
        };

        let ticket = Ticket::open(
            input.title.trim().to_string(),
            input.description,
            input.priority.unwrap_or_default(),
            asset.id,
            created_by.id,
            assigned_to.as_ref().map(|u| u.id),
            self.clock.now(),
        );
        let ticket = uow.tickets().create(ticket).await?;
        uow.commit().await?;

        tracing::info!(
            ticket_id = %ticket.id,
            asset_id = %ticket.asset_id,
            priority = %ticket.priority,
            "Ticket created",
        );

        Ok(TicketDetails {
            ticket,
            asset,
            created_by,
            assigned_to,
            updates: Vec::new(),
        })
    }

    /// Apply a partial update.
    ///
    /// Absent fields are untouched and an explicit null clears the assignee.
    /// A status change must follow the transition table. An audit row with the
    /// acting user and the old/new status is written in the same unit as the
    /// ticket itself. An empty patch writes nothing.
    pub async fn update_ticket(
        &self,
        id: DbId,
        patch: UpdateTicket,
    ) -> Result<TicketDetails, CoreError> {
        let mut uow = self.store.begin().await?;
        let mut ticket = uow.tickets().get_by_id(id).await?;
        let actor = resolve(uow.users(), patch.actor_id, "actor_id").await?;
        if patch.is_empty() {
            tracing::debug!(ticket_id = %id, actor_id = %actor.id, "Empty ticket patch ignored");
            return load_details(uow.as_mut(), ticket).await;
        }
        let now = self.clock.now();

        patch.title.apply_required(&mut ticket.title, "title")?;
        patch
            .description
            .apply_required(&mut ticket.description, "description")?;
        patch.priority.apply_required(&mut ticket.priority, "priority")?;
        if let Patch::Value(assignee) = &patch.assigned_to_id {
            resolve_active_user(uow.as_mut(), *assignee, "assigned_to_id").await?;
        }
        patch.assigned_to_id.apply_optional(&mut ticket.assigned_to_id);

        let from = ticket.status;
        let status_change = match patch.status {
            Patch::Absent => None,
            Patch::Null => {
                return Err(CoreError::Validation("status cannot be cleared".to_string()));
            }
            Patch::Value(to) if to == from => None,
            Patch::Value(to) => {
                if let Err(e) = ticket.transition(to, now) {
                    tracing::warn!(ticket_id = %id, %from, %to, "Ticket transition rejected");
                    return Err(e);
                }
                Some((from, to))
            }
        };
        ticket.updated_at = now;

        let audit = TicketUpdate {
            id: crate::types::new_id(),
            ticket_id: ticket.id,
            user_id: actor.id,
            comment: patch.comment,
            old_status: status_change.map(|(from, _)| from),
            new_status: status_change.map(|(_, to)| to),
            photo_url: patch.photo_url,
            created_at: now,
            version: 0,
        };
        uow.ticket_updates().create(audit).await?;
        let ticket = uow.tickets().update(ticket).await?;
        let details = load_details(uow.as_mut(), ticket).await?;

        if let Err(e) = uow.commit().await {
            tracing::warn!(ticket_id = %id, error = %e, "Ticket update not committed");
            return Err(e);
        }

        match status_change {
            Some((from, to)) => {
                tracing::info!(ticket_id = %id, %from, %to, actor_id = %actor.id, "Ticket status changed")
            }
            None => tracing::info!(ticket_id = %id, actor_id = %actor.id, "Ticket updated"),
        }
        Ok(details)
    }

    /// Add a comment without changing the ticket.
    pub async fn comment_on_ticket(
        &self,
        id: DbId,
        input: CreateComment,
    ) -> Result<TicketUpdate, CoreError> {
        input.validate()?;

        let mut uow = self.store.begin().await?;
        let ticket = uow.tickets().lock(id).await?;
        let user = resolve(uow.users(), input.user_id, "user_id").await?;
        let comment = TicketUpdate {
            id: crate::types::new_id(),
            ticket_id: ticket.id,
            user_id: user.id,
            comment: Some(input.comment),
            old_status: None,
            new_status: None,
            photo_url: input.photo_url,
            created_at: self.clock.now(),
            version: 0,
        };
        let comment = uow.ticket_updates().create(comment).await?;
        uow.commit().await?;

        tracing::debug!(ticket_id = %id, update_id = %comment.id, "Ticket comment added");
        Ok(comment)
    }

    /// Soft-delete a ticket. Open maintenance work linked to it blocks deletion.
    pub async fn delete_ticket(&self, id: DbId) -> Result<(), CoreError> {
        let mut uow = self.store.begin().await?;
        let ticket = uow.tickets().lock(id).await?;
        let open_work = uow
            .records()
            .list(&MaintenanceRecordFilter {
                ticket_id: Some(ticket.id),
                open: Some(true),
                ..Default::default()
            })
            .await?;
        if !open_work.is_empty() {
            tracing::warn!(ticket_id = %id, open = open_work.len(), "Ticket delete blocked by open work");
            return Err(CoreError::Conflict(format!(
                "ticket {id} has {} open maintenance record(s)",
                open_work.len()
            )));
        }
        uow.tickets().delete(id).await?;
        uow.commit().await?;

        tracing::info!(ticket_id = %id, "Ticket deleted");
        Ok(())
    }

    /// A ticket with its asset, people and history.
    pub async fn get_ticket(&self, id: DbId) -> Result<TicketDetails, CoreError> {
        let mut uow = self.store.begin().await?;
        let ticket = uow.tickets().get_by_id(id).await?;
        load_details(uow.as_mut(), ticket).await
    }

    /// Tickets matching `filter`, each with its asset and people.
    pub async fn list_tickets(&self, filter: TicketFilter) -> Result<Vec<TicketSummary>, CoreError> {
        let mut uow = self.store.begin().await?;
        let tickets = uow.tickets().list(&filter).await?;

        let mut assets: HashMap<DbId, Asset> = HashMap::new();
        let mut users: HashMap<DbId, User> = HashMap::new();
        let mut summaries = Vec::with_capacity(tickets.len());
        for ticket in tickets {
            let asset = cached_asset(uow.as_mut(), &mut assets, ticket.asset_id).await?;
            let created_by = cached_user(uow.as_mut(), &mut users, ticket.created_by_id).await?;
            let assigned_to = match ticket.assigned_to_id {
                Some(id) => Some(cached_user(uow.as_mut(), &mut users, id).await?),
                None => None,
            };
            summaries.push(TicketSummary {
                ticket,
                asset,
                created_by,
                assigned_to,
            });
        }
        Ok(summaries)
    }

    /// Log corrective work against a ticket.
    ///
    /// Creates a `CORRECTIVE` maintenance record linked to the ticket and its
    /// asset, consumes the listed parts, and stamps the asset's last
    /// maintenance time. Without `completed` the record stays open, which
    /// blocks deleting the ticket until the work is completed.
    pub async fn log_work(
        &self,
        ticket_id: DbId,
        input: LogWork,
    ) -> Result<MaintenanceRecord, CoreError> {
        input.validate()?;
        let now = self.clock.now();
        let performed_at = input.performed_at.unwrap_or(now);
        if performed_at > now {
            return Err(CoreError::Validation(
                "performed_at must not be in the future".to_string(),
            ));
        }

        let mut uow = self.store.begin().await?;
        let ticket = uow.tickets().lock(ticket_id).await?;
        ensure_workable(&ticket)?;
        let performer =
            resolve_active_user(uow.as_mut(), input.performed_by_id, "performed_by_id").await?;

        let record = MaintenanceRecord {
            id: crate::types::new_id(),
            asset_id: ticket.asset_id,
            performed_by_id: performer.id,
            schedule_id: None,
            ticket_id: Some(ticket.id),
            maintenance_type: MaintenanceType::Corrective,
            notes: input.notes,
            performed_at,
            completed_at: input.completed.then_some(now),
            created_at: now,
            updated_at: now,
            version: 0,
        };
        let record = uow.records().create(record).await?;
        consume_parts(uow.as_mut(), &input.parts, Some(record.id), Some(ticket.id), now).await?;

        let mut asset = uow.assets().get_by_id(ticket.asset_id).await?;
        if asset.last_maintenance_at.map_or(true, |last| last < performed_at) {
            asset.last_maintenance_at = Some(performed_at);
            asset.updated_at = now;
            uow.assets().update(asset).await?;
        }
        uow.commit().await?;

        tracing::info!(
            %ticket_id,
            record_id = %record.id,
            open = record.is_open(),
            "Work logged against ticket",
        );
        Ok(record)
    }
}

async fn cached_asset(
    uow: &mut dyn UnitOfWork,
    cache: &mut HashMap<DbId, Asset>,
    id: DbId,
) -> Result<Asset, CoreError> {
    if let Some(hit) = cache.get(&id) {
        return Ok(hit.clone());
    }
    let asset = uow.assets().get_by_id(id).await?;
    cache.insert(id, asset.clone());
    Ok(asset)
}

async fn cached_user(
    uow: &mut dyn UnitOfWork,
    cache: &mut HashMap<DbId, User>,
    id: DbId,
) -> Result<User, CoreError> {
    if let Some(hit) = cache.get(&id) {
        return Ok(hit.clone());
    }
    let user = uow.users().get_by_id(id).await?;
    cache.insert(id, user.clone());
    Ok(user)
}

/// Load the rows a ticket references plus its history.
async fn load_details(uow: &mut dyn UnitOfWork, ticket: Ticket) -> Result<TicketDetails, CoreError> {
    let asset = uow.assets().get_by_id(ticket.asset_id).await?;
    let created_by = uow.users().get_by_id(ticket.created_by_id).await?;
    let assigned_to = match ticket.assigned_to_id {
        Some(id) => Some(uow.users().get_by_id(id).await?),
        None => None,
    };
    let updates = uow
        .ticket_updates()
        .list(&TicketUpdateFilter {
            ticket_id: Some(ticket.id),
            ..Default::default()
        })
        .await?;
    Ok(TicketDetails {
        ticket,
        asset,
        created_by,
        assigned_to,
        updates,
    })
}
