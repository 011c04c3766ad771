//! Stock movements: restocking, consumption, and low-stock queries.

use std::sync::Arc;

use validator::Validate;

use crate::clock::Clock;
use crate::error::CoreError;
use crate::inventory::{Part, PartFilter, PartRequest, PartUsage, PartUsageFilter};
use crate::store::{Store, UnitOfWork};
use crate::types::{DbId, Timestamp};

use super::{ensure_workable, resolve};

/// Decrement stock for each request and record the usages.
///
/// Runs inside the caller's unit of work. Requests for the same part are
/// applied cumulatively. The first request that exceeds the quantity on hand
/// fails the whole operation with `Conflict`.
pub(crate) async fn consume_parts(
    uow: &mut dyn UnitOfWork,
    requests: &[PartRequest],
    maintenance_record_id: Option<DbId>,
    ticket_id: Option<DbId>,
    now: Timestamp,
) -> Result<Vec<PartUsage>, CoreError> {
    let mut usages = Vec::with_capacity(requests.len());
    for request in requests {
        let mut part = resolve(uow.parts(), request.part_id, "part_id").await?;
        if let Err(e) = part.consume(request.quantity) {
            tracing::warn!(
                part_id = %part.id,
                requested = request.quantity,
                on_hand = part.quantity_on_hand,
                "Part consumption rejected",
            );
            return Err(e);
        }
        part.updated_at = now;
        let part = uow.parts().update(part).await?;
        if part.is_low_stock() {
            tracing::info!(
                part_id = %part.id,
                on_hand = part.quantity_on_hand,
                reorder_level = part.reorder_level,
                "Part at or below reorder level",
            );
        }

        let usage = PartUsage {
            id: crate::types::new_id(),
            part_id: part.id,
            maintenance_record_id,
            ticket_id,
            quantity: request.quantity,
            created_at: now,
            version: 0,
        };
        usages.push(uow.part_usages().create(usage).await?);
    }
    Ok(usages)
}

/// Parts inventory operations.
pub struct InventoryService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl InventoryService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Add `quantity` units to a part's stock.
    pub async fn restock(&self, part_id: DbId, quantity: i32) -> Result<Part, CoreError> {
        let mut uow = self.store.begin().await?;
        let mut part = uow.parts().get_by_id(part_id).await?;
        let now = self.clock.now();
        part.restock(quantity, now)?;
        part.updated_at = now;
        let part = uow.parts().update(part).await?;
        uow.commit().await?;

        tracing::info!(
            part_id = %part.id,
            quantity,
            on_hand = part.quantity_on_hand,
            "Part restocked",
        );
        Ok(part)
    }

    /// Parts whose stock is at or below their reorder level.
    pub async fn low_stock(&self) -> Result<Vec<Part>, CoreError> {
        let mut uow = self.store.begin().await?;
        uow.parts()
            .list(&PartFilter {
                low_stock: Some(true),
                ..Default::default()
            })
            .await
    }

    /// Consume parts directly against a ticket, outside any maintenance record.
    pub async fn consume_for_ticket(
        &self,
        ticket_id: DbId,
        parts: Vec<PartRequest>,
    ) -> Result<Vec<PartUsage>, CoreError> {
        if parts.is_empty() {
            return Err(CoreError::Validation("no parts requested".to_string()));
        }
        for request in &parts {
            request.validate()?;
        }

        let mut uow = self.store.begin().await?;
        let ticket = uow.tickets().lock(ticket_id).await?;
        ensure_workable(&ticket)?;
        let now = self.clock.now();
        let usages = consume_parts(uow.as_mut(), &parts, None, Some(ticket.id), now).await?;
        uow.commit().await?;

        tracing::info!(%ticket_id, usages = usages.len(), "Parts consumed for ticket");
        Ok(usages)
    }

    pub async fn list_usages(&self, filter: PartUsageFilter) -> Result<Vec<PartUsage>, CoreError> {
        let mut uow = self.store.begin().await?;
        uow.part_usages().list(&filter).await
    }
}
