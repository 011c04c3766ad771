//! Spare parts and their consumption.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::CoreError;
use crate::store::{eq_matches, require_text, text_matches, Entity};
use crate::types::{falls_on, DbId, Timestamp};

/// A stocked spare part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Part {
    pub id: DbId,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub quantity_on_hand: i32,
    /// Stock at or below this level counts as low.
    pub reorder_level: i32,
    pub last_restocked_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub version: i32,
}

impl Part {
    /// Take `quantity` units out of stock.
    ///
    /// Leaves the part untouched and fails with `Conflict` when fewer than
    /// `quantity` units are on hand.
    pub fn consume(&mut self, quantity: i32) -> Result<(), CoreError> {
        if quantity <= 0 {
            return Err(CoreError::Validation(format!(
                "quantity must be positive, got {quantity}"
            )));
        }
        if quantity > self.quantity_on_hand {
            return Err(CoreError::Conflict(format!(
                "insufficient stock for part {}: requested {quantity}, on hand {}",
                self.id, self.quantity_on_hand
            )));
        }
        self.quantity_on_hand -= quantity;
        Ok(())
    }

    /// Put `quantity` units into stock.
    pub fn restock(&mut self, quantity: i32, now: Timestamp) -> Result<(), CoreError> {
        if quantity <= 0 {
            return Err(CoreError::Validation(format!(
                "quantity must be positive, got {quantity}"
            )));
        }
        self.quantity_on_hand = self
            .quantity_on_hand
            .checked_add(quantity)
            .ok_or_else(|| CoreError::Validation("quantity on hand overflows".to_string()))?;
        self.last_restocked_at = Some(now);
        Ok(())
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity_on_hand <= self.reorder_level
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartFilter {
    pub name: Option<String>,
    pub location: Option<String>,
    /// Only parts at or below their reorder level.
    pub low_stock: Option<bool>,
}

impl Entity for Part {
    const NAME: &'static str = "Part";
    type Filter = PartFilter;

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
        require_text(&self.name, "name")?;
        if self.quantity_on_hand < 0 {
            return Err(CoreError::Validation(
                "quantity_on_hand must not be negative".to_string(),
            ));
        }
        if self.reorder_level < 0 {
            return Err(CoreError::Validation(
                "reorder_level must not be negative".to_string(),
            ));
        }
        Ok(())
    }

    fn matches(&self, filter: &PartFilter) -> bool {
        text_matches(&self.name, &filter.name)
            && filter.location.as_ref().map_or(true, |needle| {
                self.location
                    .as_deref()
                    .is_some_and(|loc| crate::types::contains_ci(loc, needle))
            })
            && filter.low_stock.map_or(true, |low| self.is_low_stock() == low)
    }
}

/// Parts consumed by a maintenance record or a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartUsage {
    pub id: DbId,
    pub part_id: DbId,
    pub maintenance_record_id: Option<DbId>,
    pub ticket_id: Option<DbId>,
    pub quantity: i32,
    pub created_at: Timestamp,
    pub version: i32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartUsageFilter {
    pub part_id: Option<DbId>,
    pub maintenance_record_id: Option<DbId>,
    pub ticket_id: Option<DbId>,
    /// Recorded on this UTC date.
    pub used_on: Option<NaiveDate>,
}

impl Entity for PartUsage {
    const NAME: &'static str = "PartUsage";
    type Filter = PartUsageFilter;

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
        if self.quantity <= 0 {
            return Err(CoreError::Validation(
                "quantity must be positive".to_string(),
            ));
        }
        if self.maintenance_record_id.is_none() && self.ticket_id.is_none() {
            return Err(CoreError::Validation(
                "part usage must reference a maintenance record or a ticket".to_string(),
            ));
        }
        Ok(())
    }

    fn matches(&self, filter: &PartUsageFilter) -> bool {
        eq_matches(&self.part_id, &filter.part_id)
            && filter
                .maintenance_record_id
                .map_or(true, |r| self.maintenance_record_id == Some(r))
            && filter.ticket_id.map_or(true, |t| self.ticket_id == Some(t))
            && filter
                .used_on
                .map_or(true, |date| falls_on(self.created_at, date))
    }
}

/// A request to consume some quantity of one part.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PartRequest {
    pub part_id: DbId,
    #[validate(range(min = 1))]
    pub quantity: i32,
}

/// DTO for adding a part to the catalogue.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePart {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    #[validate(range(min = 0))]
    pub quantity_on_hand: i32,
    #[validate(range(min = 0))]
    pub reorder_level: i32,
}
