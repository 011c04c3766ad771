//! Row shapes as stored in PostgreSQL.
//!
//! Enum-valued columns are stored as TEXT and parsed back into the core's
//! enums, so each row converts into its domain type with `TryFrom`.

pub mod asset;
pub mod inventory;
pub mod maintenance;
pub mod report;
pub mod ticket;
pub mod user;
