//! Ticket lifecycle and maintenance-scheduling engine.
//!
//! The crate has no database dependency. Persistence is reached through the
//! [`store::Store`] contract; `assetdesk-db` provides the PostgreSQL
//! implementation and [`memory::MemoryStore`] an in-process one.

#[macro_use]
mod macros;

pub mod asset;
pub mod clock;
pub mod deadline;
pub mod error;
pub mod inventory;
pub mod maintenance;
pub mod memory;
pub mod patch;
pub mod report;
pub mod services;
pub mod store;
pub mod ticket;
pub mod types;
pub mod user;
