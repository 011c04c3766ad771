//! Background process for the assetdesk engine.
//!
//! Owns the periodic triggers the core leaves to its caller: the
//! maintenance-scheduler tick and daily report generation.

pub mod config;
pub mod jobs;
