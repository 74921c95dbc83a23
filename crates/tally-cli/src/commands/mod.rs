//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Init and shared utilities (open_db, parse_owner)
//! - `months` - Month summaries, month listing and recalculation
//! - `serve` - Web server command
//! - `status` - Database status

pub mod core;
pub mod months;
pub mod serve;
pub mod status;

// Re-export command functions for main.rs
pub use core::*;
pub use months::*;
pub use serve::*;
pub use status::*;
