//! Payment dashboard client.
//!
//! Keeps a local view of gateway payments in sync with the remote API
//! through periodic polling and `payment:verified` push events, derives
//! summary statistics from it, and drives checkout, loan reminders and
//! the financial assistant on top of that view.

pub mod api;
pub mod config;
pub mod errors;
pub mod repositories;
pub mod services;
pub mod utils;
