//! Task Forest
//!
//! Project task server built around a hierarchical subtask reordering
//! and reparenting engine. Exports the core components for testing and
//! integration.

pub mod config;
pub mod db;
pub mod error;
pub mod guard;
pub mod planner;
pub mod reconciler;
pub mod server;
pub mod snapshot;
pub mod types;
