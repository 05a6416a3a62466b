//! # Crewcast Common Library
//!
//! Shared code for the crewcast services including:
//! - Database models and schema initialization
//! - Event types and the broadcast event bus
//! - Configuration loading
//! - Common error types

pub mod config;
pub mod db;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{Event, EventBus};
