//! Crewcast Station Director (crewcast-sd)
//!
//! The scheduling core of Crewcast: one engine process and one scheduler
//! task per station, fair round-robin selection over participants' queues,
//! mood-biased picks for hands-off participants, and curator replenishment
//! from the song library when the pool runs dry.

pub mod api;
pub mod autofill;
pub mod db;
pub mod engine;
pub mod error;
pub mod fanout;
pub mod lastfm;
pub mod mood;
pub mod registry;
pub mod scheduler;
pub mod selector;
pub mod stager;

pub use error::{Error, Result};
