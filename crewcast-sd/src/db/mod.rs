//! Database queries for the station director
//!
//! The persistent store is deliberately thin: each module is a set of small
//! query functions over the shared pool, no caching layer. The scheduler
//! re-reads the pool every iteration so external mutations (songs added,
//! queues toggled) are picked up without invalidation logic.

pub mod entries;
pub mod library;
pub mod moods;
pub mod players;
pub mod playlog;
pub mod settings;
pub mod stations;

#[cfg(test)]
pub mod test_support;

pub use settings::SchedulerConfig;
