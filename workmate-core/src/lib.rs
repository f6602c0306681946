//! Core of the workmate backend.
//!
//! This crate holds everything that does not talk to a specific provider:
//! - `sync` for bidirectional calendar sync with conflict detection
//! - `mapper` for projecting tasks onto calendar events
//! - `reminder` for reminder planning and delivery bookkeeping
//! - `pipeline` and `classify` for turning uploaded documents into tasks
//! - `store` for the persistence traits and the in-memory store
//!
//! Providers implement [`remote::RemoteCalendarAdapter`] and are wired in
//! through a [`remote::ProviderRegistry`].

pub mod calendar;
pub mod classify;
pub mod config;
pub mod constants;
pub mod date_range;
pub mod error;
pub mod mapper;
pub mod model;
pub mod pipeline;
pub mod reminder;
pub mod remote;
pub mod store;
pub mod sync;

#[cfg(test)]
mod testing;

pub use calendar::CalendarService;
pub use config::WorkmateConfig;
pub use error::{WorkmateError, WorkmateResult};
pub use mapper::{TaskEventMapper, TaskSyncStats};
pub use pipeline::{DocumentPipeline, ProcessingOutcome};
pub use reminder::ReminderScheduler;
pub use sync::{CalendarSyncEngine, ConflictResolution, SyncResult};
