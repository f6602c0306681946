pub mod config;
pub mod events;
pub mod integrations;
pub mod reminders;
pub mod resolve;
pub mod sync;
pub mod tasks;
