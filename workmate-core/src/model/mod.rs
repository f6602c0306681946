//! Domain records shared by the sync engine, the task mapper and the
//! document pipeline.

mod document;
mod event;
mod integration;
mod reminder;
mod task;

pub use document::{Document, DocumentMetadata, Party, ProcessingStatus, TaskSuggestion};
pub use event::{CalendarEvent, EventDraft, EventFields, EventPatch, SyncStatus};
pub use integration::{Credentials, Integration, IntegrationConfig, IntegrationType, SyncDirection};
pub use reminder::{Channel, Reminder, ReminderSeverity, ReminderStatus};
pub use task::{Priority, Task, TaskStatus, lenient_priority};
