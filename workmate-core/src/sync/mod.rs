//! Bidirectional calendar synchronisation.

pub mod detector;
mod engine;
pub mod plan;
mod result;

pub use detector::{PairState, classify_pair};
pub use engine::{CalendarSyncEngine, ConflictResolution};
pub use plan::{ChangeKind, PullChange, PushChange, SyncPlan};
pub use result::SyncResult;
