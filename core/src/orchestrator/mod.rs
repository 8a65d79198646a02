//! Periodic multi-source scheduling around a single ingestion actor.

pub mod handle;
pub mod scheduler;
pub mod sources;
pub mod throttle;

pub use handle::{Inbox, ScanHandle};
pub use scheduler::{ScanOrchestrator, ScanState};
pub use sources::{EngineListener, NullListener, ScanSources};
pub use throttle::Throttle;
