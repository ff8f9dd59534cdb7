//! Domain layer - Core business logic
//!
//! Contains value objects, entities, and domain errors.
//! This layer has no dependencies on external systems.

pub mod config;
pub mod error;
pub mod segment;
pub mod session;
pub mod state;

// Re-export common types
pub use config::AppConfig;
pub use error::*;
pub use segment::{Segment, SegmentId, SegmentStatus};
pub use session::{Session, SessionId, SessionMeta, SessionSummary};
pub use state::{BusyError, ControllerState, MutationGuard};
