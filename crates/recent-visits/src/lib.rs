//! # Recent Visits
//!
//! Per-user, capacity-bounded page visit history.
//!
//! Each user's history holds at most `max_visits` entries; adding one more
//! evicts the visit with the oldest timestamp. The complete state is
//! rewritten to a single snapshot file after every mutation and reloaded when
//! a manager is opened on the same path.
//!
//! ## Features
//!
//! - **VisitManager**: add, query (newest first), delete and clear visits
//! - **UserRecord**: bounded per-user storage with swap-and-pop removal
//! - **Snapshot codec**: fixed-width little-endian whole-state format
//! - **Clock**: pluggable time source for deterministic tests
//!
//! ## Example
//!
//! ```rust,no_run
//! use recent_visits::VisitManager;
//!
//! # fn main() -> Result<(), recent_visits::StorageError> {
//! let mut manager = VisitManager::open("rv.dat", 10)?;
//!
//! manager.add_visit(1, 101, "https://example.com", "Example")?;
//! manager.add_visit(1, 102, "https://example.org", "Example Org")?;
//!
//! // Newest first
//! let recent = manager.recent_visits(1);
//! assert_eq!(recent[0].visit_id, 102);
//!
//! manager.delete_visits(1, &[101])?;
//! manager.clear(1)?;
//! manager.close();
//! # Ok(())
//! # }
//! ```
//!
//! ## Concurrency
//!
//! A manager is a plain single-owner value with no internal locking. Share
//! one across threads by wrapping it in a `Mutex`.

pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod manager;
pub mod record;
pub mod snapshot;
pub mod visit;

// Re-exports
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ManagerConfig, ManagerConfigBuilder};
pub use error::StorageError;
pub use manager::{AddOutcome, VisitManager};
pub use record::UserRecord;
pub use snapshot::SnapshotFile;
pub use visit::{Timestamp, Visit};
