//! Issue tracker collaborators.
//!
//! The core never mutates items directly; every read of history and every
//! label, comment and milestone change goes through an [`IssueTracker`].

pub mod file;
pub mod memory;
pub mod traits;

pub use file::FileTracker;
pub use memory::{MemoryTracker, Mutation, TrackerOp};
pub use traits::IssueTracker;
