//! Core types and logic for Steward.
//!
//! Label classification, grace periods, state resolution, notification
//! rendering and the applier that turns a resolution into tracker calls.

pub mod applier;
pub mod grace;
pub mod item;
pub mod labels;
pub mod maintainer;
pub mod message;
pub mod notification;
pub mod resolver;
pub mod state;

pub use applier::{notification_is_current, AppliedChanges, ChangeApplier};
pub use grace::{grace_remaining, Deadline};
pub use item::{Comment, ItemState, LabelAction, LabelEvent, TrackedItem};
pub use labels::{classify, Classification, LabelSummary};
pub use maintainer::{ItemOutcome, ItemReport, Maintainer, RunMode};
pub use message::{Message, ProgressNotes, RemovalReason};
pub use notification::{Notification, NOTIFIER_NAME};
pub use resolver::{Resolution, Resolver};
pub use state::{LifecycleState, MilestoneMode};
