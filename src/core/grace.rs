//! Grace period arithmetic.
//!
//! A grace period starts when a state label is applied by the bot and
//! ends `grace` later. Blockers are exempt and never run out of time.

use chrono::{DateTime, Duration, Utc};

use crate::error::Result;

/// Time left before an item becomes due for eviction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// The item is exempt; eviction is never due.
    Unbounded,
    /// Signed time left. Negative means the deadline has passed.
    Remaining(Duration),
}

impl Deadline {
    /// Check if the deadline has passed.
    ///
    /// Exactly zero remaining is still within the grace period.
    pub fn is_expired(&self) -> bool {
        match self {
            Deadline::Unbounded => false,
            Deadline::Remaining(left) => *left < Duration::zero(),
        }
    }

    /// Time left, if bounded.
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            Deadline::Unbounded => None,
            Deadline::Remaining(left) => Some(*left),
        }
    }
}

/// Compute the time remaining in a grace period.
///
/// `start` is only consulted for non-exempt items, so history lookups are
/// skipped entirely for blockers. A failed start lookup is propagated: the
/// caller must treat it as "do nothing this cycle".
pub fn grace_remaining<F>(
    exempt: bool,
    now: DateTime<Utc>,
    grace: Duration,
    start: F,
) -> Result<Deadline>
where
    F: FnOnce() -> Result<DateTime<Utc>>,
{
    if exempt {
        return Ok(Deadline::Unbounded);
    }

    let start = start()?;
    let elapsed = now.signed_duration_since(start);
    Ok(Deadline::Remaining(grace - elapsed))
}
