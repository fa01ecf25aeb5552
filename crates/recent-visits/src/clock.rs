//! Time source abstraction
//!
//! Visits are stamped with wall-clock time when they are added. The [`Clock`]
//! trait lets tests substitute a [`ManualClock`] so recency ordering and
//! eviction can be exercised without sleeping.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};

/// Time abstraction for testability
pub trait Clock: Send + Sync {
    /// Get the current UTC datetime
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Shared clocks, so a test can keep a handle while the manager owns one
impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now_utc(&self) -> DateTime<Utc> {
        (**self).now_utc()
    }
}

/// Real clock implementation using system time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
///
/// Every call to [`Clock::now_utc`] returns the current instant and then
/// advances it by the configured step, so consecutive visits get strictly
/// increasing timestamps unless the step is zero.
#[derive(Debug)]
pub struct ManualClock {
    state: Mutex<ManualState>,
}

#[derive(Debug)]
struct ManualState {
    now: DateTime<Utc>,
    step: Duration,
}

impl ManualClock {
    /// Start at `start`, advancing one millisecond per reading
    pub fn new(start: DateTime<Utc>) -> Self {
        Self::with_step(start, Duration::milliseconds(1))
    }

    /// Start at `start`, advancing by `step` per reading
    pub fn with_step(start: DateTime<Utc>, step: Duration) -> Self {
        Self {
            state: Mutex::new(ManualState { now: start, step }),
        }
    }

    /// Jump the clock to an absolute instant
    pub fn set(&self, now: DateTime<Utc>) {
        self.lock().now = now;
    }

    /// Move the clock forward without producing a reading
    pub fn advance(&self, by: Duration) {
        let mut state = self.lock();
        state.now = saturating_add(state.now, by);
    }

    /// The instant the next reading will return
    pub fn peek(&self) -> DateTime<Utc> {
        self.lock().now
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ManualState> {
        // A poisoned clock still holds a valid instant.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Clock for ManualClock {
    fn now_utc(&self) -> DateTime<Utc> {
        let mut state = self.lock();
        let now = state.now;
        state.now = saturating_add(now, state.step);
        now
    }
}

/// Add without overflowing past the representable range
fn saturating_add(at: DateTime<Utc>, by: Duration) -> DateTime<Utc> {
    at.checked_add_signed(by).unwrap_or(if by < Duration::zero() {
        DateTime::<Utc>::MIN_UTC
    } else {
        DateTime::<Utc>::MAX_UTC
    })
}
