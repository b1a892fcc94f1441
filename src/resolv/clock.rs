//! A millisecond tick source that can be replaced by a manual implementation
//! during testing.
//!
//! The resolver measures time in milliseconds held in a `u32` which wraps
//! around after roughly 49.7 days. The worker detects this wrap-around and
//! deals with it, so tick sources only need to be monotonic between wraps.

#![warn(missing_docs)]

use std::fmt::Debug;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

//------------ Ticks ---------------------------------------------------------

/// A monotonic millisecond counter that wraps around.
pub trait Ticks: Debug + Send + Sync {
    /// Returns the current tick count in milliseconds.
    fn ticks(&self) -> u32;
}

//------------ SystemTicks ---------------------------------------------------

/// Implementation of the [Ticks] trait using the Instant type from
/// std::time.
///
/// Counting starts at zero when the value is created.
#[derive(Clone, Debug)]
pub struct SystemTicks {
    /// When counting started.
    start: Instant,
}

impl SystemTicks {
    /// Creates a new tick source starting at zero.
    pub fn new() -> Self {
        SystemTicks {
            start: Instant::now(),
        }
    }
}

impl Default for SystemTicks {
    fn default() -> Self {
        Self::new()
    }
}

impl Ticks for SystemTicks {
    fn ticks(&self) -> u32 {
        // Truncation is the wrap-around.
        self.start.elapsed().as_millis() as u32
    }
}

//------------ ManualTicks ---------------------------------------------------

/// Implementation of the [Ticks] trait where time only passes when told to.
///
/// Clones share the same counter, so a test can keep one and hand another
/// to the resolver.
#[derive(Clone, Debug, Default)]
pub struct ManualTicks {
    /// The current tick count.
    now: Arc<AtomicU32>,
}

impl ManualTicks {
    /// Creates a new tick source starting at `start`.
    pub fn new(start: u32) -> Self {
        ManualTicks {
            now: Arc::new(AtomicU32::new(start)),
        }
    }

    /// Sets the current tick count.
    pub fn set(&self, ticks: u32) {
        self.now.store(ticks, Ordering::Release)
    }

    /// Advances the tick count by `millis`, wrapping around if necessary.
    pub fn advance(&self, millis: u32) {
        // Atomic addition wraps around.
        self.now.fetch_add(millis, Ordering::AcqRel);
    }
}

impl Ticks for ManualTicks {
    fn ticks(&self) -> u32 {
        self.now.load(Ordering::Acquire)
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn manual_ticks_wrap() {
        let ticks = ManualTicks::new(u32::MAX - 1);
        let shared = ticks.clone();
        shared.advance(3);
        assert_eq!(ticks.ticks(), 1);
        shared.set(10);
        assert_eq!(ticks.ticks(), 10);
    }

    #[test]
    fn system_ticks_advance() {
        let ticks = SystemTicks::new();
        let first = ticks.ticks();
        std::thread::sleep(std::time::Duration::from_millis(5));
        assert!(ticks.ticks().wrapping_sub(first) >= 5);
    }
}
