//! Monotonic millisecond clock, injectable so liveness/expiry logic is
//! testable without sleeping in real time.
//!
//! The source this broker is modelled on reads the wall clock directly
//! (and on Windows, buggily, as seconds-of-minute rather than a
//! monotonic epoch - see the design notes on that). This crate instead
//! wraps `std::time::Instant`, which is monotonic and process-relative
//! by construction, behind a trait so tests can supply a fake.

use std::sync::OnceLock;
use std::time::Instant;

static EPOCH: OnceLock<Instant> = OnceLock::new();

/// A source of monotonic milliseconds since some fixed (but unspecified)
/// reference point. Only relative differences are meaningful.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Real clock backed by `std::time::Instant`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> i64 {
        EPOCH.get_or_init(Instant::now).elapsed().as_millis() as i64
    }
}

/// Fake clock for deterministic tests: starts at 0, advances only when told.
#[derive(Debug, Default)]
pub struct FakeClock {
    millis: std::sync::atomic::AtomicI64,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            millis: std::sync::atomic::AtomicI64::new(0),
        }
    }

    pub fn advance(&self, ms: i64) {
        self.millis
            .fetch_add(ms, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn set(&self, ms: i64) {
        self.millis.store(ms, std::sync::atomic::Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now_ms(&self) -> i64 {
        self.millis.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances_monotonically() {
        let clock = FakeClock::new();
        assert_eq!(clock.now_ms(), 0);
        clock.advance(1000);
        assert_eq!(clock.now_ms(), 1000);
        clock.advance(500);
        assert_eq!(clock.now_ms(), 1500);
    }

    #[test]
    fn real_clock_never_goes_backwards() {
        let clock = MonotonicClock;
        let first = clock.now_ms();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = clock.now_ms();
        assert!(second >= first);
    }
}
