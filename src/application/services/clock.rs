//! Clock abstraction
//!
//! Every use case asks for "now" through this trait rather than calling
//! `Utc::now()` directly, so tests can pin time and so backoff/eligibility
//! calculations stay deterministic under test.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
pub struct FixedClock(pub DateTime<Utc>);

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn fixed_clock_stays_fixed() {
        let when = Utc::now();
        let clock = FixedClock(when);
        assert_eq!(clock.now(), when);
        assert_eq!(clock.now(), when);
    }
}
