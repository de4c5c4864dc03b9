//! Wall-clock time source.

use chrono::{DateTime, Utc};

use crate::ports::Clock;

/// Clock reading the system time in UTC.
pub struct LiveClock;

impl Clock for LiveClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
