//! services/api/src/adapters/clock.rs

use chrono::{Local, NaiveDateTime};
use eldercare_core::ports::Clock;

/// Local wall-clock time of the host.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}
