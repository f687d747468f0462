//! System clock adapter.
//!
//! Implements [`Clock`] with `std::time::Instant` for the monotonic reading
//! (uptime since construction) and `chrono` for wall-clock time.  Local time
//! follows the host's timezone, which is what daily feed times are written
//! in.

use std::time::{Duration, Instant};

use chrono::{DateTime, Local, NaiveDateTime, Utc};

use crate::app::ports::Clock;

pub struct SystemClock {
    start: Instant,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self { start: Instant::now() }
    }
}

impl Clock for SystemClock {
    fn uptime(&self) -> Duration {
        self.start.elapsed()
    }

    fn local_now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
