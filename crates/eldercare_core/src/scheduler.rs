//! crates/eldercare_core/src/scheduler.rs
//!
//! Minute-resolution detection of due tasks.
//!
//! The poll loop runs more often than once a minute, so the scheduler keeps
//! a "last checked minute" guard and only looks for due tasks on a minute
//! transition. It never mutates the registry; the orchestrator acts on what
//! it reports.

use crate::domain::TimeOfDay;
use crate::registry::TaskRegistry;
use chrono::{NaiveDate, NaiveDateTime};
use uuid::Uuid;

/// Reported once per wall-clock minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinuteTransition {
    pub minute: TimeOfDay,
    /// True when the calendar date moved since the previous transition.
    pub day_changed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct MinuteScheduler {
    last_checked: Option<(NaiveDate, TimeOfDay)>,
}

impl MinuteScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `now` and returns `Some` only the first time a given minute is seen.
    pub fn begin_minute(&mut self, now: &NaiveDateTime) -> Option<MinuteTransition> {
        let current = (now.date(), TimeOfDay::of(now));
        if self.last_checked == Some(current) {
            return None;
        }
        let day_changed = matches!(self.last_checked, Some((day, _)) if day != current.0);
        self.last_checked = Some(current);
        Some(MinuteTransition {
            minute: current.1,
            day_changed,
        })
    }

    /// The first pending task in registry order scheduled at `minute`.
    ///
    /// Returns `None` while an alarm is active: the due task is dropped for
    /// this minute, not queued.
    pub fn due_task(minute: TimeOfDay, registry: &TaskRegistry, alarm_active: bool) -> Option<Uuid> {
        if alarm_active {
            return None;
        }
        registry
            .iter()
            .find(|t| !t.completed && t.scheduled_time == minute)
            .map(|t| t.id)
    }
}
