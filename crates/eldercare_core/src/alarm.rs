//! crates/eldercare_core/src/alarm.rs
//!
//! Owns the single active alarm and the attention signal that goes with it.

use crate::domain::{ActivityTask, AlarmSession};
use crate::ports::AttentionSignal;
use chrono::NaiveDateTime;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// The per-task alarm state, derived from the task and the active session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum AlarmPhase {
    Pending,
    Alarming,
    Completed,
}

pub struct AlarmController {
    session: Option<AlarmSession>,
    signal: Arc<dyn AttentionSignal>,
}

impl AlarmController {
    pub fn new(signal: Arc<dyn AttentionSignal>) -> Self {
        Self {
            session: None,
            signal,
        }
    }

    pub fn session(&self) -> Option<&AlarmSession> {
        self.session.as_ref()
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn active_task_id(&self) -> Option<Uuid> {
        self.session.as_ref().map(|s| s.task_id)
    }

    pub fn phase_of(&self, task: &ActivityTask) -> AlarmPhase {
        if task.completed {
            AlarmPhase::Completed
        } else if self.active_task_id() == Some(task.id) {
            AlarmPhase::Alarming
        } else {
            AlarmPhase::Pending
        }
    }

    /// Starts alarming for `task`. Returns `false`, changing nothing, if an
    /// alarm is already active or the task is already completed.
    pub fn raise(&mut self, task: &ActivityTask, now: NaiveDateTime) -> bool {
        if task.completed {
            return false;
        }
        self.start_session(task, now)
    }

    /// Starts a trial alarm. Unlike `raise`, a completed task may ring again;
    /// its phase stays `Completed`.
    pub fn rehearse(&mut self, task: &ActivityTask, now: NaiveDateTime) -> bool {
        self.start_session(task, now)
    }

    fn start_session(&mut self, task: &ActivityTask, now: NaiveDateTime) -> bool {
        if let Some(active) = &self.session {
            debug!(active = %active.task_id, dropped = %task.id, "Alarm already active; raise ignored.");
            return false;
        }
        info!(task_id = %task.id, label = %task.label, "Raising alarm.");
        self.session = Some(AlarmSession {
            task_id: task.id,
            raised_at: now,
        });
        self.signal.start();
        true
    }

    /// Stops the sound but keeps the session, used once a task is verified
    /// and the relay is still sending.
    pub fn silence(&self) {
        self.signal.stop();
    }

    /// Clears the session unconditionally.
    pub fn dismiss(&mut self) -> Option<AlarmSession> {
        self.signal.stop();
        let cleared = self.session.take();
        if let Some(session) = &cleared {
            info!(task_id = %session.task_id, "Alarm dismissed.");
        }
        cleared
    }

    /// User-initiated cancel. The task returns to pending.
    ///
    /// The caller is responsible for sending the cancellation notice first.
    pub fn cancel(&mut self) -> Option<AlarmSession> {
        self.signal.stop();
        let cleared = self.session.take();
        if let Some(session) = &cleared {
            info!(task_id = %session.task_id, "Alarm cancelled by user.");
        }
        cleared
    }
}
