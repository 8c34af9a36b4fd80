//! crates/eldercare_core/src/workflow.rs
//!
//! The workflow orchestrator: scheduler tick → alarm → photo verification →
//! completion → family notification.
//!
//! `CareWorkflow` is the only writer of the task registry and the alarm
//! controller. All state lives in one `WorkflowState` behind a mutex that is
//! never held while an external port is awaited, so the scheduler keeps
//! polling while a photo is being verified. The single active alarm is the
//! exclusion gate between concurrent callers.

use crate::alarm::{AlarmController, AlarmPhase};
use crate::domain::{
    ActivityTask, AlarmSession, CareProfile, NewTask, NoticeKind, PhotoEvidence, StatusNotice,
    TaskChanges, VerificationResult,
};
use crate::ports::{AttentionSignal, Clock, NotificationChannel, VisionService};
use crate::registry::TaskRegistry;
use crate::relay::{cancellation_message, completion_message, NotificationRelay};
use crate::scheduler::MinuteScheduler;
use crate::verification::VerificationClient;
use bytes::Bytes;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

const EVENT_CHANNEL_CAPACITY: usize = 64;
const PROCESSING_ERROR_NOTICE: &str = "Error processing the image.";
const NO_ALARM_NOTICE: &str = "There is no active alarm to verify.";
const BUSY_NOTICE: &str = "Please wait, the previous photo is still being checked.";

//=========================================================================================
// Wiring
//=========================================================================================

/// The external collaborators the workflow drives.
#[derive(Clone)]
pub struct WorkflowPorts {
    pub vision: Arc<dyn VisionService>,
    pub channel: Arc<dyn NotificationChannel>,
    pub signal: Arc<dyn AttentionSignal>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WorkflowSettings {
    /// Re-arm completed tasks on the first scheduler poll of a new day.
    pub daily_reset: bool,
}

//=========================================================================================
// Presentation-facing Types
//=========================================================================================

/// Why an alarm session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmOutcome {
    Completed,
    Cancelled,
    Dismissed,
}

/// Everything the presentation layer is told about as it happens.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    AlarmRaised { task: ActivityTask },
    VerificationStarted { task_id: Uuid },
    VerificationFailed { task_id: Uuid, reason: String },
    TaskCompleted { task: ActivityTask, reason: String },
    NotificationStarted { task_id: Uuid },
    NotificationFinished { task_id: Uuid, delivered: bool },
    AlarmCleared { task_id: Uuid, outcome: AlarmOutcome },
    TasksChanged,
    ProfileChanged,
    Notice { notice: StatusNotice },
}

/// Result of a photo submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PhotoOutcome {
    Verified { result: VerificationResult, notified: bool },
    Rejected { result: VerificationResult },
    NoActiveAlarm,
    /// A verification or notification is already running.
    Busy,
    /// The photo could not be processed (empty upload, task deleted meanwhile).
    ProcessingError,
    /// The alarm ended while the photo was being verified.
    Discarded,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskView {
    #[serde(flatten)]
    pub task: ActivityTask,
    pub phase: AlarmPhase,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActiveAlarmView {
    #[serde(flatten)]
    pub session: AlarmSession,
    /// `None` if the task was deleted while alarming.
    pub task: Option<ActivityTask>,
}

/// A read-only copy of the workflow state.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowSnapshot {
    pub profile: CareProfile,
    pub tasks: Vec<TaskView>,
    pub active_alarm: Option<ActiveAlarmView>,
    pub is_verifying: bool,
    pub is_notifying: bool,
    pub notice: Option<StatusNotice>,
    pub completed_count: usize,
    pub total_count: usize,
}

//=========================================================================================
// State and Orchestrator
//=========================================================================================

struct WorkflowState {
    registry: TaskRegistry,
    alarm: AlarmController,
    scheduler: MinuteScheduler,
    profile: CareProfile,
    is_verifying: bool,
    is_notifying: bool,
    notice: Option<StatusNotice>,
}

impl WorkflowState {
    fn is_busy(&self) -> bool {
        self.is_verifying || self.is_notifying
    }
}

pub struct CareWorkflow {
    state: Mutex<WorkflowState>,
    verifier: VerificationClient,
    relay: NotificationRelay,
    clock: Arc<dyn Clock>,
    settings: WorkflowSettings,
    events: broadcast::Sender<WorkflowEvent>,
}

impl CareWorkflow {
    pub fn new(
        ports: WorkflowPorts,
        registry: TaskRegistry,
        profile: CareProfile,
        settings: WorkflowSettings,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(WorkflowState {
                registry,
                alarm: AlarmController::new(ports.signal),
                scheduler: MinuteScheduler::new(),
                profile,
                is_verifying: false,
                is_notifying: false,
                notice: None,
            }),
            verifier: VerificationClient::new(ports.vision),
            relay: NotificationRelay::new(ports.channel),
            clock: ports.clock,
            settings,
            events,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: WorkflowEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn set_notice(&self, state: &mut WorkflowState, kind: NoticeKind, message: impl Into<String>) {
        let notice = StatusNotice::new(kind, message);
        state.notice = Some(notice.clone());
        self.emit(WorkflowEvent::Notice { notice });
    }

    fn raise_locked(&self, state: &mut WorkflowState, task_id: Uuid, now: NaiveDateTime) -> bool {
        let Some(task) = state.registry.find_by_id(task_id).cloned() else {
            return false;
        };
        if !state.alarm.raise(&task, now) {
            return false;
        }
        self.emit(WorkflowEvent::AlarmRaised { task });
        true
    }

    //-------------------------------------------------------------------------------------
    // Scheduling and Alarms
    //-------------------------------------------------------------------------------------

    /// One scheduler poll. Returns the id of the task whose alarm was raised, if any.
    pub async fn tick(&self) -> Option<Uuid> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let transition = state.scheduler.begin_minute(&now)?;

        if transition.day_changed && self.settings.daily_reset {
            let reset = state.registry.reset_completions();
            if reset > 0 {
                info!(reset, "New day: completed tasks re-armed.");
                self.emit(WorkflowEvent::TasksChanged);
            }
        }

        let due = MinuteScheduler::due_task(transition.minute, &state.registry, state.alarm.is_active())?;
        self.raise_locked(&mut state, due, now).then_some(due)
    }

    /// Raises the alarm for a specific task. No-op on an unknown id, a
    /// completed task, or while another alarm is active.
    pub async fn trigger_alarm_manually(&self, task_id: Uuid) -> bool {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        self.raise_locked(&mut state, task_id, now)
    }

    /// Raises a trial alarm for the first task that is not yet completed,
    /// or for the first task when every task is done. `None` when the list
    /// is empty or another alarm is active.
    pub async fn trigger_test_alarm(&self) -> Option<Uuid> {
        let now = self.clock.now();
        let mut state = self.state.lock().await;
        let candidate = state
            .registry
            .iter()
            .find(|t| !t.completed)
            .or_else(|| state.registry.iter().next())
            .cloned()?;
        if !state.alarm.rehearse(&candidate, now) {
            return None;
        }
        let task_id = candidate.id;
        self.emit(WorkflowEvent::AlarmRaised { task: candidate });
        Some(task_id)
    }

    /// Cancels the active alarm. The family contact receives exactly one
    /// cancellation message before the session is cleared; the task stays
    /// pending. Returns `false` when there is nothing to cancel or a
    /// verification/notification is in flight.
    pub async fn cancel_alarm(&self) -> bool {
        let now = self.clock.now();
        let (task_id, task, profile) = {
            let mut state = self.state.lock().await;
            let Some(task_id) = state.alarm.active_task_id() else {
                return false;
            };
            if state.is_busy() {
                return false;
            }
            state.alarm.silence();
            state.is_notifying = true;
            self.emit(WorkflowEvent::NotificationStarted { task_id });
            let task = state.registry.find_by_id(task_id).cloned();
            (task_id, task, state.profile.clone())
        };

        let delivered = match &task {
            Some(task) => {
                let message = cancellation_message(&profile, task, now);
                self.relay.notify(&profile, task, &message).await
            }
            None => {
                warn!(%task_id, "Cancelled alarm refers to a deleted task; no message sent.");
                false
            }
        };

        let mut state = self.state.lock().await;
        state.is_notifying = false;
        self.emit(WorkflowEvent::NotificationFinished { task_id, delivered });
        if state.alarm.cancel().is_some() {
            self.emit(WorkflowEvent::AlarmCleared {
                task_id,
                outcome: AlarmOutcome::Cancelled,
            });
        }
        let message = if delivered {
            format!("Alarm cancelled. {} has been informed.", profile.contact.name)
        } else {
            format!("Alarm cancelled, but {} could not be informed.", profile.contact.name)
        };
        self.set_notice(&mut state, NoticeKind::Info, message);
        true
    }

    /// Clears the active alarm without notifying anyone.
    pub async fn dismiss_alarm(&self) -> bool {
        let mut state = self.state.lock().await;
        if state.is_busy() {
            return false;
        }
        match state.alarm.dismiss() {
            Some(session) => {
                self.emit(WorkflowEvent::AlarmCleared {
                    task_id: session.task_id,
                    outcome: AlarmOutcome::Dismissed,
                });
                true
            }
            None => false,
        }
    }

    //-------------------------------------------------------------------------------------
    // Photo Verification
    //-------------------------------------------------------------------------------------

    /// Verifies a proof photo for the active alarm and, on success, completes
    /// the task and notifies the family contact.
    pub async fn submit_photo(&self, photo: Bytes, mime_type: &str) -> PhotoOutcome {
        let task = {
            let mut state = self.state.lock().await;
            let Some(task_id) = state.alarm.active_task_id() else {
                self.set_notice(&mut state, NoticeKind::Info, NO_ALARM_NOTICE);
                return PhotoOutcome::NoActiveAlarm;
            };
            if state.is_busy() {
                self.set_notice(&mut state, NoticeKind::Info, BUSY_NOTICE);
                return PhotoOutcome::Busy;
            }
            let task = match state.registry.find_by_id(task_id).cloned() {
                Some(task) if !photo.is_empty() => task,
                _ => {
                    self.set_notice(&mut state, NoticeKind::Error, PROCESSING_ERROR_NOTICE);
                    return PhotoOutcome::ProcessingError;
                }
            };
            state.is_verifying = true;
            self.emit(WorkflowEvent::VerificationStarted { task_id });
            task
        };

        let result = self.verifier.verify(&photo, mime_type, task.activity).await;
        let now = self.clock.now();

        let mut state = self.state.lock().await;
        state.is_verifying = false;

        if state.alarm.active_task_id() != Some(task.id) {
            info!(task_id = %task.id, "Alarm ended during verification; verdict discarded.");
            return PhotoOutcome::Discarded;
        }

        if !result.verified {
            self.emit(WorkflowEvent::VerificationFailed {
                task_id: task.id,
                reason: result.reason.clone(),
            });
            self.set_notice(
                &mut state,
                NoticeKind::Error,
                format!("Could not verify: {}. Please take another photo.", result.reason),
            );
            return PhotoOutcome::Rejected { result };
        }

        let evidence = PhotoEvidence::new(photo, mime_type, now);
        let Some(completed) = state.registry.mark_completed(task.id, evidence, now) else {
            self.set_notice(&mut state, NoticeKind::Error, PROCESSING_ERROR_NOTICE);
            return PhotoOutcome::ProcessingError;
        };
        state.alarm.silence();
        state.is_notifying = true;
        self.emit(WorkflowEvent::TaskCompleted {
            task: completed.clone(),
            reason: result.reason.clone(),
        });
        self.emit(WorkflowEvent::NotificationStarted { task_id: task.id });
        let profile = state.profile.clone();
        drop(state);

        let message = completion_message(&profile, &completed, now, &result.reason);
        let notified = self.relay.notify(&profile, &completed, &message).await;

        let mut state = self.state.lock().await;
        self.finish_completion(&mut state, &completed, &profile, notified);
        PhotoOutcome::Verified { result, notified }
    }

    fn finish_completion(
        &self,
        state: &mut WorkflowState,
        completed: &ActivityTask,
        profile: &CareProfile,
        notified: bool,
    ) {
        state.is_notifying = false;
        self.emit(WorkflowEvent::NotificationFinished {
            task_id: completed.id,
            delivered: notified,
        });
        if state.alarm.active_task_id() == Some(completed.id) {
            state.alarm.dismiss();
            self.emit(WorkflowEvent::AlarmCleared {
                task_id: completed.id,
                outcome: AlarmOutcome::Completed,
            });
        }
        if notified {
            self.set_notice(
                state,
                NoticeKind::Whatsapp,
                format!("Verified and WhatsApp sent to {}!", profile.contact.name),
            );
        } else {
            self.set_notice(
                state,
                NoticeKind::Error,
                format!("Verified, but the message to {} could not be delivered.", profile.contact.name),
            );
        }
    }

    //-------------------------------------------------------------------------------------
    // Task and Profile Editing (never touches alarm state)
    //-------------------------------------------------------------------------------------

    pub async fn add_task(&self, new_task: NewTask) -> ActivityTask {
        let task = self.state.lock().await.registry.create(new_task);
        self.emit(WorkflowEvent::TasksChanged);
        task
    }

    pub async fn update_task(&self, task_id: Uuid, changes: &TaskChanges) -> Option<ActivityTask> {
        let updated = self.state.lock().await.registry.update(task_id, changes)?;
        self.emit(WorkflowEvent::TasksChanged);
        Some(updated)
    }

    pub async fn delete_task(&self, task_id: Uuid) -> bool {
        let removed = self.state.lock().await.registry.remove(task_id);
        if removed {
            self.emit(WorkflowEvent::TasksChanged);
        }
        removed
    }

    pub async fn profile(&self) -> CareProfile {
        self.state.lock().await.profile.clone()
    }

    pub async fn update_profile(&self, profile: CareProfile) {
        self.state.lock().await.profile = profile;
        self.emit(WorkflowEvent::ProfileChanged);
    }

    pub async fn clear_notice(&self) {
        self.state.lock().await.notice = None;
    }

    //-------------------------------------------------------------------------------------
    // Read-only Views
    //-------------------------------------------------------------------------------------

    pub async fn tasks(&self) -> Vec<ActivityTask> {
        self.state.lock().await.registry.list()
    }

    pub async fn history(&self) -> Vec<ActivityTask> {
        self.state.lock().await.registry.history()
    }

    pub async fn photo_evidence(&self, task_id: Uuid) -> Option<PhotoEvidence> {
        let state = self.state.lock().await;
        state.registry.find_by_id(task_id)?.photo_evidence.clone()
    }

    pub async fn snapshot(&self) -> WorkflowSnapshot {
        let state = self.state.lock().await;
        let tasks = state
            .registry
            .iter()
            .map(|t| TaskView {
                task: t.clone(),
                phase: state.alarm.phase_of(t),
            })
            .collect();
        let active_alarm = state.alarm.session().map(|session| ActiveAlarmView {
            session: session.clone(),
            task: state.registry.find_by_id(session.task_id).cloned(),
        });
        let (completed_count, total_count) = state.registry.progress();
        WorkflowSnapshot {
            profile: state.profile.clone(),
            tasks,
            active_alarm,
            is_verifying: state.is_verifying,
            is_notifying: state.is_notifying,
            notice: state.notice.clone(),
            completed_count,
            total_count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alarm::tests::RecordingSignal;
    use crate::domain::ActivityType;
    use crate::ports::PortResult;
    use crate::relay::tests::{profile, RecordingChannel};
    use crate::relay::CANCELLATION_REASON;
    use crate::verification::tests::ScriptedVision;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::atomic::Ordering;
    use tokio::sync::Notify;

    struct ManualClock(std::sync::Mutex<NaiveDateTime>);

    impl ManualClock {
        fn at(day: u32, h: u32, m: u32) -> Self {
            Self(std::sync::Mutex::new(ts(day, h, m, 0)))
        }

        fn set(&self, t: NaiveDateTime) {
            *self.0.lock().unwrap() = t;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> NaiveDateTime {
            *self.0.lock().unwrap()
        }
    }

    fn ts(day: u32, h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, day)
            .and_then(|d| d.and_hms_opt(h, m, s))
            .expect("valid timestamp")
    }

    struct Harness {
        workflow: Arc<CareWorkflow>,
        vision: Arc<ScriptedVision>,
        channel: Arc<RecordingChannel>,
        signal: Arc<RecordingSignal>,
        clock: Arc<ManualClock>,
    }

    fn harness_with(times: &[(&str, ActivityType)], reply: &str, settings: WorkflowSettings) -> Harness {
        let mut registry = TaskRegistry::new();
        for (time, activity) in times {
            registry.add(ActivityTask::new(*activity, "Drink water", time.parse().unwrap()));
        }
        let vision = Arc::new(ScriptedVision::replying(reply));
        let channel = Arc::new(RecordingChannel::default());
        let signal = Arc::new(RecordingSignal::default());
        let clock = Arc::new(ManualClock::at(14, 10, 29));
        let ports = WorkflowPorts {
            vision: vision.clone(),
            channel: channel.clone(),
            signal: signal.clone(),
            clock: clock.clone(),
        };
        Harness {
            workflow: Arc::new(CareWorkflow::new(ports, registry, profile(), settings)),
            vision,
            channel,
            signal,
            clock,
        }
    }

    fn harness(reply: &str) -> Harness {
        harness_with(&[("10:30", ActivityType::Water)], reply, WorkflowSettings::default())
    }

    const WATER_OK: &str = r#"{"verified": true, "reason": "Person drinking water", "confidence": 0.92}"#;
    const WATER_NO: &str = r#"{"verified": false, "reason": "No beverage visible", "confidence": 0.3}"#;

    #[tokio::test]
    async fn verified_photo_completes_task_notifies_and_clears_alarm() {
        let h = harness(WATER_OK);
        let mut events = h.workflow.subscribe();
        let task_id = h.workflow.tasks().await[0].id;

        assert_eq!(h.workflow.tick().await, None);
        h.clock.set(ts(14, 10, 30, 0));
        assert_eq!(h.workflow.tick().await, Some(task_id));
        assert!(matches!(events.recv().await.unwrap(), WorkflowEvent::AlarmRaised { .. }));
        let snap = h.workflow.snapshot().await;
        assert_eq!(snap.active_alarm.as_ref().map(|a| a.session.task_id), Some(task_id));
        assert_eq!(snap.tasks[0].phase, AlarmPhase::Alarming);
        assert!(h.signal.playing.load(Ordering::SeqCst));

        h.clock.set(ts(14, 10, 31, 0));
        let outcome = h.workflow.submit_photo(Bytes::from_static(b"jpeg"), "image/jpeg").await;
        match outcome {
            PhotoOutcome::Verified { result, notified } => {
                assert!(notified);
                assert_eq!(result.confidence, 0.92);
            }
            other => panic!("unexpected outcome {other:?}"),
        }

        let snap = h.workflow.snapshot().await;
        assert!(snap.active_alarm.is_none());
        assert!(!snap.is_verifying && !snap.is_notifying);
        assert_eq!((snap.completed_count, snap.total_count), (1, 1));
        let task = &snap.tasks[0].task;
        assert!(task.completed && task.is_consistent());
        assert_eq!(task.verified_at, Some(ts(14, 10, 31, 0)));
        assert_eq!(snap.notice.as_ref().map(|n| n.kind), Some(NoticeKind::Whatsapp));
        assert!(!h.signal.playing.load(Ordering::SeqCst));

        let sent = h.channel.sent.lock().unwrap().clone();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "+34600000000");
        assert!(sent[0].1.contains("Person drinking water"));
        assert!(sent[0].1.contains("10:31"));

        let evidence = h.workflow.photo_evidence(task_id).await.unwrap();
        assert_eq!(&evidence.bytes[..], b"jpeg");
    }

    #[tokio::test]
    async fn rejected_photo_keeps_alarm_and_invites_retry() {
        let h = harness(WATER_NO);
        h.clock.set(ts(14, 10, 30, 0));
        h.workflow.tick().await;

        let outcome = h.workflow.submit_photo(Bytes::from_static(b"jpeg"), "image/jpeg").await;
        assert!(matches!(outcome, PhotoOutcome::Rejected { ref result } if result.reason == "No beverage visible"));

        let snap = h.workflow.snapshot().await;
        assert!(!snap.tasks[0].task.completed);
        assert_eq!(snap.tasks[0].phase, AlarmPhase::Alarming);
        let notice = snap.notice.unwrap();
        assert_eq!(notice.kind, NoticeKind::Error);
        assert!(notice.message.contains("No beverage visible"));
        assert!(h.channel.sent.lock().unwrap().is_empty());
        assert!(h.signal.playing.load(Ordering::SeqCst));

        // A retry with a better photo succeeds.
        h.vision.set_reply(WATER_OK);
        let retry = h.workflow.submit_photo(Bytes::from_static(b"jpeg2"), "image/jpeg").await;
        assert!(matches!(retry, PhotoOutcome::Verified { .. }));
    }

    #[tokio::test]
    async fn only_the_first_of_two_simultaneous_tasks_alarms() {
        let h = harness_with(
            &[("08:00", ActivityType::Pills), ("08:00", ActivityType::Water)],
            WATER_OK,
            WorkflowSettings::default(),
        );
        let ids: Vec<Uuid> = h.workflow.tasks().await.iter().map(|t| t.id).collect();
        for s in 0..10 {
            h.clock.set(ts(14, 8, 0, s));
            let fired = h.workflow.tick().await;
            assert_eq!(fired, (s == 0).then_some(ids[0]));
        }
        let snap = h.workflow.snapshot().await;
        assert_eq!(snap.tasks[1].phase, AlarmPhase::Pending);
        assert_eq!(h.signal.starts.load(Ordering::SeqCst), 1);

        // Finishing the first alarm within the same minute does not fire the second.
        h.workflow.submit_photo(Bytes::from_static(b"jpeg"), "image/jpeg").await;
        h.clock.set(ts(14, 8, 0, 30));
        assert_eq!(h.workflow.tick().await, None);
    }

    #[tokio::test]
    async fn cancelling_sends_exactly_one_warning_and_leaves_task_pending() {
        let h = harness(WATER_OK);
        assert!(!h.workflow.cancel_alarm().await);

        h.clock.set(ts(14, 10, 30, 0));
        h.workflow.tick().await;
        assert!(h.workflow.cancel_alarm().await);

        let messages = h.channel.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].contains(CANCELLATION_REASON));

        let snap = h.workflow.snapshot().await;
        assert!(snap.active_alarm.is_none());
        assert!(!snap.tasks[0].task.completed);
        assert_eq!(snap.tasks[0].phase, AlarmPhase::Pending);
        assert!(!h.signal.playing.load(Ordering::SeqCst));
        assert!(!h.workflow.cancel_alarm().await);
        assert_eq!(h.channel.messages().len(), 1);
    }

    #[tokio::test]
    async fn photo_without_alarm_or_with_empty_bytes_is_refused() {
        let h = harness(WATER_OK);
        assert_eq!(
            h.workflow.submit_photo(Bytes::from_static(b"jpeg"), "image/jpeg").await,
            PhotoOutcome::NoActiveAlarm
        );
        assert_eq!(
            h.workflow.snapshot().await.notice,
            Some(StatusNotice::new(NoticeKind::Info, NO_ALARM_NOTICE))
        );
        let id = h.workflow.tasks().await[0].id;
        assert!(h.workflow.trigger_alarm_manually(id).await);
        assert_eq!(h.workflow.submit_photo(Bytes::new(), "image/jpeg").await, PhotoOutcome::ProcessingError);
        assert_eq!(
            h.workflow.snapshot().await.notice.map(|n| n.message),
            Some(PROCESSING_ERROR_NOTICE.to_string())
        );
        assert!(h.vision.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn manual_triggers_respect_the_single_alarm_rule() {
        let h = harness_with(
            &[("08:00", ActivityType::Pills), ("09:00", ActivityType::Food)],
            WATER_OK,
            WorkflowSettings::default(),
        );
        let ids: Vec<Uuid> = h.workflow.tasks().await.iter().map(|t| t.id).collect();
        assert!(!h.workflow.trigger_alarm_manually(Uuid::new_v4()).await);
        assert_eq!(h.workflow.trigger_test_alarm().await, Some(ids[0]));
        assert!(!h.workflow.trigger_alarm_manually(ids[1]).await);
        assert_eq!(h.workflow.trigger_test_alarm().await, None);
        assert!(h.workflow.dismiss_alarm().await);
        assert!(!h.workflow.dismiss_alarm().await);
        assert!(h.workflow.trigger_alarm_manually(ids[1]).await);
        assert!(h.channel.messages().is_empty());
    }

    #[tokio::test]
    async fn test_alarm_falls_back_to_the_first_task_once_all_are_done() {
        let h = harness(WATER_OK);
        let id = h.workflow.tasks().await[0].id;
        assert!(h.workflow.trigger_alarm_manually(id).await);
        assert!(matches!(
            h.workflow.submit_photo(Bytes::from_static(b"jpeg"), "image/jpeg").await,
            PhotoOutcome::Verified { .. }
        ));
        // A completed task never rings on its own.
        assert!(!h.workflow.trigger_alarm_manually(id).await);

        let mut events = h.workflow.subscribe();
        assert_eq!(h.workflow.trigger_test_alarm().await, Some(id));
        assert!(matches!(events.recv().await.unwrap(), WorkflowEvent::AlarmRaised { task } if task.id == id));
        let snap = h.workflow.snapshot().await;
        assert_eq!(snap.active_alarm.map(|a| a.session.task_id), Some(id));
        assert_eq!(snap.tasks[0].phase, AlarmPhase::Completed);
        assert!(h.workflow.cancel_alarm().await);
        assert!(h.workflow.snapshot().await.tasks[0].task.completed);
    }

    #[tokio::test]
    async fn test_alarm_needs_at_least_one_task() {
        let h = harness_with(&[], WATER_OK, WorkflowSettings::default());
        assert_eq!(h.workflow.trigger_test_alarm().await, None);
        assert!(!h.signal.playing.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failed_delivery_still_completes_the_task() {
        let h = harness(WATER_OK);
        h.channel.fail.store(true, Ordering::SeqCst);
        h.clock.set(ts(14, 10, 30, 0));
        h.workflow.tick().await;

        let outcome = h.workflow.submit_photo(Bytes::from_static(b"jpeg"), "image/jpeg").await;
        assert!(matches!(outcome, PhotoOutcome::Verified { notified: false, .. }));
        let snap = h.workflow.snapshot().await;
        assert!(snap.tasks[0].task.completed);
        assert!(snap.active_alarm.is_none());
        assert_eq!(snap.notice.map(|n| n.kind), Some(NoticeKind::Error));
    }

    #[tokio::test]
    async fn completed_tasks_do_not_refire_unless_daily_reset_is_enabled() {
        for daily_reset in [false, true] {
            let h = harness_with(
                &[("10:30", ActivityType::Water)],
                WATER_OK,
                WorkflowSettings { daily_reset },
            );
            h.clock.set(ts(14, 10, 30, 0));
            assert!(h.workflow.tick().await.is_some());
            h.workflow.submit_photo(Bytes::from_static(b"jpeg"), "image/jpeg").await;

            h.clock.set(ts(15, 0, 0, 0));
            h.workflow.tick().await;
            h.clock.set(ts(15, 10, 30, 0));
            assert_eq!(h.workflow.tick().await.is_some(), daily_reset);
        }
    }

    #[tokio::test]
    async fn task_edits_do_not_touch_the_alarm() {
        let h = harness(WATER_OK);
        let id = h.workflow.tasks().await[0].id;
        h.workflow.trigger_alarm_manually(id).await;

        let added = h.workflow.add_task(NewTask::default()).await;
        let changes = TaskChanges {
            label: Some("Glass of water".into()),
            ..Default::default()
        };
        assert_eq!(h.workflow.update_task(id, &changes).await.unwrap().label, "Glass of water");
        assert!(h.workflow.delete_task(added.id).await);
        assert!(!h.workflow.delete_task(added.id).await);

        let snap = h.workflow.snapshot().await;
        assert_eq!(snap.active_alarm.unwrap().task.unwrap().label, "Glass of water");

        // Deleting the alarming task leaves a dangling session that can still be cancelled.
        h.workflow.delete_task(id).await;
        assert_eq!(
            h.workflow.submit_photo(Bytes::from_static(b"jpeg"), "image/jpeg").await,
            PhotoOutcome::ProcessingError
        );
        assert!(h.workflow.cancel_alarm().await);
        assert!(h.channel.messages().is_empty());
    }

    /// Holds every verification until released.
    struct GatedVision {
        gate: Notify,
    }

    #[async_trait]
    impl VisionService for GatedVision {
        async fn judge_photo(&self, _image: &[u8], _mime: &str, _instruction: &str) -> PortResult<String> {
            self.gate.notified().await;
            Ok(WATER_OK.to_string())
        }
    }

    #[tokio::test]
    async fn in_flight_verification_blocks_resubmission_and_cancel() {
        let mut registry = TaskRegistry::new();
        registry.add(ActivityTask::new(ActivityType::Water, "Drink water", "10:30".parse().unwrap()));
        let vision = Arc::new(GatedVision { gate: Notify::new() });
        let clock = Arc::new(ManualClock::at(14, 10, 30));
        let ports = WorkflowPorts {
            vision: vision.clone(),
            channel: Arc::new(RecordingChannel::default()),
            signal: Arc::new(RecordingSignal::default()),
            clock: clock.clone(),
        };
        let workflow = Arc::new(CareWorkflow::new(ports, registry, profile(), WorkflowSettings::default()));
        workflow.tick().await;

        let submitting = {
            let workflow = workflow.clone();
            tokio::spawn(async move { workflow.submit_photo(Bytes::from_static(b"jpeg"), "image/jpeg").await })
        };
        while !workflow.snapshot().await.is_verifying {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            workflow.submit_photo(Bytes::from_static(b"again"), "image/jpeg").await,
            PhotoOutcome::Busy
        );
        assert_eq!(
            workflow.snapshot().await.notice.map(|n| n.message),
            Some(BUSY_NOTICE.to_string())
        );
        assert!(!workflow.cancel_alarm().await);
        // The scheduler keeps polling while the photo is out for verification.
        clock.set(ts(14, 10, 31, 0));
        assert_eq!(workflow.tick().await, None);

        vision.gate.notify_one();
        let outcome = submitting.await.unwrap();
        assert!(matches!(outcome, PhotoOutcome::Verified { .. }));
    }
}
