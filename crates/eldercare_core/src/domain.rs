//! crates/eldercare_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs know nothing about HTTP, the vision provider or the
//! messaging transport; they only derive `Serialize` so the presentation
//! layer can render them.

use bytes::Bytes;
use chrono::{NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Activity Types and Wall-Clock Times
//=========================================================================================

/// The closed set of reminder categories. Drives the verification prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityType {
    Pills,
    Water,
    Food,
    Exercise,
}

impl ActivityType {
    pub const ALL: [ActivityType; 4] = [
        ActivityType::Pills,
        ActivityType::Water,
        ActivityType::Food,
        ActivityType::Exercise,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Pills => "PILLS",
            ActivityType::Water => "WATER",
            ActivityType::Food => "FOOD",
            ActivityType::Exercise => "EXERCISE",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("'{0}' is not a valid HH:MM time of day")]
pub struct TimeOfDayParseError(pub String);

/// A daily wall-clock time with minute resolution and no date component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    pub fn new(hour: u8, minute: u8) -> Result<Self, TimeOfDayParseError> {
        if hour > 23 || minute > 59 {
            return Err(TimeOfDayParseError(format!("{:02}:{:02}", hour, minute)));
        }
        Ok(Self { hour, minute })
    }

    /// Truncates a full timestamp to the minute it falls in.
    pub fn of(now: &NaiveDateTime) -> Self {
        Self::from_time(&now.time())
    }

    pub fn from_time(time: &NaiveTime) -> Self {
        // chrono guarantees hour < 24 and minute < 60.
        Self {
            hour: time.hour() as u8,
            minute: time.minute() as u8,
        }
    }

    pub fn hour(&self) -> u8 {
        self.hour
    }

    pub fn minute(&self) -> u8 {
        self.minute
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = TimeOfDayParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || TimeOfDayParseError(s.to_string());
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
        if !two_digits(h) || !two_digits(m) {
            return Err(invalid());
        }
        let hour = h.parse::<u8>().map_err(|_| invalid())?;
        let minute = m.parse::<u8>().map_err(|_| invalid())?;
        Self::new(hour, minute).map_err(|_| invalid())
    }
}

impl TryFrom<String> for TimeOfDay {
    type Error = TimeOfDayParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeOfDay> for String {
    fn from(value: TimeOfDay) -> Self {
        value.to_string()
    }
}

//=========================================================================================
// Tasks and Evidence
//=========================================================================================

/// The captured proof image attached to a completed task.
///
/// The bytes are reference-counted, so cloning a task never copies the image.
#[derive(Debug, Clone, Serialize)]
pub struct PhotoEvidence {
    pub id: Uuid,
    pub mime_type: String,
    #[serde(skip)]
    pub bytes: Bytes,
    pub captured_at: NaiveDateTime,
}

impl PhotoEvidence {
    pub fn new(bytes: Bytes, mime_type: impl Into<String>, captured_at: NaiveDateTime) -> Self {
        Self {
            id: Uuid::new_v4(),
            mime_type: mime_type.into(),
            bytes,
            captured_at,
        }
    }
}

/// A scheduled daily reminder.
#[derive(Debug, Clone, Serialize)]
pub struct ActivityTask {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub activity: ActivityType,
    pub label: String,
    pub scheduled_time: TimeOfDay,
    pub completed: bool,
    pub photo_evidence: Option<PhotoEvidence>,
    pub verified_at: Option<NaiveDateTime>,
}

impl ActivityTask {
    pub fn new(activity: ActivityType, label: impl Into<String>, scheduled_time: TimeOfDay) -> Self {
        Self {
            id: Uuid::new_v4(),
            activity,
            label: label.into(),
            scheduled_time,
            completed: false,
            photo_evidence: None,
            verified_at: None,
        }
    }

    /// Returns a completed copy of this task carrying its proof.
    pub fn completed_with(&self, evidence: PhotoEvidence, verified_at: NaiveDateTime) -> Self {
        Self {
            completed: true,
            photo_evidence: Some(evidence),
            verified_at: Some(verified_at),
            ..self.clone()
        }
    }

    /// Returns a pending copy of this task with any proof removed.
    pub fn reset(&self) -> Self {
        Self {
            completed: false,
            photo_evidence: None,
            verified_at: None,
            ..self.clone()
        }
    }

    /// `completed` must imply that both proof fields are present.
    pub fn is_consistent(&self) -> bool {
        !self.completed || (self.photo_evidence.is_some() && self.verified_at.is_some())
    }
}

/// The fields needed to create a task.
#[derive(Debug, Clone)]
pub struct NewTask {
    pub activity: ActivityType,
    pub label: String,
    pub scheduled_time: TimeOfDay,
}

impl Default for NewTask {
    fn default() -> Self {
        Self {
            activity: ActivityType::Water,
            label: "New alarm".to_string(),
            scheduled_time: TimeOfDay { hour: 12, minute: 0 },
        }
    }
}

/// Typed partial update of a task's editable fields.
#[derive(Debug, Clone, Default)]
pub struct TaskChanges {
    pub activity: Option<ActivityType>,
    pub label: Option<String>,
    pub scheduled_time: Option<TimeOfDay>,
}

impl TaskChanges {
    pub fn apply_to(&self, task: &ActivityTask) -> ActivityTask {
        ActivityTask {
            activity: self.activity.unwrap_or(task.activity),
            label: self.label.clone().unwrap_or_else(|| task.label.clone()),
            scheduled_time: self.scheduled_time.unwrap_or(task.scheduled_time),
            ..task.clone()
        }
    }
}

//=========================================================================================
// Alarm, Verification and Contact
//=========================================================================================

/// The one alarm currently demanding proof. Refers to its task by id only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlarmSession {
    pub task_id: Uuid,
    pub raised_at: NaiveDateTime,
}

/// The normalized verdict of the external vision service.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct VerificationResult {
    pub verified: bool,
    pub reason: String,
    pub confidence: f64,
}

/// The recipient of completion and cancellation messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FamilyContact {
    pub name: String,
    pub phone: String,
}

/// Application-wide settings: who is being cared for and who gets told.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CareProfile {
    pub user_name: String,
    pub contact: FamilyContact,
}

//=========================================================================================
// User-facing Notices
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    Error,
    Info,
    Whatsapp,
}

/// A transient message for the presentation layer (a toast).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StatusNotice {
    pub kind: NoticeKind,
    pub message: String,
}

impl StatusNotice {
    pub fn new(kind: NoticeKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
