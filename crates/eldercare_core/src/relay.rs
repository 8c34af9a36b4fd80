//! crates/eldercare_core/src/relay.rs
//!
//! Composes confirmation messages for the family contact and hands them to
//! the outbound `NotificationChannel`.

use crate::domain::{ActivityTask, CareProfile};
use crate::ports::NotificationChannel;
use chrono::NaiveDateTime;
use std::sync::Arc;
use tracing::{info, warn};

/// The reason text sent when the user cancels an alarm instead of proving it.
pub const CANCELLATION_REASON: &str = "⚠️ The user cancelled the alarm manually.";

/// Completion message for a verified task.
pub fn completion_message(
    profile: &CareProfile,
    task: &ActivityTask,
    at: NaiveDateTime,
    reason: &str,
) -> String {
    format!(
        "✅ ElderCare Guard: {} has completed the activity \"{}\" at {}. Photo verified by AI: \"{}\".",
        profile.user_name,
        task.label,
        at.format("%H:%M"),
        reason
    )
}

/// Warning sent when an alarm is cancelled without proof.
pub fn cancellation_message(profile: &CareProfile, task: &ActivityTask, at: NaiveDateTime) -> String {
    format!(
        "ElderCare Guard: the alarm for \"{}\" was stopped at {} without confirmation from {}. {}",
        task.label,
        at.format("%H:%M"),
        profile.user_name,
        CANCELLATION_REASON
    )
}

#[derive(Clone)]
pub struct NotificationRelay {
    channel: Arc<dyn NotificationChannel>,
}

impl NotificationRelay {
    pub fn new(channel: Arc<dyn NotificationChannel>) -> Self {
        Self { channel }
    }

    /// Sends `message` to the profile's contact. Returns whether the channel
    /// acknowledged it; a failure is logged, never raised.
    pub async fn notify(&self, profile: &CareProfile, task: &ActivityTask, message: &str) -> bool {
        match self.channel.deliver(&profile.contact.phone, message).await {
            Ok(()) => {
                info!(task_id = %task.id, recipient = %profile.contact.phone, "Family contact notified.");
                true
            }
            Err(e) => {
                warn!(task_id = %task.id, "Failed to notify family contact: {}", e);
                false
            }
        }
    }
}
