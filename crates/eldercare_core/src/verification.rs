//! crates/eldercare_core/src/verification.rs
//!
//! Turns a photo and an activity type into a strict, normalized verdict.
//!
//! The client never fails: transport, service and parse errors all collapse
//! into a conservative `verified: false` result. Wrongly confirming that
//! medication or food was taken is worse than asking for another photo.

use crate::domain::{ActivityType, VerificationResult};
use crate::ports::VisionService;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, warn};

pub const DEFAULT_REASON: &str = "No description provided.";
pub const SERVICE_ERROR_REASON: &str = "Error contacting AI service.";

const REPLY_FORMAT_DIRECTIVE: &str = "Check carefully. Respond ONLY in JSON format with the fields \
\"verified\" (boolean), \"reason\" (a short sentence) and \"confidence\" (a number between 0 and 1).";

const STRICTNESS_DIRECTIVE: &str = "Verification must be strict to ensure the safety of an elderly \
person. If the image is ambiguous or the activity is not clearly visible, answer \"verified\": false.";

/// The per-activity question asked about the photo.
pub fn activity_instruction(activity: ActivityType) -> &'static str {
    match activity {
        ActivityType::Pills => "Analyze if this image shows a person taking medication or holding a pill/medicine bottle ready to be consumed.",
        ActivityType::Water => "Analyze if this image shows a person drinking water from a glass, bottle, or holding a water container.",
        ActivityType::Food => "Analyze if this image shows a person eating a meal or a plate of food prepared to be eaten.",
        ActivityType::Exercise => "Analyze if this image shows a person performing light exercises, walking, or wearing sports gear.",
    }
}

/// The full instruction sent alongside the image.
pub fn build_instruction(activity: ActivityType) -> String {
    format!(
        "{}\n{}\n{}",
        activity_instruction(activity),
        REPLY_FORMAT_DIRECTIVE,
        STRICTNESS_DIRECTIVE
    )
}

/// A verdict that counts as "not verified" with the given reason.
pub fn rejected(reason: impl Into<String>) -> VerificationResult {
    VerificationResult {
        verified: false,
        reason: reason.into(),
        confidence: 0.0,
    }
}

/// Parses the model's reply, defaulting any missing field.
///
/// An empty reply is read as `{}`. Only text that is not JSON at all is an error.
pub fn parse_verdict(raw: &str) -> Result<VerificationResult, serde_json::Error> {
    let body = strip_code_fence(raw);
    let value: Value = if body.is_empty() {
        Value::Object(Default::default())
    } else {
        serde_json::from_str(body)?
    };

    let verified = value.get("verified").and_then(Value::as_bool).unwrap_or(false);
    let reason = value
        .get("reason")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .unwrap_or(DEFAULT_REASON)
        .to_string();
    let confidence = value
        .get("confidence")
        .and_then(Value::as_f64)
        .filter(|c| c.is_finite())
        .map(|c| c.clamp(0.0, 1.0))
        .unwrap_or(0.0);

    Ok(VerificationResult {
        verified,
        reason,
        confidence,
    })
}

/// Models sometimes wrap JSON in a ```json fence despite being asked not to.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// The verification client wrapping a `VisionService` port.
#[derive(Clone)]
pub struct VerificationClient {
    vision: Arc<dyn VisionService>,
}

impl VerificationClient {
    pub fn new(vision: Arc<dyn VisionService>) -> Self {
        Self { vision }
    }

    pub async fn verify(&self, image: &[u8], mime_type: &str, activity: ActivityType) -> VerificationResult {
        let instruction = build_instruction(activity);
        let raw = match self.vision.judge_photo(image, mime_type, &instruction).await {
            Ok(raw) => raw,
            Err(e) => {
                error!("AI verification failed: {}", e);
                return rejected(SERVICE_ERROR_REASON);
            }
        };

        match parse_verdict(&raw) {
            Ok(result) => {
                info!(
                    %activity,
                    verified = result.verified,
                    confidence = result.confidence,
                    "Verification verdict received."
                );
                result
            }
            Err(e) => {
                warn!("Unparseable verification reply ({}): {:?}", e, raw);
                rejected(SERVICE_ERROR_REASON)
            }
        }
    }
}
