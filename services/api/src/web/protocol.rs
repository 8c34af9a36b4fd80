//! services/api/src/web/protocol.rs
//!
//! Defines the WebSocket message protocol between the alarm screen and the
//! API server.

use eldercare_core::workflow::{PhotoOutcome, WorkflowEvent, WorkflowSnapshot};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

//=========================================================================================
// Messages Sent FROM the Client (Alarm Screen) TO the Server
//=========================================================================================
// NOTE: A proof photo may also be sent as a raw Binary frame (JPEG), not as part of
// this enum. It is submitted for the active alarm.
//=========================================================================================

/// Represents the structured text messages a client can send to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Raise the alarm for a specific task right now.
    TriggerAlarm { task_id: Uuid },

    /// Raise the alarm for the first incomplete task.
    TestAlarm,

    /// The user gives up on the active alarm. The family contact is warned.
    CancelAlarm,

    /// A carer silences the active alarm in person. Nobody is messaged.
    DismissAlarm,

    /// The user closed the current toast.
    ClearNotice,
}

//=========================================================================================
// Messages Sent FROM the Server TO the Client
//=========================================================================================

/// Represents the structured text messages the server can send to the client.
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The full state, sent on connect and after the client lags behind.
    Snapshot { state: WorkflowSnapshot },

    /// A single workflow event, forwarded as it happens.
    Event { event: WorkflowEvent },

    /// The verdict for a photo sent as a Binary frame.
    PhotoResult { outcome: PhotoOutcome },

    /// Reports an error to the client, which should display an error message.
    Error { message: String },
}
