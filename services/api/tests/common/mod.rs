//! Serves the real router on an ephemeral port, with a scripted vision
//! model and an instant messaging channel.

use async_trait::async_trait;
use eldercare_api_lib::{
    adapters::{SimulatedWhatsAppChannel, SystemClock},
    config::Config,
    web::{self, state::AppState},
};
use eldercare_core::{
    domain::{CareProfile, FamilyContact},
    ports::{AttentionSignal, PortResult, VisionService},
    registry::TaskRegistry,
    workflow::{CareWorkflow, WorkflowPorts, WorkflowSettings},
};
use std::sync::Arc;
use std::time::Duration;

struct FixedVision(&'static str);

#[async_trait]
impl VisionService for FixedVision {
    async fn judge_photo(&self, _image: &[u8], _mime_type: &str, _instruction: &str) -> PortResult<String> {
        Ok(self.0.to_string())
    }
}

struct SilentSignal;

impl AttentionSignal for SilentSignal {
    fn start(&self) {}
    fn stop(&self) {}
}

pub const APPROVES: &str = r#"{"verified": true, "reason": "Pill in hand.", "confidence": 0.95}"#;
pub const REJECTS: &str = r#"{"verified": false, "reason": "The image is blurry", "confidence": 0.2}"#;

/// Serves the app and returns its base URL.
pub async fn spawn_app(vision_reply: &'static str) -> String {
    let config = Config::from_lookup(|key: &str| match key {
        "GEMINI_API_KEY" => Some("test-key".to_string()),
        "BIND_ADDRESS" => Some("127.0.0.1:0".to_string()),
        _ => None,
    })
    .unwrap();

    let ports = WorkflowPorts {
        vision: Arc::new(FixedVision(vision_reply)),
        channel: Arc::new(SimulatedWhatsAppChannel::new(Duration::ZERO)),
        signal: Arc::new(SilentSignal),
        clock: Arc::new(SystemClock),
    };
    let profile = CareProfile {
        user_name: config.elder_name.clone(),
        contact: FamilyContact {
            name: config.contact_name.clone(),
            phone: config.contact_phone.clone(),
        },
    };
    let workflow = Arc::new(CareWorkflow::new(
        ports,
        TaskRegistry::seeded(),
        profile,
        WorkflowSettings::default(),
    ));
    let app_state = Arc::new(AppState {
        workflow,
        config: Arc::new(config),
    });
    let app = web::router(app_state).unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await });
    format!("http://{}", addr)
}
