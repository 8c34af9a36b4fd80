//! services/api/src/bin/api.rs

use eldercare_api_lib::{
    adapters::{OpenAiVisionAdapter, SimulatedWhatsAppChannel, SystemClock, TerminalBellSignal},
    config::Config,
    error::ApiError,
    web::{self, spawn_scheduler, state::AppState},
};
use eldercare_core::{
    domain::{CareProfile, FamilyContact},
    registry::TaskRegistry,
    workflow::{CareWorkflow, WorkflowPorts, WorkflowSettings},
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// How often the alarm bell repeats while an alarm is ringing.
const BELL_PERIOD: Duration = Duration::from_secs(2);

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Initialize Service Adapters ---
    let vision_client = OpenAiVisionAdapter::client_for(
        &config.vision_api_base,
        &config.gemini_api_key,
        config.vision_timeout,
    )?;
    let ports = WorkflowPorts {
        vision: Arc::new(OpenAiVisionAdapter::new(
            vision_client,
            config.vision_model.clone(),
        )),
        channel: Arc::new(SimulatedWhatsAppChannel::new(config.notify_delay)),
        signal: Arc::new(TerminalBellSignal::new(BELL_PERIOD)),
        clock: Arc::new(SystemClock),
    };

    // --- 3. Build the Workflow ---
    let registry = if config.seed_default_tasks {
        TaskRegistry::seeded()
    } else {
        TaskRegistry::new()
    };
    info!(tasks = registry.len(), "Task registry ready.");
    let profile = CareProfile {
        user_name: config.elder_name.clone(),
        contact: FamilyContact {
            name: config.contact_name.clone(),
            phone: config.contact_phone.clone(),
        },
    };
    let settings = WorkflowSettings {
        daily_reset: config.daily_reset,
    };
    let workflow = Arc::new(CareWorkflow::new(ports, registry, profile, settings));

    // --- 4. Build the Shared AppState & Router ---
    let app_state = Arc::new(AppState {
        workflow: workflow.clone(),
        config: config.clone(),
    });
    let app = web::router(app_state)?;

    // --- 5. Start the Scheduler ---
    let shutdown = CancellationToken::new();
    let scheduler = spawn_scheduler(workflow, config.scheduler_poll, shutdown.clone());

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
            }
            info!("Shutdown signal received.");
        })
        .await?;

    shutdown.cancel();
    scheduler.await?;
    info!("Server stopped.");
    Ok(())
}
