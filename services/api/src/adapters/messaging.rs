//! services/api/src/adapters/messaging.rs
//!
//! A stand-in for the family messaging transport. It implements the
//! `NotificationChannel` port by logging the message and waiting a fixed
//! delay that mimics a network send.

use async_trait::async_trait;
use eldercare_core::ports::{NotificationChannel, PortError, PortResult};
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

#[derive(Clone, Debug)]
pub struct SimulatedWhatsAppChannel {
    delay: Duration,
}

impl SimulatedWhatsAppChannel {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait]
impl NotificationChannel for SimulatedWhatsAppChannel {
    async fn deliver(&self, recipient: &str, message: &str) -> PortResult<()> {
        if recipient.trim().is_empty() {
            return Err(PortError::Service(
                "No recipient handle configured for the family contact.".to_string(),
            ));
        }
        info!(to = %recipient, "[AUTOMATIC WHATSAPP] {}", message);
        sleep(self.delay).await;
        Ok(())
    }
}
