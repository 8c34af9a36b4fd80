//! services/api/src/adapters/signal.rs
//!
//! The attention signal for the host terminal: a looping bell that rings
//! until the alarm is resolved.

use eldercare_core::ports::AttentionSignal;
use std::io::Write;
use std::sync::Mutex;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub struct TerminalBellSignal {
    period: Duration,
    ringing: Mutex<Option<CancellationToken>>,
}

impl TerminalBellSignal {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            ringing: Mutex::new(None),
        }
    }

    pub fn is_ringing(&self) -> bool {
        self.ringing.lock().map(|g| g.is_some()).unwrap_or(false)
    }
}

impl AttentionSignal for TerminalBellSignal {
    fn start(&self) {
        let Ok(mut ringing) = self.ringing.lock() else {
            error!("Attention signal state poisoned; bell not started.");
            return;
        };
        if ringing.is_some() {
            return;
        }
        let Ok(handle) = Handle::try_current() else {
            warn!("No async runtime available; alarm bell disabled.");
            return;
        };

        let token = CancellationToken::new();
        let child = token.clone();
        let period = self.period;
        handle.spawn(async move {
            info!("Alarm bell ringing.");
            let mut interval = tokio::time::interval(period);
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = interval.tick() => {
                        let mut stderr = std::io::stderr();
                        let _ = stderr.write_all(b"\x07");
                        let _ = stderr.flush();
                    }
                }
            }
            info!("Alarm bell stopped.");
        });
        *ringing = Some(token);
    }

    fn stop(&self) {
        if let Ok(mut ringing) = self.ringing.lock() {
            if let Some(token) = ringing.take() {
                token.cancel();
            }
        }
    }
}
