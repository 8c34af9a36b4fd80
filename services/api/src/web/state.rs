//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use eldercare_core::workflow::CareWorkflow;
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Handlers)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<CareWorkflow>,
    pub config: Arc<Config>,
}
