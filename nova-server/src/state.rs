//! Shared handler state

use nova_core::{AdmissionLimiter, Orchestrator};
use std::sync::Arc;

/// State cloned into every request handler
#[derive(Clone, Debug)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub limiter: AdmissionLimiter,
}

impl AppState {
    pub fn new(orchestrator: Orchestrator, limiter: AdmissionLimiter) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
            limiter,
        }
    }
}
