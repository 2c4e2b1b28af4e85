//! Shared application state

use crate::registry::AgentRegistry;
use crate::runtime::AgentRunner;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<AgentRegistry>,
    pub runner: Arc<AgentRunner>,
}

impl AppState {
    pub fn new() -> Self {
        let registry = Arc::new(AgentRegistry::new());
        let runner = Arc::new(AgentRunner::new(registry.clone()));
        Self { registry, runner }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
