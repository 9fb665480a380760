//! Publish/subscribe routing of request data to inspectors.

mod context;

use ahash::AHashMap;
use std::sync::Arc;

use crate::domain::Address;
use crate::inspector::Inspector;
use crate::observability::EngineMetrics;

pub use context::Context;

/// Routes published addresses to the inspectors subscribed to them.
///
/// Subscriptions are registered during setup and never change afterwards;
/// an updated inspector goes into a new engine.
#[derive(Debug, Default)]
pub struct Engine {
    /// Inspectors in subscription order
    inspectors: Vec<Arc<dyn Inspector>>,

    /// Address to indices into `inspectors`
    subscriptions: AHashMap<Address, Vec<usize>>,

    metrics: EngineMetrics,
}

impl Engine {
    pub fn new() -> Self {
        Engine::default()
    }

    /// Register an inspector under every address it reads.
    ///
    /// Registering the same inspector twice makes it run twice.
    pub fn subscribe(&mut self, inspector: Arc<dyn Inspector>) {
        let index = self.inspectors.len();
        for address in inspector.subscriptions() {
            self.subscriptions
                .entry(address.clone())
                .or_default()
                .push(index);
        }
        self.inspectors.push(inspector);
    }

    /// Start a request context.
    pub fn context(self: &Arc<Self>) -> Context {
        Context::new(Arc::clone(self))
    }

    pub fn metrics(&self) -> &EngineMetrics {
        &self.metrics
    }

    pub fn inspectors(&self) -> &[Arc<dyn Inspector>] {
        &self.inspectors
    }

    /// Indices of inspectors subscribed to an address.
    fn subscribers(&self, address: &str) -> &[usize] {
        self.subscriptions
            .get(address)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
