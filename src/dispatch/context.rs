use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

use crate::domain::{Meta, Metrics, Parameter, ParameterView, Verdict};
use crate::error::{Error, Result};
use crate::inspector::Listener;
use crate::observability::TimingGuard;

use super::Engine;

/// State of one request: the batches published so far and one listener per
/// inspector that has been invoked.
#[derive(Debug)]
pub struct Context {
    id: Uuid,
    engine: Arc<Engine>,
    batches: Vec<Parameter>,
    listeners: BTreeMap<usize, Box<dyn Listener>>,
}

impl Context {
    pub(super) fn new(engine: Arc<Engine>) -> Self {
        Context {
            id: Uuid::new_v4(),
            engine,
            batches: Vec::new(),
            listeners: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Number of batches published so far.
    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }

    /// Publish a batch of addresses and evaluate it.
    ///
    /// Every inspector subscribed to at least one key of `data` runs once,
    /// seeing all batches published in this context. Inspector failures are
    /// logged and skipped. The most severe verdict is returned, the first
    /// inspector in subscription order winning ties.
    pub fn publish(&mut self, data: Parameter, budget_us: u64) -> Result<Verdict> {
        if !data.is_map() {
            return Err(Error::invalid_object(".", "published data is not a map"));
        }

        let engine = Arc::clone(&self.engine);
        let _timing = TimingGuard::new(&engine.metrics);

        let mut targets = BTreeSet::new();
        for (address, _) in data.entries() {
            debug!(context = %self.id, address = %address, "Pushing address");
            targets.extend(engine.subscribers(address).iter().copied());
        }
        self.batches.push(data);

        let view = ParameterView::layered(&self.batches);
        let mut verdict = Verdict::none();
        for index in targets {
            let inspector = &engine.inspectors[index];
            let listener = self
                .listeners
                .entry(index)
                .or_insert_with(|| inspector.create_listener());

            match listener.call(view, budget_us) {
                Ok(event) => {
                    engine.metrics.record_inspector_call(false, false);
                    verdict = verdict.combine(Verdict::from(event));
                }
                Err(e) => {
                    engine.metrics.record_inspector_call(true, e.is_timeout());
                    error!(
                        context = %self.id,
                        inspector = inspector.name(),
                        error = %e,
                        "Inspector call failed"
                    );
                }
            }
        }

        engine.metrics.record_verdict(verdict.rank);
        Ok(verdict)
    }

    /// Merge the diagnostics of every listener, in subscription order.
    pub fn get_meta_and_metrics(&self, meta: &mut Meta, metrics: &mut Metrics) {
        for listener in self.listeners.values() {
            listener.get_meta_and_metrics(meta, metrics);
        }
    }
}
