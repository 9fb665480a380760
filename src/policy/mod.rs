//! Ruleset loading and live engine replacement.

pub mod hot_reload;
pub mod loader;

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::info;

use crate::config::EngineSettings;
use crate::dispatch::{Context, Engine};
use crate::domain::{Meta, Metrics, Parameter};
use crate::error::Result;
use crate::inspector::{WafInspector, WafOptions};

pub use hot_reload::RulesetWatcher;
pub use loader::EngineRuleset;

/// The current dispatch engine, replaceable while requests are in flight.
///
/// Readers never block: contexts started before a swap keep the engine and
/// inspector they were created with. Writers are serialized so that two
/// concurrent updates cannot both build from the same base inspector.
pub struct EngineSlot {
    engine: ArcSwap<Engine>,
    inspector: Mutex<Arc<WafInspector>>,
    options: WafOptions,
}

impl EngineSlot {
    /// Create a slot serving the given inspector.
    pub fn new(inspector: WafInspector, options: WafOptions) -> Self {
        let inspector = Arc::new(inspector);
        EngineSlot {
            engine: ArcSwap::new(Arc::new(engine_for(&inspector))),
            inspector: Mutex::new(inspector),
            options,
        }
    }

    /// Load the ruleset named in `settings` and build the first engine.
    pub fn from_settings(
        settings: &EngineSettings,
        meta: &mut Meta,
        metrics: &mut Metrics,
    ) -> Result<Self> {
        let ruleset = EngineRuleset::from_path(&settings.rules_file)?;
        let inspector = WafInspector::from_settings(settings, &ruleset, meta, metrics)?;
        Ok(EngineSlot::new(inspector, WafOptions::from(settings)))
    }

    /// The engine new contexts are created from.
    pub fn engine(&self) -> Arc<Engine> {
        self.engine.load_full()
    }

    /// Start a request context on the current engine.
    pub fn context(&self) -> Context {
        self.engine().context()
    }

    pub fn inspector(&self) -> Arc<WafInspector> {
        Arc::clone(&self.inspector.lock())
    }

    /// Apply a rule data update. On failure the current engine keeps serving.
    pub fn apply_rule_data(
        &self,
        doc: &Parameter,
        meta: &mut Meta,
        metrics: &mut Metrics,
    ) -> Result<()> {
        let mut current = self.inspector.lock();
        let updated = current.with_rule_data(doc, meta, metrics)?;
        self.install(&mut current, updated);
        info!("Rule data updated");
        Ok(())
    }

    /// Replace the whole ruleset. On failure the current engine keeps serving.
    pub fn reload(
        &self,
        ruleset: &EngineRuleset,
        meta: &mut Meta,
        metrics: &mut Metrics,
    ) -> Result<()> {
        let mut current = self.inspector.lock();
        let updated = WafInspector::from_ruleset(ruleset, meta, metrics, self.options.clone())?;
        self.install(&mut current, updated);
        info!(
            rules_version = ruleset.version().unwrap_or("unknown"),
            "Ruleset reloaded"
        );
        Ok(())
    }

    fn install(&self, current: &mut Arc<WafInspector>, updated: WafInspector) {
        let updated = Arc::new(updated);
        self.engine.store(Arc::new(engine_for(&updated)));
        *current = updated;
    }
}

fn engine_for(inspector: &Arc<WafInspector>) -> Engine {
    let mut engine = Engine::new();
    engine.subscribe(inspector.clone());
    engine
}
