pub mod waf;

use std::collections::BTreeSet;
use std::fmt::Debug;
use std::sync::Arc;

use crate::domain::{Address, Event, Meta, Metrics, Parameter, ParameterView};
use crate::error::Result;

pub use waf::{WafInspector, WafListener, WafOptions, DEFAULT_WAF_TIMEOUT_US};

/// A component evaluating published request data.
///
/// Inspectors are immutable once built and shared across request contexts.
/// Reconfiguration goes through [`Inspector::update`], which returns a new
/// inspector and leaves the receiver untouched.
pub trait Inspector: Send + Sync + Debug {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Addresses this inspector reads.
    fn subscriptions(&self) -> &BTreeSet<Address>;

    /// Create a listener bound to the current engine instance.
    ///
    /// Every call returns an independent listener.
    fn create_listener(&self) -> Box<dyn Listener>;

    /// Build a new inspector from incremental configuration.
    fn update(
        &self,
        config: &Parameter,
        meta: &mut Meta,
        metrics: &mut Metrics,
    ) -> Result<Arc<dyn Inspector>>;
}

/// Per-context evaluation state of one inspector.
pub trait Listener: Send + Debug {
    /// Evaluate the data published so far in the context.
    fn call(&mut self, data: ParameterView<'_>, budget_us: u64) -> Result<Event>;

    /// Merge accumulated diagnostics into the caller's maps.
    fn get_meta_and_metrics(&self, meta: &mut Meta, metrics: &mut Metrics);
}
