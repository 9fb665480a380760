use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::interval;
use tracing::{info, warn};

use crate::domain::{Meta, Metrics};
use crate::error::Result;

use super::loader::EngineRuleset;
use super::EngineSlot;

/// Polls the ruleset file and reloads the engine when its content changes.
pub struct RulesetWatcher {
    slot: Arc<EngineSlot>,
    path: PathBuf,
    check_interval: Duration,
    last_content: Option<String>,
}

impl RulesetWatcher {
    pub fn new(slot: Arc<EngineSlot>, path: impl Into<PathBuf>, check_interval: Duration) -> Self {
        RulesetWatcher {
            slot,
            path: path.into(),
            check_interval,
            last_content: None,
        }
    }

    /// Start watching.
    ///
    /// The receiver is bumped after every successful reload.
    pub fn start(mut self) -> (watch::Receiver<u64>, tokio::task::JoinHandle<()>) {
        // The slot was built from the current content
        self.last_content = fs::read_to_string(&self.path).ok();

        let (tx, rx) = watch::channel(0u64);

        let handle = tokio::spawn(async move {
            let mut interval = interval(self.check_interval);
            let mut reloads = 0u64;

            loop {
                interval.tick().await;

                match self.check_for_updates() {
                    Ok(true) => {
                        reloads += 1;
                        let _ = tx.send(reloads);
                    }
                    Ok(false) => {}
                    Err(e) => warn!(path = %self.path.display(), error = %e, "Ruleset reload failed, keeping current engine"),
                }
            }
        });

        (rx, handle)
    }

    /// Reload if the file changed. A content that fails to load is not
    /// retried until it changes again.
    fn check_for_updates(&mut self) -> Result<bool> {
        let content = fs::read_to_string(&self.path)?;
        if self.last_content.as_deref() == Some(content.as_str()) {
            return Ok(false);
        }
        self.last_content = Some(content);
        let content = self.last_content.as_deref().unwrap_or_default();

        let ruleset = EngineRuleset::from_file_content(&self.path, content)?;
        let mut meta = Meta::new();
        let mut metrics = Metrics::new();
        self.slot.reload(&ruleset, &mut meta, &mut metrics)?;

        info!(
            path = %self.path.display(),
            rules_version = ruleset.version().unwrap_or("unknown"),
            "Ruleset file changed"
        );
        Ok(true)
    }
}
