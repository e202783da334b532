use std::sync::Arc;

use tracing::debug;

use crate::config::Config;
use crate::events::EventBus;

use super::orchestrator::Orchestrator;

/// Builder for an [`Orchestrator`].
pub struct OrchestratorBuilder {
    cfg: Config,
    bus: Option<EventBus>,
}

impl OrchestratorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self { cfg, bus: None }
    }

    /// Uses an existing bus instead of creating one from `cfg.bus`.
    ///
    /// Lets several components share a bus that outlives the orchestrator.
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Builds the orchestrator and starts the bus dispatcher if a tokio
    /// runtime is available (otherwise `start_all` starts it).
    pub fn build(self) -> Arc<Orchestrator> {
        let bus = self.bus.unwrap_or_else(|| EventBus::new(&self.cfg.bus));
        if tokio::runtime::Handle::try_current().is_ok() {
            bus.start();
        }
        debug!(
            watchdog = self.cfg.watchdog.enabled,
            history_cap = self.cfg.bus.history_cap,
            "orchestrator built"
        );
        Orchestrator::new_internal(self.cfg, bus)
    }
}
