//! # Recovery watchdog for critical units.
//!
//! Opt-in (`watchdog.enabled`). Every `interval` it looks at the critical
//! units and restarts the ones found FAILED:
//!
//! ```text
//! tick ──► critical unit FAILED? ──► attempts < max? ──► due (backoff elapsed)? ──► restart
//!                                        │                                          ├─ ok  ──► service_recovered, reset
//!                                        └─ no ──► service_recovery_failed (once)    └─ err ──► attempt += 1, next = now + backoff(attempt)
//! ```
//!
//! A unit seen RUNNING has its attempt counter reset. The task exits when its
//! token is cancelled (`stop_all`, orchestrator drop).

use std::collections::HashMap;
use std::sync::Weak;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::WatchdogConfig;
use crate::events::kinds;
use crate::lifecycle::UnitStatus;

use super::orchestrator::Orchestrator;

struct Attempts {
    count: u32,
    not_before: Instant,
    gave_up: bool,
}

struct Recovery {
    cfg: WatchdogConfig,
    units: HashMap<String, Attempts>,
}

pub(crate) fn spawn(
    orch: Weak<Orchestrator>,
    cfg: WatchdogConfig,
    token: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cfg.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?cfg.interval, max_attempts = cfg.max_attempts, "watchdog started");

        let mut recovery = Recovery {
            cfg,
            units: HashMap::new(),
        };
        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let Some(orch) = orch.upgrade() else {
                break;
            };
            recovery.scan(&orch).await;
        }
        debug!("watchdog stopped");
    })
}

impl Recovery {
    async fn scan(&mut self, orch: &Orchestrator) {
        for (name, status) in orch.critical_statuses() {
            match status {
                UnitStatus::Running => {
                    self.units.remove(&name);
                }
                UnitStatus::Failed => self.recover(orch, &name).await,
                _ => {}
            }
        }
    }

    async fn recover(&mut self, orch: &Orchestrator, name: &str) {
        let now = Instant::now();
        let max_attempts = self.cfg.max_attempts;
        let state = self.units.entry(name.to_string()).or_insert(Attempts {
            count: 0,
            not_before: now,
            gave_up: false,
        });
        if state.gave_up || now < state.not_before {
            return;
        }
        if state.count >= max_attempts {
            state.gave_up = true;
            error!(unit = name, attempts = state.count, "giving up on critical unit");
            orch.emit(kinds::SERVICE_RECOVERY_FAILED, name);
            return;
        }

        let attempt = state.count;
        warn!(unit = name, attempt = attempt + 1, "restarting failed critical unit");
        match orch.restart(name).await {
            Ok(()) => {
                self.units.remove(name);
                info!(unit = name, "critical unit recovered");
                orch.emit(kinds::SERVICE_RECOVERED, name);
            }
            Err(err) => {
                let delay = self.cfg.backoff.next(attempt);
                if let Some(state) = self.units.get_mut(name) {
                    state.count = attempt + 1;
                    state.not_before = Instant::now() + delay;
                }
                warn!(unit = name, error = %err, retry_in = ?delay, "recovery attempt failed");
            }
        }
    }
}
