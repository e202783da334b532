//! # Orchestrator: drives units through their lifecycle in dependency order.
//!
//! The [`Orchestrator`] owns the unit registry, the [`DependencyGraph`] and a
//! handle to the [`EventBus`]. It is the only component that changes a unit's
//! [`UnitStatus`].
//!
//! ## High-level flow
//! ```text
//! register(name, source, deps) ──► registry + graph edges
//!
//! start(X):
//!   initialize(X) ──► initialize(dep) for each dep (recursive)
//!                 └─► build from factory (construction lock) ──► Unit::initialize
//!   Starting ──► start(dep) for each dep (recursive) ──► Unit::start ──► Running
//!                                                       └─► publish service_started
//!
//! stop(X):
//!   Stopping ──► stop(dependent) for each dependent (recursive)
//!            └─► cancel X's stop signal ──► Unit::stop ──► Stopped (always)
//!                                         └─► publish service_stopped / service_stop_failed
//!
//! start_all / stop_all:
//!   graph.start_order() / stop_order() ──► start / stop each unit, collect BatchOutcome
//! ```
//!
//! ## Rules
//! - A failure marks the unit FAILED, is stored as its `last_error` and is
//!   returned; it never aborts other branches of the graph.
//! - FAILED is left only through [`restart`](Orchestrator::restart) (or the
//!   opt-in watchdog, which calls it).
//! - Re-entering a unit that is mid-transition returns
//!   [`LifecycleError::InProgress`]; this is also what ends recursion on cycles.
//! - Unit calls run under `catch_unwind`; a panic becomes [`UnitError::Panicked`].
//! - Locks are never held across an `.await`.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use servicevisor::{Config, Orchestrator, Unit, UnitContext, UnitError, UnitStatus};
//!
//! struct Db;
//! struct Api;
//!
//! #[async_trait]
//! impl Unit for Db {
//!     fn name(&self) -> &str { "db" }
//!     async fn start(&self, _ctx: &UnitContext) -> Result<(), UnitError> { Ok(()) }
//! }
//!
//! #[async_trait]
//! impl Unit for Api {
//!     fn name(&self) -> &str { "api" }
//!     async fn start(&self, _ctx: &UnitContext) -> Result<(), UnitError> { Ok(()) }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let orch = Orchestrator::new(Config::default());
//!     orch.register_unit(Arc::new(Db), &[])?;
//!     orch.register_unit(Arc::new(Api), &["db"])?;
//!
//!     let outcome = orch.start_all().await?;
//!     assert!(outcome.success);
//!     assert_eq!(orch.status_of("api"), Some(UnitStatus::Running));
//!
//!     orch.shutdown().await;
//!     assert_eq!(orch.status_of("db"), Some(UnitStatus::Stopped));
//!     Ok(())
//! }
//! ```

use std::collections::BTreeMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant, SystemTime};

use futures::future::BoxFuture;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::core::builder::OrchestratorBuilder;
use crate::core::outcome::{BatchOutcome, ConsistencyReport, UnitReport};
use crate::core::registry::Registry;
use crate::core::{shutdown, watchdog};
use crate::error::{panic_message, LifecycleError, RegistrationError, RuntimeError, UnitError};
use crate::events::{kinds, Event, EventBus};
use crate::graph::DependencyGraph;
use crate::lifecycle::{Unit, UnitContext, UnitFactory, UnitRef, UnitSource, UnitStatus};

/// Registry and lifecycle driver for managed units.
pub struct Orchestrator {
    me: Weak<Orchestrator>,
    cfg: Config,
    bus: EventBus,
    registry: Mutex<Registry>,
    graph: RwLock<DependencyGraph>,
    /// Serializes lazy construction from factories.
    construct_lock: tokio::sync::Mutex<()>,
    /// Parent of every unit's stop signal; replaced after each `stop_all`.
    runtime_token: Mutex<CancellationToken>,
    watchdog: Mutex<Option<JoinHandle<()>>>,
}

impl Orchestrator {
    /// Starts building an orchestrator.
    pub fn builder(cfg: Config) -> OrchestratorBuilder {
        OrchestratorBuilder::new(cfg)
    }

    /// Builds an orchestrator with its own event bus.
    ///
    /// The bus dispatcher is started when called inside a tokio runtime.
    pub fn new(cfg: Config) -> Arc<Self> {
        OrchestratorBuilder::new(cfg).build()
    }

    pub(crate) fn new_internal(cfg: Config, bus: EventBus) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            cfg,
            bus,
            registry: Mutex::new(Registry::default()),
            graph: RwLock::new(DependencyGraph::new()),
            construct_lock: tokio::sync::Mutex::new(()),
            runtime_token: Mutex::new(CancellationToken::new()),
            watchdog: Mutex::new(None),
        })
    }

    // ---------------------------------------------------------------------
    // Registration
    // ---------------------------------------------------------------------

    /// Registers `name` with its dependencies.
    ///
    /// Re-registering the same kind is a no-op (the source is replaced while
    /// the unit was never initialized); another kind is a conflict.
    pub fn register(
        &self,
        name: &str,
        source: UnitSource,
        dependencies: &[&str],
    ) -> Result<(), RegistrationError> {
        self.register_inner(name, source, dependencies, false)
    }

    /// Registers a live instance under [`Unit::name`].
    pub fn register_unit(
        &self,
        unit: UnitRef,
        dependencies: &[&str],
    ) -> Result<(), RegistrationError> {
        let name = unit.name().to_string();
        self.register_inner(&name, UnitSource::Instance(unit), dependencies, false)
    }

    /// Registers a factory; the unit is built on first initialization.
    pub fn register_factory(
        &self,
        name: &str,
        factory: Arc<dyn UnitFactory>,
        dependencies: &[&str],
    ) -> Result<(), RegistrationError> {
        self.register_inner(name, UnitSource::Factory(factory), dependencies, false)
    }

    /// Registers a critical unit: started before the others by `start_all`
    /// and restarted by the watchdog when it is enabled.
    pub fn register_critical(
        &self,
        name: &str,
        source: UnitSource,
        dependencies: &[&str],
    ) -> Result<(), RegistrationError> {
        self.register_inner(name, source, dependencies, true)
    }

    fn register_inner(
        &self,
        name: &str,
        source: UnitSource,
        dependencies: &[&str],
        critical: bool,
    ) -> Result<(), RegistrationError> {
        let kind = source.kind();
        let parent = self.runtime_token.lock().clone();
        self.registry
            .lock()
            .register(name, source, critical, &parent)?;

        let mut graph = self.graph.write();
        graph.add_unit(name);
        for dep in dependencies {
            graph.add_dependency(name, dep);
        }
        debug!(unit = name, kind, ?dependencies, critical, "registered");
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Single-unit lifecycle
    // ---------------------------------------------------------------------

    /// Initializes `name` after its dependencies. Idempotent.
    pub async fn initialize(&self, name: &str) -> Result<(), LifecycleError> {
        self.init_unit(name).await
    }

    /// Starts `name` after its dependencies. Idempotent while running.
    ///
    /// Publishes `service_started` or `service_start_failed`.
    pub async fn start(&self, name: &str) -> Result<(), LifecycleError> {
        self.start_unit(name).await
    }

    /// Stops every (transitive) dependent of `name`, then `name` itself.
    ///
    /// The unit ends STOPPED even when its own `stop` fails; the failure is
    /// still returned and published as `service_stop_failed`.
    pub async fn stop(&self, name: &str) -> Result<(), LifecycleError> {
        self.stop_unit(name).await
    }

    /// `stop` then `start`. The only way out of FAILED.
    ///
    /// Dependents stopped on the way are not started again.
    pub async fn restart(&self, name: &str) -> Result<(), LifecycleError> {
        info!(unit = name, "restarting");
        match self.stop_unit(name).await {
            Ok(()) | Err(LifecycleError::Stop { .. }) => {}
            Err(err) => return Err(err),
        }
        self.start_unit(name).await
    }

    fn init_unit<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), LifecycleError>> {
        async move {
            {
                let mut reg = self.registry.lock();
                let unit = reg.get(name)?;
                match unit.status {
                    UnitStatus::Failed => return Err(failed(name)),
                    status if status.is_transient() => return Err(in_progress(name, status)),
                    _ if unit.initialized => return Ok(()),
                    _ => {}
                }
                reg.transition(name, UnitStatus::Initializing)?;
            }
            debug!(unit = name, "initializing");

            let deps = self.graph.read().dependencies_of(name);
            for dep in &deps {
                if let Err(err) = self.init_unit(dep).await {
                    debug!(unit = name, dependency = %dep, error = %err, "dependency not initialized");
                    return Err(self.fail(name, dependency_failed(name, dep)));
                }
            }

            let ctx = self.context(name)?;
            let unit = match self.materialize(name, &ctx).await {
                Ok(unit) => unit,
                Err(err) => return Err(self.fail(name, err)),
            };
            if let Err(source) = guarded(unit.initialize(&ctx)).await {
                let err = LifecycleError::Initialize {
                    unit: name.to_string(),
                    source,
                };
                return Err(self.fail(name, err));
            }

            {
                let mut reg = self.registry.lock();
                reg.transition(name, UnitStatus::Initialized)?;
                let managed = reg.get_mut(name)?;
                managed.initialized = true;
                managed.last_error = None;
            }
            info!(unit = name, "initialized");
            Ok(())
        }
        .boxed()
    }

    fn start_unit<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), LifecycleError>> {
        async move {
            let status = self.registry.lock().status(name)?;
            match status {
                UnitStatus::Running => return Ok(()),
                UnitStatus::Failed => return Err(failed(name)),
                status if status.is_transient() => return Err(in_progress(name, status)),
                _ => {}
            }

            if let Err(err) = self.init_unit(name).await {
                if self.status_of(name) == Some(UnitStatus::Failed) {
                    self.emit_failure(kinds::SERVICE_START_FAILED, name, &err);
                }
                return Err(err);
            }

            let parent = self.runtime_token.lock().clone();
            {
                let mut reg = self.registry.lock();
                reg.transition(name, UnitStatus::Starting)?;
                let managed = reg.get_mut(name)?;
                if managed.run_token.is_cancelled() {
                    managed.run_token = parent.child_token();
                }
            }
            debug!(unit = name, "starting");

            let deps = self.graph.read().dependencies_of(name);
            for dep in &deps {
                if let Err(err) = self.start_unit(dep).await {
                    debug!(unit = name, dependency = %dep, error = %err, "dependency not running");
                    let err = self.fail(name, dependency_failed(name, dep));
                    self.emit_failure(kinds::SERVICE_START_FAILED, name, &err);
                    return Err(err);
                }
            }

            let ctx = self.context(name)?;
            let unit = self.instance(name)?;
            if let Err(source) = guarded(unit.start(&ctx)).await {
                let err = self.fail(
                    name,
                    LifecycleError::Start {
                        unit: name.to_string(),
                        source,
                    },
                );
                self.emit_failure(kinds::SERVICE_START_FAILED, name, &err);
                return Err(err);
            }

            {
                let mut reg = self.registry.lock();
                reg.transition(name, UnitStatus::Running)?;
                let managed = reg.get_mut(name)?;
                managed.started_at = Some(SystemTime::now());
                managed.running_since = Some(Instant::now());
                managed.last_run = None;
                managed.last_error = None;
            }
            info!(unit = name, "running");
            self.emit(kinds::SERVICE_STARTED, name);
            Ok(())
        }
        .boxed()
    }

    fn stop_unit<'a>(&'a self, name: &'a str) -> BoxFuture<'a, Result<(), LifecycleError>> {
        async move {
            let status = self.registry.lock().status(name)?;
            match status {
                UnitStatus::Stopped | UnitStatus::Uninitialized => return Ok(()),
                status if status.is_transient() => return Err(in_progress(name, status)),
                _ => {}
            }
            self.registry.lock().transition(name, UnitStatus::Stopping)?;
            debug!(unit = name, "stopping");

            let dependents = self.graph.read().dependents_of(name);
            for dependent in &dependents {
                if !self.registry.lock().contains(dependent) {
                    continue;
                }
                if let Err(err) = self.stop_unit(dependent).await {
                    warn!(unit = name, dependent = %dependent, error = %err, "dependent did not stop cleanly");
                }
            }

            let (instance, token) = {
                let reg = self.registry.lock();
                let managed = reg.get(name)?;
                (managed.instance.clone(), managed.run_token.clone())
            };
            token.cancel();
            let result = match instance {
                Some(unit) => guarded(unit.stop()).await,
                None => Ok(()),
            };
            let result = result.map_err(|source| LifecycleError::Stop {
                unit: name.to_string(),
                source,
            });

            {
                let mut reg = self.registry.lock();
                reg.transition(name, UnitStatus::Stopped)?;
                let managed = reg.get_mut(name)?;
                managed.stopped_at = Some(SystemTime::now());
                managed.end_run();
                if let Err(err) = &result {
                    managed.last_error = Some(err.clone());
                }
            }

            match &result {
                Ok(()) => {
                    info!(unit = name, "stopped");
                    self.emit(kinds::SERVICE_STOPPED, name);
                }
                Err(err) => {
                    warn!(unit = name, error = %err, "stopped with error");
                    self.emit_failure(kinds::SERVICE_STOP_FAILED, name, err);
                }
            }
            result
        }
        .boxed()
    }

    async fn materialize(&self, name: &str, ctx: &UnitContext) -> Result<UnitRef, LifecycleError> {
        if let Some(unit) = self.registry.lock().get(name)?.instance.clone() {
            return Ok(unit);
        }

        let _guard = self.construct_lock.lock().await;
        let source = {
            let reg = self.registry.lock();
            let managed = reg.get(name)?;
            if let Some(unit) = &managed.instance {
                return Ok(unit.clone());
            }
            managed.source.clone()
        };

        let unit = match source {
            UnitSource::Instance(unit) => unit,
            UnitSource::Factory(factory) => {
                let built = std::panic::catch_unwind(AssertUnwindSafe(|| factory.build(ctx)))
                    .unwrap_or_else(|payload| {
                        Err(UnitError::Panicked {
                            info: panic_message(payload.as_ref()),
                        })
                    });
                built.map_err(|source| LifecycleError::Construct {
                    unit: name.to_string(),
                    source,
                })?
            }
        };
        self.registry.lock().get_mut(name)?.instance = Some(unit.clone());
        debug!(unit = name, kind = unit.kind(), "constructed");
        Ok(unit)
    }

    // ---------------------------------------------------------------------
    // Batch operations
    // ---------------------------------------------------------------------

    /// Starts every registered unit in dependency order, critical units first.
    ///
    /// Fails before touching any unit if the graph has a cycle. Individual
    /// failures are collected in the returned [`BatchOutcome`].
    pub async fn start_all(&self) -> Result<BatchOutcome, RegistrationError> {
        self.start_all_inner(None).await
    }

    /// Like [`start_all`](Self::start_all) with a caller-provided order.
    ///
    /// Dependencies are still started first; names that are not registered are skipped.
    pub async fn start_all_with(&self, order: &[&str]) -> Result<BatchOutcome, RegistrationError> {
        let order = order.iter().map(|s| s.to_string()).collect();
        self.start_all_inner(Some(order)).await
    }

    async fn start_all_inner(
        &self,
        order: Option<Vec<String>>,
    ) -> Result<BatchOutcome, RegistrationError> {
        let graph_order = self.graph.read().start_order().map_err(|cycle| {
            error!(%cycle, "refusing to start: dependency cycle");
            RegistrationError::Cycle(cycle)
        })?;
        let order = order.unwrap_or(graph_order);
        self.bus.start();

        let (critical, regular): (Vec<String>, Vec<String>) = {
            let reg = self.registry.lock();
            order
                .into_iter()
                .filter(|name| {
                    let known = reg.contains(name);
                    if !known {
                        warn!(unit = %name, "not registered, skipping");
                    }
                    known
                })
                .partition(|name| reg.get(name).is_ok_and(|u| u.critical))
        };
        info!(units = critical.len() + regular.len(), "starting all units");

        let mut outcome = BatchOutcome::default();
        for name in &critical {
            let result = self.start_unit(name).await;
            if let Err(err) = &result {
                error!(unit = %name, error = %err, "critical unit failed to start");
            }
            outcome.record(name, result);
        }
        for name in &regular {
            let result = self.start_unit(name).await;
            if let Err(err) = &result {
                warn!(unit = %name, error = %err, "unit failed to start");
            }
            outcome.record(name, result);
        }

        self.ensure_watchdog();
        info!(
            success = outcome.success,
            failed = outcome.failures.len(),
            "start_all finished"
        );
        Ok(outcome)
    }

    /// Broadcasts the stop signal, then stops every unit in reverse dependency order.
    ///
    /// With a cycle in the graph, units are stopped in reverse name order instead.
    pub async fn stop_all(&self) -> BatchOutcome {
        self.stop_all_inner(None).await
    }

    /// Like [`stop_all`](Self::stop_all) with a caller-provided order.
    pub async fn stop_all_with(&self, order: &[&str]) -> BatchOutcome {
        let order = order.iter().map(|s| s.to_string()).collect();
        self.stop_all_inner(Some(order)).await
    }

    async fn stop_all_inner(&self, order: Option<Vec<String>>) -> BatchOutcome {
        let previous = std::mem::replace(&mut *self.runtime_token.lock(), CancellationToken::new());
        previous.cancel();

        let watchdog = self.watchdog.lock().take();
        if let Some(handle) = watchdog {
            if let Err(err) = handle.await {
                warn!(error = %err, "watchdog ended abnormally");
            }
        }

        let order = match order {
            Some(order) => order,
            None => self.graph.read().stop_order().unwrap_or_else(|cycle| {
                warn!(%cycle, "dependency cycle, stopping in reverse name order");
                let mut names = self.registry.lock().names();
                names.reverse();
                names
            }),
        };
        info!(units = order.len(), "stopping all units");

        let mut outcome = BatchOutcome::default();
        for name in &order {
            if !self.registry.lock().contains(name) {
                continue;
            }
            let result = self.stop_unit(name).await;
            outcome.record(name, result);
        }
        info!(
            success = outcome.success,
            failed = outcome.failures.len(),
            "stop_all finished"
        );
        outcome
    }

    /// Stops every unit, drains pending events and stops the bus.
    pub async fn shutdown(&self) -> BatchOutcome {
        let outcome = self.stop_all().await;
        self.bus.wait_idle().await;
        self.bus.stop().await;
        outcome
    }

    /// Starts every unit, waits for SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere),
    /// then shuts down.
    ///
    /// Returns the outcome of the shutdown.
    pub async fn run_until_signal(&self) -> Result<BatchOutcome, RuntimeError> {
        let started = self.start_all().await?;
        if !started.success {
            let failed: Vec<&str> = started.failed_units().collect();
            warn!(?failed, "running with failed units");
        }
        shutdown::wait_for_shutdown_signal().await?;
        info!("shutdown signal received");
        Ok(self.shutdown().await)
    }

    // ---------------------------------------------------------------------
    // Accessors
    // ---------------------------------------------------------------------

    /// Current status of a unit.
    pub fn status_of(&self, name: &str) -> Option<UnitStatus> {
        self.registry.lock().status(name).ok()
    }

    /// Last recorded error of a unit.
    pub fn error_of(&self, name: &str) -> Option<LifecycleError> {
        self.registry.lock().get(name).ok()?.last_error.clone()
    }

    /// How long the unit has been RUNNING in its current run.
    ///
    /// Once stopped, the length of the last run (`stopped_at - started_at`).
    /// `None` if the unit never ran or is in any other state.
    pub fn uptime_of(&self, name: &str) -> Option<Duration> {
        self.registry.lock().get(name).ok()?.uptime()
    }

    /// Status of every registered unit.
    pub fn all_statuses(&self) -> BTreeMap<String, UnitStatus> {
        self.registry
            .lock()
            .iter()
            .map(|(name, unit)| (name.clone(), unit.status))
            .collect()
    }

    /// Monitoring view of one unit.
    pub fn report(&self, name: &str) -> Option<UnitReport> {
        let reg = self.registry.lock();
        let unit = reg.get(name).ok()?;
        Some(build_report(name, unit))
    }

    /// Monitoring view of every unit, by name.
    pub fn reports(&self) -> Vec<UnitReport> {
        self.registry
            .lock()
            .iter()
            .map(|(name, unit)| build_report(name, unit))
            .collect()
    }

    /// Materialized instance of a unit (`None` until a factory-backed unit is initialized).
    pub fn unit(&self, name: &str) -> Option<UnitRef> {
        self.registry.lock().get(name).ok()?.instance.clone()
    }

    /// Shared event bus.
    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    /// Snapshot of the dependency graph.
    pub fn graph(&self) -> DependencyGraph {
        self.graph.read().clone()
    }

    /// Configuration the orchestrator was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    // ---------------------------------------------------------------------
    // Diagnostics
    // ---------------------------------------------------------------------

    /// Compares registry and graph and lists every cycle. Findings are logged.
    pub fn check_dependency_consistency(&self) -> ConsistencyReport {
        let graph = self.graph.read().clone();
        let registered: Vec<String> = self.registry.lock().names();

        let mut report = ConsistencyReport::default();
        for name in &registered {
            if !graph.contains(name) {
                warn!(unit = %name, "registered but missing from the dependency graph");
                report.missing_from_graph.insert(name.clone());
            }
        }
        for node in graph.all_units() {
            if !registered.contains(&node) {
                warn!(unit = %node, dependents = ?graph.dependents_of(&node), "dependency is not registered");
                report.unregistered.insert(node);
            }
        }
        report.cycles = graph.detect_cycles();
        for cycle in &report.cycles {
            error!(%cycle, "dependency cycle");
        }
        if report.is_consistent() {
            debug!("dependency graph is consistent\n{}", graph.describe());
        }
        report
    }

    /// Boot check: a cycle is fatal, other findings are only logged.
    pub fn ensure_consistent(&self) -> Result<ConsistencyReport, RegistrationError> {
        let mut report = self.check_dependency_consistency();
        if !report.cycles.is_empty() {
            return Err(RegistrationError::Cycle(report.cycles.remove(0)));
        }
        Ok(report)
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    pub(crate) fn critical_statuses(&self) -> Vec<(String, UnitStatus)> {
        self.registry
            .lock()
            .iter()
            .filter(|(_, unit)| unit.critical)
            .map(|(name, unit)| (name.clone(), unit.status))
            .collect()
    }

    pub(crate) fn emit(&self, event_type: &str, unit: &str) {
        self.bus.publish(Event::lifecycle(event_type, unit, None));
    }

    pub(crate) fn emit_failure(&self, event_type: &str, unit: &str, err: &LifecycleError) {
        let message = err.to_string();
        self.bus
            .publish(Event::lifecycle(event_type, unit, Some(message.as_str())));
    }

    fn fail(&self, name: &str, err: LifecycleError) -> LifecycleError {
        error!(unit = name, label = err.as_label(), error = %err, "unit failed");
        self.registry.lock().fail(name, &err);
        err
    }

    fn context(&self, name: &str) -> Result<UnitContext, LifecycleError> {
        let token = self.registry.lock().get(name)?.run_token.clone();
        Ok(UnitContext::new(name, self.bus.clone(), token))
    }

    fn instance(&self, name: &str) -> Result<UnitRef, LifecycleError> {
        self.registry
            .lock()
            .get(name)?
            .instance
            .clone()
            .ok_or_else(|| failed(name))
    }

    fn ensure_watchdog(&self) {
        if !self.cfg.watchdog.enabled {
            return;
        }
        let mut slot = self.watchdog.lock();
        if slot.as_ref().is_some_and(|h| !h.is_finished()) {
            return;
        }
        let token = self.runtime_token.lock().child_token();
        *slot = Some(watchdog::spawn(
            self.me.clone(),
            self.cfg.watchdog.clone(),
            token,
        ));
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.runtime_token.get_mut().cancel();
    }
}

async fn guarded<F>(fut: F) -> Result<(), UnitError>
where
    F: Future<Output = Result<(), UnitError>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => Err(UnitError::Panicked {
            info: panic_message(payload.as_ref()),
        }),
    }
}

fn build_report(name: &str, unit: &crate::core::registry::ManagedUnit) -> UnitReport {
    UnitReport {
        name: name.to_string(),
        status: unit.status,
        kind: unit.source.kind(),
        critical: unit.critical,
        initialized: unit.initialized,
        started_at: unit.started_at,
        stopped_at: unit.stopped_at,
        uptime: unit.uptime(),
        last_error: unit.last_error.clone(),
        snapshot: unit.instance.as_ref().and_then(|i| i.snapshot()),
    }
}

fn failed(name: &str) -> LifecycleError {
    LifecycleError::Failed {
        unit: name.to_string(),
    }
}

fn in_progress(name: &str, status: UnitStatus) -> LifecycleError {
    LifecycleError::InProgress {
        unit: name.to_string(),
        status,
    }
}

fn dependency_failed(name: &str, dependency: &str) -> LifecycleError {
    LifecycleError::Dependency {
        unit: name.to_string(),
        dependency: dependency.to_string(),
    }
}
