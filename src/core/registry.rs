//! # Managed unit registry.
//!
//! Holds one [`ManagedUnit`] per registered name. Only the orchestrator
//! mutates it, always under a short `parking_lot` lock that is never held
//! across an `.await`.
//!
//! ## Rules
//! - Units are never removed; a stopped unit stays registered and can be restarted.
//! - Every status change goes through [`UnitStatus::transition`].
//! - Re-registering a name with the same kind is a no-op, except that the
//!   source is replaced while the unit has never been initialized.

use std::collections::BTreeMap;
use std::time::{Duration, Instant, SystemTime};

use tokio_util::sync::CancellationToken;

use crate::error::{LifecycleError, RegistrationError};
use crate::lifecycle::{UnitRef, UnitSource, UnitStatus};

/// Orchestrator-side record of a unit.
pub(crate) struct ManagedUnit {
    pub(crate) status: UnitStatus,
    pub(crate) source: UnitSource,
    pub(crate) instance: Option<UnitRef>,
    pub(crate) initialized: bool,
    pub(crate) critical: bool,
    pub(crate) last_error: Option<LifecycleError>,
    pub(crate) started_at: Option<SystemTime>,
    pub(crate) running_since: Option<Instant>,
    /// Length of the last completed run, frozen when the unit stopped.
    pub(crate) last_run: Option<Duration>,
    pub(crate) stopped_at: Option<SystemTime>,
    /// Stop signal of the current run; a child of the orchestrator-wide token.
    pub(crate) run_token: CancellationToken,
}

impl ManagedUnit {
    fn new(source: UnitSource, critical: bool, parent: &CancellationToken) -> Self {
        let instance = match &source {
            UnitSource::Instance(unit) => Some(unit.clone()),
            UnitSource::Factory(_) => None,
        };
        Self {
            status: UnitStatus::Uninitialized,
            source,
            instance,
            initialized: false,
            critical,
            last_error: None,
            started_at: None,
            running_since: None,
            last_run: None,
            stopped_at: None,
            run_token: parent.child_token(),
        }
    }

    /// Time since the current run began, or the length of the last run once stopped.
    pub(crate) fn uptime(&self) -> Option<Duration> {
        match self.status {
            UnitStatus::Running => self.running_since.map(|t| t.elapsed()),
            UnitStatus::Stopped => self.last_run,
            _ => None,
        }
    }

    /// Marks the current run as finished and freezes its length.
    pub(crate) fn end_run(&mut self) {
        if let Some(since) = self.running_since.take() {
            self.last_run = Some(since.elapsed());
        }
    }
}

#[derive(Default)]
pub(crate) struct Registry {
    units: BTreeMap<String, ManagedUnit>,
}

impl Registry {
    pub(crate) fn register(
        &mut self,
        name: &str,
        source: UnitSource,
        critical: bool,
        parent: &CancellationToken,
    ) -> Result<(), RegistrationError> {
        if let Some(existing) = self.units.get_mut(name) {
            if existing.source.kind() != source.kind() {
                return Err(RegistrationError::Conflict {
                    name: name.to_string(),
                    existing: existing.source.kind().to_string(),
                    incoming: source.kind().to_string(),
                });
            }
            if existing.status == UnitStatus::Uninitialized && !existing.initialized {
                *existing = ManagedUnit::new(source, critical || existing.critical, parent);
            } else {
                existing.critical |= critical;
            }
            return Ok(());
        }
        self.units
            .insert(name.to_string(), ManagedUnit::new(source, critical, parent));
        Ok(())
    }

    pub(crate) fn get(&self, name: &str) -> Result<&ManagedUnit, LifecycleError> {
        self.units.get(name).ok_or_else(|| unknown(name))
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Result<&mut ManagedUnit, LifecycleError> {
        self.units.get_mut(name).ok_or_else(|| unknown(name))
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    pub(crate) fn status(&self, name: &str) -> Result<UnitStatus, LifecycleError> {
        self.get(name).map(|u| u.status)
    }

    /// Applies a validated transition and returns the new status.
    pub(crate) fn transition(
        &mut self,
        name: &str,
        to: UnitStatus,
    ) -> Result<UnitStatus, LifecycleError> {
        let unit = self.get_mut(name)?;
        unit.status = unit.status.transition(name, to)?;
        Ok(unit.status)
    }

    /// Moves a unit in a transient state to FAILED and records the error.
    pub(crate) fn fail(&mut self, name: &str, err: &LifecycleError) {
        if let Ok(unit) = self.get_mut(name) {
            if let Ok(next) = unit.status.transition(name, UnitStatus::Failed) {
                unit.status = next;
            }
            unit.running_since = None;
            unit.last_error = Some(err.clone());
        }
    }

    pub(crate) fn names(&self) -> Vec<String> {
        self.units.keys().cloned().collect()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&String, &ManagedUnit)> {
        self.units.iter()
    }
}

fn unknown(name: &str) -> LifecycleError {
    LifecycleError::UnknownUnit {
        unit: name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::error::UnitError;
    use crate::lifecycle::{FactoryFn, Unit, UnitContext};

    struct Alpha;
    struct Beta;

    #[async_trait]
    impl Unit for Alpha {
        fn name(&self) -> &str {
            "alpha"
        }
        async fn start(&self, _ctx: &UnitContext) -> Result<(), UnitError> {
            Ok(())
        }
    }

    #[async_trait]
    impl Unit for Beta {
        fn name(&self) -> &str {
            "beta"
        }
        async fn start(&self, _ctx: &UnitContext) -> Result<(), UnitError> {
            Ok(())
        }
    }

    #[test]
    fn conflicting_kind_is_rejected() {
        let token = CancellationToken::new();
        let mut reg = Registry::default();
        reg.register("svc", UnitSource::Instance(Arc::new(Alpha)), false, &token)
            .unwrap();
        let err = reg
            .register("svc", UnitSource::Instance(Arc::new(Beta)), false, &token)
            .unwrap_err();
        assert_eq!(err.as_label(), "registration_conflict");
    }

    #[test]
    fn factory_and_instance_of_same_kind_are_compatible() {
        let token = CancellationToken::new();
        let mut reg = Registry::default();
        reg.register(
            "svc",
            UnitSource::Factory(FactoryFn::arc(|_ctx: &UnitContext| Ok(Alpha))),
            false,
            &token,
        )
        .unwrap();
        assert!(reg.get("svc").unwrap().instance.is_none());

        reg.register("svc", UnitSource::Instance(Arc::new(Alpha)), true, &token)
            .unwrap();
        let unit = reg.get("svc").unwrap();
        assert!(unit.instance.is_some());
        assert!(unit.critical);
    }

    #[test]
    fn transition_is_validated_and_fail_records_error() {
        let token = CancellationToken::new();
        let mut reg = Registry::default();
        reg.register("svc", UnitSource::Instance(Arc::new(Alpha)), false, &token)
            .unwrap();

        assert!(reg.transition("svc", UnitStatus::Running).is_err());
        assert_eq!(
            reg.transition("svc", UnitStatus::Initializing),
            Ok(UnitStatus::Initializing)
        );

        let err = LifecycleError::Failed { unit: "svc".into() };
        reg.fail("svc", &err);
        let unit = reg.get("svc").unwrap();
        assert_eq!(unit.status, UnitStatus::Failed);
        assert_eq!(unit.last_error, Some(err));
        assert!(matches!(
            reg.status("nope"),
            Err(LifecycleError::UnknownUnit { .. })
        ));
    }
}
