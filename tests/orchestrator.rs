mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use servicevisor::{
    kinds, BackoffPolicy, Config, FactoryFn, JitterPolicy, LifecycleError, Orchestrator,
    RegistrationError, Unit, UnitContext, UnitError, UnitSource, UnitStatus, WatchdogConfig,
};
use support::{call_log, position, Other, Recorder, Step};

fn orchestrator() -> Arc<Orchestrator> {
    Orchestrator::new(Config::default())
}

async fn wait_for_status(orch: &Orchestrator, name: &str, status: UnitStatus) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while orch.status_of(name) != Some(status) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("{name} never reached {status}"));
}

#[tokio::test]
async fn failed_initialize_isolates_the_unit_and_its_dependents() {
    let log = call_log();
    let orch = orchestrator();
    orch.register_unit(Recorder::arc("a", &log), &[]).unwrap();
    orch.register_unit(Recorder::failing("b", &log, Step::Initialize), &["a"])
        .unwrap();
    orch.register_unit(Recorder::arc("c", &log), &["b"]).unwrap();

    let outcome = orch.start_all().await.unwrap();

    assert!(!outcome.success);
    assert_eq!(outcome.succeeded("a"), Some(true));
    assert_eq!(outcome.succeeded("b"), Some(false));
    assert_eq!(outcome.succeeded("c"), Some(false));
    assert_eq!(outcome.failed_units().collect::<Vec<_>>(), vec!["b", "c"]);

    assert_eq!(orch.status_of("a"), Some(UnitStatus::Running));
    assert_eq!(orch.status_of("b"), Some(UnitStatus::Failed));
    assert_eq!(orch.status_of("c"), Some(UnitStatus::Failed));
    assert!(matches!(
        orch.error_of("b"),
        Some(LifecycleError::Initialize { .. })
    ));
    let err = orch.error_of("c").unwrap();
    assert_eq!(err.dependency(), Some("b"));
    assert!(position(&log, "c.initialize").is_none());
}

#[tokio::test]
async fn independent_branches_keep_running() {
    let log = call_log();
    let orch = orchestrator();
    orch.register_unit(Recorder::failing("db", &log, Step::Start), &[])
        .unwrap();
    orch.register_unit(Recorder::arc("api", &log), &["db"]).unwrap();
    orch.register_unit(Recorder::arc("metrics", &log), &[]).unwrap();

    let outcome = orch.start_all().await.unwrap();

    assert_eq!(outcome.succeeded("metrics"), Some(true));
    assert_eq!(outcome.succeeded("api"), Some(false));
    assert_eq!(orch.status_of("metrics"), Some(UnitStatus::Running));
    assert!(position(&log, "api.start").is_none());
}

#[tokio::test]
async fn dependencies_run_before_the_unit() {
    let log = call_log();
    let orch = orchestrator();
    // Registered before its dependency on purpose.
    orch.register_unit(Recorder::arc("api", &log), &["db"]).unwrap();
    orch.register_unit(Recorder::arc("db", &log), &[]).unwrap();

    orch.start("api").await.unwrap();

    assert_eq!(orch.status_of("db"), Some(UnitStatus::Running));
    assert_eq!(orch.status_of("api"), Some(UnitStatus::Running));
    assert!(position(&log, "db.initialize") < position(&log, "api.initialize"));
    assert!(position(&log, "db.start") < position(&log, "api.start"));

    // Idempotent while running.
    orch.start("api").await.unwrap();
    assert_eq!(log.lock().iter().filter(|e| *e == "api.start").count(), 1);
}

#[tokio::test]
async fn start_all_follows_dependency_order() {
    let log = call_log();
    let orch = orchestrator();
    orch.register_unit(Recorder::arc("web", &log), &["api"]).unwrap();
    orch.register_unit(Recorder::arc("api", &log), &["db", "cache"])
        .unwrap();
    orch.register_unit(Recorder::arc("cache", &log), &[]).unwrap();
    orch.register_unit(Recorder::arc("db", &log), &[]).unwrap();

    let outcome = orch.start_all().await.unwrap();
    assert!(outcome.success);

    let started = |name: &str| position(&log, &format!("{name}.start")).unwrap();
    assert!(started("db") < started("api"));
    assert!(started("cache") < started("api"));
    assert!(started("api") < started("web"));
}

#[tokio::test]
async fn stopping_a_unit_stops_its_dependents_first() {
    let log = call_log();
    let orch = orchestrator();
    orch.register_unit(Recorder::arc("db", &log), &[]).unwrap();
    orch.register_unit(Recorder::arc("cache", &log), &["db"]).unwrap();
    orch.register_unit(Recorder::arc("api", &log), &["cache"]).unwrap();
    orch.register_unit(Recorder::arc("metrics", &log), &[]).unwrap();
    orch.start_all().await.unwrap();

    orch.stop("db").await.unwrap();

    let stopped = |name: &str| position(&log, &format!("{name}.stop")).unwrap();
    assert!(stopped("api") < stopped("cache"));
    assert!(stopped("cache") < stopped("db"));
    for name in ["db", "cache", "api"] {
        assert_eq!(orch.status_of(name), Some(UnitStatus::Stopped));
    }
    assert_eq!(orch.status_of("metrics"), Some(UnitStatus::Running));
    assert!(orch.report("db").unwrap().stopped_at.is_some());
}

#[tokio::test]
async fn failing_stop_still_ends_stopped() {
    let log = call_log();
    let orch = orchestrator();
    orch.register_unit(Recorder::failing("db", &log, Step::Stop), &[])
        .unwrap();
    orch.start("db").await.unwrap();

    let err = orch.stop("db").await.unwrap_err();
    assert!(matches!(err, LifecycleError::Stop { .. }));
    assert_eq!(orch.status_of("db"), Some(UnitStatus::Stopped));

    orch.event_bus().wait_idle().await;
    let failed = orch
        .event_bus()
        .history(Some(kinds::SERVICE_STOP_FAILED), None);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].service_name(), Some("db"));
    assert!(failed[0].payload.get("error").is_some());
}

#[tokio::test]
async fn restart_moves_started_at_forward() {
    let log = call_log();
    let orch = orchestrator();
    orch.register_unit(Recorder::arc("db", &log), &[]).unwrap();
    orch.start("db").await.unwrap();
    let first = orch.report("db").unwrap().started_at.unwrap();
    assert!(orch.uptime_of("db").is_some());

    tokio::time::sleep(Duration::from_millis(5)).await;
    orch.restart("db").await.unwrap();

    let second = orch.report("db").unwrap().started_at.unwrap();
    assert!(second > first);
    assert_eq!(orch.status_of("db"), Some(UnitStatus::Running));
    // Initialization happens once per instance.
    assert_eq!(
        log.lock().iter().filter(|e| *e == "db.initialize").count(),
        1
    );
}

#[tokio::test]
async fn uptime_is_frozen_after_stop() {
    let log = call_log();
    let orch = orchestrator();
    orch.register_unit(Recorder::arc("db", &log), &[]).unwrap();
    assert_eq!(orch.uptime_of("db"), None);

    orch.start("db").await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    orch.stop("db").await.unwrap();

    let ran = orch.uptime_of("db").expect("stopped unit keeps its last uptime");
    assert!(ran >= Duration::from_millis(20));

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(orch.uptime_of("db"), Some(ran));
    assert_eq!(orch.report("db").unwrap().uptime, Some(ran));

    orch.start("db").await.unwrap();
    assert!(orch.uptime_of("db").unwrap() < ran);
}

#[tokio::test]
async fn failed_units_need_an_explicit_restart() {
    let log = call_log();
    let orch = orchestrator();
    let db = Recorder::failing("db", &log, Step::Start);
    orch.register_unit(db.clone(), &[]).unwrap();

    let err = orch.start("db").await.unwrap_err();
    assert!(matches!(err, LifecycleError::Start { .. }));

    db.heal();
    let err = orch.start("db").await.unwrap_err();
    assert!(matches!(err, LifecycleError::Failed { .. }));
    assert_eq!(orch.status_of("db"), Some(UnitStatus::Failed));

    orch.restart("db").await.unwrap();
    assert_eq!(orch.status_of("db"), Some(UnitStatus::Running));
    assert!(orch.error_of("db").is_none());
}

#[tokio::test]
async fn cycle_aborts_start_all() {
    let log = call_log();
    let orch = orchestrator();
    orch.register_unit(Recorder::arc("a", &log), &["b"]).unwrap();
    orch.register_unit(Recorder::arc("b", &log), &["c"]).unwrap();
    orch.register_unit(Recorder::arc("c", &log), &["a"]).unwrap();

    let err = orch.start_all().await.unwrap_err();
    let RegistrationError::Cycle(cycle) = err else {
        panic!("expected a cycle, got {err:?}");
    };
    assert_eq!(
        cycle.members().into_iter().collect::<Vec<_>>(),
        vec!["a", "b", "c"]
    );
    assert!(log.lock().is_empty());
    assert!(orch
        .all_statuses()
        .values()
        .all(|s| *s == UnitStatus::Uninitialized));
}

#[tokio::test]
async fn cycle_in_single_start_ends_without_recursing_forever() {
    let log = call_log();
    let orch = orchestrator();
    orch.register_unit(Recorder::arc("a", &log), &["b"]).unwrap();
    orch.register_unit(Recorder::arc("b", &log), &["a"]).unwrap();

    assert!(orch.start("a").await.is_err());
    assert_eq!(orch.status_of("a"), Some(UnitStatus::Failed));
}

#[tokio::test]
async fn conflicting_registration_is_rejected() {
    let log = call_log();
    let orch = orchestrator();
    orch.register_unit(Recorder::arc("svc", &log), &[]).unwrap();

    // Same kind again is accepted.
    orch.register_unit(Recorder::arc("svc", &log), &[]).unwrap();

    let err = orch.register_unit(Arc::new(Other("svc")), &[]).unwrap_err();
    assert!(matches!(err, RegistrationError::Conflict { ref name, .. } if name == "svc"));
    assert_eq!(err.as_label(), "registration_conflict");
}

#[tokio::test]
async fn unknown_units_are_reported() {
    let orch = orchestrator();
    let err = orch.start("ghost").await.unwrap_err();
    assert!(matches!(err, LifecycleError::UnknownUnit { .. }));
    assert_eq!(orch.status_of("ghost"), None);
}

#[tokio::test]
async fn factories_build_lazily_and_once() {
    let log = call_log();
    let builds = Arc::new(AtomicUsize::new(0));
    let orch = orchestrator();

    let factory = {
        let log = log.clone();
        let builds = builds.clone();
        FactoryFn::arc(move |ctx: &UnitContext| {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok(Recorder::new(ctx.name(), &log))
        })
    };
    orch.register_factory("cache", factory, &[]).unwrap();
    assert!(orch.unit("cache").is_none());
    assert_eq!(builds.load(Ordering::SeqCst), 0);

    orch.start("cache").await.unwrap();
    assert!(orch.unit("cache").is_some());
    assert_eq!(builds.load(Ordering::SeqCst), 1);

    orch.restart("cache").await.unwrap();
    assert_eq!(builds.load(Ordering::SeqCst), 1);
    assert_eq!(orch.unit("cache").unwrap().name(), "cache");
}

#[tokio::test]
async fn factory_errors_fail_the_unit() {
    let orch = orchestrator();
    let factory = FactoryFn::<Recorder, _>::arc(|_ctx: &UnitContext| {
        Err(UnitError::fatal("no connection string"))
    });
    orch.register_factory("db", factory, &[]).unwrap();

    let err = orch.start("db").await.unwrap_err();
    assert!(matches!(err, LifecycleError::Construct { .. }));
    assert_eq!(orch.status_of("db"), Some(UnitStatus::Failed));
}

#[tokio::test]
async fn panicking_units_are_contained() {
    let log = call_log();
    let orch = orchestrator();
    orch.register_unit(Recorder::panicking("boom", &log, Step::Start), &[])
        .unwrap();
    orch.register_unit(Recorder::arc("calm", &log), &[]).unwrap();

    let outcome = orch.start_all().await.unwrap();

    assert_eq!(outcome.succeeded("calm"), Some(true));
    let err = &outcome.failures["boom"];
    assert!(matches!(
        err,
        LifecycleError::Start {
            source: UnitError::Panicked { .. },
            ..
        }
    ));
    assert_eq!(orch.status_of("boom"), Some(UnitStatus::Failed));
}

#[tokio::test]
async fn lifecycle_events_reach_history_and_subscribers() {
    let log = call_log();
    let orch = orchestrator();
    orch.register_unit(Recorder::arc("db", &log), &[]).unwrap();
    orch.register_unit(Recorder::arc("api", &log), &["db"]).unwrap();
    orch.register_unit(Recorder::failing("jobs", &log, Step::Start), &[])
        .unwrap();

    orch.start_all().await.unwrap();
    orch.event_bus().wait_idle().await;

    let bus = orch.event_bus();
    let started: Vec<_> = bus
        .history(Some(kinds::SERVICE_STARTED), None)
        .iter()
        .map(|ev| ev.service_name().unwrap().to_string())
        .collect();
    assert_eq!(started, vec!["db", "api"]);

    let failed = bus.history(Some(kinds::SERVICE_START_FAILED), None);
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].service_name(), Some("jobs"));
    assert_eq!(failed[0].source.as_deref(), Some(kinds::ORCHESTRATOR));

    orch.shutdown().await;
    let stopped = bus.history(Some(kinds::SERVICE_STOPPED), None);
    assert_eq!(stopped.len(), 3);
    assert!(!bus.is_running());
}

#[tokio::test]
async fn stop_all_reverses_start_order() {
    let log = call_log();
    let orch = orchestrator();
    orch.register_unit(Recorder::arc("db", &log), &[]).unwrap();
    orch.register_unit(Recorder::arc("api", &log), &["db"]).unwrap();
    orch.start_all().await.unwrap();

    let outcome = orch.stop_all().await;
    assert!(outcome.success);
    assert!(position(&log, "api.stop") < position(&log, "db.stop"));

    // Units can be brought back after a full stop.
    let outcome = orch.start_all().await.unwrap();
    assert!(outcome.success);
    assert_eq!(orch.status_of("api"), Some(UnitStatus::Running));
}

#[tokio::test]
async fn stop_signal_reaches_running_units() {
    struct Worker {
        observed: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl Unit for Worker {
        fn name(&self) -> &str {
            "worker"
        }

        async fn start(&self, ctx: &UnitContext) -> Result<(), UnitError> {
            let token = ctx.stop_signal().clone();
            let observed = self.observed.clone();
            tokio::spawn(async move {
                token.cancelled().await;
                observed.fetch_add(1, Ordering::SeqCst);
            });
            Ok(())
        }
    }

    let observed = Arc::new(AtomicUsize::new(0));
    let orch = orchestrator();
    orch.register_unit(
        Arc::new(Worker {
            observed: observed.clone(),
        }),
        &[],
    )
    .unwrap();
    orch.start_all().await.unwrap();
    orch.stop_all().await;

    tokio::time::timeout(Duration::from_secs(1), async {
        while observed.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn critical_units_start_first() {
    let log = call_log();
    let orch = orchestrator();
    orch.register_unit(Recorder::arc("a", &log), &[]).unwrap();
    orch.register_critical("z", UnitSource::Instance(Recorder::arc("z", &log)), &[])
        .unwrap();

    orch.start_all().await.unwrap();

    assert!(position(&log, "z.start") < position(&log, "a.start"));
    assert!(orch.report("z").unwrap().critical);
}

#[tokio::test]
async fn watchdog_recovers_critical_units() {
    let cfg = Config {
        watchdog: WatchdogConfig {
            enabled: true,
            interval: Duration::from_millis(10),
            backoff: BackoffPolicy {
                first: Duration::from_millis(5),
                max: Duration::from_millis(20),
                factor: 2.0,
                jitter: JitterPolicy::None,
            },
            max_attempts: 5,
        },
        ..Config::default()
    };
    let log = call_log();
    let orch = Orchestrator::new(cfg);
    let db = Recorder::failing("db", &log, Step::Start);
    orch.register_critical("db", UnitSource::Instance(db.clone()), &[])
        .unwrap();

    let outcome = orch.start_all().await.unwrap();
    assert_eq!(outcome.succeeded("db"), Some(false));

    db.heal();
    wait_for_status(&orch, "db", UnitStatus::Running).await;

    orch.event_bus().wait_idle().await;
    let recovered = orch
        .event_bus()
        .history(Some(kinds::SERVICE_RECOVERED), None);
    assert_eq!(recovered.len(), 1);
    assert_eq!(recovered[0].service_name(), Some("db"));

    orch.shutdown().await;
}

#[tokio::test]
async fn watchdog_gives_up_after_max_attempts() {
    let cfg = Config {
        watchdog: WatchdogConfig {
            enabled: true,
            interval: Duration::from_millis(5),
            backoff: BackoffPolicy {
                first: Duration::from_millis(1),
                max: Duration::from_millis(2),
                factor: 1.0,
                jitter: JitterPolicy::None,
            },
            max_attempts: 2,
        },
        ..Config::default()
    };
    let log = call_log();
    let orch = Orchestrator::new(cfg);
    orch.register_critical(
        "db",
        UnitSource::Instance(Recorder::failing("db", &log, Step::Start)),
        &[],
    )
    .unwrap();
    orch.start_all().await.unwrap();

    let bus = orch.event_bus().clone();
    tokio::time::timeout(Duration::from_secs(2), async {
        while bus
            .history(Some(kinds::SERVICE_RECOVERY_FAILED), None)
            .is_empty()
        {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();

    // One initial start plus two restarts.
    assert_eq!(log.lock().iter().filter(|e| *e == "db.start").count(), 3);
    assert_eq!(orch.status_of("db"), Some(UnitStatus::Failed));
    orch.shutdown().await;
}

#[tokio::test]
async fn consistency_report_lists_problems() {
    let log = call_log();
    let orch = orchestrator();
    orch.register_unit(Recorder::arc("db", &log), &[]).unwrap();
    orch.register_unit(Recorder::arc("api", &log), &["db", "ghost"])
        .unwrap();

    let report = orch.check_dependency_consistency();
    assert!(!report.is_consistent());
    assert!(report.unregistered.contains("ghost"));
    assert!(report.missing_from_graph.is_empty());
    assert!(report.cycles.is_empty());
    assert!(orch.ensure_consistent().is_ok());

    orch.register_unit(Recorder::arc("x", &log), &["y"]).unwrap();
    orch.register_unit(Recorder::arc("y", &log), &["x"]).unwrap();
    assert!(matches!(
        orch.ensure_consistent(),
        Err(RegistrationError::Cycle(_))
    ));
}

#[tokio::test]
async fn reports_expose_unit_snapshots() {
    let log = call_log();
    let orch = orchestrator();
    orch.register_unit(Recorder::arc("db", &log), &[]).unwrap();
    orch.start("db").await.unwrap();

    let reports = orch.reports();
    assert_eq!(reports.len(), 1);
    let db = &reports[0];
    assert_eq!(db.status, UnitStatus::Running);
    assert!(db.initialized);
    assert!(db.snapshot.as_ref().is_some_and(|s| s.running));
    assert!(db.kind.ends_with("Recorder"));
}
