//! # Example: Booting a small service graph
//!
//! ```text
//! db ◄── cache ◄── api
//!  ▲               │ "ping" (targeted at cache)
//!  └── jobs        ▼
//! ```
//!
//! `jobs` fails on its first start and is marked critical, so the watchdog
//! brings it back. Press Ctrl-C to shut everything down.
//!
//! Run with `RUST_LOG=servicevisor=debug cargo run --example boot`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use servicevisor::{
    kinds, Config, Event, FactoryFn, HandlerError, HandlerFn, Orchestrator, Unit, UnitContext,
    UnitError, UnitSource,
};
use tracing_subscriber::EnvFilter;

const CONFIG: &str = r#"
[bus]
history_cap = 50

[watchdog]
enabled = true
interval = "500ms"
max_attempts = 3
backoff = { first = "200ms", max = "2s", factor = 2.0, jitter = "equal" }
"#;

/// Service that only logs its lifecycle.
struct Plain(&'static str);

#[async_trait]
impl Unit for Plain {
    fn name(&self) -> &str {
        self.0
    }

    async fn start(&self, ctx: &UnitContext) -> Result<(), UnitError> {
        println!("[{}] started", ctx.name());
        Ok(())
    }

    async fn stop(&self) -> Result<(), UnitError> {
        println!("[{}] stopped", self.0);
        Ok(())
    }
}

/// Answers pings addressed to it.
struct Cache;

#[async_trait]
impl Unit for Cache {
    fn name(&self) -> &str {
        "cache"
    }

    async fn initialize(&self, ctx: &UnitContext) -> Result<(), UnitError> {
        ctx.subscribe(
            "ping",
            HandlerFn::arc("cache.ping", |ev: Arc<Event>| async move {
                println!("[cache] ping from {:?}: {}", ev.source, ev.payload);
                Ok::<(), HandlerError>(())
            }),
        );
        Ok(())
    }

    async fn start(&self, _ctx: &UnitContext) -> Result<(), UnitError> {
        Ok(())
    }
}

/// Pings the cache until asked to stop.
struct Api;

#[async_trait]
impl Unit for Api {
    fn name(&self) -> &str {
        "api"
    }

    async fn start(&self, ctx: &UnitContext) -> Result<(), UnitError> {
        let ctx = ctx.clone();
        tokio::spawn(async move {
            let mut n = 0u64;
            loop {
                tokio::select! {
                    _ = ctx.stop_signal().cancelled() => break,
                    _ = tokio::time::sleep(Duration::from_secs(1)) => {
                        n += 1;
                        ctx.emit("ping", json!({ "n": n }), Some("cache"));
                    }
                }
            }
        });
        Ok(())
    }
}

/// Fails the first time it is started.
struct Jobs {
    flaky: AtomicBool,
}

#[async_trait]
impl Unit for Jobs {
    fn name(&self) -> &str {
        "jobs"
    }

    async fn start(&self, _ctx: &UnitContext) -> Result<(), UnitError> {
        if self.flaky.swap(false, Ordering::SeqCst) {
            return Err(UnitError::fail("queue not reachable yet"));
        }
        println!("[jobs] started");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cfg = Config::from_toml_str(CONFIG)?;
    let orch = Orchestrator::new(cfg);

    orch.register_unit(Arc::new(Plain("db")), &[])?;
    orch.register_factory(
        "cache",
        FactoryFn::arc(|_ctx: &UnitContext| Ok(Cache)),
        &["db"],
    )?;
    orch.register_unit(Arc::new(Api), &["cache"])?;
    orch.register_critical(
        "jobs",
        UnitSource::Instance(Arc::new(Jobs {
            flaky: AtomicBool::new(true),
        })),
        &["db"],
    )?;
    orch.ensure_consistent()?;
    println!("{}", orch.graph().describe());

    orch.event_bus().subscribe(
        kinds::SERVICE_RECOVERED,
        HandlerFn::arc("boot.recovered", |ev: Arc<Event>| async move {
            println!("[boot] recovered {:?}", ev.service_name());
            Ok::<(), HandlerError>(())
        }),
        None,
    );

    let outcome = orch.run_until_signal().await?;
    for report in orch.reports() {
        println!(
            "{:<6} {:<10} last_error={:?}",
            report.name,
            report.status.as_label(),
            report.last_error
        );
    }
    println!("shutdown success: {}", outcome.success);
    Ok(())
}
