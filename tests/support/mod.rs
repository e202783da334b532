//! Shared unit doubles for the integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use parking_lot::Mutex;
use servicevisor::{Unit, UnitContext, UnitError, UnitSnapshot};

/// Ordered record of lifecycle calls, shared between units ("db.start", ...).
pub type CallLog = Arc<Mutex<Vec<String>>>;

pub fn call_log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// Position of `entry` in the log.
pub fn position(log: &CallLog, entry: &str) -> Option<usize> {
    log.lock().iter().position(|e| e == entry)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Initialize,
    Start,
    Stop,
}

/// Unit that records its calls and fails or panics on demand.
pub struct Recorder {
    name: String,
    log: CallLog,
    fail_on: Mutex<Option<Step>>,
    panic_on: Option<Step>,
    running: AtomicBool,
    pub starts: AtomicUsize,
}

impl Recorder {
    pub fn new(name: &str, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
            fail_on: Mutex::new(None),
            panic_on: None,
            running: AtomicBool::new(false),
            starts: AtomicUsize::new(0),
        }
    }

    pub fn arc(name: &str, log: &CallLog) -> Arc<Self> {
        Arc::new(Self::new(name, log))
    }

    pub fn failing(name: &str, log: &CallLog, step: Step) -> Arc<Self> {
        let unit = Self::new(name, log);
        *unit.fail_on.lock() = Some(step);
        Arc::new(unit)
    }

    pub fn panicking(name: &str, log: &CallLog, step: Step) -> Arc<Self> {
        let mut unit = Self::new(name, log);
        unit.panic_on = Some(step);
        Arc::new(unit)
    }

    /// Stops failing from now on.
    pub fn heal(&self) {
        *self.fail_on.lock() = None;
    }

    fn step(&self, step: Step, label: &str) -> Result<(), UnitError> {
        self.log.lock().push(format!("{}.{label}", self.name));
        if self.panic_on == Some(step) {
            panic!("{} exploded in {label}", self.name);
        }
        if *self.fail_on.lock() == Some(step) {
            return Err(UnitError::fail(format!("{label} refused")));
        }
        Ok(())
    }
}

#[async_trait]
impl Unit for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    async fn initialize(&self, _ctx: &UnitContext) -> Result<(), UnitError> {
        self.step(Step::Initialize, "initialize")
    }

    async fn start(&self, _ctx: &UnitContext) -> Result<(), UnitError> {
        self.step(Step::Start, "start")?;
        self.starts.fetch_add(1, Ordering::SeqCst);
        self.running.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) -> Result<(), UnitError> {
        self.running.store(false, Ordering::SeqCst);
        self.step(Step::Stop, "stop")
    }

    fn snapshot(&self) -> Option<UnitSnapshot> {
        Some(UnitSnapshot {
            running: self.running.load(Ordering::SeqCst),
            started_at: Some(SystemTime::now()),
            last_error: None,
        })
    }
}

/// A different kind of unit, used to provoke registration conflicts.
pub struct Other(pub &'static str);

#[async_trait]
impl Unit for Other {
    fn name(&self) -> &str {
        self.0
    }

    async fn start(&self, _ctx: &UnitContext) -> Result<(), UnitError> {
        Ok(())
    }
}
