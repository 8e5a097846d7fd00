//! Step reporting, decoupled from any particular output.
//!
//! The pipeline announces each stage through a [`Reporter`] instead of
//! printing, so the CLI can render progress while tests capture the sequence.

use serde::Serialize;
use std::fmt;
use std::sync::Mutex;
use tracing::info;

/// The four stages of a layer release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Build,
    Package,
    Upload,
    Publish,
}

impl Step {
    pub fn name(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Package => "package",
            Self::Upload => "upload",
            Self::Publish => "publish",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub trait Reporter: Send + Sync {
    /// A stage is starting; `detail` is a one-line summary of what it will do.
    fn step_started(&self, step: Step, detail: &str);

    /// Diagnostic detail within the current stage.
    fn info(&self, message: &str);

    /// A stage ended, successfully or not.
    fn step_finished(&self, step: Step, success: bool);
}

impl<T: Reporter + ?Sized> Reporter for std::sync::Arc<T> {
    fn step_started(&self, step: Step, detail: &str) {
        (**self).step_started(step, detail);
    }
    fn info(&self, message: &str) {
        (**self).info(message);
    }
    fn step_finished(&self, step: Step, success: bool) {
        (**self).step_finished(step, success);
    }
}

/// Forwards everything to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn step_started(&self, step: Step, detail: &str) {
        info!("[{step}] {detail}");
    }
    fn info(&self, message: &str) {
        info!("{message}");
    }
    fn step_finished(&self, step: Step, success: bool) {
        info!("[{step}] {}", if success { "done" } else { "failed" });
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn step_started(&self, _step: Step, _detail: &str) {}
    fn info(&self, _message: &str) {}
    fn step_finished(&self, _step: Step, _success: bool) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Started(Step, String),
    Info(String),
    Finished(Step, bool),
}

/// Records every event for later assertions.
#[derive(Debug, Default)]
pub struct CapturingReporter {
    events: Mutex<Vec<Event>>,
}

impl CapturingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Steps in the order they started.
    pub fn started(&self) -> Vec<Step> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Started(step, _) => Some(step),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl Reporter for CapturingReporter {
    fn step_started(&self, step: Step, detail: &str) {
        self.push(Event::Started(step, detail.to_owned()));
    }
    fn info(&self, message: &str) {
        self.push(Event::Info(message.to_owned()));
    }
    fn step_finished(&self, step: Step, success: bool) {
        self.push(Event::Finished(step, success));
    }
}

/// Run `f` as `step`, reporting start and outcome.
pub(crate) fn run_step<T, E>(
    reporter: &dyn Reporter,
    step: Step,
    detail: &str,
    f: impl FnOnce() -> Result<T, E>,
) -> Result<T, E> {
    reporter.step_started(step, detail);
    let result = f();
    reporter.step_finished(step, result.is_ok());
    result
}
