use crate::process::{ProcessRunner, ProcessSpec};
use crate::RuntimeError;
use std::sync::Mutex;

type Effect = Box<dyn Fn(&ProcessSpec) -> Result<(), RuntimeError> + Send + Sync>;

/// Records every invocation instead of spawning anything.
///
/// Side effects can be attached per program name (for example creating the
/// `site-packages` directory a real `uv sync` would leave behind), and a
/// program can be told to exit non-zero.
pub struct MockRunner {
    calls: Mutex<Vec<ProcessSpec>>,
    effects: Vec<(String, Effect)>,
    failures: Vec<(String, i32)>,
}

impl Default for MockRunner {
    fn default() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            effects: Vec::new(),
            failures: Vec::new(),
        }
    }
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `effect` whenever a process named `program` is invoked.
    #[must_use]
    pub fn on<F>(mut self, program: &str, effect: F) -> Self
    where
        F: Fn(&ProcessSpec) -> Result<(), RuntimeError> + Send + Sync + 'static,
    {
        self.effects.push((program.to_owned(), Box::new(effect)));
        self
    }

    /// Make every invocation of `program` exit with `code`.
    #[must_use]
    pub fn fail_on(mut self, program: &str, code: i32) -> Self {
        self.failures.push((program.to_owned(), code));
        self
    }

    pub fn calls(&self) -> Vec<ProcessSpec> {
        self.calls
            .lock()
            .map(|calls| calls.clone())
            .unwrap_or_default()
    }

    pub fn programs(&self) -> Vec<String> {
        self.calls()
            .iter()
            .map(|c| c.program_name().to_owned())
            .collect()
    }
}

impl ProcessRunner for MockRunner {
    fn run(&self, spec: &ProcessSpec) -> Result<(), RuntimeError> {
        self.calls
            .lock()
            .map_err(|e| RuntimeError::Io(std::io::Error::other(format!("mutex poisoned: {e}"))))?
            .push(spec.clone());

        let name = spec.program_name();
        if let Some((_, code)) = self.failures.iter().find(|(p, _)| p == name) {
            return Err(RuntimeError::ExitStatus {
                command: spec.command_line(),
                code: Some(*code),
            });
        }
        for (program, effect) in &self.effects {
            if program == name {
                effect(spec)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn records_calls_in_order() {
        let runner = MockRunner::new();
        runner.run(&ProcessSpec::new("poetry").arg("install")).unwrap();
        runner.run(&ProcessSpec::new("/usr/bin/docker").arg("run")).unwrap();
        assert_eq!(runner.programs(), vec!["poetry", "docker"]);
        assert_eq!(runner.calls()[0].args, vec!["install"]);
    }

    #[test]
    fn effects_run_for_matching_program_only() {
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let runner = MockRunner::new().on("uv", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        runner.run(&ProcessSpec::new("uv")).unwrap();
        runner.run(&ProcessSpec::new("pip")).unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fail_on_returns_exit_status() {
        let runner = MockRunner::new().fail_on("pip", 1);
        let err = runner.run(&ProcessSpec::new("pip").arg("install")).unwrap_err();
        assert!(matches!(err, RuntimeError::ExitStatus { code: Some(1), .. }));
        assert_eq!(runner.calls().len(), 1);
    }
}
