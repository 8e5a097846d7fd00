//! Execution layer for stratum: the opaque external processes a layer build
//! depends on (pip, poetry, uv, and the container CLI).
//!
//! Everything goes through the [`ProcessRunner`] trait so builds can be driven
//! by the real [`SystemRunner`] or by [`MockRunner`] in tests. Each process gets
//! its own explicit environment map; nothing here mutates the parent process
//! environment.

pub mod container;
pub mod mock;
pub mod prereq;
pub mod process;
pub mod scripts;

pub use container::{ContainerSpec, DEFAULT_CONTAINER_RUNTIME, MOUNT_TARGET};
pub use mock::MockRunner;
pub use prereq::{
    check_container_prereqs, check_tool_prereqs, command_exists, format_missing, MissingPrereq,
};
pub use process::{ProcessRunner, ProcessSpec, SystemRunner};
pub use scripts::entry_script;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("runtime I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to start '{program}': {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },
    #[error("command exited with {}: {command}", exit_label(*.code))]
    ExitStatus { command: String, code: Option<i32> },
}

fn exit_label(code: Option<i32>) -> String {
    code.map_or_else(|| "a signal".to_owned(), |c| format!("status {c}"))
}
