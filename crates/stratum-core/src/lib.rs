//! Layer release pipeline for stratum.
//!
//! Ties the schema, store, runtime, and remote crates together into the four
//! stages of a release: build dependencies with pip, poetry, or uv (on the host
//! or in a Lambda build container), package them into a zip, upload it to S3,
//! and publish a new Lambda layer version only when the dependency manifest
//! changed since the last one.

pub mod builder;
pub mod concurrency;
pub mod packager;
pub mod publish;
pub mod reporter;
pub mod upload;
pub mod workflow;

pub use builder::{
    strategy_for, BuildContext, BuildOutput, BuildStrategy, Confirm, ExecutionMode,
    PipStrategy, PoetryStrategy, UvStrategy,
};
pub use concurrency::{install_signal_handler, shutdown_requested};
pub use packager::package_layer;
pub use publish::{ChangeDetector, LayerDeployment, PublicationStatus, Publisher};
pub use reporter::{CapturingReporter, Event, NullReporter, Reporter, Step, TracingReporter};
pub use upload::{upload_layer, FINGERPRINT_METADATA_KEY};
pub use workflow::{BuildSettings, LayerProject, RunReport, Workflow};

use std::path::PathBuf;
use stratum_remote::RemoteError;
use stratum_runtime::RuntimeError;
use stratum_schema::{ConfigError, SchemaError};
use stratum_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    /// Required local input missing or invalid; nothing was modified.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// The user declined to delete an existing build directory.
    #[error("aborted: {} was left untouched", .0.display())]
    DestructiveActionAborted(PathBuf),
    /// An install, sync, or container process failed. The build root is kept
    /// for inspection.
    #[error("build tool failed: {0}")]
    BuildTool(#[from] RuntimeError),
    /// A step expected output from an earlier step that is not there.
    #[error("missing artifact: {}", .0.display())]
    MissingArtifact(PathBuf),
    #[error("remote state error: {0}")]
    RemoteState(String),
    #[error("interrupted")]
    Interrupted,
    #[error("store error: {0}")]
    Store(StoreError),
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::MissingArtifact(path) => Self::MissingArtifact(path),
            StoreError::MissingInput(path) => {
                Self::Configuration(format!("required file not found: {}", path.display()))
            }
            other => Self::Store(other),
        }
    }
}

impl From<ConfigError> for CoreError {
    fn from(e: ConfigError) -> Self {
        Self::Configuration(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_missing_artifact_keeps_its_kind() {
        let e: CoreError = StoreError::MissingArtifact(PathBuf::from("/p/.venv/lib")).into();
        assert!(matches!(e, CoreError::MissingArtifact(_)));
        let e: CoreError = StoreError::MissingInput(PathBuf::from("/p/uv.lock")).into();
        assert!(matches!(e, CoreError::Configuration(_)));
        assert!(e.to_string().starts_with("configuration error:"));
    }

    #[test]
    fn aborted_message_names_directory() {
        let e = CoreError::DestructiveActionAborted(PathBuf::from("/p/build/lambda/layer"));
        assert_eq!(
            e.to_string(),
            "aborted: /p/build/lambda/layer was left untouched"
        );
    }
}
