//! Shared vocabulary for stratum: build tools, target platforms, private
//! repository credentials, path filtering, and the `stratum.toml` project file.
//!
//! Nothing in this crate touches the network or spawns processes. Types here are
//! consumed by the store, runtime, remote, and core crates.

pub mod config;
pub mod credentials;
pub mod filter;
pub mod tool;

pub use config::{
    parse_config_file, parse_config_str, BuildMode, BuildSection, ConfigError,
    CredentialsSection, LayerSection, ProjectConfig, PublishSection, CONFIG_FILE_NAME,
};
pub use credentials::Credentials;
pub use filter::{is_match, PathFilter};
pub use tool::{Architecture, BuildTool, PythonVersion};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid credentials file: {0}")]
    Credentials(#[from] serde_json::Error),
    #[error("invalid glob pattern '{pattern}': {message}")]
    Pattern { pattern: String, message: String },
    #[error("unknown build tool '{0}' (expected: pip, poetry, uv)")]
    UnknownTool(String),
    #[error("unknown architecture '{0}' (expected: x86_64, arm64)")]
    UnknownArchitecture(String),
    #[error("invalid python version '{0}' (expected MAJOR.MINOR, e.g. 3.12)")]
    InvalidPythonVersion(String),
}
