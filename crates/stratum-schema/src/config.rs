use crate::tool::{Architecture, BuildTool, PythonVersion};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Conventional project configuration file name, looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "stratum.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("failed to render config: {0}")]
    RenderToml(#[from] toml::ser::Error),
    #[error("layer.name must not be empty")]
    EmptyLayerName,
    #[error("layer.s3_dir must start with s3://, got '{0}'")]
    InvalidS3Dir(String),
    #[error("invalid tag '{0}': keys must not be empty")]
    InvalidTag(String),
}

/// Contents of `stratum.toml`. Every field is optional so the CLI can layer
/// flags on top.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    #[serde(default)]
    pub layer: LayerSection,
    #[serde(default)]
    pub build: BuildSection,
    #[serde(default)]
    pub publish: PublishSection,
    #[serde(default)]
    pub credentials: CredentialsSection,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LayerSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<BuildTool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_dir: Option<String>,
    /// Package names excluded from the archive. `None` means the default set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    #[default]
    Local,
    Container,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct BuildSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<BuildMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub python: Option<PythonVersion>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architecture: Option<Architecture>,
    /// Explicit path to the pip/poetry/uv executable for local builds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_path: Option<PathBuf>,
    /// Container CLI, `docker` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container_runtime: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PublishSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compatible_runtimes: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub compatible_architectures: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license_info: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CredentialsSection {
    /// Path to a credentials JSON file, relative to the config file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl ProjectConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(name) = &self.layer.name {
            if name.trim().is_empty() {
                return Err(ConfigError::EmptyLayerName);
            }
        }
        if let Some(dir) = &self.layer.s3_dir {
            if !dir.starts_with("s3://") {
                return Err(ConfigError::InvalidS3Dir(dir.clone()));
            }
        }
        if let Some((k, v)) = self.layer.tags.iter().find(|(k, _)| k.trim().is_empty()) {
            return Err(ConfigError::InvalidTag(format!("{k}={v}")));
        }
        Ok(())
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }
}

pub fn parse_config_str(input: &str) -> Result<ProjectConfig, ConfigError> {
    let config: ProjectConfig = toml::from_str(input)?;
    config.validate()?;
    Ok(config)
}

pub fn parse_config_file(path: &Path) -> Result<ProjectConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config_str(&content)
}
