//! Enumerations that select how a layer is built and for which platform.

use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Dependency tool used to materialize the layer's installed packages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildTool {
    /// `pip install -r requirements.txt -t <dir>`.
    Pip,
    /// `poetry install` against `pyproject.toml` + `poetry.lock`.
    Poetry,
    /// `uv sync` against `pyproject.toml` + `uv.lock`.
    Uv,
}

impl BuildTool {
    pub const ALL: [BuildTool; 3] = [BuildTool::Pip, BuildTool::Poetry, BuildTool::Uv];

    pub fn name(self) -> &'static str {
        match self {
            Self::Pip => "pip",
            Self::Poetry => "poetry",
            Self::Uv => "uv",
        }
    }

    /// The deterministic dependency descriptor compared during change detection.
    pub fn manifest_name(self) -> &'static str {
        match self {
            Self::Pip => "requirements.txt",
            Self::Poetry => "poetry.lock",
            Self::Uv => "uv.lock",
        }
    }

    /// Files copied from the project root into the staging repo before install.
    pub fn staged_files(self) -> &'static [&'static str] {
        match self {
            Self::Pip => &["requirements.txt"],
            Self::Poetry => &["pyproject.toml", "poetry.lock"],
            Self::Uv => &["pyproject.toml", "uv.lock"],
        }
    }

    /// Whether the tool installs into a virtualenv that has to be relocated
    /// afterwards, rather than straight into the layer's `python/` directory.
    pub fn uses_virtualenv(self) -> bool {
        !matches!(self, Self::Pip)
    }
}

impl fmt::Display for BuildTool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BuildTool {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pip" => Ok(Self::Pip),
            "poetry" => Ok(Self::Poetry),
            "uv" => Ok(Self::Uv),
            other => Err(SchemaError::UnknownTool(other.to_owned())),
        }
    }
}

/// Lambda instruction set architecture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Architecture {
    #[default]
    #[serde(rename = "x86_64")]
    X86_64,
    #[serde(rename = "arm64")]
    Arm64,
}

impl Architecture {
    /// Name used by the Lambda API (`compatible_architectures`).
    pub fn lambda_name(self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Arm64 => "arm64",
        }
    }

    /// Container platform string passed to `--platform`.
    pub fn platform(self) -> &'static str {
        match self {
            Self::X86_64 => "linux/amd64",
            Self::Arm64 => "linux/arm64",
        }
    }

    /// Short suffix used in container names.
    pub fn short_name(self) -> &'static str {
        match self {
            Self::X86_64 => "amd64",
            Self::Arm64 => "arm64",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.lambda_name())
    }
}

impl FromStr for Architecture {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "x86_64" | "amd64" => Ok(Self::X86_64),
            "arm64" | "aarch64" => Ok(Self::Arm64),
            other => Err(SchemaError::UnknownArchitecture(other.to_owned())),
        }
    }
}

/// Python `MAJOR.MINOR` version of the target Lambda runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PythonVersion {
    pub major: u8,
    pub minor: u8,
}

impl PythonVersion {
    pub const fn new(major: u8, minor: u8) -> Self {
        Self { major, minor }
    }

    /// Lambda runtime identifier, e.g. `python3.12`.
    pub fn runtime_id(self) -> String {
        format!("python{}.{}", self.major, self.minor)
    }
}

impl Default for PythonVersion {
    fn default() -> Self {
        Self::new(3, 12)
    }
}

impl fmt::Display for PythonVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for PythonVersion {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || SchemaError::InvalidPythonVersion(s.to_owned());
        let trimmed = s.trim().trim_start_matches("python");
        let (major, minor) = trimmed.split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

impl TryFrom<String> for PythonVersion {
    type Error = SchemaError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PythonVersion> for String {
    fn from(value: PythonVersion) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_names_are_distinct_per_tool() {
        assert_eq!(BuildTool::Pip.manifest_name(), "requirements.txt");
        assert_eq!(BuildTool::Poetry.manifest_name(), "poetry.lock");
        assert_eq!(BuildTool::Uv.manifest_name(), "uv.lock");
    }

    #[test]
    fn lock_based_tools_stage_descriptor_and_lock() {
        assert_eq!(BuildTool::Pip.staged_files(), &["requirements.txt"]);
        assert_eq!(
            BuildTool::Poetry.staged_files(),
            &["pyproject.toml", "poetry.lock"]
        );
        assert!(BuildTool::Uv.staged_files().contains(&"uv.lock"));
        assert!(!BuildTool::Pip.uses_virtualenv());
        assert!(BuildTool::Uv.uses_virtualenv());
    }

    #[test]
    fn build_tool_parses_case_insensitively() {
        assert_eq!("UV".parse::<BuildTool>().unwrap(), BuildTool::Uv);
        assert_eq!(" poetry ".parse::<BuildTool>().unwrap(), BuildTool::Poetry);
        assert!("conda".parse::<BuildTool>().is_err());
    }

    #[test]
    fn architecture_maps_to_platform_strings() {
        assert_eq!(Architecture::X86_64.platform(), "linux/amd64");
        assert_eq!(Architecture::Arm64.platform(), "linux/arm64");
        assert_eq!(Architecture::X86_64.short_name(), "amd64");
        assert_eq!("aarch64".parse::<Architecture>().unwrap(), Architecture::Arm64);
    }

    #[test]
    fn python_version_parses_and_renders() {
        let v: PythonVersion = "3.11".parse().unwrap();
        assert_eq!(v, PythonVersion::new(3, 11));
        assert_eq!(v.to_string(), "3.11");
        assert_eq!(v.runtime_id(), "python3.11");
        assert_eq!("python3.9".parse::<PythonVersion>().unwrap().minor, 9);
    }

    #[test]
    fn python_version_rejects_garbage() {
        assert!("3".parse::<PythonVersion>().is_err());
        assert!("three.twelve".parse::<PythonVersion>().is_err());
    }

    #[test]
    fn build_tool_serde_is_lowercase() {
        let json = serde_json::to_string(&BuildTool::Poetry).unwrap();
        assert_eq!(json, "\"poetry\"");
        let arch: Architecture = serde_json::from_str("\"arm64\"").unwrap();
        assert_eq!(arch, Architecture::Arm64);
    }
}
