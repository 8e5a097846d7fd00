use crate::tool::BuildTool;
use crate::SchemaError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Authentication for a private package index.
///
/// Serialized as a flat JSON object so it can be handed to the container-side
/// build script through the bind-mounted staging directory. `Debug` output
/// never contains the password.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub index_name: String,
    pub index_url: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("index_name", &self.index_name)
            .field("index_url", &self.index_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(
        index_name: impl Into<String>,
        index_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            index_name: index_name.into(),
            index_url: index_url.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// Index host and path with the scheme, trailing slash, and trailing
    /// `/simple` removed.
    pub fn normalized_host(&self) -> String {
        let url = self.index_url.trim();
        let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
        let trimmed = without_scheme.trim_end_matches('/');
        trimmed
            .strip_suffix("/simple")
            .unwrap_or(trimmed)
            .trim_end_matches('/')
            .to_owned()
    }

    /// Index URL with embedded basic auth, the form pip understands.
    pub fn pip_index_url(&self) -> String {
        format!(
            "https://{}:{}@{}/simple/",
            self.username,
            self.password,
            self.normalized_host()
        )
    }

    /// Index name in the shape poetry and uv expect inside environment
    /// variable names: upper-case, non-alphanumerics replaced by `_`.
    pub fn env_key_stem(&self) -> String {
        self.index_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() {
                    c.to_ascii_uppercase()
                } else {
                    '_'
                }
            })
            .collect()
    }

    /// Environment variables that authenticate `tool` against the index.
    pub fn env_vars(&self, tool: BuildTool) -> Vec<(String, String)> {
        let stem = self.env_key_stem();
        match tool {
            BuildTool::Pip => vec![("PIP_INDEX_URL".to_owned(), self.pip_index_url())],
            BuildTool::Poetry => vec![
                (
                    format!("POETRY_HTTP_BASIC_{stem}_USERNAME"),
                    self.username.clone(),
                ),
                (
                    format!("POETRY_HTTP_BASIC_{stem}_PASSWORD"),
                    self.password.clone(),
                ),
            ],
            BuildTool::Uv => vec![
                (format!("UV_INDEX_{stem}_USERNAME"), self.username.clone()),
                (format!("UV_INDEX_{stem}_PASSWORD"), self.password.clone()),
            ],
        }
    }

    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write the credentials as JSON. The temp file is created with owner-only
    /// permissions and renamed into place.
    pub fn dump(&self, path: &Path) -> Result<(), SchemaError> {
        let dir = path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        std::fs::create_dir_all(&dir)?;
        let content = serde_json::to_string_pretty(self)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| SchemaError::Io(e.error))?;
        Ok(())
    }
}
