use crate::StoreError;
use stratum_schema::BuildTool;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Mount point of the project root inside the build container.
pub const CONTAINER_ROOT: &str = "/var/task";
/// Credentials handed to the container, relative to the staging repo.
pub const CREDENTIALS_FILE_NAME: &str = "private-repository-credentials.json";
/// Container entry script, relative to the staging repo.
pub const CONTAINER_SCRIPT_NAME: &str = "build_lambda_layer_in_container.sh";

/// Directory layout for a layer build, derived from the project descriptor.
///
/// ```text
/// <root>/build/lambda/layer/
///     repo/               isolated copies of manifest and lock files
///     artifacts/python/   what ends up at the root of the layer zip
///     layer.zip
/// ```
///
/// Every path is computed from the root; nothing is cached or created until
/// [`mkdirs`](Self::mkdirs) is called.
#[derive(Debug, Clone)]
pub struct ProjectLayout {
    descriptor: PathBuf,
    root: PathBuf,
}

impl ProjectLayout {
    /// Build a layout from the path of the project descriptor (`pyproject.toml`
    /// or `requirements.txt`). The project root is the descriptor's directory.
    pub fn new(descriptor: impl Into<PathBuf>) -> Self {
        let descriptor = descriptor.into();
        let root = match descriptor.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self { descriptor, root }
    }

    #[inline]
    pub fn descriptor(&self) -> &Path {
        &self.descriptor
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Wiped at the start of every build.
    #[inline]
    pub fn build_root(&self) -> PathBuf {
        self.root.join("build").join("lambda").join("layer")
    }

    #[inline]
    pub fn repo_dir(&self) -> PathBuf {
        self.build_root().join("repo")
    }

    #[inline]
    pub fn artifacts_dir(&self) -> PathBuf {
        self.build_root().join("artifacts")
    }

    /// The `python/` directory Lambda expects at the root of a layer.
    #[inline]
    pub fn python_dir(&self) -> PathBuf {
        self.artifacts_dir().join("python")
    }

    #[inline]
    pub fn archive_path(&self) -> PathBuf {
        self.build_root().join("layer.zip")
    }

    #[inline]
    pub fn credentials_file(&self) -> PathBuf {
        self.repo_dir().join(CREDENTIALS_FILE_NAME)
    }

    #[inline]
    pub fn container_script(&self) -> PathBuf {
        self.repo_dir().join(CONTAINER_SCRIPT_NAME)
    }

    #[inline]
    pub fn venv_dir(&self) -> PathBuf {
        self.repo_dir().join(".venv")
    }

    /// Manifest file at the project root used for change detection.
    #[inline]
    pub fn manifest_path(&self, tool: BuildTool) -> PathBuf {
        self.root.join(tool.manifest_name())
    }

    /// Map a local path under the project root to its in-container path.
    pub fn container_path(&self, local: &Path) -> Result<String, StoreError> {
        let relative = local
            .strip_prefix(&self.root)
            .map_err(|_| StoreError::OutsideProject {
                path: local.to_path_buf(),
                root: self.root.clone(),
            })?;
        let mut path = CONTAINER_ROOT.to_owned();
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    path.push('/');
                    path.push_str(&part.to_string_lossy());
                }
                Component::CurDir => {}
                _ => {
                    return Err(StoreError::OutsideProject {
                        path: local.to_path_buf(),
                        root: self.root.clone(),
                    })
                }
            }
        }
        Ok(path)
    }

    /// Files the tool needs at the project root that are absent.
    pub fn missing_inputs(&self, tool: BuildTool) -> Vec<PathBuf> {
        tool.staged_files()
            .iter()
            .map(|name| self.root.join(name))
            .filter(|p| !p.is_file())
            .collect()
    }

    /// Copy the tool's manifest (and lock file) into the staging repo.
    pub fn stage_inputs(&self, tool: BuildTool) -> Result<Vec<PathBuf>, StoreError> {
        let repo = self.repo_dir();
        fs::create_dir_all(&repo)?;
        let mut staged = Vec::new();
        for name in tool.staged_files() {
            let src = self.root.join(name);
            if !src.is_file() {
                return Err(StoreError::MissingInput(src));
            }
            let dst = repo.join(name);
            debug!("copy {} -> {}", src.display(), dst.display());
            fs::copy(&src, &dst)?;
            staged.push(dst);
        }
        Ok(staged)
    }

    /// Whether the build root exists and contains anything.
    pub fn build_root_is_populated(&self) -> Result<bool, StoreError> {
        let dir = self.build_root();
        if !dir.exists() {
            return Ok(false);
        }
        Ok(fs::read_dir(&dir)?.next().is_some())
    }

    /// Remove the build root. No confirmation at this level.
    pub fn clean(&self) -> Result<(), StoreError> {
        let dir = self.build_root();
        if dir.exists() {
            debug!("removing {}", dir.display());
            fs::remove_dir_all(&dir)?;
        }
        Ok(())
    }

    pub fn mkdirs(&self) -> Result<(), StoreError> {
        fs::create_dir_all(self.repo_dir())?;
        fs::create_dir_all(self.python_dir())?;
        Ok(())
    }

    /// Locate `repo/.venv/lib/python*/site-packages` left by poetry or uv.
    pub fn find_venv_site_packages(&self) -> Option<PathBuf> {
        let lib = self.venv_dir().join("lib");
        let pattern = format!(
            "{}/python*/site-packages",
            glob::Pattern::escape(&lib.to_string_lossy())
        );
        let mut found: Vec<PathBuf> = glob::glob(&pattern)
            .ok()?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .collect();
        found.sort();
        found.pop()
    }

    /// Where the installed packages for `tool` are expected after a build.
    pub fn site_packages(&self, tool: BuildTool) -> Result<PathBuf, StoreError> {
        if !tool.uses_virtualenv() {
            return Ok(self.python_dir());
        }
        self.find_venv_site_packages()
            .ok_or_else(|| StoreError::MissingArtifact(self.venv_dir().join("lib")))
    }
}
