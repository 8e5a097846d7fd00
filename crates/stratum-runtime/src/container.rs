use crate::process::ProcessSpec;
use std::path::Path;
use stratum_schema::{Architecture, PythonVersion};

/// Default container CLI. Anything docker-compatible (`podman`) also works.
pub const DEFAULT_CONTAINER_RUNTIME: &str = "docker";
/// Mount point of the project root inside the container.
pub const MOUNT_TARGET: &str = "/var/task";

/// A build container matching the Lambda runtime for one Python version and
/// architecture, using the public AWS SAM build images.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSpec {
    pub runtime: String,
    pub python: PythonVersion,
    pub architecture: Architecture,
}

impl ContainerSpec {
    pub fn new(python: PythonVersion, architecture: Architecture) -> Self {
        Self {
            runtime: DEFAULT_CONTAINER_RUNTIME.to_owned(),
            python,
            architecture,
        }
    }

    #[must_use]
    pub fn with_runtime(mut self, runtime: impl Into<String>) -> Self {
        self.runtime = runtime.into();
        self
    }

    pub fn image_uri(&self) -> String {
        format!(
            "public.ecr.aws/sam/build-python{}.{}:latest-{}",
            self.python.major,
            self.python.minor,
            self.architecture.lambda_name()
        )
    }

    pub fn platform(&self) -> &'static str {
        self.architecture.platform()
    }

    /// Stable name, so a second concurrent build for the same target is
    /// rejected by the container runtime instead of racing on the mount.
    pub fn container_name(&self) -> String {
        format!(
            "lambda_layer_builder-python{}{}-{}",
            self.python.major,
            self.python.minor,
            self.architecture.short_name()
        )
    }

    /// `run --rm` invocation mounting `project_root` at `/var/task` and
    /// executing `script` (an in-container path) with bash.
    pub fn run_spec(&self, project_root: &Path, script: &str) -> ProcessSpec {
        ProcessSpec::new(self.runtime.as_str())
            .args(["run", "--rm", "--name"])
            .arg(self.container_name())
            .arg("--platform")
            .arg(self.platform())
            .arg("--mount")
            .arg(format!(
                "type=bind,source={},target={MOUNT_TARGET}",
                project_root.display()
            ))
            .args(["--workdir", MOUNT_TARGET, "--env", "PYTHONUNBUFFERED=1"])
            .arg(self.image_uri())
            .arg("bash")
            .arg(script)
    }
}
