//! Build strategies: materialize a layer's installed dependencies.
//!
//! [`BuildStrategy::build`] holds the fixed step sequence shared by every
//! tool; each strategy contributes only its install command. Execution is
//! either on the host or inside a Lambda build container, selected by
//! [`ExecutionMode`].

use crate::reporter::Reporter;
use crate::CoreError;
use std::fs;
use std::path::{Path, PathBuf};
use stratum_runtime::{entry_script, ContainerSpec, ProcessRunner, ProcessSpec};
use stratum_schema::{BuildTool, Credentials};
use stratum_store::ProjectLayout;
use tracing::{debug, info, warn};

/// Answers the "delete existing build directory?" question.
pub trait Confirm {
    fn confirm(&self, prompt: &str) -> bool;
}

impl<F: Fn(&str) -> bool> Confirm for F {
    fn confirm(&self, prompt: &str) -> bool {
        self(prompt)
    }
}

/// Where the install runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionMode {
    /// On the host. `program` overrides the tool binary (defaults to the
    /// tool name on `PATH`).
    Local { program: Option<String> },
    /// Inside a Lambda build image with the project root bind-mounted.
    Container(ContainerSpec),
}

impl Default for ExecutionMode {
    fn default() -> Self {
        Self::Local { program: None }
    }
}

/// Collaborators and inputs for one build.
pub struct BuildContext<'a> {
    pub layout: &'a ProjectLayout,
    pub credentials: Option<&'a Credentials>,
    pub skip_confirmation: bool,
    pub mode: &'a ExecutionMode,
    pub runner: &'a dyn ProcessRunner,
    pub reporter: &'a dyn Reporter,
    pub confirm: &'a dyn Confirm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOutput {
    pub tool: BuildTool,
    /// Directory holding the installed packages, still to be relocated into
    /// `artifacts/python` by the packager.
    pub site_packages: PathBuf,
}

pub trait BuildStrategy {
    fn tool(&self) -> BuildTool;

    /// Host-side install command, run with the staging repo as cwd.
    fn install_spec(&self, layout: &ProjectLayout, program: &str) -> ProcessSpec;

    /// Run the full build. Steps are fixed and safe to repeat:
    /// report, check inputs, reset the build root, then install locally or in
    /// a container. A failing install leaves the build root as it is.
    fn build(&self, ctx: &BuildContext<'_>) -> Result<BuildOutput, CoreError> {
        let tool = self.tool();
        let layout = ctx.layout;
        report_paths(tool, ctx);

        let missing = layout.missing_inputs(tool);
        if !missing.is_empty() {
            return Err(CoreError::Configuration(format!(
                "{tool} needs {} at the project root",
                missing
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }

        prepare_build_root(ctx)?;

        match ctx.mode {
            ExecutionMode::Local { program } => {
                let program = program.as_deref().unwrap_or(tool.name());
                self.install_locally(ctx, program)?;
            }
            ExecutionMode::Container(container) => {
                install_in_container(tool, container, ctx)?;
            }
        }

        let site_packages = layout.site_packages(tool)?;
        info!("{tool} installed into {}", site_packages.display());
        Ok(BuildOutput {
            tool,
            site_packages,
        })
    }

    fn install_locally(&self, ctx: &BuildContext<'_>, program: &str) -> Result<(), CoreError> {
        let tool = self.tool();
        let staged = ctx.layout.stage_inputs(tool)?;
        for path in &staged {
            debug!("staged {}", path.display());
        }
        let mut spec = self.install_spec(ctx.layout, program);
        if let Some(creds) = ctx.credentials {
            ctx.reporter
                .info(&format!("authenticating against index '{}'", creds.index_name));
            spec = spec.envs(creds.env_vars(tool));
        }
        ctx.reporter.info(&format!("running {}", spec.command_line()));
        ctx.runner.run(&spec)?;
        Ok(())
    }
}

fn report_paths(tool: BuildTool, ctx: &BuildContext<'_>) {
    let layout = ctx.layout;
    let mode = match ctx.mode {
        ExecutionMode::Local { .. } => "local".to_owned(),
        ExecutionMode::Container(c) => format!("container {}", c.image_uri()),
    };
    ctx.reporter.info(&format!("tool: {tool} ({mode})"));
    ctx.reporter
        .info(&format!("project root: {}", layout.root().display()));
    ctx.reporter
        .info(&format!("build root: {}", layout.build_root().display()));
}

/// Clear and recreate the build root, asking first if it already has content.
fn prepare_build_root(ctx: &BuildContext<'_>) -> Result<(), CoreError> {
    let layout = ctx.layout;
    let build_root = layout.build_root();
    if layout.build_root_is_populated()? && !ctx.skip_confirmation {
        let prompt = format!("remove existing build directory {}?", build_root.display());
        if !ctx.confirm.confirm(&prompt) {
            return Err(CoreError::DestructiveActionAborted(build_root));
        }
    }
    layout.clean()?;
    layout.mkdirs()?;
    Ok(())
}

/// Removes the credentials file when dropped, whether the container
/// succeeded or not.
struct CredentialsFileGuard(PathBuf);

impl Drop for CredentialsFileGuard {
    fn drop(&mut self) {
        if self.0.exists() {
            if let Err(e) = fs::remove_file(&self.0) {
                warn!("failed to remove {}: {e}", self.0.display());
            }
        }
    }
}

fn write_entry_script(tool: BuildTool, path: &Path) -> Result<(), CoreError> {
    fs::write(path, entry_script(tool))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}

fn install_in_container(
    tool: BuildTool,
    container: &ContainerSpec,
    ctx: &BuildContext<'_>,
) -> Result<(), CoreError> {
    let layout = ctx.layout;
    let script = layout.container_script();
    write_entry_script(tool, &script)?;
    debug!("wrote {}", script.display());

    let _guard = match ctx.credentials {
        Some(creds) => {
            let path = layout.credentials_file();
            creds.dump(&path)?;
            ctx.reporter
                .info(&format!("credentials for '{}' handed to container", creds.index_name));
            Some(CredentialsFileGuard(path))
        }
        None => None,
    };

    let spec = container.run_spec(layout.root(), &layout.container_path(&script)?);
    ctx.reporter.info(&format!("running {}", spec.command_line()));
    ctx.runner.run(&spec)?;
    Ok(())
}

/// `pip install -r requirements.txt -t ../artifacts/python`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PipStrategy;

impl BuildStrategy for PipStrategy {
    fn tool(&self) -> BuildTool {
        BuildTool::Pip
    }

    fn install_spec(&self, layout: &ProjectLayout, program: &str) -> ProcessSpec {
        // Relative to the staging repo, so it holds for relative roots too.
        let target = Path::new("..").join("artifacts").join("python");
        ProcessSpec::new(program)
            .args(["install", "-r", BuildTool::Pip.manifest_name(), "-t"])
            .arg(target.to_string_lossy())
            .current_dir(layout.repo_dir())
    }
}

/// `poetry install --no-root` into an in-project virtualenv.
#[derive(Debug, Default, Clone, Copy)]
pub struct PoetryStrategy;

impl BuildStrategy for PoetryStrategy {
    fn tool(&self) -> BuildTool {
        BuildTool::Poetry
    }

    fn install_spec(&self, layout: &ProjectLayout, program: &str) -> ProcessSpec {
        ProcessSpec::new(program)
            .args(["install", "--no-root"])
            .env("POETRY_VIRTUALENVS_IN_PROJECT", "true")
            .current_dir(layout.repo_dir())
    }
}

/// `uv sync` of the locked, non-dev dependencies.
#[derive(Debug, Default, Clone, Copy)]
pub struct UvStrategy;

impl BuildStrategy for UvStrategy {
    fn tool(&self) -> BuildTool {
        BuildTool::Uv
    }

    fn install_spec(&self, layout: &ProjectLayout, program: &str) -> ProcessSpec {
        ProcessSpec::new(program)
            .args(["sync", "--frozen", "--no-dev", "--no-install-project"])
            .current_dir(layout.repo_dir())
    }
}

pub fn strategy_for(tool: BuildTool) -> &'static dyn BuildStrategy {
    match tool {
        BuildTool::Pip => &PipStrategy,
        BuildTool::Poetry => &PoetryStrategy,
        BuildTool::Uv => &UvStrategy,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::NullReporter;
    use stratum_runtime::{MockRunner, RuntimeError};
    use stratum_schema::{Architecture, PythonVersion};

    fn yes(_: &str) -> bool {
        true
    }

    fn no(_: &str) -> bool {
        false
    }

    fn project(files: &[(&str, &str)]) -> (tempfile::TempDir, ProjectLayout) {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            fs::write(dir.path().join(name), content).unwrap();
        }
        let layout = ProjectLayout::new(dir.path().join("pyproject.toml"));
        (dir, layout)
    }

    fn ctx<'a>(
        layout: &'a ProjectLayout,
        mode: &'a ExecutionMode,
        runner: &'a MockRunner,
        confirm: &'a dyn Confirm,
        credentials: Option<&'a Credentials>,
    ) -> BuildContext<'a> {
        BuildContext {
            layout,
            credentials,
            skip_confirmation: false,
            mode,
            runner,
            reporter: &NullReporter,
            confirm,
        }
    }

    fn fake_venv(spec: &ProcessSpec) -> Result<(), RuntimeError> {
        let repo = spec.cwd.clone().unwrap();
        let sp = repo.join(".venv/lib/python3.12/site-packages/attrs");
        fs::create_dir_all(&sp)?;
        fs::write(sp.join("__init__.py"), "")?;
        Ok(())
    }

    #[test]
    fn pip_local_build_installs_into_python_dir() {
        let (_dir, layout) = project(&[("requirements.txt", "requests==2.32.3\n")]);
        let runner = MockRunner::new();
        let mode = ExecutionMode::default();
        let out = PipStrategy
            .build(&ctx(&layout, &mode, &runner, &yes, None))
            .unwrap();

        assert_eq!(out.site_packages, layout.python_dir());
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].command_line(),
            "pip install -r requirements.txt -t ../artifacts/python"
        );
        assert_eq!(calls[0].cwd, Some(layout.repo_dir()));
        assert!(layout.repo_dir().join("requirements.txt").is_file());
        assert!(calls[0].env.is_empty());
    }

    #[test]
    fn credentials_reach_the_process_env_only() {
        let (_dir, layout) = project(&[("pyproject.toml", "[project]\n"), ("uv.lock", "v\n")]);
        let creds = Credentials::new("my-repo", "https://pkgs.example.com/simple/", "aws", "tok");
        let runner = MockRunner::new().on("uv", fake_venv);
        let mode = ExecutionMode::Local {
            program: Some("/opt/bin/uv".to_owned()),
        };
        UvStrategy
            .build(&ctx(&layout, &mode, &runner, &yes, Some(&creds)))
            .unwrap();

        let call = &runner.calls()[0];
        assert_eq!(call.program, "/opt/bin/uv");
        assert_eq!(
            call.env.get("UV_INDEX_MY_REPO_PASSWORD").map(String::as_str),
            Some("tok")
        );
        assert!(!call.args.iter().any(|a| a.contains("tok")));
        assert!(std::env::var("UV_INDEX_MY_REPO_PASSWORD").is_err());
    }

    #[test]
    fn poetry_build_finds_venv_site_packages() {
        let (_dir, layout) =
            project(&[("pyproject.toml", "[project]\n"), ("poetry.lock", "# lock\n")]);
        let runner = MockRunner::new().on("poetry", fake_venv);
        let mode = ExecutionMode::default();
        let out = PoetryStrategy
            .build(&ctx(&layout, &mode, &runner, &yes, None))
            .unwrap();
        assert!(out.site_packages.ends_with("site-packages"));
        assert_eq!(
            runner.calls()[0]
                .env
                .get("POETRY_VIRTUALENVS_IN_PROJECT")
                .map(String::as_str),
            Some("true")
        );
    }

    #[test]
    fn missing_lock_fails_before_touching_build_root() {
        let (_dir, layout) = project(&[("pyproject.toml", "[project]\n")]);
        fs::create_dir_all(layout.python_dir()).unwrap();
        fs::write(layout.python_dir().join("keep.py"), "").unwrap();
        let runner = MockRunner::new();
        let mode = ExecutionMode::default();

        let err = PoetryStrategy
            .build(&ctx(&layout, &mode, &runner, &yes, None))
            .unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
        assert!(layout.python_dir().join("keep.py").is_file());
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn declined_confirmation_leaves_build_root_untouched() {
        let (_dir, layout) = project(&[("requirements.txt", "six==1.16.0\n")]);
        fs::create_dir_all(layout.python_dir()).unwrap();
        fs::write(layout.python_dir().join("keep.py"), "").unwrap();
        let runner = MockRunner::new();
        let mode = ExecutionMode::default();

        let err = PipStrategy
            .build(&ctx(&layout, &mode, &runner, &no, None))
            .unwrap_err();
        assert!(matches!(err, CoreError::DestructiveActionAborted(_)));
        assert!(layout.python_dir().join("keep.py").is_file());
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn skip_confirmation_never_asks() {
        let (_dir, layout) = project(&[("requirements.txt", "six==1.16.0\n")]);
        fs::create_dir_all(layout.python_dir()).unwrap();
        fs::write(layout.python_dir().join("stale.py"), "").unwrap();
        let runner = MockRunner::new();
        let mode = ExecutionMode::default();
        let decline = no;
        let mut context = ctx(&layout, &mode, &runner, &decline, None);
        context.skip_confirmation = true;

        PipStrategy.build(&context).unwrap();
        assert!(!layout.python_dir().join("stale.py").exists());
    }

    #[test]
    fn failing_tool_is_build_tool_error_and_keeps_state() {
        let (_dir, layout) = project(&[("requirements.txt", "six==1.16.0\n")]);
        let runner = MockRunner::new().fail_on("pip", 1);
        let mode = ExecutionMode::default();
        let err = PipStrategy
            .build(&ctx(&layout, &mode, &runner, &yes, None))
            .unwrap_err();
        assert!(matches!(err, CoreError::BuildTool(_)));
        assert!(layout.repo_dir().join("requirements.txt").is_file());
    }

    #[test]
    fn venv_tool_without_output_is_missing_artifact() {
        let (_dir, layout) = project(&[("pyproject.toml", "[project]\n"), ("uv.lock", "v\n")]);
        let runner = MockRunner::new();
        let mode = ExecutionMode::default();
        let err = UvStrategy
            .build(&ctx(&layout, &mode, &runner, &yes, None))
            .unwrap_err();
        assert!(matches!(err, CoreError::MissingArtifact(_)));
    }

    #[test]
    fn container_build_writes_script_and_removes_credentials() {
        let (dir, layout) = project(&[("requirements.txt", "six==1.16.0\n")]);
        let creds = Credentials::new("corp", "https://pkgs.example.com", "aws", "tok");
        let creds_file = layout.credentials_file();
        let runner = MockRunner::new().on("docker", move |_| {
            assert!(creds_file.is_file(), "credentials visible to the container");
            Ok(())
        });
        let mode = ExecutionMode::Container(ContainerSpec::new(
            PythonVersion::new(3, 12),
            Architecture::X86_64,
        ));

        PipStrategy
            .build(&ctx(&layout, &mode, &runner, &yes, Some(&creds)))
            .unwrap();

        let script = fs::read_to_string(layout.container_script()).unwrap();
        assert_eq!(script, entry_script(BuildTool::Pip));
        assert!(!layout.credentials_file().exists());

        let call = &runner.calls()[0];
        assert_eq!(call.program, "docker");
        assert!(call
            .args
            .contains(&format!("type=bind,source={},target=/var/task", dir.path().display())));
        assert_eq!(
            call.args.last().map(String::as_str),
            Some("/var/task/build/lambda/layer/repo/build_lambda_layer_in_container.sh")
        );
        assert!(call.env.is_empty());
    }

    #[test]
    fn container_failure_still_removes_credentials() {
        let (_dir, layout) = project(&[("requirements.txt", "six==1.16.0\n")]);
        let creds = Credentials::new("corp", "https://pkgs.example.com", "aws", "tok");
        let runner = MockRunner::new().fail_on("docker", 125);
        let mode = ExecutionMode::Container(ContainerSpec::new(
            PythonVersion::new(3, 11),
            Architecture::Arm64,
        ));
        let err = PipStrategy
            .build(&ctx(&layout, &mode, &runner, &yes, Some(&creds)))
            .unwrap_err();
        assert!(matches!(err, CoreError::BuildTool(_)));
        assert!(!layout.credentials_file().exists());
    }

    #[test]
    fn strategy_for_matches_tool() {
        for tool in BuildTool::ALL {
            assert_eq!(strategy_for(tool).tool(), tool);
        }
    }
}
