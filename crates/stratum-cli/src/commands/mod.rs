pub mod build;
pub mod completions;
pub mod doctor;
pub mod init;
pub mod man_pages;
pub mod package;
pub mod publish;
pub mod run;
pub mod status;
pub mod upload;

use crate::{BuildArgs, RemoteArgs};
use indicatif::{ProgressBar, ProgressStyle};
use std::fmt;
use std::io::{stderr, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use stratum_core::{BuildSettings, ExecutionMode, LayerProject, PublicationStatus, Reporter, Step};
use stratum_remote::{AwsLayerRegistry, AwsObjectStore, AwsSettings, PublishOptions, RemoteLayout, S3Uri};
use stratum_runtime::{ContainerSpec, MissingPrereq};
use stratum_schema::{
    parse_config_file, Architecture, BuildMode, BuildTool, Credentials, ProjectConfig,
    PythonVersion, CONFIG_FILE_NAME,
};
use stratum_store::ProjectLayout;
use tracing::debug;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_CONFIG_ERROR: u8 = 2;
pub const EXIT_ABORTED: u8 = 3;
pub const EXIT_INTERRUPTED: u8 = 130;

/// Global flags shared by every command.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub config: Option<PathBuf>,
    pub project: PathBuf,
    pub json: bool,
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn config_error(e: impl fmt::Display) -> String {
    format!("configuration error: {e}")
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn status_label(status: PublicationStatus) -> &'static str {
    match status {
        PublicationStatus::NoPriorVersion => "no_prior_version",
        PublicationStatus::Unchanged { .. } => "unchanged",
        PublicationStatus::Changed { .. } => "changed",
    }
}

pub fn colorize_state(state: &str) -> String {
    use console::Style;
    match state {
        "unchanged" => Style::new().green().apply_to(state).to_string(),
        "changed" => Style::new().yellow().bold().apply_to(state).to_string(),
        "no_prior_version" => Style::new().cyan().apply_to(state).to_string(),
        "published" => Style::new().green().bold().apply_to(state).to_string(),
        other => other.to_owned(),
    }
}

/// Renders stage progress on stderr.
///
/// The build stage streams tool output to the terminal, so it gets a plain
/// header line; the other stages get a spinner.
#[derive(Default)]
pub struct ConsoleReporter {
    current: Mutex<Option<(Step, ProgressBar, String)>>,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Reporter for ConsoleReporter {
    fn step_started(&self, step: Step, detail: &str) {
        let label = format!("{step}: {detail}");
        if step == Step::Build {
            let style = console::Style::new().bold();
            eprintln!("{} {label}", style.apply_to("==>"));
            return;
        }
        if let Ok(mut current) = self.current.lock() {
            *current = Some((step, spinner(&label), label));
        }
    }

    fn info(&self, message: &str) {
        match self.current.lock() {
            Ok(current) => match current.as_ref() {
                Some((_, pb, _)) => pb.println(format!("  {message}")),
                None => eprintln!("  {message}"),
            },
            Err(_) => eprintln!("  {message}"),
        }
    }

    fn step_finished(&self, step: Step, success: bool) {
        let taken = self.current.lock().ok().and_then(|mut c| c.take());
        match taken {
            Some((started, pb, label)) if started == step => {
                if success {
                    spin_ok(&pb, &label);
                } else {
                    spin_fail(&pb, &label);
                }
            }
            _ => {
                let mark = if success { "✓" } else { "✗" };
                eprintln!("{mark} {step}");
            }
        }
    }
}

/// Interactive yes/no, default no. Without a terminal the answer is no.
pub fn confirm_prompt(prompt: &str) -> bool {
    if !stderr().is_terminal() {
        eprintln!("{prompt} [non-interactive, answering no; pass --yes to skip this prompt]");
        return false;
    }
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .unwrap_or(false)
}

/// `stratum.toml` and the directory relative paths in it resolve against.
#[derive(Debug, Clone, Default)]
pub struct LoadedConfig {
    pub config: ProjectConfig,
    pub dir: PathBuf,
}

impl LoadedConfig {
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.dir.join(path)
        }
    }
}

/// An explicit `--config` must exist; otherwise `./stratum.toml` is read
/// when present.
pub fn load_config(inv: &Invocation) -> Result<LoadedConfig, String> {
    let (path, required) = match &inv.config {
        Some(p) => (p.clone(), true),
        None => (PathBuf::from(CONFIG_FILE_NAME), false),
    };
    if !path.is_file() {
        if required {
            return Err(config_error(format!("{} not found", path.display())));
        }
        debug!("no {CONFIG_FILE_NAME} in the working directory, using defaults");
        return Ok(LoadedConfig {
            config: ProjectConfig::default(),
            dir: PathBuf::from("."),
        });
    }
    let config = parse_config_file(&path)
        .map_err(|e| config_error(format!("{}: {e}", path.display())))?;
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    debug!("loaded {}", path.display());
    Ok(LoadedConfig { config, dir })
}

/// Absolute path of the project descriptor. The descriptor itself need not
/// exist (pip projects only have `requirements.txt`), its directory must.
pub fn resolve_descriptor(project: &Path) -> Result<PathBuf, String> {
    let file_name = project
        .file_name()
        .ok_or_else(|| config_error(format!("invalid project path {}", project.display())))?;
    let dir = match project.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let root = dir
        .canonicalize()
        .map_err(|e| config_error(format!("project directory {}: {e}", dir.display())))?;
    Ok(root.join(file_name))
}

/// Flag, then config, then whichever lock file is present at the root.
pub fn resolve_tool(
    flag: Option<BuildTool>,
    loaded: &LoadedConfig,
    root: &Path,
) -> Result<BuildTool, String> {
    if let Some(tool) = flag.or(loaded.config.layer.tool) {
        return Ok(tool);
    }
    [BuildTool::Uv, BuildTool::Poetry, BuildTool::Pip]
        .into_iter()
        .find(|t| root.join(t.manifest_name()).is_file())
        .ok_or_else(|| {
            config_error(format!(
                "cannot tell which build tool {} uses; pass --tool or set layer.tool",
                root.display()
            ))
        })
}

pub fn parse_tag(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_owned(), v.to_owned())),
        _ => Err(config_error(format!(
            "invalid tag '{raw}' (expected KEY=VALUE)"
        ))),
    }
}

/// Merge config and flags into the project the workflow operates on.
pub fn resolve_project(
    inv: &Invocation,
    loaded: &LoadedConfig,
    tool: Option<BuildTool>,
    ignore: &[String],
    remote: Option<&RemoteArgs>,
) -> Result<LayerProject, String> {
    let descriptor = resolve_descriptor(&inv.project)?;
    let layout = ProjectLayout::new(descriptor);
    let tool = resolve_tool(tool, loaded, layout.root())?;
    let config = &loaded.config;
    let mut project = LayerProject::new(layout, tool);

    if !ignore.is_empty() {
        project.ignored_packages = ignore.to_vec();
    } else if let Some(configured) = &config.layer.ignore {
        project.ignored_packages.clone_from(configured);
    }

    project.layer_name = remote
        .and_then(|r| r.layer_name.clone())
        .or_else(|| config.layer.name.clone());

    let s3_dir = remote
        .and_then(|r| r.s3_dir.clone())
        .or_else(|| config.layer.s3_dir.clone());
    if let Some(dir) = s3_dir {
        let base = S3Uri::parse(&dir).map_err(config_error)?;
        project.remote = Some(RemoteLayout::new(base));
    }

    project.tags.clone_from(&config.layer.tags);
    if let Some(remote) = remote {
        for raw in &remote.tags {
            let (k, v) = parse_tag(raw)?;
            project.tags.insert(k, v);
        }
    }

    project.publish_options = publish_options(config, None, None);
    Ok(project)
}

/// Runtimes and architectures fall back to the build target, where `python`
/// and `arch` are the command-line overrides of the configured one.
pub fn publish_options(
    config: &ProjectConfig,
    python: Option<PythonVersion>,
    arch: Option<Architecture>,
) -> PublishOptions {
    let publish = &config.publish;
    let mut options = PublishOptions {
        description: publish.description.clone(),
        compatible_runtimes: publish.compatible_runtimes.clone(),
        compatible_architectures: publish.compatible_architectures.clone(),
        license_info: publish.license_info.clone(),
    };
    if options.compatible_runtimes.is_empty() {
        if let Some(python) = python.or(config.build.python) {
            options.compatible_runtimes.push(python.runtime_id());
        }
    }
    if options.compatible_architectures.is_empty() {
        if let Some(arch) = arch.or(config.build.architecture) {
            options
                .compatible_architectures
                .push(arch.lambda_name().to_owned());
        }
    }
    options
}

pub fn resolve_build_settings(
    loaded: &LoadedConfig,
    args: &BuildArgs,
) -> Result<BuildSettings, String> {
    let build = &loaded.config.build;

    let credentials = match &args.credentials {
        Some(path) => Some(path.clone()),
        None => loaded
            .config
            .credentials
            .file
            .as_deref()
            .map(|p| loaded.resolve_path(p)),
    };
    let credentials = credentials
        .map(|path| {
            Credentials::load(&path)
                .map_err(|e| config_error(format!("credentials {}: {e}", path.display())))
        })
        .transpose()?;

    let container = args.container || build.mode == Some(BuildMode::Container);
    let mode = if container {
        let python = args.python.or(build.python).unwrap_or_default();
        let arch = args.arch.or(build.architecture).unwrap_or_default();
        let mut spec = ContainerSpec::new(python, arch);
        if let Some(runtime) = args
            .container_runtime
            .as_ref()
            .or(build.container_runtime.as_ref())
        {
            spec = spec.with_runtime(runtime.clone());
        }
        ExecutionMode::Container(spec)
    } else {
        let program = args
            .tool_path
            .clone()
            .or_else(|| build.tool_path.as_deref().map(|p| loaded.resolve_path(p)))
            .map(|p| p.to_string_lossy().into_owned());
        ExecutionMode::Local { program }
    };

    Ok(BuildSettings {
        credentials,
        skip_confirmation: args.yes,
        mode,
    })
}

/// Host tools the chosen execution mode needs. Skipped when
/// `STRATUM_SKIP_PREREQS=1`.
pub fn check_build_prereqs(tool: BuildTool, mode: &ExecutionMode) -> Result<(), String> {
    if std::env::var("STRATUM_SKIP_PREREQS").as_deref() == Ok("1") {
        return Ok(());
    }
    let missing: Vec<MissingPrereq> = match mode {
        ExecutionMode::Local { program } => {
            stratum_runtime::check_tool_prereqs(tool, program.as_deref().unwrap_or(tool.name()))
        }
        ExecutionMode::Container(spec) => stratum_runtime::check_container_prereqs(&spec.runtime),
    };
    if missing.is_empty() {
        Ok(())
    } else {
        Err(stratum_runtime::format_missing(&missing))
    }
}

pub fn connect_aws(remote: &RemoteArgs) -> Result<(AwsObjectStore, AwsLayerRegistry), String> {
    AwsSettings::new(remote.region.clone(), remote.profile.clone())
        .connect()
        .map_err(|e| e.to_string())
}

pub fn reporter(json: bool) -> Box<dyn Reporter> {
    if json {
        Box::new(stratum_core::TracingReporter)
    } else {
        Box::new(ConsoleReporter::new())
    }
}
