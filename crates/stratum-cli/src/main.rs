mod commands;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use commands::{
    Invocation, EXIT_ABORTED, EXIT_CONFIG_ERROR, EXIT_FAILURE, EXIT_INTERRUPTED,
};
use std::path::PathBuf;
use std::process::ExitCode;
use stratum_core::install_signal_handler;
use stratum_schema::{Architecture, BuildTool, PythonVersion};

#[derive(Debug, Parser)]
#[command(
    name = "stratum",
    version,
    about = "Build, package, and publish AWS Lambda dependency layers"
)]
struct Cli {
    /// Path to the stratum config file (defaults to ./stratum.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Project descriptor; its directory is the project root.
    #[arg(long, global = true, default_value = "pyproject.toml")]
    project: PathBuf,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Flags controlling the build stage.
#[derive(Debug, Clone, Default, Args)]
pub struct BuildArgs {
    /// Dependency manager: pip, poetry, or uv.
    #[arg(long)]
    pub tool: Option<BuildTool>,
    /// Build inside the Lambda build image instead of on the host.
    #[arg(long, default_value_t = false)]
    pub container: bool,
    /// Python version of the target runtime, e.g. 3.12.
    #[arg(long)]
    pub python: Option<PythonVersion>,
    /// Target architecture: x86_64 or arm64.
    #[arg(long)]
    pub arch: Option<Architecture>,
    /// Private package index credentials (JSON).
    #[arg(long)]
    pub credentials: Option<PathBuf>,
    /// Path to the pip/poetry/uv executable for host builds.
    #[arg(long)]
    pub tool_path: Option<PathBuf>,
    /// Container CLI for container builds.
    #[arg(long)]
    pub container_runtime: Option<String>,
    /// Delete an existing build directory without asking.
    #[arg(short, long, default_value_t = false)]
    pub yes: bool,
}

/// Flags locating the published layer.
#[derive(Debug, Clone, Default, Args)]
pub struct RemoteArgs {
    /// Lambda layer name.
    #[arg(long)]
    pub layer_name: Option<String>,
    /// S3 base directory, e.g. s3://bucket/my-app/lambda/.
    #[arg(long)]
    pub s3_dir: Option<String>,
    /// Object tag for the uploaded archive (repeatable).
    #[arg(long = "tag", value_name = "KEY=VALUE")]
    pub tags: Vec<String>,
    /// AWS region (overrides the environment and profile).
    #[arg(long)]
    pub region: Option<String>,
    /// Named AWS profile.
    #[arg(long)]
    pub profile: Option<String>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Install the layer's dependencies into the build directory.
    Build {
        #[command(flatten)]
        build: BuildArgs,
    },
    /// Relocate installed packages and zip them into layer.zip.
    Package {
        /// Dependency manager: pip, poetry, or uv.
        #[arg(long)]
        tool: Option<BuildTool>,
        /// Package excluded from the archive (repeatable, replaces the defaults).
        #[arg(long = "ignore", value_name = "PKG")]
        ignore: Vec<String>,
    },
    /// Upload layer.zip to the transient S3 location.
    Upload {
        /// Dependency manager: pip, poetry, or uv.
        #[arg(long)]
        tool: Option<BuildTool>,
        /// Package excluded from the fingerprint (repeatable, replaces the defaults).
        #[arg(long = "ignore", value_name = "PKG")]
        ignore: Vec<String>,
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Publish a new layer version if the dependency manifest changed.
    Publish {
        /// Dependency manager: pip, poetry, or uv.
        #[arg(long)]
        tool: Option<BuildTool>,
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Compare the local manifest with the one archived for the latest version.
    Status {
        /// Dependency manager: pip, poetry, or uv.
        #[arg(long)]
        tool: Option<BuildTool>,
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Build, package, upload, and publish in one go.
    Run {
        #[command(flatten)]
        build: BuildArgs,
        /// Package excluded from the archive (repeatable, replaces the defaults).
        #[arg(long = "ignore", value_name = "PKG")]
        ignore: Vec<String>,
        #[command(flatten)]
        remote: RemoteArgs,
    },
    /// Write a starter stratum.toml.
    Init {
        /// Layer name.
        #[arg(long)]
        name: Option<String>,
        /// Dependency manager: pip, poetry, or uv.
        #[arg(long)]
        tool: Option<BuildTool>,
        /// S3 base directory.
        #[arg(long)]
        s3_dir: Option<String>,
        /// Overwrite an existing file.
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Check that build tools and the container runtime are available.
    Doctor,
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages in the specified directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("STRATUM_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    install_signal_handler();

    let inv = Invocation {
        config: cli.config.clone(),
        project: cli.project.clone(),
        json: cli.json,
    };

    let result = match cli.command {
        Commands::Build { build } => commands::build::run(&inv, &build),
        Commands::Package { tool, ignore } => commands::package::run(&inv, tool, &ignore),
        Commands::Upload {
            tool,
            ignore,
            remote,
        } => commands::upload::run(&inv, tool, &ignore, &remote),
        Commands::Publish { tool, remote } => commands::publish::run(&inv, tool, &remote),
        Commands::Status { tool, remote } => commands::status::run(&inv, tool, &remote),
        Commands::Run {
            build,
            ignore,
            remote,
        } => commands::run::run(&inv, &build, &ignore, &remote),
        Commands::Init {
            name,
            tool,
            s3_dir,
            force,
        } => commands::init::run(
            &inv,
            name.as_deref(),
            tool,
            s3_dir.as_deref(),
            force,
        ),
        Commands::Doctor => commands::doctor::run(&inv),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("configuration error:") {
                EXIT_CONFIG_ERROR
            } else if msg.starts_with("aborted:") {
                EXIT_ABORTED
            } else if msg == "interrupted" {
                EXIT_INTERRUPTED
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}
