use std::fmt;
use std::process::{Command, Stdio};
use stratum_schema::BuildTool;

/// A missing prerequisite with actionable install instructions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingPrereq {
    pub name: String,
    pub purpose: &'static str,
    pub install_hint: &'static str,
}

impl fmt::Display for MissingPrereq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "  - {}: {} (install: {})",
            self.name, self.purpose, self.install_hint
        )
    }
}

pub fn command_exists(name: &str) -> bool {
    // Explicit paths are checked directly; `which` only searches PATH.
    if name.contains('/') {
        return std::path::Path::new(name).is_file();
    }
    Command::new("which")
        .arg(name)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}

fn daemon_reachable(runtime: &str) -> bool {
    Command::new(runtime)
        .arg("info")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

fn install_hint(tool: BuildTool) -> &'static str {
    match tool {
        BuildTool::Pip => "python3 -m ensurepip | apt install python3-pip | dnf install python3-pip",
        BuildTool::Poetry => "pipx install poetry | pip install 'poetry>=2.1.1,<3.0.0'",
        BuildTool::Uv => "curl -LsSf https://astral.sh/uv/install.sh | sh | pipx install uv",
    }
}

/// Prerequisites for a local build with `tool`, invoked as `program`.
pub fn check_tool_prereqs(tool: BuildTool, program: &str) -> Vec<MissingPrereq> {
    let mut missing = Vec::new();
    if !command_exists(program) {
        missing.push(MissingPrereq {
            name: program.to_owned(),
            purpose: "installing layer dependencies on the host",
            install_hint: install_hint(tool),
        });
    }
    missing
}

/// Prerequisites for a container build with the given container CLI.
pub fn check_container_prereqs(runtime: &str) -> Vec<MissingPrereq> {
    let mut missing = Vec::new();
    if !command_exists(runtime) {
        missing.push(MissingPrereq {
            name: runtime.to_owned(),
            purpose: "running the Lambda build image",
            install_hint: "https://docs.docker.com/engine/install/ | zypper install podman | apt install podman",
        });
    } else if !daemon_reachable(runtime) {
        missing.push(MissingPrereq {
            name: format!("{runtime} daemon"),
            purpose: "running the Lambda build image",
            install_hint: "start the daemon (systemctl start docker) or add your user to the docker group",
        });
    }
    missing
}

/// Format a list of missing prerequisites into a user-friendly error message.
pub fn format_missing(missing: &[MissingPrereq]) -> String {
    use std::fmt::Write as _;
    let mut msg = String::from("missing prerequisites:\n");
    for m in missing {
        let _ = writeln!(msg, "{m}");
    }
    msg.push_str("\nstratum needs these tools to build the layer.");
    msg
}
