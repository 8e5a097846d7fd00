use super::{load_config, Invocation, EXIT_FAILURE, EXIT_SUCCESS};
use stratum_runtime::{check_container_prereqs, command_exists, DEFAULT_CONTAINER_RUNTIME};
use stratum_schema::{BuildMode, BuildTool, CONFIG_FILE_NAME};

pub fn run(inv: &Invocation) -> Result<u8, String> {
    let mut checks: Vec<Check> = Vec::new();
    let mut all_pass = true;

    let loaded = match load_config(inv) {
        Ok(loaded) => {
            checks.push(Check::pass("config", "Configuration is valid"));
            Some(loaded)
        }
        Err(e) => {
            all_pass = false;
            checks.push(Check::fail("config", &e));
            None
        }
    };
    let config = loaded.map(|l| l.config).unwrap_or_default();
    let container = config.build.mode == Some(BuildMode::Container);

    for tool in BuildTool::ALL {
        let wanted = config.layer.tool == Some(tool) && !container;
        let program = match (&config.build.tool_path, wanted) {
            (Some(path), true) => path.to_string_lossy().into_owned(),
            _ => tool.name().to_owned(),
        };
        let name = format!("tool_{}", tool.name());
        if command_exists(&program) {
            checks.push(Check::pass(&name, &format!("{program} found")));
        } else if wanted {
            all_pass = false;
            checks.push(Check::fail(
                &name,
                &format!("{program} not found but layer.tool is {tool}"),
            ));
        } else {
            checks.push(Check::info(&name, &format!("{program} not installed")));
        }
    }

    let runtime = config
        .build
        .container_runtime
        .as_deref()
        .unwrap_or(DEFAULT_CONTAINER_RUNTIME);
    let missing = check_container_prereqs(runtime);
    if missing.is_empty() {
        checks.push(Check::pass(
            "container_runtime",
            &format!("{runtime} is available"),
        ));
    } else {
        let detail = missing
            .iter()
            .map(|m| format!("{} ({})", m.name, m.install_hint))
            .collect::<Vec<_>>()
            .join("; ");
        if container {
            all_pass = false;
            checks.push(Check::fail(
                "container_runtime",
                &format!("container builds need {detail}"),
            ));
        } else {
            checks.push(Check::warn(
                "container_runtime",
                &format!("--container builds unavailable: {detail}"),
            ));
        }
    }

    let region = ["AWS_REGION", "AWS_DEFAULT_REGION", "AWS_PROFILE"]
        .iter()
        .find(|k| std::env::var_os(k).is_some());
    match region {
        Some(var) => checks.push(Check::pass("aws", &format!("{var} is set"))),
        None => checks.push(Check::info(
            "aws",
            "No AWS_REGION or AWS_PROFILE set; upload and publish need --region or a profile",
        )),
    }

    print_results(&checks, all_pass, inv.json)
}

fn print_results(checks: &[Check], all_pass: bool, json_output: bool) -> Result<u8, String> {
    if json_output {
        let json = serde_json::json!({
            "healthy": all_pass,
            "checks": checks.iter().map(|c| serde_json::json!({
                "name": c.name,
                "status": c.status,
                "message": c.message,
            })).collect::<Vec<_>>(),
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&json).map_err(|e| e.to_string())?
        );
    } else {
        println!("stratum doctor\n");
        for check in checks {
            let icon = match check.status {
                "pass" => "✓",
                "fail" => "✗",
                "warn" => "⚠",
                _ => "ℹ",
            };
            println!("  {icon} {}", check.message);
        }
        println!();
        if all_pass {
            println!("All checks passed.");
        } else {
            println!("Some checks failed. Fix them or adjust {CONFIG_FILE_NAME}.");
        }
    }
    Ok(if all_pass { EXIT_SUCCESS } else { EXIT_FAILURE })
}

struct Check {
    name: String,
    status: &'static str,
    message: String,
}

impl Check {
    fn new(name: &str, status: &'static str, message: &str) -> Self {
        Self {
            name: name.to_owned(),
            status,
            message: message.to_owned(),
        }
    }

    fn pass(name: &str, message: &str) -> Self {
        Self::new(name, "pass", message)
    }

    fn fail(name: &str, message: &str) -> Self {
        Self::new(name, "fail", message)
    }

    fn warn(name: &str, message: &str) -> Self {
        Self::new(name, "warn", message)
    }

    fn info(name: &str, message: &str) -> Self {
        Self::new(name, "info", message)
    }
}
