use super::{
    config_error, json_pretty, resolve_descriptor, resolve_tool, Invocation, LoadedConfig,
    EXIT_SUCCESS,
};
use dialoguer::{Confirm, Input, Select};
use std::io::{stderr, stdin, IsTerminal, Write};
use std::path::{Path, PathBuf};
use stratum_schema::{
    Architecture, BuildMode, BuildTool, ProjectConfig, PythonVersion, CONFIG_FILE_NAME,
};
use tempfile::NamedTempFile;

const HEADER: &str = "\
# stratum layer configuration.
# Every value can be overridden on the command line; see `stratum --help`.

";

fn write_atomic(dest: &Path, content: &str) -> Result<(), String> {
    let dir = match dest.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| format!("write temp file: {e}"))?;
    tmp.write_all(content.as_bytes())
        .map_err(|e| format!("write temp file: {e}"))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| format!("fsync temp file: {e}"))?;
    tmp.persist(dest)
        .map_err(|e| format!("persist {}: {}", dest.display(), e.error))?;
    Ok(())
}

fn ensure_can_write(dest: &Path, force: bool, is_tty: bool) -> Result<(), String> {
    if !dest.exists() || force {
        return Ok(());
    }
    let refuse = || {
        format!(
            "refusing to overwrite existing {} (pass --force)",
            dest.display()
        )
    };
    if !is_tty {
        return Err(refuse());
    }
    let overwrite = Confirm::new()
        .with_prompt(format!("overwrite {}?", dest.display()))
        .default(false)
        .interact()
        .map_err(|e| format!("prompt failed: {e}"))?;
    if overwrite {
        Ok(())
    } else {
        Err(refuse())
    }
}

/// Starter config for a project rooted at `root`.
fn starter_config(
    root: &Path,
    name: Option<&str>,
    tool: Option<BuildTool>,
    s3_dir: Option<&str>,
) -> ProjectConfig {
    let mut config = ProjectConfig::default();
    config.layer.name = name.map(str::to_owned).or_else(|| {
        root.file_name()
            .map(|n| format!("{}-dependencies", n.to_string_lossy()))
    });
    config.layer.tool = tool.or_else(|| resolve_tool(None, &LoadedConfig::default(), root).ok());
    config.layer.s3_dir = s3_dir.map(str::to_owned);
    config.build.mode = Some(BuildMode::Local);
    config.build.python = Some(PythonVersion::default());
    config.build.architecture = Some(Architecture::default());
    config
}

fn prompt_missing(config: &mut ProjectConfig) -> Result<(), String> {
    let name: String = Input::new()
        .with_prompt("layer name")
        .default(config.layer.name.clone().unwrap_or_default())
        .interact_text()
        .map_err(|e| format!("prompt failed: {e}"))?;
    config.layer.name = Some(name);

    let tools: Vec<&str> = BuildTool::ALL.iter().map(|t| t.name()).collect();
    let default_idx = config
        .layer
        .tool
        .and_then(|t| BuildTool::ALL.iter().position(|c| *c == t))
        .unwrap_or(0);
    let idx = Select::new()
        .with_prompt("build tool")
        .items(&tools)
        .default(default_idx)
        .interact()
        .map_err(|e| format!("prompt failed: {e}"))?;
    config.layer.tool = Some(BuildTool::ALL[idx]);

    if config.layer.s3_dir.is_none() {
        let dir: String = Input::new()
            .with_prompt("S3 directory (s3://bucket/prefix/, empty to skip)")
            .allow_empty(true)
            .interact_text()
            .map_err(|e| format!("prompt failed: {e}"))?;
        if !dir.trim().is_empty() {
            config.layer.s3_dir = Some(dir.trim().to_owned());
        }
    }
    Ok(())
}

pub fn run(
    inv: &Invocation,
    name: Option<&str>,
    tool: Option<BuildTool>,
    s3_dir: Option<&str>,
    force: bool,
) -> Result<u8, String> {
    let dest = inv
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME));
    let is_tty = stdin().is_terminal() && stderr().is_terminal();
    ensure_can_write(&dest, force, is_tty)?;

    let descriptor = resolve_descriptor(&inv.project)?;
    let root = descriptor.parent().unwrap_or(Path::new("."));
    let mut config = starter_config(root, name, tool, s3_dir);
    if is_tty && !inv.json && (name.is_none() || tool.is_none()) {
        prompt_missing(&mut config)?;
    }
    config.validate().map_err(config_error)?;

    let rendered = config.to_toml_string().map_err(config_error)?;
    write_atomic(&dest, &format!("{HEADER}{rendered}"))?;

    if inv.json {
        let payload = serde_json::json!({
            "status": "written",
            "path": dest,
            "config": config,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("wrote {}", dest.display());
        if config.layer.tool.is_none() {
            println!("no lock file found; set layer.tool before building");
        }
    }
    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use stratum_schema::parse_config_str;

    #[test]
    fn starter_config_infers_tool_and_name() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("billing");
        fs::create_dir_all(&root).unwrap();
        fs::write(root.join("uv.lock"), "").unwrap();

        let config = starter_config(&root, None, None, Some("s3://b/billing/"));
        assert_eq!(config.layer.name.as_deref(), Some("billing-dependencies"));
        assert_eq!(config.layer.tool, Some(BuildTool::Uv));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rendered_starter_config_parses_back() {
        let dir = tempfile::tempdir().unwrap();
        let config = starter_config(dir.path(), Some("deps"), Some(BuildTool::Pip), None);
        let text = format!("{HEADER}{}", config.to_toml_string().unwrap());
        assert_eq!(parse_config_str(&text).unwrap(), config);
    }

    #[test]
    fn existing_file_is_kept_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&dest, "# mine\n").unwrap();
        assert!(ensure_can_write(&dest, false, false).is_err());
        assert!(ensure_can_write(&dest, true, false).is_ok());
        assert_eq!(fs::read_to_string(&dest).unwrap(), "# mine\n");
    }
}
