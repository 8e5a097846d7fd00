use super::{json_pretty, load_config, reporter, resolve_project, Invocation, EXIT_SUCCESS};
use stratum_core::Workflow;
use stratum_runtime::SystemRunner;
use stratum_schema::BuildTool;

pub fn run(inv: &Invocation, tool: Option<BuildTool>, ignore: &[String]) -> Result<u8, String> {
    let loaded = load_config(inv)?;
    let project = resolve_project(inv, &loaded, tool, ignore, None)?;

    let reporter = reporter(inv.json);
    let confirm = |_: &str| false;
    let workflow = Workflow::new(&project, &SystemRunner, &*reporter, &confirm);
    let archive = workflow.package().map_err(|e| e.to_string())?;

    if inv.json {
        let payload = serde_json::json!({
            "archive": archive.path,
            "files": archive.files,
            "sha256": archive.fingerprint,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("{} ({} files)", archive.path.display(), archive.files);
        println!("sha256 {}", archive.fingerprint);
    }
    Ok(EXIT_SUCCESS)
}
