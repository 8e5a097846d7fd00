use super::{
    colorize_state, connect_aws, json_pretty, load_config, reporter, resolve_project,
    status_label, Invocation, EXIT_SUCCESS,
};
use crate::RemoteArgs;
use stratum_core::{PublicationStatus, Workflow};
use stratum_runtime::SystemRunner;
use stratum_schema::BuildTool;

pub fn run(inv: &Invocation, tool: Option<BuildTool>, remote: &RemoteArgs) -> Result<u8, String> {
    let loaded = load_config(inv)?;
    let project = resolve_project(inv, &loaded, tool, &[], Some(remote))?;
    project.remote().map_err(|e| e.to_string())?;
    let layer_name = project.layer_name().map_err(|e| e.to_string())?.to_owned();
    let (store, registry) = connect_aws(remote)?;

    let reporter = reporter(inv.json);
    let confirm = |_: &str| false;
    let workflow =
        Workflow::new(&project, &SystemRunner, &*reporter, &confirm).with_remote(&store, &registry);
    let status = workflow.status().map_err(|e| e.to_string())?;

    if inv.json {
        let payload = serde_json::json!({
            "layer_name": layer_name,
            "manifest": project.tool.manifest_name(),
            "status": status,
            "needs_publish": status.needs_publish(),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        let state = colorize_state(status_label(status));
        match status {
            PublicationStatus::NoPriorVersion => {
                println!("{layer_name}: {state} (next publish creates version 1)");
            }
            PublicationStatus::Unchanged { version } | PublicationStatus::Changed { version } => {
                println!(
                    "{layer_name}: {state} against version {version} ({})",
                    project.tool.manifest_name()
                );
            }
        }
    }
    Ok(EXIT_SUCCESS)
}
