use super::{
    connect_aws, json_pretty, load_config, reporter, resolve_project, Invocation, EXIT_SUCCESS,
};
use crate::RemoteArgs;
use stratum_core::Workflow;
use stratum_runtime::SystemRunner;
use stratum_schema::BuildTool;

pub fn run(
    inv: &Invocation,
    tool: Option<BuildTool>,
    ignore: &[String],
    remote: &RemoteArgs,
) -> Result<u8, String> {
    let loaded = load_config(inv)?;
    let project = resolve_project(inv, &loaded, tool, ignore, Some(remote))?;
    project.remote().map_err(|e| e.to_string())?;
    let (store, registry) = connect_aws(remote)?;

    let reporter = reporter(inv.json);
    let confirm = |_: &str| false;
    let workflow =
        Workflow::new(&project, &SystemRunner, &*reporter, &confirm).with_remote(&store, &registry);
    let uploaded = workflow.upload(None).map_err(|e| e.to_string())?;

    if inv.json {
        let payload = serde_json::json!({ "uploaded": uploaded.to_string() });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!("uploaded to {uploaded}");
    }
    Ok(EXIT_SUCCESS)
}
