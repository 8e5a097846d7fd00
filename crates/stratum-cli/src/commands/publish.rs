use super::{
    colorize_state, connect_aws, json_pretty, load_config, reporter, resolve_project,
    Invocation, EXIT_SUCCESS,
};
use crate::RemoteArgs;
use stratum_core::{LayerDeployment, Workflow};
use stratum_runtime::SystemRunner;
use stratum_schema::BuildTool;

pub fn run(inv: &Invocation, tool: Option<BuildTool>, remote: &RemoteArgs) -> Result<u8, String> {
    let loaded = load_config(inv)?;
    let project = resolve_project(inv, &loaded, tool, &[], Some(remote))?;
    project.remote().map_err(|e| e.to_string())?;
    project.layer_name().map_err(|e| e.to_string())?;
    let (store, registry) = connect_aws(remote)?;

    let reporter = reporter(inv.json);
    let confirm = |_: &str| false;
    let workflow =
        Workflow::new(&project, &SystemRunner, &*reporter, &confirm).with_remote(&store, &registry);
    let deployment = workflow.publish().map_err(|e| e.to_string())?;

    print_deployment(deployment.as_ref(), inv.json)?;
    Ok(EXIT_SUCCESS)
}

pub(super) fn print_deployment(
    deployment: Option<&LayerDeployment>,
    json: bool,
) -> Result<(), String> {
    if json {
        let payload = match deployment {
            Some(d) => serde_json::json!({
                "published": true,
                "layer_name": d.layer_name,
                "version": d.version,
                "version_arn": d.version_arn,
                "manifest": d.manifest_uri.to_string(),
            }),
            None => serde_json::json!({ "published": false }),
        };
        println!("{}", json_pretty(&payload)?);
        return Ok(());
    }
    match deployment {
        Some(d) => {
            println!(
                "{} {} version {}",
                colorize_state("published"),
                d.layer_name,
                d.version
            );
            println!("  arn:      {}", d.version_arn);
            println!("  manifest: {}", d.manifest_uri);
        }
        None => println!("{}: nothing to publish", colorize_state("unchanged")),
    }
    Ok(())
}
