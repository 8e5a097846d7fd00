use super::{
    check_build_prereqs, confirm_prompt, connect_aws, json_pretty, load_config, publish_options,
    reporter, resolve_build_settings, resolve_project, Invocation, EXIT_SUCCESS,
};
use crate::{BuildArgs, RemoteArgs};
use stratum_core::Workflow;
use stratum_runtime::SystemRunner;

pub fn run(
    inv: &Invocation,
    args: &BuildArgs,
    ignore: &[String],
    remote: &RemoteArgs,
) -> Result<u8, String> {
    let loaded = load_config(inv)?;
    let mut project = resolve_project(inv, &loaded, args.tool, ignore, Some(remote))?;
    project.publish_options = publish_options(&loaded.config, args.python, args.arch);
    project.remote().map_err(|e| e.to_string())?;
    project.layer_name().map_err(|e| e.to_string())?;
    let settings = resolve_build_settings(&loaded, args)?;
    check_build_prereqs(project.tool, &settings.mode)?;
    let (store, registry) = connect_aws(remote)?;

    let reporter = reporter(inv.json);
    let confirm = confirm_prompt;
    let workflow =
        Workflow::new(&project, &SystemRunner, &*reporter, &confirm).with_remote(&store, &registry);
    let report = workflow.run(&settings).map_err(|e| e.to_string())?;

    if inv.json {
        let payload = serde_json::json!({
            "tool": report.build.tool,
            "archive": report.archive.path,
            "files": report.archive.files,
            "sha256": report.archive.fingerprint,
            "uploaded": report.uploaded.to_string(),
            "published": report.deployment.as_ref().map(|d| serde_json::json!({
                "layer_name": d.layer_name,
                "version": d.version,
                "version_arn": d.version_arn,
                "manifest": d.manifest_uri.to_string(),
            })),
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "{} ({} files) uploaded to {}",
            report.archive.path.display(),
            report.archive.files,
            report.uploaded
        );
        super::publish::print_deployment(report.deployment.as_ref(), false)?;
    }
    Ok(EXIT_SUCCESS)
}
