use super::{
    check_build_prereqs, confirm_prompt, json_pretty, load_config, reporter,
    resolve_build_settings, resolve_project, Invocation, EXIT_SUCCESS,
};
use crate::BuildArgs;
use stratum_core::Workflow;
use stratum_runtime::SystemRunner;

pub fn run(inv: &Invocation, args: &BuildArgs) -> Result<u8, String> {
    let loaded = load_config(inv)?;
    let project = resolve_project(inv, &loaded, args.tool, &[], None)?;
    let settings = resolve_build_settings(&loaded, args)?;
    check_build_prereqs(project.tool, &settings.mode)?;

    let reporter = reporter(inv.json);
    let confirm = confirm_prompt;
    let workflow = Workflow::new(&project, &SystemRunner, &*reporter, &confirm);
    let output = workflow.build(&settings).map_err(|e| e.to_string())?;

    if inv.json {
        let payload = serde_json::json!({
            "tool": output.tool,
            "site_packages": output.site_packages,
        });
        println!("{}", json_pretty(&payload)?);
    } else {
        println!(
            "built {} dependencies into {}",
            output.tool,
            output.site_packages.display()
        );
    }
    Ok(EXIT_SUCCESS)
}
