use crate::reporter::Reporter;
use crate::CoreError;
use std::fs;
use stratum_schema::BuildTool;
use stratum_store::{archive, relocate, ArchiveOutput, ProjectLayout, StoreError};
use tracing::debug;

/// Move the tool's output into `artifacts/python` and zip it.
///
/// Packaging twice in a row is fine: once a virtualenv's `site-packages` has
/// been relocated, a populated `artifacts/python` is taken as already in place.
pub fn package_layer<S: AsRef<str>>(
    layout: &ProjectLayout,
    tool: BuildTool,
    ignored_packages: &[S],
    reporter: &dyn Reporter,
) -> Result<ArchiveOutput, CoreError> {
    match layout.site_packages(tool) {
        Ok(site_packages) => {
            relocate(&site_packages, layout)?;
        }
        Err(StoreError::MissingArtifact(missing)) if python_dir_populated(layout) => {
            debug!(
                "{} not found, using existing {}",
                missing.display(),
                layout.python_dir().display()
            );
        }
        Err(e) => return Err(e.into()),
    }

    let output = archive(layout, ignored_packages)?;
    reporter.info(&format!(
        "{} ({} files, sha256 {})",
        output.path.display(),
        output.files,
        output.fingerprint
    ));
    Ok(output)
}

fn python_dir_populated(layout: &ProjectLayout) -> bool {
    fs::read_dir(layout.python_dir())
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}
