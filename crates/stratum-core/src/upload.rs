use crate::CoreError;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use stratum_remote::{ObjectStore, PutOptions, RemoteLayout, S3Uri};
use tracing::info;

/// Object metadata key carrying the archive fingerprint.
pub const FINGERPRINT_METADATA_KEY: &str = "layer_sha256";

/// Write the local archive to the transient remote location, replacing
/// whatever is there.
pub fn upload_layer(
    store: &dyn ObjectStore,
    archive_path: &Path,
    remote: &RemoteLayout,
    fingerprint: &str,
    tags: &BTreeMap<String, String>,
) -> Result<S3Uri, CoreError> {
    if !archive_path.is_file() {
        return Err(CoreError::MissingArtifact(archive_path.to_path_buf()));
    }
    let body = fs::read(archive_path)?;
    let size = body.len();

    let mut options = PutOptions::with_content_type("application/zip");
    options
        .metadata
        .insert(FINGERPRINT_METADATA_KEY.to_owned(), fingerprint.to_owned());
    options.tags.clone_from(tags);

    let target = remote.transient_archive();
    store.put_object(&target, body, &options)?;
    info!("uploaded {} ({size} bytes) to {target}", archive_path.display());
    Ok(target)
}
