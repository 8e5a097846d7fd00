//! Local side of a layer build: the fixed directory layout under
//! `build/lambda/layer`, staging of manifest files, relocation of installed
//! packages into `artifacts/python`, and the zip archive plus its SHA-256
//! fingerprint.

pub mod fingerprint;
pub mod layout;
pub mod package;

pub use fingerprint::{fingerprint_dir, Fingerprint};
pub use layout::{ProjectLayout, CONTAINER_ROOT, CONTAINER_SCRIPT_NAME, CREDENTIALS_FILE_NAME};
pub use package::{
    archive, archive_entries, exclusion_patterns, layer_filter, relocate, ArchiveOutput,
    DEFAULT_IGNORED_PACKAGES,
};

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("zip archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
    #[error("schema error: {0}")]
    Schema(#[from] stratum_schema::SchemaError),
    #[error("required input file not found: {}", .0.display())]
    MissingInput(PathBuf),
    #[error("expected build output not found: {}", .0.display())]
    MissingArtifact(PathBuf),
    #[error("path {} is not under the project root {}", .path.display(), .root.display())]
    OutsideProject { path: PathBuf, root: PathBuf },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_error_display_missing_artifact() {
        let e = StoreError::MissingArtifact(PathBuf::from("/tmp/site-packages"));
        assert!(e.to_string().contains("/tmp/site-packages"));
    }
}
