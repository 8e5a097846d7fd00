use crate::uri::S3Uri;
use stratum_schema::BuildTool;

/// Digits used for version directories, so lexicographic order of keys
/// equals numeric order of versions.
pub const VERSION_WIDTH: usize = 6;

/// Object keys for one layer, relative to a base S3 directory:
///
/// ```text
/// <base>/layer/layer.zip                 transient archive
/// <base>/layer/000001/<manifest>         manifest archived per version
/// <base>/layer/last-<manifest>           most recently published manifest
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLayout {
    base: S3Uri,
}

impl RemoteLayout {
    pub fn new(base: S3Uri) -> Self {
        Self { base: base.to_dir() }
    }

    pub fn base(&self) -> &S3Uri {
        &self.base
    }

    pub fn layer_dir(&self) -> S3Uri {
        self.base.join("layer/")
    }

    /// Handoff location for the registry; overwritten on every upload.
    pub fn transient_archive(&self) -> S3Uri {
        self.layer_dir().join("layer.zip")
    }

    pub fn version_dir(&self, version: u64) -> S3Uri {
        self.layer_dir()
            .join(&format!("{version:0width$}/", width = VERSION_WIDTH))
    }

    pub fn versioned_manifest(&self, version: u64, tool: BuildTool) -> S3Uri {
        self.version_dir(version).join(tool.manifest_name())
    }

    pub fn last_manifest(&self, tool: BuildTool) -> S3Uri {
        self.layer_dir()
            .join(&format!("last-{}", tool.manifest_name()))
    }
}
