//! Change detection and conditional publication of layer versions.
//!
//! The deciding input is the tool's manifest (`requirements.txt`,
//! `poetry.lock`, `uv.lock`). Every published version has its manifest
//! archived next to it in S3; a new version is registered only when the local
//! manifest differs byte for byte from the one archived with the latest
//! version. Manifests must pin exact versions for this to mean anything.

use crate::reporter::Reporter;
use crate::CoreError;
use serde::Serialize;
use std::fs;
use std::path::Path;
use stratum_remote::{
    version_from_arn, LayerRegistry, ObjectStore, PublishOptions, PutOptions, RemoteError,
    RemoteLayout, S3Uri,
};
use stratum_schema::BuildTool;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PublicationStatus {
    /// The layer has never been published.
    NoPriorVersion,
    /// The manifest archived with `version` equals the local one.
    Unchanged { version: u64 },
    /// The manifest differs from, or could not be read for, `version`.
    Changed { version: u64 },
}

impl PublicationStatus {
    pub fn needs_publish(self) -> bool {
        !matches!(self, Self::Unchanged { .. })
    }
}

/// Result of a publish that registered a new version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerDeployment {
    pub layer_name: String,
    pub version: u64,
    pub version_arn: String,
    pub manifest_uri: S3Uri,
}

pub struct ChangeDetector<'a> {
    pub store: &'a dyn ObjectStore,
    pub registry: &'a dyn LayerRegistry,
    pub remote: &'a RemoteLayout,
}

impl ChangeDetector<'_> {
    /// Compare `local_manifest` against the manifest archived with the latest
    /// version. Never mutates anything.
    pub fn detect(
        &self,
        layer_name: &str,
        tool: BuildTool,
        local_manifest: &Path,
    ) -> Result<PublicationStatus, CoreError> {
        let local = read_manifest(local_manifest)?;
        let Some(latest) = self.registry.latest_version(layer_name)? else {
            info!("layer '{layer_name}' has no published versions");
            return Ok(PublicationStatus::NoPriorVersion);
        };

        let archived_uri = self.remote.versioned_manifest(latest.version, tool);
        let archived = match self.store.get_object(&archived_uri) {
            Ok(bytes) => bytes,
            Err(e) => {
                let state = match e {
                    RemoteError::NotFound(_) => {
                        CoreError::RemoteState(format!("no manifest archived at {archived_uri}"))
                    }
                    other => CoreError::RemoteState(format!(
                        "cannot read manifest at {archived_uri}: {other}"
                    )),
                };
                warn!("{state}; treating version {} as changed", latest.version);
                return Ok(PublicationStatus::Changed {
                    version: latest.version,
                });
            }
        };

        if archived == local {
            Ok(PublicationStatus::Unchanged {
                version: latest.version,
            })
        } else {
            Ok(PublicationStatus::Changed {
                version: latest.version,
            })
        }
    }
}

fn read_manifest(path: &Path) -> Result<Vec<u8>, CoreError> {
    fs::read(path).map_err(|e| {
        CoreError::Configuration(format!("cannot read manifest {}: {e}", path.display()))
    })
}

pub struct Publisher<'a> {
    pub store: &'a dyn ObjectStore,
    pub registry: &'a dyn LayerRegistry,
    pub remote: &'a RemoteLayout,
    pub reporter: &'a dyn Reporter,
}

impl Publisher<'_> {
    fn detector(&self) -> ChangeDetector<'_> {
        ChangeDetector {
            store: self.store,
            registry: self.registry,
            remote: self.remote,
        }
    }

    /// Register a new version from the uploaded archive if the manifest
    /// changed, then archive the manifest under the new version.
    ///
    /// Returns `None` when nothing changed; in that case nothing remote is
    /// written. Registration always happens before the manifest is archived,
    /// because the version number comes from the registry. If the process dies
    /// in between, the next detection sees no archived manifest and publishes
    /// again.
    pub fn publish(
        &self,
        layer_name: &str,
        tool: BuildTool,
        local_manifest: &Path,
        options: &PublishOptions,
    ) -> Result<Option<LayerDeployment>, CoreError> {
        let status = self.detector().detect(layer_name, tool, local_manifest)?;
        if !status.needs_publish() {
            self.reporter
                .info(&format!("{} unchanged, nothing to publish", tool.manifest_name()));
            return Ok(None);
        }

        let archive = self.remote.transient_archive();
        if !self.store.exists(&archive)? {
            return Err(CoreError::MissingArtifact(archive.to_string().into()));
        }
        let manifest = read_manifest(local_manifest)?;

        let arn = self.registry.publish_version(layer_name, &archive, options)?;
        let version = version_from_arn(&arn).ok_or_else(|| {
            CoreError::RemoteState(format!("cannot parse version number from '{arn}'"))
        })?;
        self.reporter
            .info(&format!("published {layer_name} version {version}"));

        let text = PutOptions::with_content_type("text/plain");
        let manifest_uri = self.remote.versioned_manifest(version, tool);
        self.store
            .put_object(&manifest_uri, manifest.clone(), &text)?;
        self.store
            .put_object(&self.remote.last_manifest(tool), manifest, &text)?;
        info!("archived manifest at {manifest_uri}");

        Ok(Some(LayerDeployment {
            layer_name: layer_name.to_owned(),
            version,
            version_arn: arn,
            manifest_uri,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::NullReporter;
    use stratum_remote::{MemoryLayerRegistry, MemoryObjectStore};

    struct Fixture {
        _dir: tempfile::TempDir,
        manifest: std::path::PathBuf,
        remote: RemoteLayout,
        store: MemoryObjectStore,
    }

    fn fixture(manifest: &str) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("uv.lock");
        fs::write(&path, manifest).unwrap();
        let remote = RemoteLayout::new(S3Uri::parse("s3://artifacts/deps").unwrap());
        let store = MemoryObjectStore::new();
        store.insert(&remote.transient_archive(), "PK");
        Fixture {
            _dir: dir,
            manifest: path,
            remote,
            store,
        }
    }

    #[test]
    fn unreadable_archived_manifest_counts_as_changed() {
        struct Broken;
        impl ObjectStore for Broken {
            fn put_object(&self, _: &S3Uri, _: Vec<u8>, _: &PutOptions) -> Result<(), RemoteError> {
                Ok(())
            }
            fn get_object(&self, _: &S3Uri) -> Result<Vec<u8>, RemoteError> {
                Err(RemoteError::Service("access denied".to_owned()))
            }
            fn exists(&self, _: &S3Uri) -> Result<bool, RemoteError> {
                Ok(true)
            }
        }
        let f = fixture("a==1\n");
        let registry =
            MemoryLayerRegistry::new().with_version("deps", 3, f.remote.transient_archive());
        let detector = ChangeDetector {
            store: &Broken,
            registry: &registry,
            remote: &f.remote,
        };
        assert_eq!(
            detector.detect("deps", BuildTool::Uv, &f.manifest).unwrap(),
            PublicationStatus::Changed { version: 3 }
        );
    }

    #[test]
    fn missing_local_manifest_is_configuration_error() {
        let f = fixture("a==1\n");
        let registry = MemoryLayerRegistry::new();
        let detector = ChangeDetector {
            store: &f.store,
            registry: &registry,
            remote: &f.remote,
        };
        let err = detector
            .detect("deps", BuildTool::Uv, &f.manifest.with_file_name("missing.lock"))
            .unwrap_err();
        assert!(matches!(err, CoreError::Configuration(_)));
    }

    #[test]
    fn publish_writes_versioned_and_last_manifest() {
        let f = fixture("a==1\n");
        let registry = MemoryLayerRegistry::new();
        let publisher = Publisher {
            store: &f.store,
            registry: &registry,
            remote: &f.remote,
            reporter: &NullReporter,
        };
        let options = PublishOptions {
            description: Some("deps".to_owned()),
            compatible_runtimes: vec!["python3.12".to_owned()],
            ..PublishOptions::default()
        };
        let deployment = publisher
            .publish("deps", BuildTool::Uv, &f.manifest, &options)
            .unwrap()
            .unwrap();

        assert_eq!(deployment.version, 1);
        assert_eq!(
            deployment.manifest_uri.to_string(),
            "s3://artifacts/deps/layer/000001/uv.lock"
        );
        let last = f.store.object(&f.remote.last_manifest(BuildTool::Uv)).unwrap();
        assert_eq!(last.body, b"a==1\n");
        assert_eq!(last.options.content_type.as_deref(), Some("text/plain"));
        assert_eq!(registry.published()[0].options, options);
    }

    #[test]
    fn publish_without_uploaded_archive_registers_nothing() {
        let f = fixture("a==1\n");
        f.store.remove(&f.remote.transient_archive());
        let registry = MemoryLayerRegistry::new();
        let publisher = Publisher {
            store: &f.store,
            registry: &registry,
            remote: &f.remote,
            reporter: &NullReporter,
        };
        let err = publisher
            .publish("deps", BuildTool::Uv, &f.manifest, &PublishOptions::default())
            .unwrap_err();
        assert!(matches!(err, CoreError::MissingArtifact(_)));
        assert!(registry.published().is_empty());
    }

    #[test]
    fn unparsable_arn_is_remote_state_error() {
        struct OddRegistry;
        impl LayerRegistry for OddRegistry {
            fn latest_version(
                &self,
                _: &str,
            ) -> Result<Option<stratum_remote::LayerVersion>, RemoteError> {
                Ok(None)
            }
            fn publish_version(
                &self,
                _: &str,
                _: &S3Uri,
                _: &PublishOptions,
            ) -> Result<String, RemoteError> {
                Ok("arn:aws:lambda:us-east-1:1:layer:deps:latest".to_owned())
            }
        }
        let f = fixture("a==1\n");
        let publisher = Publisher {
            store: &f.store,
            registry: &OddRegistry,
            remote: &f.remote,
            reporter: &NullReporter,
        };
        let err = publisher
            .publish("deps", BuildTool::Uv, &f.manifest, &PublishOptions::default())
            .unwrap_err();
        assert!(matches!(err, CoreError::RemoteState(_)));
    }
}
