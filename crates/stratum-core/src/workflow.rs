use crate::builder::{strategy_for, BuildContext, BuildOutput, Confirm, ExecutionMode};
use crate::concurrency::shutdown_requested;
use crate::packager::package_layer;
use crate::publish::{ChangeDetector, LayerDeployment, PublicationStatus, Publisher};
use crate::reporter::{run_step, Reporter, Step};
use crate::upload::upload_layer;
use crate::CoreError;
use std::collections::BTreeMap;
use stratum_remote::{LayerRegistry, ObjectStore, PublishOptions, RemoteLayout, S3Uri};
use stratum_runtime::ProcessRunner;
use stratum_schema::{BuildTool, Credentials};
use stratum_store::{fingerprint_dir, layer_filter, ArchiveOutput, ProjectLayout};
use tracing::info;

/// Everything that identifies one layer: where it is built, with which tool,
/// and where it goes.
#[derive(Debug, Clone)]
pub struct LayerProject {
    pub layout: ProjectLayout,
    pub tool: BuildTool,
    pub layer_name: Option<String>,
    pub remote: Option<RemoteLayout>,
    pub ignored_packages: Vec<String>,
    pub tags: BTreeMap<String, String>,
    pub publish_options: PublishOptions,
}

impl LayerProject {
    pub fn new(layout: ProjectLayout, tool: BuildTool) -> Self {
        Self {
            layout,
            tool,
            layer_name: None,
            remote: None,
            ignored_packages: stratum_store::DEFAULT_IGNORED_PACKAGES
                .iter()
                .map(|p| (*p).to_owned())
                .collect(),
            tags: BTreeMap::new(),
            publish_options: PublishOptions::default(),
        }
    }

    pub fn layer_name(&self) -> Result<&str, CoreError> {
        self.layer_name.as_deref().ok_or_else(|| {
            CoreError::Configuration(
                "layer name is not set; pass --layer-name or set layer.name".to_owned(),
            )
        })
    }

    pub fn remote(&self) -> Result<&RemoteLayout, CoreError> {
        self.remote.as_ref().ok_or_else(|| {
            CoreError::Configuration(
                "S3 directory is not set; pass --s3-dir or set layer.s3_dir".to_owned(),
            )
        })
    }
}

/// How the build stage runs.
#[derive(Debug, Clone, Default)]
pub struct BuildSettings {
    pub credentials: Option<Credentials>,
    pub skip_confirmation: bool,
    pub mode: ExecutionMode,
}

/// Outputs of a full run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub build: BuildOutput,
    pub archive: ArchiveOutput,
    pub uploaded: S3Uri,
    pub deployment: Option<LayerDeployment>,
}

struct RemoteServices<'a> {
    store: &'a dyn ObjectStore,
    registry: &'a dyn LayerRegistry,
}

/// Build, package, upload, publish. Each stage can be called on its own and
/// picks up the durable output of the previous one; [`run`](Self::run) chains
/// all four. A failure leaves earlier outputs in place and nothing is rolled
/// back.
pub struct Workflow<'a> {
    project: &'a LayerProject,
    runner: &'a dyn ProcessRunner,
    reporter: &'a dyn Reporter,
    confirm: &'a dyn Confirm,
    services: Option<RemoteServices<'a>>,
}

impl<'a> Workflow<'a> {
    pub fn new(
        project: &'a LayerProject,
        runner: &'a dyn ProcessRunner,
        reporter: &'a dyn Reporter,
        confirm: &'a dyn Confirm,
    ) -> Self {
        Self {
            project,
            runner,
            reporter,
            confirm,
            services: None,
        }
    }

    /// Attach the object store and layer registry needed by upload, publish
    /// and status.
    #[must_use]
    pub fn with_remote(
        mut self,
        store: &'a dyn ObjectStore,
        registry: &'a dyn LayerRegistry,
    ) -> Self {
        self.services = Some(RemoteServices { store, registry });
        self
    }

    fn services(&self) -> Result<&RemoteServices<'a>, CoreError> {
        self.services.as_ref().ok_or_else(|| {
            CoreError::Configuration("no object store or layer registry configured".to_owned())
        })
    }

    pub fn build(&self, settings: &BuildSettings) -> Result<BuildOutput, CoreError> {
        let tool = self.project.tool;
        run_step(self.reporter, Step::Build, tool.name(), || {
            let ctx = BuildContext {
                layout: &self.project.layout,
                credentials: settings.credentials.as_ref(),
                skip_confirmation: settings.skip_confirmation,
                mode: &settings.mode,
                runner: self.runner,
                reporter: self.reporter,
                confirm: self.confirm,
            };
            strategy_for(tool).build(&ctx)
        })
    }

    pub fn package(&self) -> Result<ArchiveOutput, CoreError> {
        let layout = &self.project.layout;
        let detail = layout.archive_path().display().to_string();
        run_step(self.reporter, Step::Package, &detail, || {
            package_layer(
                layout,
                self.project.tool,
                &self.project.ignored_packages,
                self.reporter,
            )
        })
    }

    /// Upload the archive. Without `archive` the fingerprint is recomputed
    /// from `artifacts/` with the same exclusions the archiver applies.
    pub fn upload(&self, archive: Option<&ArchiveOutput>) -> Result<S3Uri, CoreError> {
        let remote = self.project.remote()?;
        let services = self.services()?;
        let detail = remote.transient_archive().to_string();
        run_step(self.reporter, Step::Upload, &detail, || {
            let layout = &self.project.layout;
            let fingerprint = match archive {
                Some(out) => out.fingerprint.clone(),
                None => {
                    let artifacts = layout.artifacts_dir();
                    if !artifacts.is_dir() {
                        return Err(CoreError::MissingArtifact(artifacts));
                    }
                    let filter = layer_filter(&self.project.ignored_packages)?;
                    fingerprint_dir(&artifacts, &filter)?
                }
            };
            let path = archive.map_or_else(|| layout.archive_path(), |a| a.path.clone());
            upload_layer(
                services.store,
                &path,
                remote,
                &fingerprint,
                &self.project.tags,
            )
        })
    }

    /// Change detection only.
    pub fn status(&self) -> Result<PublicationStatus, CoreError> {
        let remote = self.project.remote()?;
        let services = self.services()?;
        let detector = ChangeDetector {
            store: services.store,
            registry: services.registry,
            remote,
        };
        let tool = self.project.tool;
        detector.detect(
            self.project.layer_name()?,
            tool,
            &self.project.layout.manifest_path(tool),
        )
    }

    pub fn publish(&self) -> Result<Option<LayerDeployment>, CoreError> {
        let remote = self.project.remote()?;
        let services = self.services()?;
        let layer_name = self.project.layer_name()?;
        run_step(self.reporter, Step::Publish, layer_name, || {
            let publisher = Publisher {
                store: services.store,
                registry: services.registry,
                remote,
                reporter: self.reporter,
            };
            let tool = self.project.tool;
            publisher.publish(
                layer_name,
                tool,
                &self.project.layout.manifest_path(tool),
                &self.project.publish_options,
            )
        })
    }

    /// All four stages in order, stopping between stages on Ctrl-C.
    pub fn run(&self, settings: &BuildSettings) -> Result<RunReport, CoreError> {
        // Fail on missing remote settings before spending time on a build.
        self.project.remote()?;
        self.project.layer_name()?;
        self.services()?;

        let build = self.build(settings)?;
        check_interrupt()?;
        let archive = self.package()?;
        check_interrupt()?;
        let uploaded = self.upload(Some(&archive))?;
        check_interrupt()?;
        let deployment = self.publish()?;
        match &deployment {
            Some(d) => info!("published {} version {}", d.layer_name, d.version),
            None => info!("no new layer version needed"),
        }
        Ok(RunReport {
            build,
            archive,
            uploaded,
            deployment,
        })
    }
}

fn check_interrupt() -> Result<(), CoreError> {
    if shutdown_requested() {
        Err(CoreError::Interrupted)
    } else {
        Ok(())
    }
}
