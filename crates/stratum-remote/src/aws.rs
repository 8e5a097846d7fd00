//! S3 and Lambda adapters over the AWS SDK.
//!
//! The SDK is async; the rest of stratum is not. Each adapter owns a
//! current-thread tokio runtime and blocks on every call.

use crate::tagging::encode_tags;
use crate::uri::S3Uri;
use crate::{LayerRegistry, LayerVersion, ObjectStore, PublishOptions, PutOptions, RemoteError};
use aws_config::BehaviorVersion;
use aws_sdk_lambda::types::{Architecture, LayerVersionContentInput, Runtime};
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info};

/// Region and named profile overrides on top of the default AWS provider chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AwsSettings {
    pub region: Option<String>,
    pub profile: Option<String>,
}

impl AwsSettings {
    pub fn new(region: Option<String>, profile: Option<String>) -> Self {
        Self { region, profile }
    }

    /// Load shared SDK config and build both adapters on one runtime.
    pub fn connect(&self) -> Result<(AwsObjectStore, AwsLayerRegistry), RemoteError> {
        let runtime = Arc::new(
            tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()?,
        );
        let sdk_config = runtime.block_on(self.load())?;
        info!(
            "aws region: {}",
            sdk_config
                .region()
                .map_or("<unset>", |r| r.as_ref())
        );
        Ok((
            AwsObjectStore {
                client: aws_sdk_s3::Client::new(&sdk_config),
                runtime: Arc::clone(&runtime),
            },
            AwsLayerRegistry {
                client: aws_sdk_lambda::Client::new(&sdk_config),
                runtime,
            },
        ))
    }

    async fn load(&self) -> Result<aws_config::SdkConfig, RemoteError> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &self.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(profile) = &self.profile {
            loader = loader.profile_name(profile);
        }
        let config = loader.load().await;
        if config.region().is_none() {
            return Err(RemoteError::Config(
                "no AWS region configured; set AWS_REGION or pass --region".to_owned(),
            ));
        }
        Ok(config)
    }
}

fn block_on<F: Future>(runtime: &tokio::runtime::Runtime, fut: F) -> F::Output {
    runtime.block_on(fut)
}

fn service_error<E>(what: &str, err: E) -> RemoteError
where
    E: std::error::Error,
{
    RemoteError::Service(format!("{what}: {}", DisplayErrorContext(err)))
}

pub struct AwsObjectStore {
    client: aws_sdk_s3::Client,
    runtime: Arc<tokio::runtime::Runtime>,
}

impl ObjectStore for AwsObjectStore {
    fn put_object(
        &self,
        uri: &S3Uri,
        body: Vec<u8>,
        options: &PutOptions,
    ) -> Result<(), RemoteError> {
        debug!("put {uri} ({} bytes)", body.len());
        let mut request = self
            .client
            .put_object()
            .bucket(&uri.bucket)
            .key(&uri.key)
            .body(ByteStream::from(body));
        if let Some(content_type) = &options.content_type {
            request = request.content_type(content_type);
        }
        for (key, value) in &options.metadata {
            request = request.metadata(key, value);
        }
        if !options.tags.is_empty() {
            request = request.tagging(encode_tags(&options.tags));
        }
        block_on(&self.runtime, request.send())
            .map_err(|e| service_error(&format!("failed to put {uri}"), e))?;
        Ok(())
    }

    fn get_object(&self, uri: &S3Uri) -> Result<Vec<u8>, RemoteError> {
        debug!("get {uri}");
        let resp = block_on(
            &self.runtime,
            self.client
                .get_object()
                .bucket(&uri.bucket)
                .key(&uri.key)
                .send(),
        )
        .map_err(|e| {
            let err = e.into_service_error();
            if err.is_no_such_key() {
                RemoteError::NotFound(uri.to_string())
            } else {
                service_error(&format!("failed to get {uri}"), err)
            }
        })?;
        let bytes = block_on(&self.runtime, resp.body.collect())
            .map_err(|e| service_error(&format!("failed to read {uri}"), e))?;
        Ok(bytes.to_vec())
    }

    fn exists(&self, uri: &S3Uri) -> Result<bool, RemoteError> {
        let result = block_on(
            &self.runtime,
            self.client
                .head_object()
                .bucket(&uri.bucket)
                .key(&uri.key)
                .send(),
        );
        match result {
            Ok(_) => Ok(true),
            Err(e) => {
                let err = e.into_service_error();
                if err.is_not_found() {
                    Ok(false)
                } else {
                    Err(service_error(&format!("failed to head {uri}"), err))
                }
            }
        }
    }
}

pub struct AwsLayerRegistry {
    client: aws_sdk_lambda::Client,
    runtime: Arc<tokio::runtime::Runtime>,
}

impl LayerRegistry for AwsLayerRegistry {
    fn latest_version(&self, layer_name: &str) -> Result<Option<LayerVersion>, RemoteError> {
        // Versions come back newest first, so the first page holds the latest.
        let result = block_on(
            &self.runtime,
            self.client
                .list_layer_versions()
                .layer_name(layer_name)
                .send(),
        );
        let output = match result {
            Ok(output) => output,
            Err(e) => {
                let err = e.into_service_error();
                if err.is_resource_not_found_exception() {
                    return Ok(None);
                }
                return Err(service_error(
                    &format!("failed to list versions of layer '{layer_name}'"),
                    err,
                ));
            }
        };
        let latest = output
            .layer_versions()
            .iter()
            .filter_map(|item| {
                let version = u64::try_from(item.version()).ok()?;
                let arn = item.layer_version_arn()?.to_owned();
                Some(LayerVersion { version, arn })
            })
            .max_by_key(|v| v.version);
        debug!("latest version of '{layer_name}': {latest:?}");
        Ok(latest)
    }

    fn publish_version(
        &self,
        layer_name: &str,
        content: &S3Uri,
        options: &PublishOptions,
    ) -> Result<String, RemoteError> {
        let input = LayerVersionContentInput::builder()
            .s3_bucket(&content.bucket)
            .s3_key(&content.key)
            .build();
        let mut request = self
            .client
            .publish_layer_version()
            .layer_name(layer_name)
            .content(input);
        if let Some(description) = &options.description {
            request = request.description(description);
        }
        if let Some(license) = &options.license_info {
            request = request.license_info(license);
        }
        for runtime in &options.compatible_runtimes {
            request = request.compatible_runtimes(Runtime::from(runtime.as_str()));
        }
        for arch in &options.compatible_architectures {
            request = request.compatible_architectures(Architecture::from(arch.as_str()));
        }
        let output = block_on(&self.runtime, request.send()).map_err(|e| {
            service_error(&format!("failed to publish layer '{layer_name}'"), e)
        })?;
        output
            .layer_version_arn()
            .map(str::to_owned)
            .ok_or_else(|| {
                RemoteError::Service(format!(
                    "publish of layer '{layer_name}' returned no version ARN"
                ))
            })
    }
}
