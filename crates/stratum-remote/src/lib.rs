//! Remote state for published layers.
//!
//! Two external services are consumed through small traits: an object store
//! ([`ObjectStore`], S3 in production) holding the transient archive and the
//! versioned manifests, and a layer registry ([`LayerRegistry`], AWS Lambda)
//! that assigns version numbers. [`RemoteLayout`] computes every object key
//! from one base directory. In-memory implementations back the test suites;
//! the AWS SDK adapters live behind the default `aws` feature.

#[cfg(feature = "aws")]
pub mod aws;
pub mod layout;
pub mod memory;
pub mod tagging;
pub mod uri;

#[cfg(feature = "aws")]
pub use aws::{AwsLayerRegistry, AwsObjectStore, AwsSettings};
pub use layout::{RemoteLayout, VERSION_WIDTH};
pub use memory::{MemoryLayerRegistry, MemoryObjectStore, PublishedVersion, StoredObject};
pub use tagging::encode_tags;
pub use uri::S3Uri;

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("remote I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("service error: {0}")]
    Service(String),
    #[error("invalid S3 URI '{0}': expected s3://bucket/key")]
    InvalidUri(String),
    #[error("remote config error: {0}")]
    Config(String),
}

/// Attributes written alongside an object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PutOptions {
    pub content_type: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub tags: BTreeMap<String, String>,
}

impl PutOptions {
    pub fn with_content_type(content_type: &str) -> Self {
        Self {
            content_type: Some(content_type.to_owned()),
            ..Self::default()
        }
    }
}

/// Object storage operations the publish pipeline needs.
pub trait ObjectStore: Send + Sync {
    /// Write `body` at `uri`, replacing any existing object.
    fn put_object(&self, uri: &S3Uri, body: Vec<u8>, options: &PutOptions)
        -> Result<(), RemoteError>;

    /// Read the object at `uri`. A missing object is [`RemoteError::NotFound`].
    fn get_object(&self, uri: &S3Uri) -> Result<Vec<u8>, RemoteError>;

    fn exists(&self, uri: &S3Uri) -> Result<bool, RemoteError>;
}

/// One registered layer version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerVersion {
    pub version: u64,
    pub arn: String,
}

/// Settings forwarded with a new layer version.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishOptions {
    pub description: Option<String>,
    pub compatible_runtimes: Vec<String>,
    pub compatible_architectures: Vec<String>,
    pub license_info: Option<String>,
}

/// Version registry for named layers.
pub trait LayerRegistry: Send + Sync {
    /// Highest registered version of `layer_name`, or `None` if it has never
    /// been published.
    fn latest_version(&self, layer_name: &str) -> Result<Option<LayerVersion>, RemoteError>;

    /// Register a new version whose content is the archive at `content`.
    /// Returns the version ARN; its last `:` segment is the version number.
    fn publish_version(
        &self,
        layer_name: &str,
        content: &S3Uri,
        options: &PublishOptions,
    ) -> Result<String, RemoteError>;
}

impl<T: ObjectStore + ?Sized> ObjectStore for std::sync::Arc<T> {
    fn put_object(
        &self,
        uri: &S3Uri,
        body: Vec<u8>,
        options: &PutOptions,
    ) -> Result<(), RemoteError> {
        (**self).put_object(uri, body, options)
    }

    fn get_object(&self, uri: &S3Uri) -> Result<Vec<u8>, RemoteError> {
        (**self).get_object(uri)
    }

    fn exists(&self, uri: &S3Uri) -> Result<bool, RemoteError> {
        (**self).exists(uri)
    }
}

impl<T: LayerRegistry + ?Sized> LayerRegistry for std::sync::Arc<T> {
    fn latest_version(&self, layer_name: &str) -> Result<Option<LayerVersion>, RemoteError> {
        (**self).latest_version(layer_name)
    }

    fn publish_version(
        &self,
        layer_name: &str,
        content: &S3Uri,
        options: &PublishOptions,
    ) -> Result<String, RemoteError> {
        (**self).publish_version(layer_name, content, options)
    }
}

/// Version number from a layer version ARN
/// (`arn:aws:lambda:<region>:<account>:layer:<name>:<version>`).
pub fn version_from_arn(arn: &str) -> Option<u64> {
    arn.rsplit(':').next()?.parse().ok()
}
