use crate::uri::S3Uri;
use crate::{
    version_from_arn, LayerRegistry, LayerVersion, ObjectStore, PublishOptions, PutOptions,
    RemoteError,
};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>, RemoteError> {
    m.lock()
        .map_err(|e| RemoteError::Service(format!("mutex poisoned: {e}")))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub options: PutOptions,
}

/// In-memory object store keyed by full `s3://` URI.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, StoredObject>>,
    puts: Mutex<Vec<String>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without counting it as a write.
    pub fn insert(&self, uri: &S3Uri, body: impl Into<Vec<u8>>) {
        if let Ok(mut objects) = self.objects.lock() {
            objects.insert(
                uri.to_string(),
                StoredObject {
                    body: body.into(),
                    options: PutOptions::default(),
                },
            );
        }
    }

    pub fn remove(&self, uri: &S3Uri) -> Option<StoredObject> {
        self.objects.lock().ok()?.remove(&uri.to_string())
    }

    pub fn object(&self, uri: &S3Uri) -> Option<StoredObject> {
        self.objects.lock().ok()?.get(&uri.to_string()).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects
            .lock()
            .map(|o| o.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// URIs passed to `put_object`, in call order.
    pub fn puts(&self) -> Vec<String> {
        self.puts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl ObjectStore for MemoryObjectStore {
    fn put_object(
        &self,
        uri: &S3Uri,
        body: Vec<u8>,
        options: &PutOptions,
    ) -> Result<(), RemoteError> {
        lock(&self.puts)?.push(uri.to_string());
        lock(&self.objects)?.insert(
            uri.to_string(),
            StoredObject {
                body,
                options: options.clone(),
            },
        );
        Ok(())
    }

    fn get_object(&self, uri: &S3Uri) -> Result<Vec<u8>, RemoteError> {
        lock(&self.objects)?
            .get(&uri.to_string())
            .map(|o| o.body.clone())
            .ok_or_else(|| RemoteError::NotFound(uri.to_string()))
    }

    fn exists(&self, uri: &S3Uri) -> Result<bool, RemoteError> {
        Ok(lock(&self.objects)?.contains_key(&uri.to_string()))
    }
}

/// A version registered with [`MemoryLayerRegistry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedVersion {
    pub layer_name: String,
    pub version: u64,
    pub arn: String,
    pub content: S3Uri,
    pub options: PublishOptions,
}

/// In-memory layer registry assigning versions 1, 2, 3... per layer name.
#[derive(Debug)]
pub struct MemoryLayerRegistry {
    arn_prefix: String,
    versions: Mutex<Vec<PublishedVersion>>,
}

impl Default for MemoryLayerRegistry {
    fn default() -> Self {
        Self {
            arn_prefix: "arn:aws:lambda:us-east-1:111122223333:layer".to_owned(),
            versions: Mutex::new(Vec::new()),
        }
    }
}

impl MemoryLayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arn(&self, layer_name: &str, version: u64) -> String {
        format!("{}:{layer_name}:{version}", self.arn_prefix)
    }

    /// Pretend `version` of `layer_name` already exists.
    #[must_use]
    pub fn with_version(self, layer_name: &str, version: u64, content: S3Uri) -> Self {
        let arn = self.arn(layer_name, version);
        if let Ok(mut versions) = self.versions.lock() {
            versions.push(PublishedVersion {
                layer_name: layer_name.to_owned(),
                version,
                arn,
                content,
                options: PublishOptions::default(),
            });
        }
        self
    }

    pub fn published(&self) -> Vec<PublishedVersion> {
        self.versions.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl LayerRegistry for MemoryLayerRegistry {
    fn latest_version(&self, layer_name: &str) -> Result<Option<LayerVersion>, RemoteError> {
        Ok(lock(&self.versions)?
            .iter()
            .filter(|v| v.layer_name == layer_name)
            .max_by_key(|v| v.version)
            .map(|v| LayerVersion {
                version: v.version,
                arn: v.arn.clone(),
            }))
    }

    fn publish_version(
        &self,
        layer_name: &str,
        content: &S3Uri,
        options: &PublishOptions,
    ) -> Result<String, RemoteError> {
        let mut versions = lock(&self.versions)?;
        let next = versions
            .iter()
            .filter(|v| v.layer_name == layer_name)
            .map(|v| v.version)
            .max()
            .unwrap_or(0)
            + 1;
        let arn = self.arn(layer_name, next);
        debug_assert_eq!(version_from_arn(&arn), Some(next));
        versions.push(PublishedVersion {
            layer_name: layer_name.to_owned(),
            version: next,
            arn: arn.clone(),
            content: content.clone(),
            options: options.clone(),
        });
        Ok(arn)
    }
}
