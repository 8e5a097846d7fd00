use crate::RemoteError;
use std::fmt;
use std::str::FromStr;

/// `s3://bucket/key`. A key ending in `/` (or empty) names a directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct S3Uri {
    pub bucket: String,
    pub key: String,
}

impl S3Uri {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn parse(uri: &str) -> Result<Self, RemoteError> {
        let rest = uri
            .strip_prefix("s3://")
            .ok_or_else(|| RemoteError::InvalidUri(uri.to_owned()))?;
        let (bucket, key) = rest.split_once('/').unwrap_or((rest, ""));
        if bucket.is_empty() {
            return Err(RemoteError::InvalidUri(uri.to_owned()));
        }
        Ok(Self::new(bucket, key))
    }

    pub fn is_dir(&self) -> bool {
        self.key.is_empty() || self.key.ends_with('/')
    }

    /// The same location as a directory (trailing `/`).
    #[must_use]
    pub fn to_dir(&self) -> Self {
        if self.is_dir() {
            self.clone()
        } else {
            Self::new(self.bucket.as_str(), format!("{}/", self.key))
        }
    }

    /// Append `part` below this location, treating it as a directory.
    #[must_use]
    pub fn join(&self, part: &str) -> Self {
        let dir = self.to_dir();
        Self::new(
            dir.bucket,
            format!("{}{}", dir.key, part.trim_start_matches('/')),
        )
    }
}

impl fmt::Display for S3Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

impl FromStr for S3Uri {
    type Err = RemoteError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
