use crate::StoreError;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use stratum_schema::PathFilter;
use walkdir::WalkDir;

/// Incremental SHA-256 over `(relative path, content)` pairs.
///
/// Callers must feed files in a stable order; [`fingerprint_dir`] and the
/// archiver both walk sorted by file name.
pub struct Fingerprint {
    hasher: Sha256,
}

impl Default for Fingerprint {
    fn default() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }
}

impl Fingerprint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, relative: &str, content: &[u8]) {
        self.hasher.update(relative.as_bytes());
        self.hasher.update([0u8]);
        self.hasher.update((content.len() as u64).to_le_bytes());
        self.hasher.update(content);
    }

    pub fn finish(self) -> String {
        hex::encode(self.hasher.finalize())
    }
}

/// Relative path of `path` under `base`, `/`-separated.
pub(crate) fn relative_parts(base: &Path, path: &Path) -> Vec<String> {
    path.strip_prefix(base)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect()
}

/// Hash every regular file under `dir` that `filter` admits.
pub fn fingerprint_dir(dir: &Path, filter: &PathFilter) -> Result<String, StoreError> {
    let mut fp = Fingerprint::new();
    let walker = WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            let parts = relative_parts(dir, e.path());
            let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
            filter.is_match(&refs)
        });
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = relative_parts(dir, entry.path()).join("/");
        fp.add_file(&name, &fs::read(entry.path())?);
    }
    Ok(fp.finish())
}
