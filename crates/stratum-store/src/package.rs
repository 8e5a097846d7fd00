use crate::fingerprint::{relative_parts, Fingerprint};
use crate::layout::ProjectLayout;
use crate::StoreError;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use stratum_schema::PathFilter;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

/// Packages left out of the layer: provided by the Lambda runtime, or only
/// needed to build and test.
pub const DEFAULT_IGNORED_PACKAGES: &[&str] = &[
    "boto3",
    "botocore",
    "s3transfer",
    "urllib3",
    "setuptools",
    "pip",
    "wheel",
    "twine",
    "_pytest",
    "pytest",
];

/// Result of [`archive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveOutput {
    pub path: PathBuf,
    /// Hex SHA-256 over every archived file.
    pub fingerprint: String,
    pub files: usize,
}

/// `python/{pkg}*` for each package name.
pub fn exclusion_patterns<S: AsRef<str>>(packages: &[S]) -> Vec<String> {
    packages
        .iter()
        .map(|p| format!("python/{}*", p.as_ref()))
        .collect()
}

/// Root-anchored filter that drops `python/{pkg}*` for each ignored package.
/// Nested directories that happen to share a name stay in the layer.
pub fn layer_filter<S: AsRef<str>>(ignored_packages: &[S]) -> Result<PathFilter, StoreError> {
    Ok(PathFilter::anchored_excluding(&exclusion_patterns(
        ignored_packages,
    ))?)
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Move the tool's installation directory into `artifacts/python`.
///
/// Fails without touching anything if `site_packages` is missing. A no-op when
/// source and destination are the same directory. An existing destination is
/// swapped out by rename and only deleted once the new one is in place.
pub fn relocate(site_packages: &Path, layout: &ProjectLayout) -> Result<(), StoreError> {
    if !site_packages.is_dir() {
        return Err(StoreError::MissingArtifact(site_packages.to_path_buf()));
    }
    let dest = layout.python_dir();
    if same_dir(site_packages, &dest) {
        debug!("{} already in place", dest.display());
        return Ok(());
    }
    fs::create_dir_all(layout.artifacts_dir())?;

    let backup = layout.build_root().join(".python.previous");
    if backup.exists() {
        fs::remove_dir_all(&backup)?;
    }
    let had_previous = dest.exists();
    if had_previous {
        fs::rename(&dest, &backup)?;
    }
    if let Err(e) = fs::rename(site_packages, &dest) {
        if had_previous {
            fs::rename(&backup, &dest)?;
        }
        return Err(e.into());
    }
    if had_previous {
        fs::remove_dir_all(&backup)?;
    }
    info!(
        "relocated {} -> {}",
        site_packages.display(),
        dest.display()
    );
    Ok(())
}

#[cfg(unix)]
fn file_mode(meta: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o777
}

#[cfg(not(unix))]
fn file_mode(_meta: &fs::Metadata) -> u32 {
    0o644
}

fn entry_options(mode: u32) -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9))
        .last_modified_time(DateTime::default())
        .unix_permissions(mode)
}

/// Zip the artifacts directory into `layer.zip`.
///
/// Entry names are relative to the artifacts directory so `python/` sits at
/// the archive root. Any entry whose path matches `python/{pkg}*` for an
/// ignored package is skipped along with its subtree. Entries are written in
/// sorted order with a fixed timestamp at Deflate level 9.
pub fn archive<S: AsRef<str>>(
    layout: &ProjectLayout,
    ignored_packages: &[S],
) -> Result<ArchiveOutput, StoreError> {
    let base = layout.artifacts_dir();
    if !base.is_dir() {
        return Err(StoreError::MissingArtifact(base));
    }
    let filter = layer_filter(ignored_packages)?;
    let build_root = layout.build_root();

    let mut tmp = NamedTempFile::new_in(&build_root)?;
    let mut zip = ZipWriter::new(tmp.as_file_mut());
    let mut fingerprint = Fingerprint::new();
    let mut files = 0usize;
    let walker = WalkDir::new(&base)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            let parts = relative_parts(&base, e.path());
            let refs: Vec<&str> = parts.iter().map(String::as_str).collect();
            filter.is_match(&refs)
        });

    for entry in walker {
        let entry = entry?;
        let name = relative_parts(&base, entry.path()).join("/");
        let options = entry_options(file_mode(&entry.metadata()?));
        if entry.file_type().is_dir() {
            zip.add_directory(format!("{name}/"), options)?;
        } else if entry.file_type().is_file() {
            let content = fs::read(entry.path())?;
            zip.start_file(name.as_str(), options)?;
            zip.write_all(&content)?;
            fingerprint.add_file(&name, &content);
            files += 1;
        }
    }
    zip.finish()?;
    tmp.as_file().sync_all()?;

    let path = layout.archive_path();
    tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
    let fingerprint = fingerprint.finish();
    info!(
        "wrote {} ({files} files, sha256 {fingerprint})",
        path.display()
    );
    Ok(ArchiveOutput {
        path,
        fingerprint,
        files,
    })
}

/// Names of the entries in a zip archive, in archive order.
pub fn archive_entries(path: &Path) -> Result<Vec<String>, StoreError> {
    let zip = zip::ZipArchive::new(File::open(path)?)?;
    Ok(zip.file_names().map(str::to_owned).collect())
}
