//! Model archive packaging.
//!
//! Bundles a directory of model files into a `.mar` zip with a generated
//! `MAR-INF/MANIFEST.json`, optionally sealing the result with the same
//! AES transform that acquisition reverses.

use crate::crypto::{encrypt_bytes, load_key};
use crate::manifest::{MANIFEST_DIR, MANIFEST_PATH, Manifest, ModelInfo, Runtime};
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// File extension of packaged archives.
pub const ARCHIVE_EXTENSION: &str = "mar";

/// Errors arising from packaging.
#[derive(Debug, Error)]
pub enum PackagingError {
    /// An I/O operation failed (reading model files, writing the archive).
    #[error("I/O error during packaging: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization of the manifest failed.
    #[error("manifest serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Writing the zip container failed.
    #[error("archive write error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// The model name contains characters outside `[A-Za-z0-9_.-]` or
    /// does not start with a letter or digit.
    #[error(
        "invalid model name \"{0}\": use letters, digits, '_', '-' or '.', starting with a letter or digit"
    )]
    InvalidModelName(String),

    /// The model version is empty.
    #[error("model version must not be empty")]
    EmptyVersion,

    /// The model source is not a directory.
    #[error("model source is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An archive already exists at the output path and `force` was not
    /// set.
    #[error("{0} already exists; use --force to overwrite")]
    AlreadyExists(PathBuf),

    /// The encryption key could not be loaded or used.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Failed to read the system clock.
    #[error("system time error: {0}")]
    SystemTime(#[from] std::time::SystemTimeError),
}

/// Input parameters for [`package_archive`].
#[derive(Debug, Clone)]
pub struct PackageParams {
    /// Model name; also the archive's file stem.
    pub model_name: String,
    /// Model version.
    pub model_version: String,
    /// Handler entry point recorded in the manifest.
    pub handler: Option<String>,
    /// Serialized weights file recorded in the manifest.
    pub serialized_file: Option<String>,
    /// Runtime recorded in the manifest.
    pub runtime: Runtime,
    /// Free-form description recorded in the manifest.
    pub description: Option<String>,
    /// Directory whose contents become the archive body.
    pub source_dir: PathBuf,
    /// Directory the archive is written to.
    pub output_dir: PathBuf,
    /// Creation timestamp [default: current UTC time].
    pub created_on: Option<String>,
    /// Overwrite an existing archive.
    pub force: bool,
    /// Raw key file; when set the archive is encrypted.
    pub key_file: Option<PathBuf>,
}

/// Output produced by [`package_archive`].
#[derive(Debug)]
pub struct PackageOutput {
    /// Path to the created archive.
    pub archive_path: PathBuf,
    /// The manifest embedded in the archive.
    pub manifest: Manifest,
    /// Whether the archive was encrypted.
    pub encrypted: bool,
}

/// Check a model name against `^[A-Za-z0-9][A-Za-z0-9_\-.]*$`.
///
/// # Examples
///
/// ```
/// use model_archive::packaging::is_valid_model_name;
///
/// assert!(is_valid_model_name("resnet-18_v1.0"));
/// assert!(!is_valid_model_name("-resnet"));
/// assert!(!is_valid_model_name("res net"));
/// ```
#[must_use]
pub fn is_valid_model_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphanumeric())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

/// Package `params.source_dir` into `<output_dir>/<model_name>.mar`.
///
/// Any `MAR-INF/` directory in the source is replaced by the generated
/// manifest. Entries are added in sorted order so that identical inputs
/// produce identical entry lists.
///
/// # Errors
///
/// Returns a [`PackagingError`] when inputs are invalid, the archive
/// already exists without `force`, the key is unusable, or I/O fails.
pub fn package_archive(params: PackageParams) -> Result<PackageOutput, PackagingError> {
    if !is_valid_model_name(&params.model_name) {
        return Err(PackagingError::InvalidModelName(params.model_name));
    }
    if params.model_version.trim().is_empty() {
        return Err(PackagingError::EmptyVersion);
    }
    if !params.source_dir.is_dir() {
        return Err(PackagingError::NotADirectory(params.source_dir));
    }

    let archive_path = params
        .output_dir
        .join(format!("{}.{ARCHIVE_EXTENSION}", params.model_name));
    if archive_path.exists() && !params.force {
        return Err(PackagingError::AlreadyExists(archive_path));
    }

    let manifest = build_manifest(&params)?;
    let files = collect_files(&params.source_dir)?;
    let mut bytes = create_archive(&manifest, &files)?;

    let encrypted = params.key_file.is_some();
    if let Some(key_file) = &params.key_file {
        let key = load_key(key_file).map_err(|e| PackagingError::Encryption(e.to_string()))?;
        bytes = encrypt_bytes(&bytes, &key).map_err(|e| PackagingError::Encryption(e.to_string()))?;
    }

    fs::create_dir_all(&params.output_dir)?;
    let mut staged = tempfile::NamedTempFile::new_in(&params.output_dir)?;
    staged.write_all(&bytes)?;
    staged.persist(&archive_path).map_err(|e| e.error)?;

    Ok(PackageOutput {
        archive_path,
        manifest,
        encrypted,
    })
}

/// Write `manifest` and `files` into an in-memory zip.
///
/// Each entry in `files` is a `(source_path, archive_name)` pair.
///
/// # Errors
///
/// Returns [`PackagingError`] when a source file cannot be read or the
/// zip cannot be written.
pub fn create_archive(
    manifest: &Manifest,
    files: &[(PathBuf, String)],
) -> Result<Vec<u8>, PackagingError> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();

    writer.start_file(MANIFEST_PATH, options)?;
    writer.write_all(serde_json::to_string_pretty(manifest)?.as_bytes())?;

    for (source, name) in files {
        writer.start_file(name.as_str(), options)?;
        writer.write_all(&fs::read(source)?)?;
    }
    Ok(writer.finish()?.into_inner())
}

fn build_manifest(params: &PackageParams) -> Result<Manifest, PackagingError> {
    let mut model = ModelInfo::new(&params.model_name, &params.model_version);
    model.handler.clone_from(&params.handler);
    model.serialized_file.clone_from(&params.serialized_file);

    let created_on = match &params.created_on {
        Some(created_on) => created_on.clone(),
        None => now_utc_timestamp()?,
    };
    let manifest = Manifest::new(params.runtime, model)
        .with_archiver_version(env!("CARGO_PKG_VERSION"))
        .with_created_on(created_on);
    Ok(match &params.description {
        Some(description) => manifest.with_description(description),
        None => manifest,
    })
}

/// List regular files beneath `root` as `(path, archive_name)` pairs,
/// sorted by archive name.
fn collect_files(root: &Path) -> Result<Vec<(PathBuf, String)>, PackagingError> {
    let mut files = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            if name == MANIFEST_DIR || name.starts_with(&format!("{MANIFEST_DIR}/")) {
                continue;
            }
            if path.is_dir() {
                pending.push(path);
            } else if path.is_file() {
                files.push((path, name));
            }
        }
    }
    files.sort_by(|a, b| a.1.cmp(&b.1));
    Ok(files)
}

/// Return the current UTC time as `DD/MM/YYYY hh:mm:ss`.
fn now_utc_timestamp() -> Result<String, std::time::SystemTimeError> {
    let secs = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
    Ok(format_epoch_secs(secs))
}

/// Format a Unix epoch timestamp as `DD/MM/YYYY hh:mm:ss`.
fn format_epoch_secs(epoch_secs: u64) -> String {
    let (year, month, day) = civil_from_days(epoch_secs / 86_400);
    let day_secs = epoch_secs % 86_400;
    let hour = day_secs / 3_600;
    let minute = (day_secs % 3_600) / 60;
    let second = day_secs % 60;
    format!("{day:02}/{month:02}/{year:04} {hour:02}:{minute:02}:{second:02}")
}

/// Convert days since the Unix epoch to `(year, month, day)`.
///
/// Howard Hinnant's `civil_from_days`, restricted to post-epoch dates.
fn civil_from_days(days: u64) -> (u64, u64, u64) {
    let z = days + 719_468;
    let era = z / 146_097;
    let doe = z % 146_097;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + u64::from(month <= 2);
    (year, month, day)
}

#[cfg(test)]
#[path = "packaging_tests.rs"]
mod tests;
