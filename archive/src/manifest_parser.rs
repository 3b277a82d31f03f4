//! Manifest loading from extracted directories and in-memory streams.
//!
//! A missing manifest is not an error at this stage: it loads as
//! [`Manifest::default`], and validation later rejects it for lacking a
//! model record.

use crate::error::{ArchiveError, Result};
use crate::manifest::{MANIFEST_DIR, MANIFEST_FILE, Manifest};
use std::fs;
use std::io::{self, Read};
use std::path::Path;

/// Errors arising from manifest parsing.
#[derive(Debug, thiserror::Error)]
pub enum ManifestParseError {
    /// JSON deserialization failed.
    #[error("manifest parse error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<ManifestParseError> for ArchiveError {
    fn from(err: ManifestParseError) -> Self {
        Self::validation(err.to_string())
    }
}

/// Parse a JSON string into a [`Manifest`].
///
/// # Errors
///
/// Returns an error if the JSON is malformed or a field has the wrong
/// type.
///
/// # Examples
///
/// ```
/// use model_archive::manifest_parser::parse_manifest;
///
/// let json = r#"{"model":{"modelName":"resnet","modelVersion":"1.0"},"runtime":"python"}"#;
/// let manifest = parse_manifest(json).expect("valid manifest");
/// assert_eq!(manifest.model_name(), Some("resnet"));
/// ```
pub fn parse_manifest(json: &str) -> std::result::Result<Manifest, ManifestParseError> {
    Ok(serde_json::from_str(json)?)
}

/// Load `dir/MAR-INF/MANIFEST.json`, or an empty manifest when absent.
///
/// # Errors
///
/// Returns [`ArchiveError::Validation`] for malformed JSON and
/// [`ArchiveError::Extraction`] when the file exists but cannot be read.
pub fn load_manifest_file(dir: &Path) -> Result<Manifest> {
    let path = dir.join(MANIFEST_DIR).join(MANIFEST_FILE);
    match fs::read_to_string(&path) {
        Ok(contents) => Ok(parse_manifest(&contents)?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Manifest::default()),
        Err(e) => Err(ArchiveError::extraction(format!(
            "failed to read {}: {e}",
            path.display()
        ))),
    }
}

/// Load a manifest from `reader`, or an empty manifest when there is no
/// stream.
///
/// # Errors
///
/// Returns [`ArchiveError::Validation`] for malformed JSON and
/// [`ArchiveError::Extraction`] when the stream cannot be read.
pub fn load_manifest_reader(reader: Option<impl Read>) -> Result<Manifest> {
    let Some(mut reader) = reader else {
        return Ok(Manifest::default());
    };
    let mut contents = String::new();
    reader
        .read_to_string(&mut contents)
        .map_err(|e| ArchiveError::extraction(format!("failed to read manifest: {e}")))?;
    Ok(parse_manifest(&contents)?)
}
