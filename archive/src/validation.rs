//! Manifest validation rules.
//!
//! Rules run in a fixed order and the first fatal violation wins. Missing
//! provenance fields are advisory: they are logged and returned so callers
//! can surface them, but they never stop a load.

use crate::error::{ArchiveError, Result};
use crate::manifest::Manifest;
use log::warn;
use std::fmt;

/// A non-fatal manifest deficiency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Advisory {
    /// `archiverVersion` is absent.
    MissingArchiverVersion,
    /// `createdOn` is absent.
    MissingCreatedOn,
}

impl fmt::Display for Advisory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingArchiverVersion => write!(
                f,
                "model archive version is not defined; repackage with a current archiver"
            ),
            Self::MissingCreatedOn => write!(
                f,
                "model archive createdOn is not defined; repackage with a current archiver"
            ),
        }
    }
}

/// Check `manifest` against the mandatory and advisory rules.
///
/// Fatal rules, in order: model record present, model name present, model
/// version present, runtime present and recognised.
///
/// # Errors
///
/// Returns [`ArchiveError::Validation`] describing the first fatal rule
/// that failed.
///
/// # Examples
///
/// ```
/// use model_archive::manifest::{Manifest, ModelInfo, Runtime};
/// use model_archive::validation::{Advisory, validate_manifest};
///
/// let manifest = Manifest::new(Runtime::Python, ModelInfo::new("resnet", "1.0"));
/// let advisories = validate_manifest(&manifest).expect("valid");
/// assert_eq!(
///     advisories,
///     vec![Advisory::MissingArchiverVersion, Advisory::MissingCreatedOn],
/// );
/// assert!(validate_manifest(&Manifest::default()).is_err());
/// ```
pub fn validate_manifest(manifest: &Manifest) -> Result<Vec<Advisory>> {
    let model = manifest
        .model()
        .ok_or_else(|| ArchiveError::validation("missing model entry in manifest file"))?;
    if model.model_name.is_none() {
        return Err(ArchiveError::validation("model name is not defined"));
    }
    if model.model_version.is_none() {
        return Err(ArchiveError::validation("model version is not defined"));
    }
    if manifest.runtime_kind().is_none() {
        return Err(ArchiveError::validation("runtime is not defined or invalid"));
    }

    let mut advisories = Vec::new();
    if manifest.archiver_version().is_none() {
        advisories.push(Advisory::MissingArchiverVersion);
    }
    if manifest.created_on().is_none() {
        advisories.push(Advisory::MissingCreatedOn);
    }
    for advisory in &advisories {
        warn!("{advisory}");
    }
    Ok(advisories)
}
