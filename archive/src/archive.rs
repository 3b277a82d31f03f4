//! The handle returned by a successful acquisition.
//!
//! A [`ModelArchive`] owns its parsed manifest and knows whether the
//! directory it points at was created for it. Only in that case does
//! [`cleanup`](ModelArchive::cleanup) remove anything.

use crate::error::Result;
use crate::manifest::Manifest;
use crate::rollback::remove_quietly;
use crate::source::{ensure_no_traversal, parse_remote};
use crate::validation::{Advisory, validate_manifest};
use log::{debug, info};
use std::path::{Path, PathBuf};

/// A resolved, extracted, and manifest-bearing model archive.
///
/// Not `Clone`: exactly one handle owns a directory it extracted.
///
/// ```compile_fail
/// fn requires_clone<T: Clone>() {}
/// requires_clone::<model_archive::ModelArchive>();
/// ```
#[derive(Debug, PartialEq, Eq)]
pub struct ModelArchive {
    manifest: Manifest,
    reference: String,
    model_dir: PathBuf,
    archive_path: Option<PathBuf>,
    self_extracted: bool,
    advisories: Vec<Advisory>,
}

impl ModelArchive {
    pub(crate) fn new(
        manifest: Manifest,
        reference: impl Into<String>,
        model_dir: PathBuf,
        archive_path: Option<PathBuf>,
        self_extracted: bool,
    ) -> Self {
        Self {
            manifest,
            reference: reference.into(),
            model_dir,
            archive_path,
            self_extracted,
            advisories: Vec::new(),
        }
    }

    /// Record the advisories raised when the pipeline validated the handle.
    pub(crate) fn with_advisories(mut self, advisories: Vec<Advisory>) -> Self {
        self.advisories = advisories;
        self
    }

    /// The parsed manifest.
    #[must_use]
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// The model name declared in the manifest.
    #[must_use]
    pub fn model_name(&self) -> Option<&str> {
        self.manifest.model_name()
    }

    /// The model version declared in the manifest.
    #[must_use]
    pub fn model_version(&self) -> Option<&str> {
        self.manifest.model_version()
    }

    /// The handler entry point declared in the manifest.
    #[must_use]
    pub fn handler(&self) -> Option<&str> {
        self.manifest.handler()
    }

    /// The reference this archive was acquired from.
    #[must_use]
    pub fn reference(&self) -> &str {
        &self.reference
    }

    /// Directory holding the model contents.
    #[must_use]
    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    /// Archive file in the store, when the model came from one.
    #[must_use]
    pub fn archive_path(&self) -> Option<&Path> {
        self.archive_path.as_deref()
    }

    /// Whether [`model_dir`](Self::model_dir) was created by the
    /// acquisition and is therefore removed by [`cleanup`](Self::cleanup).
    #[must_use]
    pub fn is_self_extracted(&self) -> bool {
        self.self_extracted
    }

    /// Advisories raised when the acquisition validated the manifest.
    #[must_use]
    pub fn advisories(&self) -> &[Advisory] {
        &self.advisories
    }

    /// Remove the model directory if this handle created it.
    ///
    /// Safe to call more than once. Failures are logged, never returned.
    pub fn cleanup(&self) {
        if !self.self_extracted {
            return;
        }
        if remove_quietly(&self.model_dir) {
            debug!("removed extracted model {}", self.model_dir.display());
        }
    }

    /// Validate the manifest, cleaning up on a fatal violation.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Validation`](crate::error::ArchiveError::Validation)
    /// for the first fatal rule that failed.
    pub fn validate(&self) -> Result<Vec<Advisory>> {
        validate_manifest(&self.manifest).inspect_err(|_| self.cleanup())
    }
}

/// Delete the archive file that a remote `reference` was downloaded to.
///
/// Only URL references are considered; the file is
/// `store/<final path segment>`. References containing `..` are ignored.
/// Returns whether a file was removed.
///
/// # Examples
///
/// ```
/// use model_archive::archive::remove_by_reference;
///
/// let store = tempfile::tempdir().expect("temp dir");
/// std::fs::write(store.path().join("resnet.mar"), b"zip").expect("write");
///
/// assert!(!remove_by_reference(store.path(), "resnet.mar"));
/// assert!(remove_by_reference(store.path(), "https://host/models/resnet.mar"));
/// assert!(!store.path().join("resnet.mar").exists());
/// ```
pub fn remove_by_reference(store: &Path, reference: &str) -> bool {
    if ensure_no_traversal(reference).is_err() {
        return false;
    }
    let Some((_, filename)) = parse_remote(reference) else {
        return false;
    };
    if filename.is_empty() {
        return false;
    }
    let target = store.join(&filename);
    if !target.is_file() {
        return false;
    }
    let removed = remove_quietly(&target);
    if removed {
        info!("removed {} downloaded from {reference}", target.display());
    }
    removed
}
