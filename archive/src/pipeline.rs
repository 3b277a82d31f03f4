//! The acquisition state machine.
//!
//! [`Acquirer::acquire`] walks a reference through classification, an
//! optional fetch, optional decryption, extraction, manifest loading, and
//! validation. Every file or directory created along the way is held by a
//! [`RollbackGuard`] until the handle is ready, so an early return leaves
//! the store as it was found.

use crate::archive::ModelArchive;
use crate::config::{AcquireOptions, EXTRACTION_CATEGORY};
use crate::crypto::decrypt_stream;
use crate::error::{ArchiveError, Result};
use crate::extraction::{Extracted, extract_manifest, extract_to_directory};
use crate::fetch::{Fetcher, HttpFetcher, fetch_archive};
use crate::manifest_parser::{load_manifest_file, load_manifest_reader};
use crate::rollback::RollbackGuard;
use crate::source::{Source, classify};
use camino::Utf8Path;
use log::{debug, info};
use std::fmt;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// States of a single acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Deciding what the reference points at.
    Classifying,
    /// Downloading a remote archive into the store.
    Fetching,
    /// Wrapping the archive in a decrypting stream.
    Decrypting,
    /// Unpacking the archive.
    Extracting,
    /// Parsing the manifest.
    ManifestLoading,
    /// Checking the manifest rules.
    Validating,
    /// Terminal success.
    Ready,
    /// Terminal failure; everything created so far has been rolled back.
    Failed,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Classifying => "classifying",
            Self::Fetching => "fetching",
            Self::Decrypting => "decrypting",
            Self::Extracting => "extracting",
            Self::ManifestLoading => "loading manifest",
            Self::Validating => "validating",
            Self::Ready => "ready",
            Self::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Runs acquisitions against one set of options and one transport.
///
/// # Examples
///
/// ```
/// use camino::Utf8PathBuf;
/// use model_archive::config::AcquireOptions;
/// use model_archive::error::ErrorKind;
/// use model_archive::pipeline::Acquirer;
///
/// let acquirer = Acquirer::new(AcquireOptions::new(Utf8PathBuf::from("/store")));
/// let err = acquirer
///     .acquire("http://evil.example/../../etc/passwd")
///     .expect_err("traversal");
/// assert_eq!(err.kind(), ErrorKind::Security);
/// ```
pub struct Acquirer {
    options: AcquireOptions,
    fetcher: Box<dyn Fetcher>,
}

impl fmt::Debug for Acquirer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acquirer")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl Acquirer {
    /// Create an acquirer using the default HTTP transport.
    #[must_use]
    pub fn new(options: AcquireOptions) -> Self {
        Self::with_fetcher(options, HttpFetcher::default())
    }

    /// Create an acquirer using `fetcher` for remote references.
    #[must_use]
    pub fn with_fetcher(options: AcquireOptions, fetcher: impl Fetcher + 'static) -> Self {
        Self {
            options,
            fetcher: Box::new(fetcher),
        }
    }

    /// The options this acquirer was built with.
    #[must_use]
    pub fn options(&self) -> &AcquireOptions {
        &self.options
    }

    /// Resolve, unpack, and validate the archive named by `reference`.
    ///
    /// # Errors
    ///
    /// - [`ArchiveError::Security`] when the reference contains `..`.
    ///   Nothing is fetched or written.
    /// - [`ArchiveError::Configuration`] for a missing store root, an
    ///   enabled decryption without a key file, an unusable key, or an
    ///   extraction root that cannot be created.
    /// - [`ArchiveError::NotFound`] when nothing matches the reference, the
    ///   locator is not allow-listed, or the transfer fails.
    /// - [`ArchiveError::Extraction`] when the archive cannot be decrypted
    ///   or unpacked.
    /// - [`ArchiveError::Validation`] when the manifest is malformed or
    ///   misses a mandatory field.
    pub fn acquire(&self, reference: &str) -> Result<ModelArchive> {
        let result = self.run(reference);
        match &result {
            Ok(archive) => info!(
                "{reference}: {} {} {}",
                Stage::Ready,
                archive.model_name().unwrap_or_default(),
                archive.model_version().unwrap_or_default()
            ),
            Err(err) => debug!("{reference}: {} ({err})", Stage::Failed),
        }
        result
    }

    fn run(&self, reference: &str) -> Result<ModelArchive> {
        enter(reference, Stage::Classifying);
        let source = classify(reference, self.options.model_store.as_std_path())?;
        let key_store = self.key_store()?;

        match source {
            Source::Directory(dir) | Source::StoredDirectory(dir) => {
                self.open_directory(reference, dir)
            }
            Source::StoredArchive(path) => {
                self.open_archive(reference, path, RollbackGuard::none(), key_store)
            }
            Source::Remote { locator, filename } => {
                enter(reference, Stage::Fetching);
                let fetched =
                    fetch_archive(&self.options, &locator, &filename, self.fetcher.as_ref())?;
                let (path, guard) = fetched.into_parts();
                if path.is_dir() {
                    // The final segment names a model directory already
                    // expanded in the store.
                    return self.open_directory(reference, path);
                }
                self.open_archive(reference, path, guard, key_store)
            }
        }
    }

    /// The key file to decrypt with, or `None` when decryption is off.
    fn key_store(&self) -> Result<Option<&Utf8Path>> {
        if !self.options.encryption_enabled {
            return Ok(None);
        }
        self.options
            .key_store
            .as_deref()
            .map(Some)
            .ok_or_else(|| {
                ArchiveError::configuration("encryption is enabled but no key store is configured")
            })
    }

    fn open_directory(&self, reference: &str, dir: PathBuf) -> Result<ModelArchive> {
        enter(reference, Stage::ManifestLoading);
        let manifest = load_manifest_file(&dir)?;
        let archive = ModelArchive::new(manifest, reference, dir, None, false);
        finish(reference, archive, Vec::new())
    }

    fn open_archive(
        &self,
        reference: &str,
        path: PathBuf,
        download: RollbackGuard,
        key_store: Option<&Utf8Path>,
    ) -> Result<ModelArchive> {
        let reader = BufReader::new(open_archive_file(&path)?);

        if let Some(key_store) = key_store {
            enter(reference, Stage::Decrypting);
            let decrypted = decrypt_stream(reader, key_store.as_std_path())?;
            enter(reference, Stage::ManifestLoading);
            let manifest = load_manifest_reader(extract_manifest(decrypted)?)?;
            let store = self.options.model_store.as_std_path().to_path_buf();
            let archive = ModelArchive::new(manifest, reference, store, Some(path), false);
            return finish(reference, archive, vec![download]);
        }

        enter(reference, Stage::Extracting);
        let root = self.options.extraction_root();
        let Extracted { dir, created } =
            extract_to_directory(reader, root.as_std_path(), EXTRACTION_CATEGORY)?;
        let extracted = if created {
            RollbackGuard::new(&dir)
        } else {
            RollbackGuard::none()
        };
        enter(reference, Stage::ManifestLoading);
        let manifest = load_manifest_file(&dir)?;
        let archive = ModelArchive::new(manifest, reference, dir, Some(path), created);
        finish(reference, archive, vec![download, extracted])
    }
}

fn enter(reference: &str, stage: Stage) {
    debug!("{reference}: {stage}");
}

fn open_archive_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        ArchiveError::extraction(format!("failed to open {}: {e}", path.display()))
    })
}

/// Validate `archive` and, on success, keep everything the guards hold.
fn finish(
    reference: &str,
    archive: ModelArchive,
    guards: Vec<RollbackGuard>,
) -> Result<ModelArchive> {
    enter(reference, Stage::Validating);
    let advisories = archive.validate()?;
    for guard in guards {
        let _ = guard.disarm();
    }
    Ok(archive.with_advisories(advisories))
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
