//! Reference classification.
//!
//! Decides what a caller-supplied reference points at before anything is
//! fetched or unpacked. Classification performs no writes; it only inspects
//! the reference text and stats paths.

use crate::error::{ArchiveError, Result};
use std::path::{Path, PathBuf};
use url::Url;

/// URL schemes treated as remote locators.
const REMOTE_SCHEMES: [&str; 3] = ["http", "https", "file"];

/// The token whose presence anywhere in a reference is rejected.
const TRAVERSAL_TOKEN: &str = "..";

/// Where a reference resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A URL that must be fetched into the store as `filename`.
    Remote {
        /// The locator exactly as supplied.
        locator: String,
        /// Final path segment of the locator.
        filename: String,
    },
    /// An existing directory outside the store's control, used in place.
    Directory(PathBuf),
    /// A packaged archive already present in the store.
    StoredArchive(PathBuf),
    /// A previously expanded model directory inside the store.
    StoredDirectory(PathBuf),
}

/// Reject references that contain a parent-directory token.
///
/// # Errors
///
/// Returns [`ArchiveError::Security`] when `..` occurs anywhere in the text.
pub fn ensure_no_traversal(reference: &str) -> Result<()> {
    if reference.contains(TRAVERSAL_TOKEN) {
        return Err(ArchiveError::Security {
            reference: reference.to_owned(),
        });
    }
    Ok(())
}

/// Parse `reference` as a remote locator, returning it with its final path
/// segment, or `None` when it is not a URL with a supported scheme.
#[must_use]
pub fn parse_remote(reference: &str) -> Option<(Url, String)> {
    let url = Url::parse(reference).ok()?;
    if !REMOTE_SCHEMES.contains(&url.scheme()) {
        return None;
    }
    let filename = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default()
        .to_owned();
    Some((url, filename))
}

/// Classify `reference` relative to the managed store at `store_root`.
///
/// Checks run in a fixed order: empty reference, traversal token, store
/// configuration, then the filesystem probes.
///
/// # Errors
///
/// - [`ArchiveError::NotFound`] for an empty reference or one that
///   resolves to nothing.
/// - [`ArchiveError::Security`] for a reference containing `..`.
/// - [`ArchiveError::Configuration`] when `store_root` is empty.
///
/// # Examples
///
/// ```
/// use model_archive::source::{Source, classify};
/// use std::path::Path;
///
/// let source = classify("https://host/models/resnet.mar", Path::new("/store"))
///     .expect("remote locator");
/// assert!(matches!(source, Source::Remote { ref filename, .. } if filename == "resnet.mar"));
/// ```
pub fn classify(reference: &str, store_root: &Path) -> Result<Source> {
    if reference.is_empty() {
        return Err(ArchiveError::not_found(reference, "empty reference"));
    }
    ensure_no_traversal(reference)?;
    if store_root.as_os_str().is_empty() {
        return Err(ArchiveError::configuration(
            "model store has not been configured",
        ));
    }

    if let Some((_, filename)) = parse_remote(reference) {
        return Ok(Source::Remote {
            locator: reference.to_owned(),
            filename,
        });
    }

    let local = Path::new(reference);
    if local.is_dir() {
        return Ok(Source::Directory(local.to_path_buf()));
    }

    if let Some(name) = local.file_name() {
        let stored = store_root.join(name);
        if stored.is_file() {
            return Ok(Source::StoredArchive(stored));
        }
        if stored.is_dir() {
            return Ok(Source::StoredDirectory(stored));
        }
    }

    Err(ArchiveError::not_found(
        reference,
        "no archive or directory matches the reference",
    ))
}
