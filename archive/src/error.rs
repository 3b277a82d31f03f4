//! Error taxonomy for model archive acquisition.
//!
//! Every pipeline stage fails with an [`ArchiveError`]. The variants map
//! one-to-one onto the failure classes a caller needs to distinguish:
//! configuration problems are never retried, not-found conditions carry the
//! original reference, security violations fire before any filesystem
//! mutation, and validation failures occur only once a handle exists.

use std::fmt;
use thiserror::Error;

/// Errors that can occur while acquiring, extracting, or validating an
/// archive.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The pipeline is misconfigured (missing store root, unreadable or
    /// invalid key, uncreatable extraction directory).
    #[error("configuration error: {reason}")]
    Configuration {
        /// Description of the configuration problem.
        reason: String,
    },

    /// Nothing could be resolved for the reference, or the locator was
    /// rejected by the allow-list or the transport.
    #[error("model not found at {reference}: {reason}")]
    NotFound {
        /// The reference exactly as the caller supplied it.
        reference: String,
        /// Description of why resolution failed.
        reason: String,
    },

    /// The reference attempted to escape its directory.
    #[error("relative path is not allowed in reference: {reference}")]
    Security {
        /// The offending reference.
        reference: String,
    },

    /// The archive could not be decrypted or unpacked.
    #[error("failed to extract archive: {reason}")]
    Extraction {
        /// Description of the extraction failure.
        reason: String,
    },

    /// The manifest is missing mandatory fields or could not be parsed.
    #[error("invalid model archive: {reason}")]
    Validation {
        /// Description of the violated rule.
        reason: String,
    },
}

/// Coarse classification of an [`ArchiveError`].
///
/// Useful when mapping failures to exit codes or HTTP statuses without
/// matching on every field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`ArchiveError::Configuration`].
    Configuration,
    /// See [`ArchiveError::NotFound`].
    NotFound,
    /// See [`ArchiveError::Security`].
    Security,
    /// See [`ArchiveError::Extraction`].
    Extraction,
    /// See [`ArchiveError::Validation`].
    Validation,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Configuration => "configuration",
            Self::NotFound => "not-found",
            Self::Security => "security",
            Self::Extraction => "extraction",
            Self::Validation => "validation",
        };
        f.write_str(label)
    }
}

impl ArchiveError {
    /// Return the coarse kind of this error.
    ///
    /// # Examples
    ///
    /// ```
    /// use model_archive::error::{ArchiveError, ErrorKind};
    ///
    /// let err = ArchiveError::Security { reference: "../x.mar".to_owned() };
    /// assert_eq!(err.kind(), ErrorKind::Security);
    /// ```
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration { .. } => ErrorKind::Configuration,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Security { .. } => ErrorKind::Security,
            Self::Extraction { .. } => ErrorKind::Extraction,
            Self::Validation { .. } => ErrorKind::Validation,
        }
    }

    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub(crate) fn not_found(reference: &str, reason: impl Into<String>) -> Self {
        Self::NotFound {
            reference: reference.to_owned(),
            reason: reason.into(),
        }
    }

    pub(crate) fn extraction(reason: impl Into<String>) -> Self {
        Self::Extraction {
            reason: reason.into(),
        }
    }

    pub(crate) fn validation(reason: impl Into<String>) -> Self {
        Self::Validation {
            reason: reason.into(),
        }
    }
}

/// Result type alias using [`ArchiveError`].
pub type Result<T> = std::result::Result<T, ArchiveError>;
