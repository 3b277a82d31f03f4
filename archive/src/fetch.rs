//! Allow-listed archive retrieval into the managed store.
//!
//! The transport itself sits behind the [`Fetcher`] trait so that tests can
//! record or stub network behaviour. [`fetch_archive`] wraps any transport
//! with the checks that must hold before a single byte moves: a configured
//! store, an allowed locator, and a usable destination name.

use crate::allow_list::AllowList;
use crate::config::AcquireOptions;
use crate::error::{ArchiveError, Result};
use crate::rollback::RollbackGuard;
use log::debug;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use ureq::ResponseExt;
use url::Url;

/// Default overall timeout for a single transfer.
pub const DEFAULT_TRANSFER_TIMEOUT: Duration = Duration::from_secs(300);

/// Everything a transport needs to perform one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// The locator to fetch, exactly as supplied.
    pub locator: String,
    /// Final path segment of the locator.
    pub filename: String,
    /// File to write; the transport creates it.
    pub destination: PathBuf,
    /// Prefixes the locator was checked against, for transports that
    /// follow redirects.
    pub allowed_urls: AllowList,
    /// Forwarded for object-store transports that support server-side
    /// KMS encryption.
    pub use_server_side_kms: bool,
}

/// Errors reported by a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request failed.
    #[error("download failed for {url}: {reason}")]
    Http {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The remote reported that the archive does not exist.
    #[error("archive not found: {url}")]
    NotFound {
        /// The URL that returned 404.
        url: String,
    },

    /// The server redirected the transfer to a location outside the
    /// allow-list.
    #[error("download from {url} was redirected to {target}, which is not an allowed URL")]
    RedirectNotAllowed {
        /// The URL that was requested.
        url: String,
        /// Where the transfer ended up.
        target: String,
    },

    /// Writing the downloaded bytes failed.
    #[error("I/O error writing download: {0}")]
    Io(#[from] io::Error),
}

/// Transport collaborator that moves bytes from a locator to a file.
///
/// # Examples
///
/// ```
/// use model_archive::fetch::HttpFetcher;
///
/// let fetcher = HttpFetcher::default();
/// // fetcher.fetch(&request) in production
/// # let _ = fetcher;
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait Fetcher: Send + Sync {
    /// Transfer `request.locator` into `request.destination`.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] when the transfer fails.
    fn fetch(&self, request: &FetchRequest) -> std::result::Result<(), TransportError>;
}

impl<T: Fetcher + ?Sized> Fetcher for Arc<T> {
    fn fetch(&self, request: &FetchRequest) -> std::result::Result<(), TransportError> {
        (**self).fetch(request)
    }
}

/// Transport for `http`, `https`, and `file` locators using `ureq`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    /// Create a fetcher whose transfers abort after `timeout`.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }

    fn fetch_http(&self, request: &FetchRequest) -> std::result::Result<(), TransportError> {
        if request.use_server_side_kms {
            debug!(
                "server-side KMS requested for {}; plain HTTP transport sends no KMS headers",
                request.locator
            );
        }
        let response = self
            .agent
            .get(&request.locator)
            .call()
            .map_err(|e| map_ureq_error(&request.locator, &e))?;
        ensure_allowed_target(request, &response.get_uri().to_string())?;
        let mut file = fs::File::create(&request.destination)?;
        io::copy(&mut response.into_body().as_reader(), &mut file)?;
        Ok(())
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::with_timeout(DEFAULT_TRANSFER_TIMEOUT)
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, request: &FetchRequest) -> std::result::Result<(), TransportError> {
        let url = Url::parse(&request.locator).map_err(|e| TransportError::Http {
            url: request.locator.clone(),
            reason: e.to_string(),
        })?;
        if url.scheme() == "file" {
            return copy_local(&url, &request.destination);
        }
        self.fetch_http(request)
    }
}

fn copy_local(url: &Url, destination: &Path) -> std::result::Result<(), TransportError> {
    let source = url.to_file_path().map_err(|()| TransportError::Http {
        url: url.to_string(),
        reason: "not a local file path".to_owned(),
    })?;
    if !source.is_file() {
        return Err(TransportError::NotFound {
            url: url.to_string(),
        });
    }
    fs::copy(&source, destination)?;
    Ok(())
}

/// Reject a transfer that redirects ended outside `request.allowed_urls`.
fn ensure_allowed_target(
    request: &FetchRequest,
    final_url: &str,
) -> std::result::Result<(), TransportError> {
    if request.allowed_urls.is_allowed(final_url) {
        return Ok(());
    }
    Err(TransportError::RedirectNotAllowed {
        url: request.locator.clone(),
        target: final_url.to_owned(),
    })
}

/// Map a ureq error to a [`TransportError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> TransportError {
    match err {
        ureq::Error::StatusCode(404) => TransportError::NotFound {
            url: url.to_owned(),
        },
        other => TransportError::Http {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}

/// An archive file in the managed store.
#[derive(Debug)]
pub struct Fetched {
    path: PathBuf,
    guard: RollbackGuard,
}

impl Fetched {
    /// Path of the archive inside the store.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this call downloaded the file (as opposed to finding it
    /// already present).
    #[must_use]
    pub fn downloaded(&self) -> bool {
        self.guard.path().is_some()
    }

    /// Split into the path and the guard that removes a fresh download.
    pub(crate) fn into_parts(self) -> (PathBuf, RollbackGuard) {
        (self.path, self.guard)
    }
}

/// Fetch `locator` into the store as `filename`, enforcing the allow-list.
///
/// An archive already present at the destination is reused, never
/// overwritten. A freshly downloaded file stays guarded: dropping the
/// returned [`Fetched`] without disarming removes it.
///
/// # Errors
///
/// - [`ArchiveError::Configuration`] when the store root is empty or is
///   not a directory. Raised before any network activity.
/// - [`ArchiveError::NotFound`] when the locator is not allowed, has no
///   final path segment, or the transport fails.
pub fn fetch_archive(
    options: &AcquireOptions,
    locator: &str,
    filename: &str,
    fetcher: &dyn Fetcher,
) -> Result<Fetched> {
    let store = options.model_store.as_std_path();
    if store.as_os_str().is_empty() {
        return Err(ArchiveError::configuration(
            "model store has not been configured",
        ));
    }
    if !options.allowed_urls.is_allowed(locator) {
        return Err(ArchiveError::not_found(
            locator,
            format!(
                "locator does not match any allowed URL(s) {}",
                options.allowed_urls
            ),
        ));
    }
    if filename.is_empty() {
        return Err(ArchiveError::not_found(
            locator,
            "locator has no file name",
        ));
    }
    if !store.is_dir() {
        return Err(ArchiveError::configuration(format!(
            "model store {} is not a directory",
            options.model_store
        )));
    }

    let destination = store.join(filename);
    if destination.exists() {
        debug!("{} already present; skipping download", destination.display());
        return Ok(Fetched {
            path: destination,
            guard: RollbackGuard::none(),
        });
    }

    let guard = RollbackGuard::new(&destination);
    let request = FetchRequest {
        locator: locator.to_owned(),
        filename: filename.to_owned(),
        destination: destination.clone(),
        allowed_urls: options.allowed_urls.clone(),
        use_server_side_kms: options.use_server_side_kms,
    };
    debug!("fetching {locator} into {}", destination.display());
    fetcher
        .fetch(&request)
        .map_err(|e| ArchiveError::not_found(locator, format!("failed to download archive: {e}")))?;

    Ok(Fetched {
        path: destination,
        guard,
    })
}
