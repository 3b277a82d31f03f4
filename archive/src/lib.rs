//! Model archive acquisition library.
//!
//! This crate resolves a reference to a packaged model archive (`.mar`, a
//! zip file carrying `MAR-INF/MANIFEST.json`), fetches it from an
//! allow-listed location when remote, optionally decrypts it, unpacks it
//! into a managed directory, and validates the manifest before handing
//! back a [`ModelArchive`](archive::ModelArchive). Any stage that fails
//! rolls back the files and directories created before it.
//!
//! It is used by the `model-archive` CLI binary and can be embedded in a
//! serving process that supplies its own [`Fetcher`](fetch::Fetcher).
//!
//! # Modules
//!
//! - [`allow_list`] - URL prefix allow-list for remote fetches
//! - [`archive`] - The acquired archive handle and store cleanup
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Acquisition options and TOML configuration
//! - [`crypto`] - AES stream decryption and its packaging inverse
//! - [`dirs`] - Platform directory resolution
//! - [`error`] - Error taxonomy
//! - [`extraction`] - Streaming, zip-slip-safe extraction
//! - [`fetch`] - Allow-listed download into the model store
//! - [`manifest`] - Manifest schema
//! - [`manifest_parser`] - Manifest loading
//! - [`output`] - CLI output formatting
//! - [`packaging`] - Archive creation
//! - [`pipeline`] - The acquisition state machine
//! - [`rollback`] - Scoped removal of created resources
//! - [`source`] - Reference classification
//! - [`validation`] - Manifest rules
//!
//! # Example
//!
//! ```no_run
//! use camino::Utf8PathBuf;
//! use model_archive::allow_list::AllowList;
//! use model_archive::config::AcquireOptions;
//! use model_archive::pipeline::Acquirer;
//!
//! let options = AcquireOptions::new(Utf8PathBuf::from("/var/lib/models"))
//!     .with_allowed_urls(AllowList::new(["https://models.example/"]));
//! let archive = Acquirer::new(options)
//!     .acquire("https://models.example/resnet.mar")
//!     .expect("archive is valid");
//! println!("{:?} at {}", archive.model_name(), archive.model_dir().display());
//! archive.cleanup();
//! ```

pub mod allow_list;
pub mod archive;
pub mod cli;
pub mod config;
pub mod crypto;
pub mod dirs;
pub mod error;
pub mod extraction;
pub mod fetch;
pub mod manifest;
pub mod manifest_parser;
pub mod output;
pub mod packaging;
pub mod pipeline;
pub mod rollback;
pub mod source;
pub mod validation;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;

pub use archive::ModelArchive;
pub use config::AcquireOptions;
pub use error::{ArchiveError, ErrorKind, Result};
pub use pipeline::Acquirer;
