//! Acquisition options and their TOML file representation.
//!
//! [`AcquireOptions`] is the single structure the pipeline consults to decide
//! which stages run. It is always passed explicitly; nothing in the library
//! reads environment variables or process-global state. [`ConfigFile`] is
//! the on-disk form used by the CLI, with every key optional so that flags
//! can fill the gaps.

use crate::allow_list::AllowList;
use camino::{Utf8Path, Utf8PathBuf};
use serde::Deserialize;
use std::fs;
use thiserror::Error;

/// Name of the per-extraction category directory under the extraction
/// root.
pub const EXTRACTION_CATEGORY: &str = "models";

/// Directory under the model store used as the extraction root when none
/// is configured.
pub const DEFAULT_EXTRACTION_DIR: &str = ".extracted";

/// Options recognised by the acquisition pipeline.
///
/// # Examples
///
/// ```
/// use camino::Utf8PathBuf;
/// use model_archive::allow_list::AllowList;
/// use model_archive::config::AcquireOptions;
///
/// let options = AcquireOptions::new(Utf8PathBuf::from("/store"))
///     .with_allowed_urls(AllowList::new(["https://host/"]));
/// assert_eq!(options.extraction_root(), "/store/.extracted");
/// assert!(!options.encryption_enabled);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquireOptions {
    /// Root of the managed store holding downloaded archives.
    pub model_store: Utf8PathBuf,
    /// Permitted locator prefixes for remote fetches.
    pub allowed_urls: AllowList,
    /// Decrypt archives with the key at [`Self::key_store`].
    pub encryption_enabled: bool,
    /// Path of the raw symmetric key file.
    pub key_store: Option<Utf8PathBuf>,
    /// Ask object-store transports for server-side KMS handling.
    pub use_server_side_kms: bool,
    /// Root under which extraction directories are created; defaults to
    /// `<model_store>/.extracted`.
    pub extraction_root: Option<Utf8PathBuf>,
}

impl AcquireOptions {
    /// Create options for `model_store` with the permissive default
    /// allow-list and encryption disabled.
    #[must_use]
    pub fn new(model_store: Utf8PathBuf) -> Self {
        Self {
            model_store,
            allowed_urls: AllowList::default(),
            encryption_enabled: false,
            key_store: None,
            use_server_side_kms: false,
            extraction_root: None,
        }
    }

    /// Replace the allow-list.
    #[must_use]
    pub fn with_allowed_urls(mut self, allowed_urls: AllowList) -> Self {
        self.allowed_urls = allowed_urls;
        self
    }

    /// Enable decryption using the key file at `key_store`.
    #[must_use]
    pub fn with_encryption(mut self, key_store: Utf8PathBuf) -> Self {
        self.encryption_enabled = true;
        self.key_store = Some(key_store);
        self
    }

    /// Override the extraction root.
    #[must_use]
    pub fn with_extraction_root(mut self, root: Utf8PathBuf) -> Self {
        self.extraction_root = Some(root);
        self
    }

    /// Return the effective extraction root.
    #[must_use]
    pub fn extraction_root(&self) -> Utf8PathBuf {
        self.extraction_root
            .clone()
            .unwrap_or_else(|| self.model_store.join(DEFAULT_EXTRACTION_DIR))
    }
}

/// Errors raised while reading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Read {
        /// Path of the unreadable file.
        path: Utf8PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML or contains unknown keys.
    #[error("invalid config file {path}: {source}")]
    Parse {
        /// Path of the malformed file.
        path: Utf8PathBuf,
        /// Underlying TOML error.
        #[source]
        source: toml::de::Error,
    },
}

/// On-disk configuration, all keys optional.
///
/// ```toml
/// model-store = "/var/lib/models"
/// allowed-urls = ["https://models.example/"]
/// encryption = true
/// key-store = "/etc/model-archive/key.bin"
/// server-side-kms = false
/// extraction-root = "/tmp/model-archive"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct ConfigFile {
    /// Root of the managed store.
    pub model_store: Option<Utf8PathBuf>,
    /// Permitted locator prefixes.
    pub allowed_urls: Option<Vec<String>>,
    /// Whether archives are encrypted.
    pub encryption: Option<bool>,
    /// Path of the raw key file.
    pub key_store: Option<Utf8PathBuf>,
    /// Whether to request server-side KMS handling.
    pub server_side_kms: Option<bool>,
    /// Root for extraction directories.
    pub extraction_root: Option<Utf8PathBuf>,
}

impl ConfigFile {
    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns the TOML error when the input is malformed or has unknown
    /// keys.
    ///
    /// # Examples
    ///
    /// ```
    /// use model_archive::config::ConfigFile;
    ///
    /// let config = ConfigFile::from_toml_str("model-store = \"/store\"")
    ///     .expect("valid config");
    /// assert_eq!(config.model_store.as_deref().map(|p| p.as_str()), Some("/store"));
    /// ```
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Read and parse the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] or [`ConfigError::Parse`].
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        Self::from_toml_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })
    }

    /// Convert into [`AcquireOptions`], using `fallback_store` when the
    /// file does not name a model store.
    #[must_use]
    pub fn into_options(self, fallback_store: Utf8PathBuf) -> AcquireOptions {
        AcquireOptions {
            model_store: self.model_store.unwrap_or(fallback_store),
            allowed_urls: self
                .allowed_urls
                .map_or_else(AllowList::default, AllowList::new),
            encryption_enabled: self.encryption.unwrap_or(false),
            key_store: self.key_store,
            use_server_side_kms: self.server_side_kms.unwrap_or(false),
            extraction_root: self.extraction_root,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_extraction_root_lives_in_store() {
        let options = AcquireOptions::new(Utf8PathBuf::from("/srv/store"));
        assert_eq!(options.extraction_root(), "/srv/store/.extracted");
    }

    #[test]
    fn explicit_extraction_root_wins() {
        let options = AcquireOptions::new(Utf8PathBuf::from("/srv/store"))
            .with_extraction_root(Utf8PathBuf::from("/tmp/x"));
        assert_eq!(options.extraction_root(), "/tmp/x");
    }

    #[test]
    fn with_encryption_sets_flag_and_key() {
        let options = AcquireOptions::new(Utf8PathBuf::from("/s"))
            .with_encryption(Utf8PathBuf::from("/k.bin"));
        assert!(options.encryption_enabled);
        assert_eq!(options.key_store.as_deref(), Some(Utf8Path::new("/k.bin")));
    }

    #[test]
    fn parses_full_file() {
        let config = ConfigFile::from_toml_str(concat!(
            "model-store = \"/store\"\n",
            "allowed-urls = [\"https://host/\"]\n",
            "encryption = true\n",
            "key-store = \"/key.bin\"\n",
            "server-side-kms = true\n",
            "extraction-root = \"/tmp/extract\"\n",
        ))
        .expect("valid config");
        let options = config.into_options(Utf8PathBuf::from("/unused"));
        assert_eq!(options.model_store, "/store");
        assert!(options.allowed_urls.is_allowed("https://host/a.mar"));
        assert!(!options.allowed_urls.is_allowed("http://host/a.mar"));
        assert!(options.encryption_enabled);
        assert!(options.use_server_side_kms);
        assert_eq!(options.extraction_root(), "/tmp/extract");
    }

    #[test]
    fn empty_file_falls_back_to_defaults() {
        let config = ConfigFile::from_toml_str("").expect("empty config is valid");
        let options = config.into_options(Utf8PathBuf::from("/fallback"));
        assert_eq!(options, AcquireOptions::new(Utf8PathBuf::from("/fallback")));
    }

    #[test]
    fn rejects_unknown_keys() {
        let result = ConfigFile::from_toml_str("model_store = \"/store\"");
        assert!(result.is_err());
    }

    #[test]
    fn load_reports_missing_file() {
        let temp = tempfile::tempdir().expect("temp dir");
        let path = Utf8PathBuf::try_from(temp.path().join("absent.toml")).expect("UTF-8 path");
        let err = ConfigFile::load(&path).expect_err("missing file should fail");
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
