//! CLI argument definitions for `model-archive`.
//!
//! Flags override values from `--config`, which in turn override the
//! built-in defaults. Resolution into [`AcquireOptions`] happens here so
//! that the binary only orchestrates.

use crate::allow_list::AllowList;
use crate::config::{AcquireOptions, ConfigError, ConfigFile};
use crate::dirs::{BaseDirs, default_model_store};
use crate::error::{ArchiveError, ErrorKind};
use crate::manifest::Runtime;
use crate::packaging::{PackageParams, PackagingError};
use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use thiserror::Error;

/// Acquire, inspect, and package model archives.
#[derive(Parser, Debug)]
#[command(name = "model-archive")]
#[command(version, about)]
#[command(after_help = concat!(
    "EXAMPLES:\n",
    "  Download, unpack, and validate an archive:\n",
    "    $ model-archive acquire https://models.example/resnet.mar\n\n",
    "  Validate an encrypted archive already in the store:\n",
    "    $ model-archive acquire resnet.mar --encryption --key-store key.bin\n\n",
    "  Package a model directory:\n",
    "    $ model-archive pack ./resnet --model-name resnet --model-version 1.0 \\\n",
    "        --handler image_classifier\n\n",
    "  Remove a downloaded archive from the store:\n",
    "    $ model-archive remove https://models.example/resnet.mar",
))]
pub struct Cli {
    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Command,

    /// Suppress progress output (errors still shown).
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Acquire an archive and print its manifest summary.
    Acquire(AcquireArgs),

    /// Delete the store copy of a previously downloaded archive.
    Remove(RemoveArgs),

    /// Package a model directory into an archive.
    Pack(PackArgs),
}

/// Arguments locating the model store.
#[derive(Args, Debug, Clone, Default)]
pub struct StoreArgs {
    /// Model store directory [default: platform-specific].
    #[arg(short = 's', long, value_name = "DIR")]
    pub model_store: Option<Utf8PathBuf>,

    /// TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<Utf8PathBuf>,
}

/// Arguments for the acquire command.
#[derive(Args, Debug, Clone)]
pub struct AcquireArgs {
    /// Archive URL, store file name, or model directory.
    pub reference: String,

    /// Store location and configuration file.
    #[command(flatten)]
    pub store: StoreArgs,

    /// Permitted URL prefix (can be repeated) [default: file, http, https].
    #[arg(long = "allowed-url", value_name = "PREFIX")]
    pub allowed_urls: Vec<String>,

    /// Decrypt the archive with the key at --key-store.
    #[arg(long)]
    pub encryption: bool,

    /// Raw AES key file.
    #[arg(long, value_name = "FILE")]
    pub key_store: Option<Utf8PathBuf>,

    /// Request server-side KMS handling from object-store transports.
    #[arg(long)]
    pub server_side_kms: bool,

    /// Root for extraction directories [default: MODEL_STORE/.extracted].
    #[arg(long, value_name = "DIR")]
    pub extraction_root: Option<Utf8PathBuf>,

    /// Output the summary as JSON.
    #[arg(long)]
    pub json: bool,

    /// Keep the extracted directory instead of removing it on exit.
    #[arg(long)]
    pub keep: bool,
}

/// Arguments for the remove command.
#[derive(Args, Debug, Clone)]
pub struct RemoveArgs {
    /// The URL the archive was downloaded from.
    pub reference: String,

    /// Store location and configuration file.
    #[command(flatten)]
    pub store: StoreArgs,
}

/// Arguments for the pack command.
#[derive(Args, Debug, Clone)]
pub struct PackArgs {
    /// Directory holding the model files.
    pub source_dir: PathBuf,

    /// Model name; letters, digits, '_', '-' and '.'.
    #[arg(long, value_name = "NAME")]
    pub model_name: String,

    /// Model version.
    #[arg(long, value_name = "VERSION")]
    pub model_version: String,

    /// Handler entry point.
    #[arg(long, value_name = "HANDLER")]
    pub handler: Option<String>,

    /// Serialized weights file inside the model directory.
    #[arg(long, value_name = "FILE")]
    pub serialized_file: Option<String>,

    /// Runtime recorded in the manifest.
    #[arg(long, default_value = "python", value_parser = parse_runtime)]
    pub runtime: Runtime,

    /// Free-form description recorded in the manifest.
    #[arg(long)]
    pub description: Option<String>,

    /// Directory the archive is written to.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub export_path: PathBuf,

    /// Overwrite an existing archive.
    #[arg(short, long)]
    pub force: bool,

    /// Encrypt the archive with this raw AES key file.
    #[arg(long, value_name = "FILE")]
    pub key_file: Option<PathBuf>,
}

fn parse_runtime(value: &str) -> Result<Runtime, String> {
    value.parse()
}

/// Errors reported by the CLI.
#[derive(Debug, Error)]
pub enum CliError {
    /// Acquisition failed.
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// The configuration file could not be used.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Packaging failed.
    #[error(transparent)]
    Packaging(#[from] PackagingError),

    /// No model store was given and no platform default exists.
    #[error("no model store configured; pass --model-store or set model-store in --config")]
    NoModelStore,

    /// Writing output failed.
    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),

    /// Rendering JSON output failed.
    #[error("failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit code for this error.
    ///
    /// Acquisition failures get one code per [`ErrorKind`] so that scripts
    /// can tell a rejected locator from a broken archive.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Archive(err) => match err.kind() {
                ErrorKind::Configuration => 2,
                ErrorKind::NotFound => 3,
                ErrorKind::Security => 4,
                ErrorKind::Extraction => 5,
                ErrorKind::Validation => 6,
            },
            Self::Config(_) | Self::NoModelStore => 2,
            Self::Packaging(_) | Self::Io(_) | Self::Json(_) => 1,
        }
    }
}

impl StoreArgs {
    /// Load the configuration file named by `--config`, or an empty one.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::Config`] when the file cannot be read or parsed.
    pub fn load_config(&self) -> Result<ConfigFile, CliError> {
        Ok(self
            .config
            .as_deref()
            .map(ConfigFile::load)
            .transpose()?
            .unwrap_or_default())
    }

    /// Resolve the model store: flag, then config file, then platform
    /// default.
    ///
    /// # Errors
    ///
    /// Returns [`CliError::NoModelStore`] when no source provides one.
    pub fn resolve_store(
        &self,
        config: &ConfigFile,
        dirs: &dyn BaseDirs,
    ) -> Result<Utf8PathBuf, CliError> {
        self.model_store
            .clone()
            .or_else(|| config.model_store.clone())
            .or_else(|| default_model_store(dirs))
            .ok_or(CliError::NoModelStore)
    }
}

impl AcquireArgs {
    /// Build the acquisition options from flags and the config file.
    ///
    /// # Errors
    ///
    /// Returns [`CliError`] when the config file is unusable or no model
    /// store can be determined.
    pub fn resolve_options(&self, dirs: &dyn BaseDirs) -> Result<AcquireOptions, CliError> {
        let config = self.store.load_config()?;
        let store = self.store.resolve_store(&config, dirs)?;
        let mut options = config.into_options(store.clone());
        options.model_store = store;

        if !self.allowed_urls.is_empty() {
            options.allowed_urls = AllowList::new(&self.allowed_urls);
        }
        if self.encryption {
            options.encryption_enabled = true;
        }
        if let Some(key_store) = &self.key_store {
            options.key_store = Some(key_store.clone());
        }
        if self.server_side_kms {
            options.use_server_side_kms = true;
        }
        if let Some(root) = &self.extraction_root {
            options.extraction_root = Some(root.clone());
        }
        Ok(options)
    }
}

impl PackArgs {
    /// Convert into packaging parameters.
    #[must_use]
    pub fn into_params(self) -> PackageParams {
        PackageParams {
            model_name: self.model_name,
            model_version: self.model_version,
            handler: self.handler,
            serialized_file: self.serialized_file,
            runtime: self.runtime,
            description: self.description,
            source_dir: self.source_dir,
            output_dir: self.export_path,
            created_on: None,
            force: self.force,
            key_file: self.key_file,
        }
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
