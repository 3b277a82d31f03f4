//! Manifest schema for model archives.
//!
//! Every archive carries `MAR-INF/MANIFEST.json`. All fields are optional
//! at the parse level so that an incomplete manifest still loads; the rules
//! about which fields must be present live in
//! [`validation`](crate::validation).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Directory inside the archive holding metadata.
pub const MANIFEST_DIR: &str = "MAR-INF";

/// File name of the manifest inside [`MANIFEST_DIR`].
pub const MANIFEST_FILE: &str = "MANIFEST.json";

/// Archive-relative path of the manifest.
pub const MANIFEST_PATH: &str = "MAR-INF/MANIFEST.json";

/// The `model` record of a manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    /// Model name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_name: Option<String>,
    /// Model version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    /// Entry point that serves requests.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
    /// Serialized weights file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub serialized_file: Option<String>,
    /// Model definition source file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_file: Option<String>,
    /// Python requirements file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements_file: Option<String>,
    /// Model configuration file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_file: Option<String>,
    /// Request envelope name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub envelope: Option<String>,
}

impl ModelInfo {
    /// Create a model record with a name and version.
    #[must_use]
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            model_name: Some(name.into()),
            model_version: Some(version.into()),
            ..Self::default()
        }
    }

    /// Set the handler entry point.
    #[must_use]
    pub fn with_handler(mut self, handler: impl Into<String>) -> Self {
        self.handler = Some(handler.into());
        self
    }
}

/// Runtimes a model archive may declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Runtime {
    /// `python`
    Python,
    /// `python3`
    Python3,
    /// `LSP`
    Lsp,
}

impl Runtime {
    /// The manifest spelling of this runtime.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::Python3 => "python3",
            Self::Lsp => "LSP",
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Runtime {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        [Self::Python, Self::Python3, Self::Lsp]
            .into_iter()
            .find(|runtime| runtime.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| format!("unknown runtime \"{value}\""))
    }
}

/// The manifest shipped inside each model archive.
///
/// ```json
/// {
///   "createdOn": "19/10/2026 10:00:00",
///   "archiverVersion": "0.1.0",
///   "runtime": "python",
///   "model": {
///     "modelName": "resnet",
///     "modelVersion": "1.0",
///     "handler": "resnet_handler"
///   }
/// }
/// ```
///
/// # Examples
///
/// ```
/// use model_archive::manifest::{Manifest, ModelInfo, Runtime};
///
/// let manifest = Manifest::new(Runtime::Python, ModelInfo::new("resnet", "1.0"));
/// assert_eq!(manifest.model_name(), Some("resnet"));
/// assert_eq!(manifest.runtime(), Some("python"));
/// assert!(Manifest::default().model().is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    created_on: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    archiver_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    runtime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    model: Option<ModelInfo>,
}

impl Manifest {
    /// Construct a manifest declaring `runtime` and `model`.
    #[must_use]
    pub fn new(runtime: Runtime, model: ModelInfo) -> Self {
        Self {
            runtime: Some(runtime.as_str().to_owned()),
            model: Some(model),
            ..Self::default()
        }
    }

    /// Record the archiver version that produced the archive.
    #[must_use]
    pub fn with_archiver_version(mut self, version: impl Into<String>) -> Self {
        self.archiver_version = Some(version.into());
        self
    }

    /// Record when the archive was created.
    #[must_use]
    pub fn with_created_on(mut self, created_on: impl Into<String>) -> Self {
        self.created_on = Some(created_on.into());
        self
    }

    /// Attach a free-form description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// The `model` record, if present.
    #[must_use]
    pub fn model(&self) -> Option<&ModelInfo> {
        self.model.as_ref()
    }

    /// The model name, if present.
    #[must_use]
    pub fn model_name(&self) -> Option<&str> {
        self.model.as_ref()?.model_name.as_deref()
    }

    /// The model version, if present.
    #[must_use]
    pub fn model_version(&self) -> Option<&str> {
        self.model.as_ref()?.model_version.as_deref()
    }

    /// The handler entry point, if present.
    #[must_use]
    pub fn handler(&self) -> Option<&str> {
        self.model.as_ref()?.handler.as_deref()
    }

    /// The runtime exactly as written in the manifest.
    #[must_use]
    pub fn runtime(&self) -> Option<&str> {
        self.runtime.as_deref()
    }

    /// The runtime, if present and recognised.
    #[must_use]
    pub fn runtime_kind(&self) -> Option<Runtime> {
        self.runtime.as_deref()?.parse().ok()
    }

    /// The archiver version, if present.
    #[must_use]
    pub fn archiver_version(&self) -> Option<&str> {
        self.archiver_version.as_deref()
    }

    /// The creation timestamp, if present.
    #[must_use]
    pub fn created_on(&self) -> Option<&str> {
        self.created_on.as_deref()
    }

    /// The description, if present.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
