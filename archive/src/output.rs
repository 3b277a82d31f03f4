//! Output formatting for the `model-archive` CLI.

use crate::archive::ModelArchive;
use serde::Serialize;
use std::fmt;
use std::io::Write;

/// Serializable summary of an acquired archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveSummary {
    /// The reference the archive was acquired from.
    pub reference: String,
    /// Model name.
    pub model_name: Option<String>,
    /// Model version.
    pub model_version: Option<String>,
    /// Handler entry point.
    pub handler: Option<String>,
    /// Declared runtime.
    pub runtime: Option<String>,
    /// Directory holding the model contents.
    pub model_dir: String,
    /// Archive file in the store, if any.
    pub archive_path: Option<String>,
    /// Whether the directory was created by the acquisition.
    pub self_extracted: bool,
    /// Advisory warnings raised during validation.
    pub warnings: Vec<String>,
}

impl ArchiveSummary {
    /// Summarise `archive` together with its validation `warnings`.
    #[must_use]
    pub fn new(archive: &ModelArchive, warnings: Vec<String>) -> Self {
        Self {
            reference: archive.reference().to_owned(),
            model_name: archive.model_name().map(str::to_owned),
            model_version: archive.model_version().map(str::to_owned),
            handler: archive.handler().map(str::to_owned),
            runtime: archive.manifest().runtime().map(str::to_owned),
            model_dir: archive.model_dir().display().to_string(),
            archive_path: archive.archive_path().map(|p| p.display().to_string()),
            self_extracted: archive.is_self_extracted(),
            warnings,
        }
    }

    /// Render as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Render as human-readable text.
    ///
    /// # Examples
    ///
    /// ```
    /// use model_archive::output::ArchiveSummary;
    ///
    /// let summary = ArchiveSummary {
    ///     reference: "resnet.mar".to_owned(),
    ///     model_name: Some("resnet".to_owned()),
    ///     model_version: Some("1.0".to_owned()),
    ///     handler: None,
    ///     runtime: Some("python".to_owned()),
    ///     model_dir: "/store/.extracted/models/ab12".to_owned(),
    ///     archive_path: None,
    ///     self_extracted: true,
    ///     warnings: Vec::new(),
    /// };
    /// let text = summary.display_text();
    /// assert!(text.starts_with("resnet 1.0\n"));
    /// assert!(text.contains("handler:   -"));
    /// ```
    #[must_use]
    pub fn display_text(&self) -> String {
        let field = |value: &Option<String>| value.clone().unwrap_or_else(|| "-".to_owned());
        format!(
            concat!(
                "{} {}\n",
                "  handler:   {}\n",
                "  runtime:   {}\n",
                "  directory: {}\n",
                "  archive:   {}"
            ),
            field(&self.model_name),
            field(&self.model_version),
            field(&self.handler),
            field(&self.runtime),
            self.model_dir,
            field(&self.archive_path),
        )
    }
}

/// Write `message` and a newline to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort reporting; ignore write failures.
    }
}
