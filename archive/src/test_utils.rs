//! Shared test utilities for the model archive crate.

use crate::crypto::encrypt_bytes;
use crate::fetch::{FetchRequest, Fetcher, TransportError};
use crate::manifest::MANIFEST_PATH;
use sha2::{Digest, Sha256};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use zip::ZipWriter;
use zip::write::SimpleFileOptions;

/// Key used by encrypted fixtures.
pub const TEST_KEY: [u8; 16] = *b"0123456789abcdef";

/// Builds small zip archives in memory.
#[derive(Debug, Default)]
pub struct ZipFixture {
    entries: Vec<(String, Vec<u8>)>,
}

impl ZipFixture {
    /// Start an empty archive.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file entry.
    #[must_use]
    pub fn file(mut self, name: &str, contents: &[u8]) -> Self {
        self.entries.push((name.to_owned(), contents.to_vec()));
        self
    }

    /// Serialize the archive.
    ///
    /// # Panics
    ///
    /// Panics if the zip writer fails, which only happens on a bug in the
    /// fixture.
    #[must_use]
    pub fn build(self) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, contents) in self.entries {
            writer.start_file(name, options).expect("start zip entry");
            writer.write_all(&contents).expect("write zip entry");
        }
        writer.finish().expect("finish zip").into_inner()
    }
}

/// Returns the manifest of the canonical valid archive.
#[must_use]
pub fn resnet_manifest_json() -> String {
    manifest_json("resnet", "1.0", Some("python"))
}

/// Returns a manifest with the given model fields and optional runtime.
#[must_use]
pub fn manifest_json(name: &str, version: &str, runtime: Option<&str>) -> String {
    let runtime = runtime
        .map(|r| format!(r#","runtime":"{r}""#))
        .unwrap_or_default();
    format!(
        r#"{{"model":{{"modelName":"{name}","modelVersion":"{version}","handler":"{name}_handler"}}{runtime}}}"#
    )
}

/// Returns a zip holding `manifest` and a weights file.
#[must_use]
pub fn archive_with_manifest(manifest: &str) -> Vec<u8> {
    ZipFixture::new()
        .file(MANIFEST_PATH, manifest.as_bytes())
        .file("model.pt", b"weights")
        .build()
}

/// Returns `plain` encrypted with [`TEST_KEY`].
///
/// # Panics
///
/// Panics if encryption fails, which cannot happen for the fixed key.
#[must_use]
pub fn encrypt_with_test_key(plain: &[u8]) -> Vec<u8> {
    encrypt_bytes(plain, &TEST_KEY).expect("fixed key length is valid")
}

/// Writes [`TEST_KEY`] to `dir/model.key` and returns the path.
///
/// # Panics
///
/// Panics if the file cannot be written.
pub fn write_test_key(dir: &Path) -> PathBuf {
    let path = dir.join("model.key");
    std::fs::write(&path, TEST_KEY).expect("write key file");
    path
}

/// Computes the SHA-256 hex digest of `data`.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// A [`Fetcher`] that writes a fixed payload and records every request.
#[derive(Debug)]
pub struct StubFetcher {
    payload: Option<Vec<u8>>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl StubFetcher {
    /// Serve `payload` for every request.
    #[must_use]
    pub fn serving(payload: Vec<u8>) -> Self {
        Self {
            payload: Some(payload),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with a not-found error.
    #[must_use]
    pub fn missing() -> Self {
        Self {
            payload: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of transfers attempted so far.
    ///
    /// # Panics
    ///
    /// Panics if the request log mutex is poisoned.
    #[must_use]
    pub fn calls(&self) -> usize {
        self.requests.lock().expect("request log").len()
    }

    /// Copies of the requests received so far.
    ///
    /// # Panics
    ///
    /// Panics if the request log mutex is poisoned.
    #[must_use]
    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().expect("request log").clone()
    }
}

impl Fetcher for StubFetcher {
    fn fetch(&self, request: &FetchRequest) -> Result<(), TransportError> {
        self.requests
            .lock()
            .expect("request log")
            .push(request.clone());
        match &self.payload {
            Some(bytes) => std::fs::write(&request.destination, bytes).map_err(TransportError::Io),
            None => Err(TransportError::NotFound {
                url: request.locator.clone(),
            }),
        }
    }
}
