//! Zip extraction for model archives.
//!
//! [`extract_to_directory`] works on a seekable archive and reads the
//! central directory, so entries whose sizes follow in a data descriptor
//! are accepted. [`extract_manifest`] reads front to back through local
//! file headers and therefore works on non-seekable input such as a
//! decrypting stream. Entry paths are validated before anything is
//! written to guard against zip-slip.

use crate::error::{ArchiveError, Result};
use crate::manifest::MANIFEST_PATH;
use log::debug;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::{Component, Path, PathBuf};
use zip::ZipArchive;
use zip::read::read_zipfile_from_stream;

/// Prefix of the in-progress directory an extraction writes into.
const PARTIAL_PREFIX: &str = ".partial-";

/// A content-addressed extraction directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extracted {
    /// Directory holding the archive contents.
    pub dir: PathBuf,
    /// Whether this call created `dir`. `false` means an earlier
    /// extraction of the same bytes is being reused and belongs to
    /// whoever created it.
    pub created: bool,
}

/// Extract the archive in `reader` beneath `root/category`.
///
/// The directory is named after the SHA-256 of the archive bytes, so
/// repeated extraction of the same archive converges on one path. When
/// that path already exists nothing is unpacked and it is returned with
/// `created: false`. Otherwise the contents land in a fresh partial
/// directory that is renamed into place once every entry is written.
///
/// # Errors
///
/// - [`ArchiveError::Configuration`] when `root/category` or the partial
///   directory cannot be created.
/// - [`ArchiveError::Extraction`] when the archive is malformed, empty,
///   or contains an escaping entry path.
///
/// On error the partial directory has been removed.
pub fn extract_to_directory<R: Read + Seek>(
    mut reader: R,
    root: &Path,
    category: &str,
) -> Result<Extracted> {
    let category_dir = root.join(category);
    fs::create_dir_all(&category_dir).map_err(|e| {
        ArchiveError::configuration(format!(
            "failed to create extraction directory {}: {e}",
            category_dir.display()
        ))
    })?;

    let final_dir = category_dir.join(archive_digest(&mut reader)?);
    if final_dir.is_dir() {
        debug!("reusing existing extraction {}", final_dir.display());
        return Ok(Extracted {
            dir: final_dir,
            created: false,
        });
    }

    let partial = tempfile::Builder::new()
        .prefix(PARTIAL_PREFIX)
        .tempdir_in(&category_dir)
        .map_err(|e| {
            ArchiveError::configuration(format!(
                "failed to create directory under {}: {e}",
                category_dir.display()
            ))
        })?;
    let mut archive = ZipArchive::new(reader).map_err(malformed)?;
    let count = unpack_entries(&mut archive, partial.path())?;
    if count == 0 {
        return Err(ArchiveError::extraction("archive contains no entries"));
    }

    match fs::rename(partial.path(), &final_dir) {
        Ok(()) => {}
        Err(_) if final_dir.is_dir() => {
            debug!("{} appeared concurrently; reusing it", final_dir.display());
            return Ok(Extracted {
                dir: final_dir,
                created: false,
            });
        }
        Err(e) => {
            return Err(ArchiveError::extraction(format!(
                "failed to move extracted files to {}: {e}",
                final_dir.display()
            )));
        }
    }
    debug!("extracted {count} entries into {}", final_dir.display());
    // `partial` now refers to a path that no longer exists; dropping it is
    // a no-op.
    Ok(Extracted {
        dir: final_dir,
        created: true,
    })
}

/// Hash the whole archive, then rewind it.
fn archive_digest(reader: &mut (impl Read + Seek)) -> Result<String> {
    let mut hashing = HashingReader::new(&mut *reader);
    io::copy(&mut hashing, &mut io::sink()).map_err(read_failure)?;
    let digest = hashing.finish_hex();
    reader.seek(SeekFrom::Start(0)).map_err(read_failure)?;
    Ok(digest)
}

/// Return the manifest entry of the archive in `reader`, buffered in
/// memory, or `None` when the archive has no manifest.
///
/// No archive member is written to disk.
///
/// # Errors
///
/// Returns [`ArchiveError::Extraction`] when the archive is malformed or
/// cannot be decrypted.
pub fn extract_manifest(mut reader: impl Read) -> Result<Option<Cursor<Vec<u8>>>> {
    loop {
        let Some(mut entry) = read_zipfile_from_stream(&mut reader).map_err(malformed)? else {
            return Ok(None);
        };
        if normalise_entry_name(entry.name()) == MANIFEST_PATH {
            let mut contents = Vec::new();
            entry.read_to_end(&mut contents).map_err(read_failure)?;
            return Ok(Some(Cursor::new(contents)));
        }
    }
}

fn unpack_entries<R: Read + Seek>(archive: &mut ZipArchive<R>, dest_dir: &Path) -> Result<usize> {
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(malformed)?;
        let entry_path = PathBuf::from(normalise_entry_name(entry.name()));
        validate_entry_path(&entry_path)?;

        let dest_path = dest_dir.join(&entry_path);
        if entry.is_dir() {
            fs::create_dir_all(&dest_path).map_err(write_failure)?;
        } else {
            if let Some(parent) = dest_path.parent() {
                fs::create_dir_all(parent).map_err(write_failure)?;
            }
            let mut out = fs::File::create(&dest_path).map_err(write_failure)?;
            io::copy(&mut entry, &mut out).map_err(read_failure)?;
        }
    }
    Ok(archive.len())
}

/// Validate that an entry path does not escape the destination directory
/// via `..` components or absolute paths.
fn validate_entry_path(path: &Path) -> Result<()> {
    let escapes = path.is_absolute()
        || path
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
    if escapes {
        return Err(ArchiveError::extraction(format!(
            "path traversal detected: {}",
            path.display()
        )));
    }
    Ok(())
}

fn normalise_entry_name(name: &str) -> String {
    let name = name.replace('\\', "/");
    name.trim_start_matches("./").to_owned()
}

fn malformed(err: zip::result::ZipError) -> ArchiveError {
    ArchiveError::extraction(format!("malformed archive: {err}"))
}

fn read_failure(err: io::Error) -> ArchiveError {
    ArchiveError::extraction(format!("failed to read archive: {err}"))
}

fn write_failure(err: io::Error) -> ArchiveError {
    ArchiveError::extraction(format!("failed to write archive entry: {err}"))
}

/// Hashes every byte that passes through it.
struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
}

impl<R: Read> HashingReader<R> {
    fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    fn finish_hex(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if let Some(read) = buf.get(..n) {
            self.hasher.update(read);
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::test_utils::{ZipFixture, resnet_manifest_json};
    use rstest::rstest;

    fn archive_bytes() -> Vec<u8> {
        ZipFixture::new()
            .file(MANIFEST_PATH, resnet_manifest_json().as_bytes())
            .file("resnet.pt", b"weights")
            .file("code/handler.py", b"def handle(): pass")
            .build()
    }

    fn crc32(data: &[u8]) -> u32 {
        let mut crc = !0u32;
        for &byte in data {
            crc ^= u32::from(byte);
            for _ in 0..8 {
                let mask = (crc & 1).wrapping_neg();
                crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
            }
        }
        !crc
    }

    /// A single stored entry whose CRC and sizes follow the data in a data
    /// descriptor (general purpose flag bit 3), as streaming writers emit.
    fn data_descriptor_zip(name: &str, contents: &[u8]) -> Vec<u8> {
        const FLAGS: u16 = 0x0008;
        const VERSION: u16 = 20;
        const DOS_DATE: u16 = 0x0021;
        let crc = crc32(contents);
        let size = u32::try_from(contents.len()).expect("small entry");
        let name_len = u16::try_from(name.len()).expect("short name");

        let mut out = Vec::new();
        out.extend_from_slice(&0x0403_4b50_u32.to_le_bytes());
        for field in [VERSION, FLAGS, 0, 0, DOS_DATE] {
            out.extend_from_slice(&field.to_le_bytes());
        }
        out.extend_from_slice(&[0u8; 12]);
        out.extend_from_slice(&name_len.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        out.extend_from_slice(contents);

        out.extend_from_slice(&0x0807_4b50_u32.to_le_bytes());
        for field in [crc, size, size] {
            out.extend_from_slice(&field.to_le_bytes());
        }

        let cd_offset = u32::try_from(out.len()).expect("small archive");
        out.extend_from_slice(&0x0201_4b50_u32.to_le_bytes());
        for field in [VERSION, VERSION, FLAGS, 0, 0, DOS_DATE] {
            out.extend_from_slice(&field.to_le_bytes());
        }
        for field in [crc, size, size] {
            out.extend_from_slice(&field.to_le_bytes());
        }
        for field in [name_len, 0, 0, 0, 0] {
            out.extend_from_slice(&field.to_le_bytes());
        }
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        let cd_size = u32::try_from(out.len()).expect("small archive") - cd_offset;

        out.extend_from_slice(&0x0605_4b50_u32.to_le_bytes());
        for field in [0u16, 0, 1, 1] {
            out.extend_from_slice(&field.to_le_bytes());
        }
        out.extend_from_slice(&cd_size.to_le_bytes());
        out.extend_from_slice(&cd_offset.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out
    }

    fn entries_in(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .expect("read dir")
            .map(|e| e.expect("dir entry").path())
            .collect()
    }

    #[test]
    fn extracts_tree_into_content_addressed_directory() {
        let root = tempfile::tempdir().expect("temp dir");
        let bytes = archive_bytes();

        let extracted = extract_to_directory(Cursor::new(bytes.clone()), root.path(), "models")
            .expect("extract");
        let dir = extracted.dir;

        assert!(extracted.created);
        let expected_name = format!("{:x}", Sha256::digest(&bytes));
        assert_eq!(dir, root.path().join("models").join(expected_name));
        assert!(dir.join(MANIFEST_PATH).is_file());
        assert_eq!(fs::read(dir.join("code/handler.py")).expect("read"), b"def handle(): pass");
        assert_eq!(entries_in(&root.path().join("models")), vec![dir]);
    }

    #[test]
    fn repeated_extraction_reuses_directory_without_claiming_it() {
        let root = tempfile::tempdir().expect("temp dir");
        let first =
            extract_to_directory(Cursor::new(archive_bytes()), root.path(), "models").expect("first");
        let second = extract_to_directory(Cursor::new(archive_bytes()), root.path(), "models")
            .expect("second");

        assert_eq!(first.dir, second.dir);
        assert!(first.created);
        assert!(!second.created);
        assert_eq!(entries_in(&root.path().join("models")).len(), 1);
    }

    #[test]
    fn entries_with_data_descriptors_are_extracted() {
        let root = tempfile::tempdir().expect("temp dir");
        let manifest = resnet_manifest_json();
        let bytes = data_descriptor_zip(MANIFEST_PATH, manifest.as_bytes());

        let extracted =
            extract_to_directory(Cursor::new(bytes), root.path(), "models").expect("extract");

        assert_eq!(
            fs::read_to_string(extracted.dir.join(MANIFEST_PATH)).expect("read manifest"),
            manifest
        );
    }

    #[test]
    fn empty_archive_is_rejected() {
        let root = tempfile::tempdir().expect("temp dir");
        let bytes = ZipFixture::new().build();

        let err = extract_to_directory(Cursor::new(bytes), root.path(), "models")
            .expect_err("no entries");

        assert!(err.to_string().contains("no entries"));
        assert!(entries_in(&root.path().join("models")).is_empty());
    }

    #[test]
    fn malformed_archive_leaves_nothing_behind() {
        let root = tempfile::tempdir().expect("temp dir");

        let err = extract_to_directory(Cursor::new(b"not a zip".to_vec()), root.path(), "models")
            .expect_err("malformed");

        assert_eq!(err.kind(), ErrorKind::Extraction);
        assert!(entries_in(&root.path().join("models")).is_empty());
    }

    #[test]
    fn escaping_entry_is_rejected_and_rolled_back() {
        let root = tempfile::tempdir().expect("temp dir");
        let bytes = ZipFixture::new()
            .file("ok.txt", b"fine")
            .file("../escape.txt", b"evil")
            .build();

        let err =
            extract_to_directory(Cursor::new(bytes), root.path(), "models").expect_err("zip-slip");

        assert!(err.to_string().contains("path traversal"));
        assert!(entries_in(&root.path().join("models")).is_empty());
        assert!(!root.path().join("escape.txt").exists());
    }

    #[test]
    fn uncreatable_category_is_configuration_error() {
        let root = tempfile::tempdir().expect("temp dir");
        fs::write(root.path().join("models"), b"occupied").expect("write file");

        let err = extract_to_directory(Cursor::new(archive_bytes()), root.path(), "models")
            .expect_err("category is a file");

        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[rstest]
    #[case::parent_dir("../escape.txt")]
    #[case::nested_parent("foo/../../escape.txt")]
    #[case::absolute("/etc/passwd")]
    fn rejects_path_traversal(#[case] bad_path: &str) {
        let result = validate_entry_path(Path::new(bad_path));
        assert!(result.is_err(), "expected rejection for {bad_path}");
    }

    #[test]
    fn accepts_normal_paths() {
        assert!(validate_entry_path(Path::new("MAR-INF/MANIFEST.json")).is_ok());
    }

    #[test]
    fn manifest_is_read_without_touching_disk() {
        let manifest = extract_manifest(Cursor::new(archive_bytes()))
            .expect("readable archive")
            .expect("manifest present");
        assert_eq!(manifest.into_inner(), resnet_manifest_json().into_bytes());
    }

    #[test]
    fn missing_manifest_yields_none() {
        let bytes = ZipFixture::new().file("resnet.pt", b"weights").build();
        let manifest = extract_manifest(Cursor::new(bytes)).expect("readable archive");
        assert!(manifest.is_none());
    }

    #[test]
    fn dot_slash_manifest_name_is_recognised() {
        let bytes = ZipFixture::new()
            .file("./MAR-INF/MANIFEST.json", b"{}")
            .build();
        let manifest = extract_manifest(Cursor::new(bytes)).expect("readable archive");
        assert!(manifest.is_some());
    }

    #[test]
    fn manifest_stream_rejects_garbage() {
        let err = extract_manifest(Cursor::new(vec![0u8; 64])).expect_err("garbage");
        assert_eq!(err.kind(), ErrorKind::Extraction);
    }
}
