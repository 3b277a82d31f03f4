//! Unit tests for archive packaging.

use super::*;
use crate::crypto::DecryptingReader;
use crate::extraction::{extract_manifest, extract_to_directory};
use crate::manifest_parser::{load_manifest_file, load_manifest_reader};
use crate::test_utils::{TEST_KEY, write_test_key};
use rstest::{fixture, rstest};
use tempfile::TempDir;

#[fixture]
fn temp_dir() -> TempDir {
    TempDir::new().expect("temp dir creation succeeds")
}

fn model_source(root: &Path) -> PathBuf {
    let source = root.join("resnet-src");
    fs::create_dir_all(source.join("code")).expect("create source");
    fs::write(source.join("resnet.pt"), b"weights").expect("write weights");
    fs::write(source.join("code/handler.py"), b"def handle(): pass").expect("write handler");
    source
}

fn params(root: &Path) -> PackageParams {
    PackageParams {
        model_name: "resnet".to_owned(),
        model_version: "1.0".to_owned(),
        handler: Some("resnet_handler".to_owned()),
        serialized_file: Some("resnet.pt".to_owned()),
        runtime: Runtime::Python,
        description: None,
        source_dir: model_source(root),
        output_dir: root.join("dist"),
        created_on: Some("19/10/2026 10:00:00".to_owned()),
        force: false,
        key_file: None,
    }
}

#[rstest]
fn packages_manifest_and_model_files(temp_dir: TempDir) {
    let output = package_archive(params(temp_dir.path())).expect("packaged");

    assert_eq!(output.archive_path, temp_dir.path().join("dist/resnet.mar"));
    assert!(!output.encrypted);
    assert_eq!(output.manifest.archiver_version(), Some(env!("CARGO_PKG_VERSION")));

    let extracted = temp_dir.path().join("extracted");
    let file = fs::File::open(&output.archive_path).expect("open archive");
    let dir = extract_to_directory(file, &extracted, "models").expect("extract").dir;
    assert_eq!(fs::read(dir.join("resnet.pt")).expect("weights"), b"weights");
    assert!(dir.join("code/handler.py").is_file());

    let manifest = load_manifest_file(&dir).expect("manifest");
    assert_eq!(manifest, output.manifest);
    assert_eq!(manifest.handler(), Some("resnet_handler"));
    assert_eq!(manifest.created_on(), Some("19/10/2026 10:00:00"));
}

#[rstest]
fn existing_archive_requires_force(temp_dir: TempDir) {
    package_archive(params(temp_dir.path())).expect("first");

    let err = package_archive(params(temp_dir.path())).expect_err("second");
    assert!(matches!(err, PackagingError::AlreadyExists(_)));

    let mut forced = params(temp_dir.path());
    forced.force = true;
    forced.model_version = "2.0".to_owned();
    let output = package_archive(forced).expect("forced");
    assert_eq!(output.manifest.model_version(), Some("2.0"));
}

#[rstest]
fn source_manifest_is_replaced(temp_dir: TempDir) {
    let p = params(temp_dir.path());
    fs::create_dir_all(p.source_dir.join(MANIFEST_DIR)).expect("create MAR-INF");
    fs::write(p.source_dir.join(MANIFEST_PATH), b"{\"stale\":true}").expect("write stale");

    let output = package_archive(p).expect("packaged");

    let file = fs::File::open(&output.archive_path).expect("open archive");
    let manifest = load_manifest_reader(extract_manifest(file).expect("readable"))
        .expect("manifest parses");
    assert_eq!(manifest.model_name(), Some("resnet"));
}

#[rstest]
fn encrypted_archive_decrypts_to_same_manifest(temp_dir: TempDir) {
    let mut p = params(temp_dir.path());
    p.key_file = Some(write_test_key(temp_dir.path()));

    let output = package_archive(p).expect("packaged");
    assert!(output.encrypted);

    let file = fs::File::open(&output.archive_path).expect("open archive");
    let reader = DecryptingReader::new(file, &TEST_KEY).expect("valid key");
    let manifest = load_manifest_reader(extract_manifest(reader).expect("decrypts"))
        .expect("manifest parses");
    assert_eq!(manifest, output.manifest);
}

#[rstest]
fn unusable_key_is_encryption_error(temp_dir: TempDir) {
    let mut p = params(temp_dir.path());
    let key = temp_dir.path().join("short.key");
    fs::write(&key, b"too short").expect("write key");
    p.key_file = Some(key);

    let err = package_archive(p).expect_err("bad key");

    assert!(matches!(err, PackagingError::Encryption(_)));
    assert!(!temp_dir.path().join("dist/resnet.mar").exists());
}

#[rstest]
#[case::leading_dash("-resnet")]
#[case::space("res net")]
#[case::slash("models/resnet")]
#[case::empty("")]
fn invalid_model_names_are_rejected(temp_dir: TempDir, #[case] name: &str) {
    let mut p = params(temp_dir.path());
    p.model_name = name.to_owned();

    let err = package_archive(p).expect_err("invalid name");

    assert!(matches!(err, PackagingError::InvalidModelName(_)));
}

#[rstest]
fn missing_source_is_rejected(temp_dir: TempDir) {
    let mut p = params(temp_dir.path());
    p.source_dir = temp_dir.path().join("absent");

    let err = package_archive(p).expect_err("no source");

    assert!(matches!(err, PackagingError::NotADirectory(_)));
}

#[rstest]
fn empty_version_is_rejected(temp_dir: TempDir) {
    let mut p = params(temp_dir.path());
    p.model_version = "  ".to_owned();
    assert!(matches!(
        package_archive(p).expect_err("empty version"),
        PackagingError::EmptyVersion
    ));
}

#[rstest]
#[case::epoch(0, "01/01/1970 00:00:00")]
#[case::leap_day(951_782_400, "29/02/2000 00:00:00")]
#[case::recent(1_792_404_000, "19/10/2026 10:00:00")]
fn formats_epoch_seconds(#[case] secs: u64, #[case] expected: &str) {
    assert_eq!(format_epoch_secs(secs), expected);
}

#[test]
fn generated_timestamp_is_used_when_absent() {
    let temp = tempfile::tempdir().expect("temp dir");
    let mut p = params(temp.path());
    p.created_on = None;
    let manifest = build_manifest(&p).expect("manifest");
    let created_on = manifest.created_on().expect("timestamp");
    assert_eq!(created_on.len(), "19/10/2026 10:00:00".len());
}
