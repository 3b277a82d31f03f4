//! BDD tests for the archive acquisition pipeline.
//!
//! Remote transfers are served by a stub fetcher that records every
//! request, so the scenarios can assert that rejected references never
//! reach the network.

use camino::Utf8PathBuf;
use model_archive::allow_list::AllowList;
use model_archive::archive::ModelArchive;
use model_archive::config::{AcquireOptions, DEFAULT_EXTRACTION_DIR, EXTRACTION_CATEGORY};
use model_archive::error::ArchiveError;
use model_archive::manifest::MANIFEST_PATH;
use model_archive::pipeline::Acquirer;
use model_archive::test_utils::{
    StubFetcher, archive_with_manifest, encrypt_with_test_key, manifest_json, resnet_manifest_json,
    write_test_key,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

struct AcquireWorld {
    store: TempDir,
    scratch: TempDir,
    options: AcquireOptions,
    fetcher: Arc<StubFetcher>,
    reference: Option<String>,
    result: Option<Result<ModelArchive, ArchiveError>>,
}

impl AcquireWorld {
    fn store_path(&self) -> &Path {
        self.store.path()
    }

    fn archive(&self) -> &ModelArchive {
        match self.result.as_ref().expect("result set") {
            Ok(archive) => archive,
            Err(err) => panic!("expected an archive, got {err}"),
        }
    }

    fn error(&self) -> &ArchiveError {
        match self.result.as_ref().expect("result set") {
            Ok(archive) => panic!("expected an error, got {archive:?}"),
            Err(err) => err,
        }
    }

    fn store_encrypted_resnet(&self, name: &str) {
        let plain = archive_with_manifest(&resnet_manifest_json());
        std::fs::write(self.store_path().join(name), encrypt_with_test_key(&plain))
            .expect("write encrypted archive");
    }
}

#[fixture]
fn world() -> AcquireWorld {
    let store = tempfile::tempdir().expect("store dir");
    let root = Utf8PathBuf::try_from(store.path().to_path_buf()).expect("UTF-8 path");
    AcquireWorld {
        store,
        scratch: tempfile::tempdir().expect("scratch dir"),
        options: AcquireOptions::new(root),
        fetcher: Arc::new(StubFetcher::missing()),
        reference: None,
        result: None,
    }
}

#[given("a remote archive \"{url}\" with a valid manifest")]
fn given_remote_valid(world: &mut AcquireWorld, url: String) {
    world.fetcher = Arc::new(StubFetcher::serving(archive_with_manifest(
        &resnet_manifest_json(),
    )));
    world.reference = Some(url);
}

#[given("a remote archive \"{url}\" without a runtime")]
fn given_remote_without_runtime(world: &mut AcquireWorld, url: String) {
    let manifest = manifest_json("resnet", "1.0", None);
    world.fetcher = Arc::new(StubFetcher::serving(archive_with_manifest(&manifest)));
    world.reference = Some(url);
}

#[given("the reference \"{reference}\"")]
fn given_reference(world: &mut AcquireWorld, reference: String) {
    world.reference = Some(reference);
}

#[given("the allow-list only permits \"{prefix}\"")]
fn given_allow_list(world: &mut AcquireWorld, prefix: String) {
    world.options.allowed_urls = AllowList::new([prefix]);
}

#[given("an encrypted archive \"{name}\" in the store with its key")]
fn given_encrypted_with_key(world: &mut AcquireWorld, name: String) {
    world.store_encrypted_resnet(&name);
    let key = Utf8PathBuf::try_from(write_test_key(world.scratch.path())).expect("UTF-8 path");
    world.options = world.options.clone().with_encryption(key);
    world.reference = Some(name);
}

#[given("an encrypted archive \"{name}\" in the store without a key")]
fn given_encrypted_without_key(world: &mut AcquireWorld, name: String) {
    world.store_encrypted_resnet(&name);
    world.options.encryption_enabled = true;
    world.options.key_store = None;
    world.reference = Some(name);
}

#[given("an unpacked model directory with a valid manifest")]
fn given_unpacked_directory(world: &mut AcquireWorld) {
    let dir = world.scratch.path().join("resnet");
    let manifest = dir.join(MANIFEST_PATH);
    let parent = manifest.parent().expect("manifest parent");
    std::fs::create_dir_all(parent).expect("create manifest dir");
    std::fs::write(&manifest, resnet_manifest_json()).expect("write manifest");
    world.reference = Some(dir.to_str().expect("UTF-8 path").to_owned());
}

#[when("the archive is acquired")]
fn when_acquired(world: &mut AcquireWorld) {
    let reference = world.reference.clone().expect("reference set");
    let acquirer = Acquirer::with_fetcher(world.options.clone(), Arc::clone(&world.fetcher));
    world.result = Some(acquirer.acquire(&reference));
}

#[when("the archive is cleaned up")]
fn when_cleaned_up(world: &mut AcquireWorld) {
    world.archive().cleanup();
}

#[then("acquisition succeeds with model \"{name}\" version \"{version}\"")]
fn then_succeeds(world: &mut AcquireWorld, name: String, version: String) {
    let archive = world.archive();
    assert_eq!(archive.model_name(), Some(name.as_str()));
    assert_eq!(archive.model_version(), Some(version.as_str()));
}

#[then("acquisition fails with a {kind} error")]
fn then_fails_with(world: &mut AcquireWorld, kind: String) {
    let err = world.error();
    assert_eq!(err.kind().to_string(), kind, "unexpected error: {err}");
}

#[then("the model directory was created by the acquisition")]
fn then_self_extracted(world: &mut AcquireWorld) {
    let archive = world.archive();
    assert!(archive.is_self_extracted());
    assert!(archive.model_dir().join(MANIFEST_PATH).is_file());
}

#[then("the model directory is the store")]
fn then_model_dir_is_store(world: &mut AcquireWorld) {
    let archive = world.archive();
    assert!(!archive.is_self_extracted());
    assert_eq!(archive.model_dir(), world.store_path());
}

#[then("the model directory still exists")]
fn then_model_dir_exists(world: &mut AcquireWorld) {
    assert!(world.archive().model_dir().join(MANIFEST_PATH).is_file());
}

#[then("\"{name}\" is in the store")]
fn then_in_store(world: &mut AcquireWorld, name: String) {
    assert!(world.store_path().join(name).is_file());
}

#[then("\"{name}\" is not in the store")]
fn then_not_in_store(world: &mut AcquireWorld, name: String) {
    assert!(!world.store_path().join(name).exists());
}

#[then("no extracted model remains")]
fn then_no_extracted_model(world: &mut AcquireWorld) {
    let dir: PathBuf = world
        .store_path()
        .join(DEFAULT_EXTRACTION_DIR)
        .join(EXTRACTION_CATEGORY);
    let remaining = std::fs::read_dir(&dir).map_or(0, Iterator::count);
    assert_eq!(remaining, 0, "{} is not empty", dir.display());
}

#[then("no transfer was attempted")]
fn then_no_transfer(world: &mut AcquireWorld) {
    assert_eq!(world.fetcher.calls(), 0);
}

#[then("the store is empty")]
fn then_store_empty(world: &mut AcquireWorld) {
    let entries = std::fs::read_dir(world.store_path())
        .expect("read store")
        .count();
    assert_eq!(entries, 0);
}

#[scenario(
    path = "tests/features/acquire.feature",
    name = "Remote archive with a valid manifest"
)]
fn scenario_remote_valid(world: AcquireWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/acquire.feature",
    name = "Path traversal is rejected before any transfer"
)]
fn scenario_traversal(world: AcquireWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/acquire.feature",
    name = "Locator outside the allow-list is rejected"
)]
fn scenario_allow_list(world: AcquireWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/acquire.feature",
    name = "Missing runtime rolls back the download and extraction"
)]
fn scenario_missing_runtime(world: AcquireWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/acquire.feature",
    name = "Encrypted archive in the store"
)]
fn scenario_encrypted(world: AcquireWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/acquire.feature",
    name = "Encrypted archive without a key"
)]
fn scenario_encrypted_without_key(world: AcquireWorld) {
    let _ = world;
}

#[scenario(
    path = "tests/features/acquire.feature",
    name = "Existing model directory is used in place"
)]
fn scenario_existing_directory(world: AcquireWorld) {
    let _ = world;
}
