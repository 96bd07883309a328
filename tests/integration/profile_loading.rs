//! Loading test profiles and folders of sequences.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;
use tjoy_sequencer::profile::{InstalledProfile, ProfileInstaller};
use tjoy_sequencer::{Role, SequencerError, SequencerResult};

use crate::support::{sequence_file, sequencer};

/// Installer that "checks out" a fixed directory.
struct LocalProfile {
    root: PathBuf,
}

#[async_trait]
impl ProfileInstaller for LocalProfile {
    async fn install_profile(&self, _git_url: &str) -> SequencerResult<InstalledProfile> {
        Ok(InstalledProfile {
            hash: "3f2a9c1".to_string(),
            profile_root: self.root.clone(),
        })
    }
}

struct BrokenProfile;

#[async_trait]
impl ProfileInstaller for BrokenProfile {
    async fn install_profile(&self, git_url: &str) -> SequencerResult<InstalledProfile> {
        Err(SequencerError::Transport(format!("cannot clone {git_url}")))
    }
}

fn profile_dir() -> TempDir {
    let temp_dir = TempDir::new().expect("temp dir");
    fs::write(
        temp_dir.path().join("a_main.tjoy"),
        sequence_file("main", &["boot", "flash"]),
    )
    .expect("write");
    fs::write(
        temp_dir.path().join("b_extra.tjoy"),
        sequence_file("extra", &["burn_in"]),
    )
    .expect("write");
    fs::write(temp_dir.path().join("README.md"), "# station profile").expect("write");
    temp_dir
}

#[tokio::test]
async fn test_load_profile_imports_sequences_and_sets_cycles() {
    let profile = profile_dir();
    let seq = sequencer(Role::Admin).with_profile_installer(Arc::new(LocalProfile {
        root: profile.path().to_path_buf(),
    }));

    let count = seq
        .load_test_profile("https://git.example/station.git", 3, true)
        .await
        .expect("load profile");
    assert_eq!(count, 2);

    let registry = seq.registry().await;
    assert_eq!(registry.project().map(|p| p.name.as_str()), Some("main"));
    assert_eq!(registry.commit_hash(), Some("3f2a9c1"));
    assert_eq!(registry.cycle().cycle_count, 3);
    let names: Vec<&str> = registry
        .elements()
        .iter()
        .map(|e| e.test_name.as_str())
        .collect();
    assert_eq!(names, vec!["boot", "flash", "burn_in"]);
}

#[tokio::test]
async fn test_load_profile_replaces_open_sequences() {
    let profile = profile_dir();
    let seq = sequencer(Role::Admin).with_profile_installer(Arc::new(LocalProfile {
        root: profile.path().to_path_buf(),
    }));
    seq.import_sequences(vec![tjoy_sequencer::PickedFile::new(
        "old.tjoy",
        sequence_file("old", &["legacy"]),
    )])
    .await
    .expect("import");

    // Freshly imported sequences have nothing to lose.
    seq.load_test_profile("https://git.example/station.git", 1, false)
        .await
        .expect("load profile");
    let registry = seq.registry().await;
    assert!(registry.sequences().iter().all(|c| c.project.name != "old"));
}

#[tokio::test]
async fn test_load_profile_keeps_unsaved_sequences_unless_confirmed() {
    let profile = profile_dir();
    let seq = sequencer(Role::Admin).with_profile_installer(Arc::new(LocalProfile {
        root: profile.path().to_path_buf(),
    }));
    seq.import_sequences(vec![tjoy_sequencer::PickedFile::new(
        "old.tjoy",
        sequence_file("old", &["legacy"]),
    )])
    .await
    .expect("import");
    seq.set_cycle_count(4).await;
    seq.registry().await.set_unsaved(true);

    let err = seq
        .load_test_profile("https://git.example/station.git", 1, false)
        .await
        .expect_err("unsaved sequence");
    assert!(matches!(err, SequencerError::Cancelled(_)));
    {
        let registry = seq.registry().await;
        assert_eq!(registry.project().map(|p| p.name.as_str()), Some("old"));
        assert_eq!(registry.cycle().cycle_count, 4);
    }

    seq.load_test_profile("https://git.example/station.git", 1, true)
        .await
        .expect("load profile");
    assert_eq!(
        seq.registry().await.project().map(|p| p.name.as_str()),
        Some("main")
    );
}

#[tokio::test]
async fn test_empty_url_clears_state_and_fails() {
    let seq = sequencer(Role::Admin);
    seq.import_sequences(vec![tjoy_sequencer::PickedFile::new(
        "old.tjoy",
        sequence_file("old", &["legacy"]),
    )])
    .await
    .expect("import");

    let err = seq.load_test_profile("", 2, false).await.expect_err("empty url");
    assert!(err.to_string().contains("No sequences associated"));
    assert!(seq.registry().await.project().is_none());
}

#[tokio::test]
async fn test_install_failure_is_surfaced() {
    let seq = sequencer(Role::Admin).with_profile_installer(Arc::new(BrokenProfile));
    let err = seq
        .load_test_profile("https://git.example/station.git", 2, true)
        .await
        .expect_err("install failure");
    assert!(matches!(err, SequencerError::Transport(_)));
    assert!(seq.registry().await.commit_hash().is_none());
}

#[tokio::test]
async fn test_import_folder_merges_sorted_files() {
    let profile = profile_dir();
    let seq = sequencer(Role::Admin);
    let count = seq
        .import_folder(profile.path(), false)
        .await
        .expect("import folder");
    assert_eq!(count, 2);
    assert_eq!(seq.registry().await.elements().len(), 3);
}

#[tokio::test]
async fn test_import_folder_requires_admin() {
    let profile = profile_dir();
    let seq = sequencer(Role::Operator);
    assert!(matches!(
        seq.import_folder(profile.path(), false).await,
        Err(SequencerError::PermissionDenied(_))
    ));
    assert!(seq.registry().await.project().is_none());
}
