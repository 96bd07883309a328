//! Multi-sequence workflows through the public API.

use std::fs;
use std::path::Path;

use tempfile::TempDir;
use tjoy_sequencer::{
    ElementStatus, ImportSettings, PickedFile, Role, TestSequencerProject, TestType,
};

use crate::support::{sequence_file, sequencer};

#[tokio::test]
async fn test_batch_import_of_three_files_keeps_input_order() {
    let seq = sequencer(Role::Admin);
    let files = vec![
        PickedFile::new("P.tjoy", sequence_file("P", &["p1", "p2"])),
        PickedFile::new("Q.tjoy", sequence_file("Q", &["q1"])),
        PickedFile::new("R.tjoy", sequence_file("R", &["r1"])),
    ];
    seq.import_sequences(files).await.expect("import");

    let registry = seq.registry().await;
    assert_eq!(registry.project().map(|p| p.name.as_str()), Some("P"));
    let names: Vec<&str> = registry
        .elements()
        .iter()
        .map(|e| e.test_name.as_str())
        .collect();
    assert_eq!(names, vec!["p1", "p2", "q1", "r1"]);
    assert!(registry.tree().validate_index().is_ok());
}

#[tokio::test]
async fn test_switch_round_trip_preserves_each_sequence() {
    let seq = sequencer(Role::Admin);
    seq.import_sequences(vec![PickedFile::new("A.tjoy", sequence_file("A", &["a1"]))])
        .await
        .expect("import A");
    seq.import_sequences(vec![PickedFile::new("B.tjoy", sequence_file("B", &["b1", "b2"]))])
        .await
        .expect("import B");

    // B is live; record two runs on it.
    seq.set_cycle_count(2).await;
    seq.save_run().await;
    seq.save_run().await;
    assert!(!seq.has_remaining_cycles().await);

    assert!(seq.set_sequence_as_runnable("A").await.expect("switch to A"));
    {
        let registry = seq.registry().await;
        assert_eq!(registry.elements().len(), 1);
        assert_eq!(registry.cycle().cycle_number, 0);
        assert!(registry.cycle_controller().runs().is_empty());
    }

    assert!(seq.set_next_sequence_as_runnable().await);
    let registry = seq.registry().await;
    assert_eq!(registry.project().map(|p| p.name.as_str()), Some("B"));
    assert_eq!(registry.elements().len(), 2);
    assert_eq!(registry.cycle().cycle_count, 2);
    assert_eq!(registry.cycle().ptr_cycle, 1);
    assert_eq!(registry.cycle_controller().runs().len(), 2);
}

#[tokio::test]
async fn test_cycle_history_navigation() {
    let seq = sequencer(Role::Admin);
    let temp_dir = TempDir::new().expect("temp dir");
    seq.create_sequence(TestSequencerProject::new("main").with_project_path(temp_dir.path()))
        .await
        .expect("create");
    seq.import_tests(Path::new("tests/test_io.py"), ImportSettings::new(TestType::Pytest))
        .await
        .expect("import tests");

    let first_id = seq.registry().await.elements()[0].id.clone();
    seq.save_run().await;
    seq.registry()
        .await
        .update_status(&first_id, ElementStatus::Failed, Some(2.0), None);
    seq.save_run().await;

    seq.previous_cycle().await;
    assert_eq!(
        seq.registry().await.elements()[0].status,
        ElementStatus::Pending
    );
    seq.next_cycle().await;
    seq.next_cycle().await;
    let registry = seq.registry().await;
    assert_eq!(registry.elements()[0].status, ElementStatus::Failed);
    assert_eq!(registry.cycle().ptr_cycle, 1);
}

#[tokio::test]
async fn test_integrity_requires_runnable_sequences() {
    let seq = sequencer(Role::Admin);
    seq.import_sequences(vec![PickedFile::new("A.tjoy", sequence_file("A", &["a1"]))])
        .await
        .expect("import");
    assert!(seq.integrity().await);

    seq.create_sequence(TestSequencerProject::new("empty"))
        .await
        .expect("create");
    assert!(!seq.integrity().await);
}

#[tokio::test]
async fn test_save_close_and_reopen() {
    let temp_dir = TempDir::new().expect("temp dir");
    let seq = sequencer(Role::Admin);
    seq.create_sequence(TestSequencerProject::new("station").with_project_path(temp_dir.path()))
        .await
        .expect("create");
    seq.import_tests(Path::new("tests/test_io.py"), ImportSettings::new(TestType::Pytest))
        .await
        .expect("import tests");
    let path = seq.save().await.expect("save");
    seq.close_sequence(false).await.expect("close saved sequence");
    assert!(seq.registry().await.project().is_none());

    let raw = fs::read_to_string(&path).expect("read");
    seq.import_sequences(vec![PickedFile::new(path.clone(), raw)])
        .await
        .expect("reopen");
    let registry = seq.registry().await;
    assert_eq!(registry.project().map(|p| p.name.as_str()), Some("station"));
    assert_eq!(registry.elements().len(), 2);
    assert!(!registry.is_unsaved());
}
