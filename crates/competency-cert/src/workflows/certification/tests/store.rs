use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;

use super::common::*;
use crate::workflows::certification::domain::{ReviewerRole, StudentId, SubmissionStatus};
use crate::workflows::certification::repository::{
    RepositoryError, RequestContext, SubmissionRepository,
};
use crate::workflows::certification::service::CertificationWorkflow;
use crate::workflows::certification::store::SnapshotFileRepository;
use crate::workflows::levels::LevelCatalog;

fn file_workflow(
    repository: Arc<SnapshotFileRepository>,
) -> CertificationWorkflow<SnapshotFileRepository, RecordingCredits> {
    CertificationWorkflow::new(
        repository,
        Arc::new(RecordingCredits::default()),
        LevelCatalog::standard(),
    )
}

#[test]
fn missing_snapshot_reads_as_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let repository = SnapshotFileRepository::new(dir.path().join("submissions.json"));

    assert!(repository.find_all(&ctx()).expect("read").is_empty());
}

#[test]
fn malformed_snapshot_degrades_to_empty() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("submissions.json");
    fs::write(&path, "[{\"id\": \"krs-1\", \"status\": ").expect("write garbage");
    let repository = SnapshotFileRepository::new(&path);

    assert!(repository.find_all(&ctx()).expect("read").is_empty());
    assert!(repository
        .find_by_student(&ctx(), &StudentId("s-001".to_string()))
        .expect("read")
        .is_none());
}

#[test]
fn snapshot_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nested").join("submissions.json");

    let submitted = {
        let workflow = file_workflow(Arc::new(SnapshotFileRepository::new(&path)));
        let submitted = workflow.submit(&ctx(), request("s-001")).expect("submit");
        workflow
            .approve(&ctx(), &submitted.id, ReviewerRole::SubjectTeacher, None, None)
            .expect("approve");
        submitted
    };

    let reopened = file_workflow(Arc::new(SnapshotFileRepository::new(&path)));
    let current = reopened
        .get_current(&ctx(), &submitted.student_id)
        .expect("read")
        .expect("present after reopen");
    assert_eq!(current.id, submitted.id);
    assert_eq!(current.status, SubmissionStatus::PendingHomeroom);
    assert_eq!(current.version, 1);
    assert_eq!(
        fs::read_dir(dir.path().join("nested")).expect("list dir").count(),
        2,
        "only the snapshot and its lock file remain"
    );
}

#[test]
fn snapshot_keeps_one_record_per_student() {
    let dir = tempfile::tempdir().expect("tempdir");
    let repository = Arc::new(SnapshotFileRepository::new(dir.path().join("krs.json")));
    let workflow = file_workflow(repository.clone());

    workflow.submit(&ctx(), request("s-001")).expect("submit");
    workflow.submit(&ctx(), request("s-002")).expect("submit");
    let replacement = workflow.submit(&ctx(), request("s-001")).expect("resubmit");

    let all = repository.find_all(&ctx()).expect("read");
    assert_eq!(all.len(), 2);
    assert!(all.iter().any(|record| record.id == replacement.id));
}

#[test]
fn concurrent_handles_keep_every_save() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("krs.json");
    let (workflow, _, _) = build_workflow();
    let records: Vec<_> = (0..80)
        .map(|n| {
            workflow
                .submit(&ctx(), request(&format!("s-{n:03}")))
                .expect("submit")
        })
        .collect();

    let handles = [
        Arc::new(SnapshotFileRepository::new(&path)),
        Arc::new(SnapshotFileRepository::new(&path)),
    ];
    let barrier = Arc::new(Barrier::new(handles.len()));
    let writers: Vec<_> = records
        .chunks(40)
        .zip(handles.iter().cloned())
        .map(|(batch, repository)| {
            let batch = batch.to_vec();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                batch
                    .into_iter()
                    .map(|record| repository.save(&ctx(), record))
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for writer in writers {
        for result in writer.join().expect("writer thread") {
            assert!(result.is_ok(), "save failed: {result:?}");
        }
    }

    assert_eq!(handles[0].find_all(&ctx()).expect("read").len(), 80);
    let mut leftovers: Vec<_> = fs::read_dir(dir.path())
        .expect("list dir")
        .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    leftovers.sort();
    assert_eq!(leftovers, vec!["krs.json", "krs.json.lock"]);
}

#[test]
fn racing_handles_advance_a_record_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("krs.json");
    let (workflow, _, _) = build_workflow();
    let record = workflow.submit(&ctx(), request("s-001")).expect("submit");
    SnapshotFileRepository::new(&path)
        .save(&ctx(), record.clone())
        .expect("seed");

    let barrier = Arc::new(Barrier::new(2));
    let racers: Vec<_> = [SubmissionStatus::PendingHomeroom, SubmissionStatus::Rejected]
        .into_iter()
        .map(|status| {
            let repository = SnapshotFileRepository::new(&path);
            let barrier = barrier.clone();
            let mut advanced = record.clone();
            advanced.version = 1;
            advanced.status = status;
            thread::spawn(move || {
                barrier.wait();
                repository.save(&ctx(), advanced)
            })
        })
        .collect();

    let results: Vec<_> = racers
        .into_iter()
        .map(|racer| racer.join().expect("racer thread"))
        .collect();
    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert_eq!(
        results
            .iter()
            .filter(|result| matches!(result, Err(RepositoryError::Conflict)))
            .count(),
        1
    );

    let stored = SnapshotFileRepository::new(&path)
        .find_by_student(&ctx(), &record.student_id)
        .expect("read")
        .expect("present");
    assert_eq!(stored.version, 1);
}

#[test]
fn expired_context_is_abandoned() {
    let dir = tempfile::tempdir().expect("tempdir");
    let repository = SnapshotFileRepository::new(dir.path().join("krs.json"));
    let expired = RequestContext::with_timeout(std::time::Duration::ZERO);

    assert!(matches!(
        repository.find_all(&expired),
        Err(RepositoryError::Abandoned)
    ));
}
