use crate::helpers::{Job, Recorder, job, start, wait_until};
use persist_timeout::store::Store;
use persist_timeout::{InstanceCounter, Persister, PersisterConfig, Timeout};
use std::time::Duration;

#[tokio::test]
async fn fresh_instance_starts_empty() {
    let temp = tempfile::tempdir().expect("tempdir");
    let persister = start(temp.path(), "fresh", 10);

    assert!(persister.pending().is_empty());
    assert!(!persister.path().exists());
}

#[tokio::test]
async fn future_timeouts_survive_restart_without_firing() {
    let temp = tempfile::tempdir().expect("tempdir");

    let mut scheduled = Vec::new();
    {
        let first = start(temp.path(), "durable", 60_000);
        for name in ["a", "b", "c"] {
            let id = first
                .set_timeout(job(name), Duration::from_secs(3600))
                .await
                .expect("schedule");
            scheduled.push(id);
        }
    }

    let second = start(temp.path(), "durable", 10);
    let recorder = Recorder::default();
    second.add_listener(recorder.listener());
    tokio::time::sleep(Duration::from_millis(100)).await;

    let pending = second.pending();
    let ids: Vec<_> = pending.iter().map(|t| t.id).collect();
    assert_eq!(ids, scheduled);
    assert_eq!(recorder.len(), 0);
}

#[tokio::test]
async fn overdue_timeouts_fire_after_restart() {
    let temp = tempfile::tempdir().expect("tempdir");

    let id = {
        let first = start(temp.path(), "overdue", 60_000);
        first
            .set_timeout(job("missed"), Duration::from_millis(1))
            .await
            .expect("schedule")
    };

    let second = start(temp.path(), "overdue", 10);
    let recorder = Recorder::default();
    second.add_listener(recorder.listener());

    wait_until(Duration::from_secs(5), || recorder.len() == 1).await;
    let (data, meta) = recorder.events().remove(0);
    assert_eq!(data, job("missed"));
    assert_eq!(meta.timeout_id, id);

    wait_until(Duration::from_secs(5), || {
        Store::new(second.path())
            .load::<Job>()
            .map(|on_disk| on_disk.is_empty())
            .unwrap_or(false)
    })
    .await;
}

#[tokio::test]
async fn corrupt_state_file_is_discarded() {
    let temp = tempfile::tempdir().expect("tempdir");
    std::fs::write(temp.path().join("itest-corrupt.json"), "[{\"id\": oops").expect("seed");

    let persister = start(temp.path(), "corrupt", 60_000);
    assert!(persister.pending().is_empty());

    persister
        .set_timeout(job("fresh"), Duration::from_secs(60))
        .await
        .expect("schedule overwrites corrupt file");
    let on_disk: Vec<Timeout<Job>> = Store::new(persister.path()).load().expect("valid file");
    assert_eq!(on_disk.len(), 1);
}

#[tokio::test]
async fn unsorted_state_file_is_reordered_on_load() {
    let temp = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        temp.path().join("itest-hand-edited.json"),
        r#"[
            {"id": 3, "date": "2099-03-01T00:00:00.000Z", "data": {"name": "march"}},
            {"id": 1, "date": "2099-01-01T00:00:00.000Z", "data": {"name": "january"}},
            {"id": 2, "date": "2099-02-01T00:00:00.000Z", "data": {"name": "february"}}
        ]"#,
    )
    .expect("seed");

    let persister = start(temp.path(), "hand-edited", 60_000);
    let names: Vec<_> = persister
        .pending()
        .into_iter()
        .map(|t| t.data.name)
        .collect();
    assert_eq!(names, vec!["january", "february", "march"]);

    let next = persister
        .set_timeout(job("new"), Duration::from_secs(1))
        .await
        .expect("schedule");
    assert!(next.0 > 3);
}

#[tokio::test]
async fn unnamed_instances_use_the_owned_counter() {
    let temp = tempfile::tempdir().expect("tempdir");
    let counter = InstanceCounter::new();
    let config = PersisterConfig::default()
        .with_base_dir(temp.path())
        .with_app_name("itest");

    let first: Persister<Job> = Persister::start(config.clone(), &counter).expect("first");
    let second: Persister<Job> = Persister::start(config, &counter).expect("second");

    assert_eq!(first.instance_id(), "itest-0");
    assert_eq!(second.instance_id(), "itest-1");
    assert_ne!(first.path(), second.path());
}
