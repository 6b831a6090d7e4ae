use crate::helpers::{Recorder, job, start, wait_until};
use std::time::Duration;

#[tokio::test]
async fn earlier_deadline_fires_first_each_exactly_once() {
    let temp = tempfile::tempdir().expect("tempdir");
    let persister = start(temp.path(), "order", 20);
    let recorder = Recorder::default();
    persister.add_listener(recorder.listener());

    persister
        .set_timeout(job("A"), Duration::from_millis(50))
        .await
        .expect("schedule A");
    persister
        .set_timeout(job("B"), Duration::from_millis(10))
        .await
        .expect("schedule B");

    wait_until(Duration::from_secs(5), || recorder.len() >= 2).await;
    // A few more ticks must not re-deliver anything.
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(recorder.names(), vec!["B", "A"]);
    assert!(persister.pending().is_empty());
}

#[tokio::test]
async fn identical_deadlines_fire_in_insertion_order() {
    let temp = tempfile::tempdir().expect("tempdir");
    let persister = start(temp.path(), "fifo", 60_000);
    let recorder = Recorder::default();
    persister.add_listener(recorder.listener());

    for name in ["one", "two", "three", "four"] {
        persister
            .set_timeout(job(name), Duration::ZERO)
            .await
            .expect("schedule");
    }

    let pending = persister.pending();
    assert!(pending.windows(2).all(|w| w[0].fire_at <= w[1].fire_at));

    // Several inserts may share one millisecond; ties must keep FIFO order.
    let fired = persister.fire_due().await.expect("manual drain");
    assert_eq!(fired, 4);
    assert_eq!(recorder.names(), vec!["one", "two", "three", "four"]);
}

#[tokio::test]
async fn queue_stays_sorted_across_mixed_delays() {
    let temp = tempfile::tempdir().expect("tempdir");
    let persister = start(temp.path(), "sorted", 60_000);

    for (i, secs) in [300, 5, 120, 5, 0, 3600, 60].into_iter().enumerate() {
        persister
            .set_timeout(job(&format!("job-{i}")), Duration::from_secs(secs))
            .await
            .expect("schedule");
        let pending = persister.pending();
        assert!(
            pending.windows(2).all(|w| w[0].fire_at <= w[1].fire_at),
            "queue unsorted after inserting job-{i}"
        );
    }
}

#[tokio::test]
async fn every_listener_gets_correct_metadata() {
    let temp = tempfile::tempdir().expect("tempdir");
    let persister = start(temp.path(), "meta", 10);
    let first = Recorder::default();
    let second = Recorder::default();
    let first_id = persister.add_listener(first.listener());
    let second_id = persister.add_listener(second.listener());

    let timeout_id = persister
        .set_timeout(job("payload"), Duration::ZERO)
        .await
        .expect("schedule");

    wait_until(Duration::from_secs(5), || first.len() == 1 && second.len() == 1).await;

    let (data, meta) = first.events().remove(0);
    assert_eq!(data, job("payload"));
    assert_eq!(meta.timeout_id, timeout_id);
    assert_eq!(meta.listener_id, first_id);

    let (_, meta) = second.events().remove(0);
    assert_eq!(meta.timeout_id, timeout_id);
    assert_eq!(meta.listener_id, second_id);
}

#[tokio::test]
async fn async_listener_completes_before_next_timeout() {
    use persist_timeout::Listener;
    use std::sync::{Arc, Mutex};

    let temp = tempfile::tempdir().expect("tempdir");
    let persister = start(temp.path(), "async", 60_000);
    let log = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&log);
    persister.add_listener(Listener::new(move |job: crate::helpers::Job, _| {
        let sink = Arc::clone(&sink);
        async move {
            sink.lock().unwrap().push(format!("start {}", job.name));
            tokio::time::sleep(Duration::from_millis(20)).await;
            sink.lock().unwrap().push(format!("end {}", job.name));
        }
    }));

    persister
        .set_timeout(job("x"), Duration::ZERO)
        .await
        .expect("schedule x");
    persister
        .set_timeout(job("y"), Duration::ZERO)
        .await
        .expect("schedule y");
    persister.fire_due().await.expect("drain");

    assert_eq!(
        *log.lock().unwrap(),
        vec!["start x", "end x", "start y", "end y"]
    );
}
