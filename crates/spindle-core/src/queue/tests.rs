use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rand::Rng;
use rstest::rstest;
use tokio::sync::oneshot;
use tokio::time::{sleep, timeout};

use super::*;
use crate::error::EngineError;

const DEADLINE: Duration = Duration::from_secs(5);

type Log = Arc<Mutex<Vec<&'static str>>>;

fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn record(queue: &TaskQueue<&'static str>, key: &'static str, entry: &'static str, log: &Log) {
    let log = Arc::clone(log);
    queue
        .submit_async(key, "record", move || async move {
            log.lock().unwrap().push(entry);
            Ok(())
        })
        .unwrap();
}

async fn explode(message: &'static str) -> Result<(), IndexError> {
    panic!("{message}")
}

async fn noop() -> Result<(), IndexError> {
    Ok(())
}

async fn barrier(queue: &TaskQueue<&'static str>) {
    timeout(DEADLINE, queue.submit_sync("barrier", || async { Ok(()) }))
        .await
        .expect("barrier timed out")
        .unwrap();
}

#[rstest]
#[case(1)]
#[case(2)]
#[case(8)]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn tasks_on_one_key_run_in_submission_order(#[case] workers: usize) {
    const PER_KEY: usize = 40;
    let keys = ["a", "b", "c"];
    let queue = TaskQueue::new(workers);
    let seen: Arc<Mutex<HashMap<&'static str, Vec<usize>>>> = Arc::default();
    let busy: Arc<HashMap<&'static str, AtomicBool>> =
        Arc::new(keys.iter().map(|k| (*k, AtomicBool::new(false))).collect());
    let overlapped = Arc::new(AtomicBool::new(false));

    let delays: Vec<u64> = {
        let mut rng = rand::thread_rng();
        (0..PER_KEY * keys.len()).map(|_| rng.gen_range(0..3)).collect()
    };

    for i in 0..PER_KEY {
        for (k, key) in keys.iter().copied().enumerate() {
            let delay = delays[i * keys.len() + k];
            let seen = Arc::clone(&seen);
            let busy = Arc::clone(&busy);
            let overlapped = Arc::clone(&overlapped);
            queue
                .submit_async(key, "record", move || async move {
                    if busy[key].swap(true, Ordering::SeqCst) {
                        overlapped.store(true, Ordering::SeqCst);
                    }
                    sleep(Duration::from_millis(delay)).await;
                    seen.lock().unwrap().entry(key).or_default().push(i);
                    busy[key].store(false, Ordering::SeqCst);
                    Ok(())
                })
                .unwrap();
        }
    }
    barrier(&queue).await;

    assert!(!overlapped.load(Ordering::SeqCst), "two tasks of one lane overlapped");
    let seen = seen.lock().unwrap();
    for key in keys {
        assert_eq!(seen[key], (0..PER_KEY).collect::<Vec<_>>(), "lane {key}");
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn distinct_keys_do_not_wait_for_each_other() {
    let queue = TaskQueue::new(2);
    let order = log();
    let (release_a, gate_a) = oneshot::channel::<()>();

    {
        let order = Arc::clone(&order);
        queue
            .submit_async("A", "slow", move || async move {
                // Only finishes once B has run.
                gate_a.await.map_err(|_| IndexError::Closed)?;
                order.lock().unwrap().push("A");
                Ok(())
            })
            .unwrap();
    }
    {
        let order = Arc::clone(&order);
        queue
            .submit_async("B", "fast", move || async move {
                order.lock().unwrap().push("B");
                let _ = release_a.send(());
                Ok(())
            })
            .unwrap();
    }

    barrier(&queue).await;
    assert_eq!(*order.lock().unwrap(), vec!["B", "A"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn barrier_observes_every_prior_submission() {
    const N: usize = 200;
    let queue = TaskQueue::new(4);
    let counter = Arc::new(AtomicUsize::new(0));

    for i in 0..N {
        let counter = Arc::clone(&counter);
        let key = ["k0", "k1", "k2", "k3", "k4", "k5", "k6", "k7"][i % 8];
        queue
            .submit_async(key, "count", move || async move {
                tokio::task::yield_now().await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
    }

    let observed = {
        let counter = Arc::clone(&counter);
        timeout(
            DEADLINE,
            queue.submit_sync("read", move || async move { Ok(counter.load(Ordering::SeqCst)) }),
        )
        .await
        .unwrap()
        .unwrap()
    };

    assert!(observed >= N);
    assert!(counter.load(Ordering::SeqCst) >= N);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn barrier_ignores_later_submissions_but_waits_for_earlier_ones() {
    let queue = Arc::new(TaskQueue::new(2));
    let (release, gate) = oneshot::channel::<()>();
    let early_done = Arc::new(AtomicBool::new(false));

    {
        let early_done = Arc::clone(&early_done);
        queue
            .submit_async("early", "gated", move || async move {
                let _ = gate.await;
                early_done.store(true, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
    }

    let waiter = {
        let queue = Arc::clone(&queue);
        let early_done = Arc::clone(&early_done);
        tokio::spawn(async move {
            queue
                .submit_sync("check", move || async move { Ok(early_done.load(Ordering::SeqCst)) })
                .await
        })
    };

    // A later task on another lane completes first; it must not release the barrier.
    let late = log();
    record(&queue, "late", "late", &late);
    timeout(DEADLINE, async {
        while late.lock().unwrap().is_empty() {
            sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .unwrap();
    sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    release.send(()).unwrap();
    let saw_early = timeout(DEADLINE, waiter).await.unwrap().unwrap().unwrap();
    assert!(saw_early);
}

#[tokio::test]
async fn sync_failure_reaches_the_caller() {
    let queue: TaskQueue<&'static str> = TaskQueue::new(1);

    let err = queue
        .submit_sync("commit", || async {
            Err::<(), _>(IndexError::Engine(EngineError::new("disk full")))
        })
        .await
        .unwrap_err();

    assert!(matches!(err, IndexError::Engine(e) if e.message() == "disk full"));
}

#[tokio::test]
async fn sync_panic_is_reported_not_propagated() {
    let queue: TaskQueue<&'static str> = TaskQueue::new(1);

    let err = queue
        .submit_sync("commit", || explode("boom"))
        .await
        .unwrap_err();

    assert!(matches!(err, IndexError::Panicked { kind: "commit" }));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn failing_and_panicking_tasks_do_not_poison_the_lane() {
    let queue = TaskQueue::new(2);
    let entries = log();

    queue
        .submit_async("a", "fail", || async {
            Err(IndexError::Engine(EngineError::new("corrupt segment")))
        })
        .unwrap();
    queue
        .submit_async("a", "panic", || explode("mapper exploded"))
        .unwrap();
    record(&queue, "a", "after", &entries);

    barrier(&queue).await;

    assert_eq!(*entries.lock().unwrap(), vec!["after"]);
    let stats = queue.stats();
    assert_eq!(stats.completed, 3);
    assert_eq!(stats.failed, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_drains_then_refuses() {
    let queue = TaskQueue::new(2);
    let counter = Arc::new(AtomicUsize::new(0));

    for i in 0..20 {
        let counter = Arc::clone(&counter);
        let key = if i % 2 == 0 { "even" } else { "odd" };
        queue
            .submit_async(key, "slow", move || async move {
                sleep(Duration::from_millis(2)).await;
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
    }

    timeout(DEADLINE, queue.shutdown()).await.unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 20);

    let err = queue.submit_async("even", "late", || async { Ok(()) }).unwrap_err();
    assert!(err.is_closed());
    let err = queue.submit_sync("commit", || async { Ok(()) }).await.unwrap_err();
    assert!(err.is_closed());

    // Second shutdown is a no-op.
    timeout(DEADLINE, queue.shutdown()).await.unwrap();
    let stats = queue.stats();
    assert!(stats.closed);
    assert_eq!(stats.completed, 20);
}

#[tokio::test]
async fn idle_lanes_are_removed_after_barrier() {
    let queue = TaskQueue::new(3);
    let entries = log();
    for key in ["x", "y", "z"] {
        record(&queue, key, key, &entries);
    }

    barrier(&queue).await;

    let stats = queue.stats();
    assert_eq!(stats.lanes, 0);
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.running, 0);
    assert_eq!(stats.submitted, 3);
    assert!(stats.is_idle());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn dropped_queue_still_runs_queued_tasks() {
    let (done_tx, done_rx) = oneshot::channel::<()>();
    {
        let queue = TaskQueue::new(1);
        queue
            .submit_async("k", "wait", || async {
                sleep(Duration::from_millis(5)).await;
                Ok(())
            })
            .unwrap();
        queue
            .submit_async("k", "signal", move || async move {
                let _ = done_tx.send(());
                Ok(())
            })
            .unwrap();
    }

    timeout(DEADLINE, done_rx).await.unwrap().unwrap();
}

/// W=2; U1..U3 on A and U4 on B submitted concurrently, then a commit.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_workers_two_lanes_then_commit() {
    let queue = Arc::new(TaskQueue::new(2));
    let applied = log();

    let a = {
        let queue = Arc::clone(&queue);
        let applied = Arc::clone(&applied);
        tokio::spawn(async move {
            for u in ["U1", "U2", "U3"] {
                record(&queue, "A", u, &applied);
            }
        })
    };
    let b = {
        let queue = Arc::clone(&queue);
        let applied = Arc::clone(&applied);
        tokio::spawn(async move { record(&queue, "B", "U4", &applied) })
    };
    a.await.unwrap();
    b.await.unwrap();

    let at_commit = {
        let applied = Arc::clone(&applied);
        timeout(
            DEADLINE,
            queue.submit_sync("commit", move || async move { Ok(applied.lock().unwrap().clone()) }),
        )
        .await
        .unwrap()
        .unwrap()
    };

    assert_eq!(at_commit.len(), 4);
    let on_a: Vec<_> = at_commit.iter().copied().filter(|u| *u != "U4").collect();
    assert_eq!(on_a, vec!["U1", "U2", "U3"]);
    assert!(at_commit.contains(&"U4"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn barrier_operations_never_overlap() {
    let queue = Arc::new(TaskQueue::<&'static str>::new(2));
    let active = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let barriers: Vec<_> = ["commit", "truncate", "commit"]
        .into_iter()
        .map(|kind| {
            let queue = Arc::clone(&queue);
            let active = Arc::clone(&active);
            let peak = Arc::clone(&peak);
            tokio::spawn(async move {
                queue
                    .submit_sync(kind, move || async move {
                        let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        sleep(Duration::from_millis(30)).await;
                        active.fetch_sub(1, Ordering::SeqCst);
                        Ok(())
                    })
                    .await
            })
        })
        .collect();

    for barrier in barriers {
        timeout(DEADLINE, barrier).await.unwrap().unwrap().unwrap();
    }
    assert_eq!(peak.load(Ordering::SeqCst), 1, "two barrier operations ran at once");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn batch_runs_in_order_on_its_lane() {
    let queue = TaskQueue::new(2);
    let entries = log();

    let ids = queue
        .submit_all(
            "k",
            ["first", "second", "third"].map(|entry| {
                let entries = Arc::clone(&entries);
                ("record", move || async move {
                    entries.lock().unwrap().push(entry);
                    Ok(())
                })
            }),
        )
        .unwrap();
    barrier(&queue).await;

    assert_eq!(ids.len(), 3);
    assert_eq!(*entries.lock().unwrap(), vec!["first", "second", "third"]);
    assert_eq!(queue.stats().submitted, 3);
}

#[tokio::test]
async fn batch_on_closed_queue_enqueues_nothing() {
    let queue: TaskQueue<&'static str> = TaskQueue::new(1);
    queue.shutdown().await;

    let err = queue
        .submit_all("k", [("noop", noop), ("noop", noop)])
        .unwrap_err();

    assert!(err.is_closed());
    assert_eq!(queue.stats().submitted, 0);
}
