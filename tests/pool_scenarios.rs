//! End-to-end scenarios for the lane pool.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use lanepool::{LanePool, LanePoolBuilder, PoolState, Priority, SubmitError, Task};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn single_worker(capacity: usize) -> LanePool {
    init_tracing();
    LanePoolBuilder::new()
        .prefix("scenario")
        .worker_threads(1)
        .lane_capacity(capacity)
        .build()
        .unwrap()
}

/// Occupy the only worker with a Normal task until the returned sender fires.
///
/// A Normal placeholder leaves the fairness counter at zero.
fn block_worker(pool: &LanePool) -> mpsc::Sender<()> {
    let (started_tx, started_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    pool.submit(move || {
        started_tx.send(()).unwrap();
        let _ = release_rx.recv();
    })
    .unwrap();
    started_rx.recv().unwrap();
    release_tx
}

fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    panic!("condition not reached in time");
}

/// Records whether it ran and whether it was destroyed.
struct Tracked {
    ran: Arc<AtomicUsize>,
    dropped: Arc<AtomicUsize>,
}

impl Task for Tracked {
    fn execute(self) {
        self.ran.fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_drain_runs_every_submitted_task() {
    init_tracing();
    let pool = LanePool::new(4, 256).unwrap();
    let count = Arc::new(AtomicUsize::new(0));

    for _ in 0..200 {
        let count = count.clone();
        pool.submit(move || {
            count.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    pool.stop_after_drain();
    assert_eq!(count.load(Ordering::SeqCst), 200);
    assert_eq!(pool.state(), PoolState::Stopped);
    assert_eq!(pool.submit(|| {}), Err(SubmitError::Stopped));
    assert_eq!(pool.metrics().executed_tasks.get(), 200);
}

#[test]
fn test_mixed_backlog_dispatch_order() {
    let pool = single_worker(16);
    let order = Arc::new(Mutex::new(Vec::new()));
    let release = block_worker(&pool);

    let submit = |priority: Priority, label: String| {
        let order = order.clone();
        pool.submit_to(priority, move || order.lock().unwrap().push(label))
            .unwrap();
    };
    for i in 0..6 {
        submit(Priority::Low, format!("L{i}"));
    }
    for i in 0..4 {
        submit(Priority::Normal, format!("N{i}"));
    }
    for i in 0..6 {
        submit(Priority::High, format!("H{i}"));
    }

    release.send(()).unwrap();
    pool.stop_after_drain();

    let expected = [
        "H0", "H1", "H2", "N0", "H3", "H4", "H5", "N1", "N2", "N3", "L0", "L1", "L2", "L3",
        "L4", "L5",
    ];
    assert_eq!(*order.lock().unwrap(), expected);
    assert_eq!(pool.metrics().forced_normal_dispatches.get(), 1);
}

#[test]
fn test_fifo_within_each_lane() {
    let pool = single_worker(64);
    let order = Arc::new(Mutex::new(Vec::new()));
    let release = block_worker(&pool);

    for i in 0..32 {
        let order = order.clone();
        pool.submit_to(Priority::Low, move || order.lock().unwrap().push(i))
            .unwrap();
    }

    release.send(()).unwrap();
    pool.stop_after_drain();
    assert_eq!(*order.lock().unwrap(), (0..32).collect::<Vec<_>>());
}

#[test]
fn test_blocking_submit_waits_for_dispatch() {
    let pool = Arc::new(single_worker(1));
    let ran = Arc::new(AtomicUsize::new(0));
    let release = block_worker(&pool);

    let first = ran.clone();
    pool.submit(move || {
        first.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();
    assert_eq!(
        pool.submit(|| {}),
        Err(SubmitError::LaneFull(Priority::Normal))
    );

    let (done_tx, done_rx) = mpsc::channel();
    let producer = {
        let pool = pool.clone();
        let second = ran.clone();
        thread::spawn(move || {
            let result = pool.submit_blocking(move || {
                second.fetch_add(1, Ordering::SeqCst);
            });
            done_tx.send(result).unwrap();
        })
    };

    // Still blocked while the queued task sits in the lane
    assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());

    release.send(()).unwrap();
    let result = done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(result, Ok(()));
    producer.join().unwrap();

    pool.stop_after_drain();
    assert_eq!(ran.load(Ordering::SeqCst), 2);
}

#[test]
fn test_full_low_lane_does_not_block_high() {
    let pool = single_worker(1);
    let release = block_worker(&pool);

    pool.submit_to(Priority::Low, || {}).unwrap();
    // Would wait forever if lanes shared their backpressure
    pool.submit_blocking_to(Priority::High, || {}).unwrap();
    assert_eq!(pool.queued(Priority::Low), 1);
    assert_eq!(pool.queued(Priority::High), 1);

    release.send(()).unwrap();
    pool.stop_after_drain();
}

#[test]
fn test_blocked_submitter_abandoned_on_stop() {
    let pool = Arc::new(single_worker(1));
    let release = block_worker(&pool);
    pool.submit(|| {}).unwrap();

    let dropped = Arc::new(AtomicUsize::new(0));
    let ran = Arc::new(AtomicUsize::new(0));
    let (done_tx, done_rx) = mpsc::channel();
    let producer = {
        let pool = pool.clone();
        let task = Tracked {
            ran: ran.clone(),
            dropped: dropped.clone(),
        };
        thread::spawn(move || done_tx.send(pool.submit_blocking(task)).unwrap())
    };
    assert!(done_rx.recv_timeout(Duration::from_millis(100)).is_err());

    let stopper = {
        let pool = pool.clone();
        thread::spawn(move || pool.stop_immediate())
    };

    let result = done_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(result, Err(SubmitError::Stopped));
    producer.join().unwrap();
    assert_eq!(dropped.load(Ordering::SeqCst), 1);

    release.send(()).unwrap();
    stopper.join().unwrap();
    assert_eq!(pool.state(), PoolState::Stopped);
    assert_eq!(ran.load(Ordering::SeqCst), 0);
}

#[test]
fn test_immediate_stop_discards_queued_tasks() {
    let pool = Arc::new(single_worker(8));
    let release = block_worker(&pool);

    let ran = Arc::new(AtomicUsize::new(0));
    let dropped = Arc::new(AtomicUsize::new(0));
    for priority in [Priority::Low, Priority::Normal, Priority::High] {
        for _ in 0..2 {
            let task = Tracked {
                ran: ran.clone(),
                dropped: dropped.clone(),
            };
            pool.submit_to(priority, task).unwrap();
        }
    }
    assert_eq!(pool.queued_total(), 6);

    let stopper = {
        let pool = pool.clone();
        thread::spawn(move || pool.stop_immediate())
    };

    // Discarded tasks are destroyed before the in-flight one finishes
    wait_until(|| dropped.load(Ordering::SeqCst) == 6);
    assert_eq!(pool.state(), PoolState::Stopping);
    assert_eq!(pool.queued_total(), 0);

    release.send(()).unwrap();
    stopper.join().unwrap();

    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(pool.metrics().discarded_tasks.get(), 6);
    assert_eq!(pool.state(), PoolState::Stopped);
}

#[test]
fn test_drain_wait_yields_to_concurrent_immediate_stop() {
    let pool = Arc::new(single_worker(4));
    let release = block_worker(&pool);

    let ran = Arc::new(AtomicUsize::new(0));
    let dropped = Arc::new(AtomicUsize::new(0));
    pool.submit(Tracked {
        ran: ran.clone(),
        dropped: dropped.clone(),
    })
    .unwrap();

    let (drained_tx, drained_rx) = mpsc::channel();
    let drainer = {
        let pool = pool.clone();
        thread::spawn(move || {
            pool.stop_after_drain();
            drained_tx.send(pool.state()).unwrap();
        })
    };
    // Waiting for the queued task that the busy worker cannot reach
    assert!(drained_rx.recv_timeout(Duration::from_millis(100)).is_err());

    let stopper = {
        let pool = pool.clone();
        thread::spawn(move || pool.stop_immediate())
    };

    // The drainer gives up without waiting for the in-flight task
    let state = drained_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(state, PoolState::Stopping);
    drainer.join().unwrap();
    wait_until(|| dropped.load(Ordering::SeqCst) == 1);

    release.send(()).unwrap();
    stopper.join().unwrap();

    assert_eq!(ran.load(Ordering::SeqCst), 0);
    assert_eq!(pool.metrics().discarded_tasks.get(), 1);
    assert_eq!(pool.state(), PoolState::Stopped);
}

#[test]
fn test_stop_variants_are_idempotent() {
    let pool = LanePool::new(2, 8).unwrap();
    let count = Arc::new(AtomicUsize::new(0));
    for _ in 0..4 {
        let count = count.clone();
        pool.submit(move || {
            count.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();
    }

    pool.stop_after_drain();
    pool.stop_after_drain();
    pool.stop_immediate();

    assert_eq!(count.load(Ordering::SeqCst), 4);
    assert_eq!(pool.metrics().discarded_tasks.get(), 0);
    assert_eq!(pool.state(), PoolState::Stopped);
}

#[test]
fn test_panicking_task_keeps_worker_alive() {
    let pool = single_worker(8);
    let count = Arc::new(AtomicUsize::new(0));

    pool.submit_to(Priority::High, || panic!("task failure")).unwrap();
    let after = count.clone();
    pool.submit(move || {
        after.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    pool.stop_after_drain();
    assert_eq!(count.load(Ordering::SeqCst), 1);
    assert_eq!(pool.metrics().panicked_tasks.get(), 1);
}

#[test]
fn test_concurrent_producers() {
    init_tracing();
    let pool = Arc::new(LanePool::new(3, 32).unwrap());
    let count = Arc::new(AtomicUsize::new(0));

    let producers: Vec<_> = Priority::ALL
        .into_iter()
        .map(|priority| {
            let pool = pool.clone();
            let count = count.clone();
            thread::spawn(move || {
                for _ in 0..100 {
                    let count = count.clone();
                    pool.submit_blocking_to(priority, move || {
                        count.fetch_add(1, Ordering::SeqCst);
                    })
                    .unwrap();
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    pool.stop_after_drain();
    assert_eq!(count.load(Ordering::SeqCst), 300);
    assert_eq!(pool.metrics().submitted_tasks.get(), 300);
}

#[test]
fn test_metrics_exposed_through_registry() {
    let registry = prometheus::Registry::new();
    let pool = LanePoolBuilder::new()
        .prefix("exposed")
        .worker_threads(1)
        .prometheus_registry(registry.clone())
        .build()
        .unwrap();

    pool.submit(|| {}).unwrap();
    pool.stop_after_drain();

    let families = registry.gather();
    let submitted = families
        .iter()
        .find(|f| f.get_name() == "exposed_submitted_tasks")
        .expect("submitted counter registered");
    assert_eq!(submitted.get_metric()[0].get_counter().get_value(), 1.0);
    assert!(families
        .iter()
        .any(|f| f.get_name() == "exposed_queued_high"));
}
