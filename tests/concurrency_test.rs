//! Multi-threaded tests for the coordination primitives

use kanon::concurrent::{dispatch_chunks, LazyConcurrentMap, ProducerCountDownLatch};
use kanon::domain::KanonError;
use kanon::sampling::ReservoirSet;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn pool(threads: usize) -> rayon::ThreadPool {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .unwrap()
}

#[test]
fn test_latch_waits_for_every_consumer() {
    let latch = ProducerCountDownLatch::new();
    let finished = AtomicUsize::new(0);

    thread::scope(|scope| {
        for _ in 0..8 {
            latch.produce_one();
            scope.spawn(|| {
                thread::sleep(Duration::from_millis(5));
                finished.fetch_add(1, Ordering::SeqCst);
                latch.consume_one();
            });
        }
        latch.producer_complete();
        latch.wait().unwrap();
        assert_eq!(finished.load(Ordering::SeqCst), 8);
    });

    assert!(latch.is_complete());
    assert_eq!(latch.outstanding(), 0);
}

#[test]
fn test_latch_completes_with_no_work() {
    let latch = ProducerCountDownLatch::new();
    latch.producer_complete();
    assert!(latch.wait().is_ok());
}

#[test]
fn test_latch_failure_releases_waiter_early() {
    let latch = ProducerCountDownLatch::new();
    latch.produce_one();
    latch.produce_one();

    thread::scope(|scope| {
        scope.spawn(|| latch.failure(anyhow::anyhow!("disk full")));
        scope.spawn(|| latch.failure(anyhow::anyhow!("second failure")));

        // the producer never completes and nothing is consumed
        assert!(latch.wait().is_err());
    });

    let failure = latch.wait().unwrap_err();
    assert_eq!(failure.suppressed(), 1);
    let first = failure.first().to_string();
    assert!(first == "disk full" || first == "second failure");
    assert!(latch.has_failed());
}

#[test]
fn test_lazy_map_runs_factory_once_per_key() {
    let calls = AtomicUsize::new(0);
    let map = LazyConcurrentMap::new(|key: &u32| {
        calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(2));
        key * 10
    });

    thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                for key in 0..16u32 {
                    assert_eq!(*map.get(&key), key * 10);
                }
            });
        }
    });

    assert_eq!(calls.load(Ordering::SeqCst), 16);
    assert_eq!(map.len(), 16);
}

#[test]
fn test_lazy_map_shares_one_value() {
    let map = LazyConcurrentMap::new(|key: &String| key.to_uppercase());
    let first = map.get(&"john".to_string());
    let second = map.get(&"john".to_string());
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_dispatch_visits_every_item() {
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    let dispatched = dispatch_chunks(&pool(3), 0..1000u32, 7, move |item| {
        sink.lock().push(item);
    })
    .unwrap();

    assert_eq!(dispatched, 1000);
    let mut seen = seen.lock().clone();
    seen.sort_unstable();
    assert_eq!(seen, (0..1000).collect::<Vec<_>>());
}

#[test]
fn test_dispatch_empty_iterator() {
    let dispatched = dispatch_chunks(&pool(2), std::iter::empty::<u32>(), 16, |_| {}).unwrap();
    assert_eq!(dispatched, 0);
}

#[test]
fn test_dispatch_reports_task_panic() {
    let result = dispatch_chunks(&pool(2), 0..200u32, 10, |item| {
        if item == 42 {
            panic!("bad item {item}");
        }
    });

    match result {
        Err(KanonError::TaskFailed(message)) => assert!(message.contains("bad item 42")),
        other => panic!("expected task failure, got {other:?}"),
    }
}

#[test]
fn test_reservoir_under_contention() {
    let reservoir = ReservoirSet::new(50);

    thread::scope(|scope| {
        for worker in 0..4u64 {
            let reservoir = &reservoir;
            scope.spawn(move || {
                let mut rng = StdRng::seed_from_u64(worker);
                for i in 0..500u64 {
                    reservoir.try_add(&mut rng, worker * 1000 + i);
                }
            });
        }
    });

    assert_eq!(reservoir.total_tried(), 2000);
    let sample = reservoir.final_set();
    assert_eq!(sample.len(), 50);
    let distinct: HashSet<u64> = sample.iter().copied().collect();
    assert_eq!(distinct.len(), 50);
}

#[test]
fn test_reservoir_ignores_duplicates_from_many_threads() {
    let reservoir = ReservoirSet::new(10);

    thread::scope(|scope| {
        for worker in 0..4u64 {
            let reservoir = &reservoir;
            scope.spawn(move || {
                let mut rng = StdRng::seed_from_u64(worker);
                for name in ["Zack", "Amy", "Jon"] {
                    reservoir.try_add(&mut rng, name.to_string());
                }
            });
        }
    });

    assert_eq!(reservoir.total_tried(), 12);
    let mut sample = reservoir.final_set();
    sample.sort();
    assert_eq!(sample, vec!["Amy", "Jon", "Zack"]);
}
