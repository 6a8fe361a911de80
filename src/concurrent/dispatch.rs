//! Streaming a lazy iterator onto a rayon pool
//!
//! The calling thread is the single producer: it batches items into chunks and
//! spawns one task per chunk. A [`ProducerCountDownLatch`] tracks the chunks in
//! flight and bounds how far the producer can run ahead of the workers. A
//! panicking task is reported through the latch and fails the whole dispatch.

use super::latch::ProducerCountDownLatch;
use crate::domain::{KanonError, Result};
use rayon::ThreadPool;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

/// Chunks allowed in flight per pool thread before the producer blocks
const IN_FLIGHT_PER_THREAD: usize = 4;

/// Run `work` over every item of `items` on `pool`
///
/// Returns the number of items dispatched once every chunk has finished.
///
/// # Errors
///
/// [`KanonError::TaskFailed`] if any task panicked. The producer stops reading
/// `items` as soon as a failure is seen.
pub fn dispatch_chunks<I, T, F>(
    pool: &ThreadPool,
    items: I,
    chunk_size: usize,
    work: F,
) -> Result<usize>
where
    I: Iterator<Item = T>,
    T: Send + 'static,
    F: Fn(T) + Send + Sync + 'static,
{
    let chunk_size = chunk_size.max(1);
    let in_flight_limit = pool.current_num_threads().max(1) * IN_FLIGHT_PER_THREAD;
    let latch = Arc::new(ProducerCountDownLatch::new());
    let work = Arc::new(work);

    let mut dispatched = 0usize;
    let mut chunk = Vec::with_capacity(chunk_size);
    for item in items {
        chunk.push(item);
        dispatched += 1;
        if chunk.len() == chunk_size {
            latch.wait_for_capacity(in_flight_limit);
            if latch.has_failed() {
                break;
            }
            let full = std::mem::replace(&mut chunk, Vec::with_capacity(chunk_size));
            spawn_chunk(pool, &latch, &work, full);
        }
    }
    if !chunk.is_empty() && !latch.has_failed() {
        spawn_chunk(pool, &latch, &work, chunk);
    }
    latch.producer_complete();

    latch
        .wait()
        .map_err(|failure| KanonError::TaskFailed(failure.to_string()))?;
    Ok(dispatched)
}

fn spawn_chunk<T, F>(
    pool: &ThreadPool,
    latch: &Arc<ProducerCountDownLatch>,
    work: &Arc<F>,
    chunk: Vec<T>,
) where
    T: Send + 'static,
    F: Fn(T) + Send + Sync + 'static,
{
    latch.produce_one();
    let latch = Arc::clone(latch);
    let work = Arc::clone(work);
    pool.spawn(move || {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            for item in chunk {
                work(item);
            }
        }));
        if let Err(payload) = outcome {
            latch.failure(anyhow::anyhow!(
                "task panicked: {}",
                panic_message(payload.as_ref())
            ));
        }
        latch.consume_one();
    });
}

/// Run `task` on the current thread, turning a panic into
/// [`KanonError::TaskFailed`]
///
/// Used for work that runs on rayon's own parallel iterators, where a panic
/// would otherwise unwind through the caller.
pub fn catch_task<R>(task: impl FnOnce() -> Result<R>) -> Result<R> {
    panic::catch_unwind(AssertUnwindSafe(task)).unwrap_or_else(|payload| {
        Err(KanonError::TaskFailed(format!(
            "task panicked: {}",
            panic_message(payload.as_ref())
        )))
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn pool(threads: usize) -> ThreadPool {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .unwrap()
    }

    #[test]
    fn test_every_item_is_processed() {
        let pool = pool(4);
        let sum = Arc::new(AtomicUsize::new(0));
        let sink = Arc::clone(&sum);

        let dispatched = dispatch_chunks(&pool, 1..=1_000usize, 7, move |n| {
            sink.fetch_add(n, Ordering::SeqCst);
        })
        .unwrap();

        assert_eq!(dispatched, 1_000);
        assert_eq!(sum.load(Ordering::SeqCst), 500_500);
    }

    #[test]
    fn test_empty_iterator() {
        let pool = pool(2);
        let dispatched = dispatch_chunks(&pool, std::iter::empty::<u8>(), 16, |_| {}).unwrap();
        assert_eq!(dispatched, 0);
    }

    #[test]
    fn test_panicking_task_fails_dispatch() {
        let pool = pool(2);
        let result = dispatch_chunks(&pool, 0..100u32, 10, |n| {
            if n == 42 {
                panic!("bad value {n}");
            }
        });

        match result {
            Err(KanonError::TaskFailed(message)) => assert!(message.contains("bad value 42")),
            other => panic!("expected TaskFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_catch_task_maps_panic() {
        let result: Result<()> = catch_task(|| panic!("vector for {}", "Victim"));
        match result {
            Err(KanonError::TaskFailed(message)) => {
                assert_eq!(message, "task panicked: vector for Victim")
            }
            other => panic!("expected TaskFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_catch_task_passes_through_result() {
        assert_eq!(catch_task(|| Ok(7)).unwrap(), 7);
        let err = catch_task::<()>(|| Err(KanonError::Io("gone".to_string()))).unwrap_err();
        assert!(matches!(err, KanonError::Io(_)));
    }
}
