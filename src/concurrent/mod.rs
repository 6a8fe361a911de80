//! Concurrency coordination helpers used by the de-identification engines

pub mod dispatch;
pub mod latch;
pub mod lazy_map;

pub use dispatch::{catch_task, dispatch_chunks};
pub use latch::{LatchFailure, ProducerCountDownLatch};
pub use lazy_map::LazyConcurrentMap;
