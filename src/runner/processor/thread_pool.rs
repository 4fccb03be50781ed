use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::error;
use parking_lot::{Condvar, Mutex};

use crate::runner::processor::thread::{set_thread_kind, ThreadKind};

struct PoolInner {
    pool: rayon::ThreadPool,
    pending: Mutex<usize>,
    idle: Condvar,
}

/// Background worker for asynchronous script work. Jobs run one at a time in
/// submission order. Cloning yields another handle to the same worker.
#[derive(Clone)]
pub struct ScriptThreadPool {
    inner: Arc<PoolInner>,
}

impl ScriptThreadPool {
    pub fn new(stack_size: usize) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(1)
            .stack_size(stack_size)
            .thread_name(|i| format!("hisescript-pool-{}", i))
            .start_handler(|_| set_thread_kind(ThreadKind::ScriptPool))
            .build()?;
        Ok(ScriptThreadPool {
            inner: Arc::new(PoolInner {
                pool,
                pending: Mutex::new(0),
                idle: Condvar::new(),
            }),
        })
    }

    pub fn spawn(&self, job: impl FnOnce() + Send + 'static) {
        *self.inner.pending.lock() += 1;
        let inner = self.inner.clone();
        self.inner.pool.spawn_fifo(move || {
            if catch_unwind(AssertUnwindSafe(job)).is_err() {
                error!("script pool job panicked");
            }
            let mut pending = inner.pending.lock();
            *pending -= 1;
            if *pending == 0 {
                inner.idle.notify_all();
            }
        });
    }

    pub fn pending_jobs(&self) -> usize {
        *self.inner.pending.lock()
    }

    /// Blocks until every submitted job has finished. Returns false on timeout.
    /// Must not be called from the pool thread itself.
    pub fn wait_until_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut pending = self.inner.pending.lock();
        while *pending > 0 {
            if self.inner.idle.wait_until(&mut pending, deadline).timed_out() {
                return *pending == 0;
            }
        }
        true
    }
}
