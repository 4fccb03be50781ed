//! One-shot timers on a single background thread.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use log::error;
use parking_lot::{Condvar, Mutex};

use crate::runner::processor::thread::{set_thread_kind, ThreadKind};

pub type TimerId = u64;

type TimerJob = Box<dyn FnOnce() + Send>;

#[derive(Default)]
struct TimerState {
    queue: BinaryHeap<Reverse<(Instant, TimerId)>>,
    jobs: HashMap<TimerId, (u64, TimerJob)>,
    next_id: TimerId,
    shutdown: bool,
}

struct Shared {
    state: Mutex<TimerState>,
    wakeup: Condvar,
}

pub struct TimerService {
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl TimerService {
    pub fn new(stack_size: usize) -> std::io::Result<Self> {
        let shared = Arc::new(Shared {
            state: Mutex::new(TimerState::default()),
            wakeup: Condvar::new(),
        });
        let worker = shared.clone();
        let thread = std::thread::Builder::new()
            .name("hisescript-timer".to_string())
            .stack_size(stack_size)
            .spawn(move || run_timer_thread(worker))?;
        Ok(TimerService {
            shared,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Runs `job` once after `delay`. `group` lets a whole set of timers be
    /// cancelled together.
    pub fn schedule(&self, delay: Duration, group: u64, job: impl FnOnce() + Send + 'static) -> TimerId {
        let mut state = self.shared.state.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.queue.push(Reverse((Instant::now() + delay, id)));
        state.jobs.insert(id, (group, Box::new(job)));
        drop(state);
        self.shared.wakeup.notify_one();
        id
    }

    /// Returns whether the timer was still pending.
    pub fn cancel(&self, id: TimerId) -> bool {
        let removed = self.shared.state.lock().jobs.remove(&id);
        removed.is_some()
    }

    /// Cancels every pending timer of `group` and returns how many there were.
    pub fn cancel_group(&self, group: u64) -> usize {
        let mut state = self.shared.state.lock();
        let ids: Vec<TimerId> = state
            .jobs
            .iter()
            .filter(|(_, (g, _))| *g == group)
            .map(|(id, _)| *id)
            .collect();
        let removed: Vec<_> = ids.iter().filter_map(|id| state.jobs.remove(id)).collect();
        drop(state);
        removed.len()
    }

    pub fn pending(&self) -> usize {
        self.shared.state.lock().jobs.len()
    }
}

impl Drop for TimerService {
    fn drop(&mut self) {
        self.shared.state.lock().shutdown = true;
        self.shared.wakeup.notify_all();
        if let Some(thread) = self.thread.lock().take() {
            if thread.join().is_err() {
                error!("timer thread panicked");
            }
        }
    }
}

fn run_timer_thread(shared: Arc<Shared>) {
    set_thread_kind(ThreadKind::Timer);
    let mut state = shared.state.lock();
    loop {
        if state.shutdown {
            break;
        }
        let now = Instant::now();
        let mut due = vec![];
        while let Some(Reverse((deadline, id))) = state.queue.peek().copied() {
            if deadline > now {
                break;
            }
            state.queue.pop();
            if let Some((_, job)) = state.jobs.remove(&id) {
                due.push(job);
            }
        }
        if !due.is_empty() {
            drop(state);
            for job in due {
                job();
            }
            state = shared.state.lock();
            continue;
        }
        match state.queue.peek().copied() {
            Some(Reverse((deadline, _))) => {
                shared.wakeup.wait_until(&mut state, deadline);
            }
            None => shared.wakeup.wait(&mut state),
        }
    }
}
