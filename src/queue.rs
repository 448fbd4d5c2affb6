//! The ready queue: a FIFO of runnable process handles with blocking pop.
//!
//! One mutex guards the deque and the shutdown bit; waiters block on a
//! condition variable bound to that mutex. Push order equals pop order
//! within a policy — there is no priority and no stealing.
//!
//! Shutdown semantics: [`ReadyQueue::shutdown`] sets the bit and wakes every
//! waiter, but [`Popped::Shutdown`] is only reported once the queue has
//! drained, so work enqueued before shutdown still gets dispatched.

use crate::process::ProcessHandle;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};

/// Result of a blocking pop.
pub enum Popped {
    /// Next runnable process, FIFO order.
    Process(ProcessHandle),
    /// The queue is shut down and drained; the worker should exit.
    Shutdown,
}

#[derive(Debug, Default)]
struct QueueState {
    items: VecDeque<ProcessHandle>,
    shutdown: bool,
}

/// Thread-safe FIFO of process handles.
#[derive(Debug, Default)]
pub struct ReadyQueue {
    state: Mutex<QueueState>,
    cv: Condvar,
}

impl ReadyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handle and wake one waiter.
    pub fn push(&self, handle: ProcessHandle) {
        let mut state = self.state.lock().expect("ready queue mutex poisoned");
        state.items.push_back(handle);
        drop(state);
        self.cv.notify_one();
    }

    /// Block until a handle is available or the queue is shut down and
    /// empty.
    pub fn pop_blocking(&self) -> Popped {
        let mut state = self.state.lock().expect("ready queue mutex poisoned");
        loop {
            if let Some(handle) = state.items.pop_front() {
                return Popped::Process(handle);
            }
            if state.shutdown {
                return Popped::Shutdown;
            }
            state = self
                .cv
                .wait(state)
                .expect("ready queue mutex poisoned");
        }
    }

    /// Set the shutdown bit and wake all waiters.
    pub fn shutdown(&self) {
        let mut state = self.state.lock().expect("ready queue mutex poisoned");
        state.shutdown = true;
        drop(state);
        self.cv.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .expect("ready queue mutex poisoned")
            .items
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
