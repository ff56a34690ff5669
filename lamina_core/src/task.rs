// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The logic thread's message queue.
//!
//! Everything that touches the animator runs on one thread. Other threads
//! (vsync sources, timers) reach it by posting messages through a
//! [`TaskSender`]; the owning thread drains the [`TaskQueue`] and dispatches
//! each message. Delayed messages become available once the queue's
//! [`Clock`] passes their due time.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, VecDeque};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::time::{Clock, Duration, HostTime};

#[derive(Debug)]
struct Delayed<M> {
    due: HostTime,
    /// Tie-breaker keeping equal due times in posting order.
    seq: u64,
    msg: M,
}

impl<M> PartialEq for Delayed<M> {
    fn eq(&self, other: &Self) -> bool {
        self.due == other.due && self.seq == other.seq
    }
}

impl<M> Eq for Delayed<M> {}

impl<M> PartialOrd for Delayed<M> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Reversed so the `BinaryHeap` pops the earliest due message first.
impl<M> Ord for Delayed<M> {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due
            .cmp(&self.due)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug)]
struct Queues<M> {
    immediate: VecDeque<M>,
    delayed: BinaryHeap<Delayed<M>>,
    seq: u64,
    closed: bool,
}

#[derive(Debug)]
struct Shared<M> {
    queues: Mutex<Queues<M>>,
    posted: Condvar,
    clock: Arc<dyn Clock>,
}

/// Receiving end of the logic thread's queue.
#[derive(Debug)]
pub struct TaskQueue<M> {
    shared: Arc<Shared<M>>,
}

/// Cloneable, thread-safe posting handle for a [`TaskQueue`].
#[derive(Debug)]
pub struct TaskSender<M> {
    shared: Arc<Shared<M>>,
}

impl<M> Clone for TaskSender<M> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<M> TaskQueue<M> {
    /// Creates an empty queue whose delays are measured on `clock`.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            shared: Arc::new(Shared {
                queues: Mutex::new(Queues {
                    immediate: VecDeque::new(),
                    delayed: BinaryHeap::new(),
                    seq: 0,
                    closed: false,
                }),
                posted: Condvar::new(),
                clock,
            }),
        }
    }

    /// A new posting handle.
    #[must_use]
    pub fn sender(&self) -> TaskSender<M> {
        TaskSender {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Pops the next runnable message without waiting.
    ///
    /// Immediate messages run before delayed ones that are due.
    pub fn try_next(&self) -> Option<M> {
        let now = self.shared.clock.now();
        let mut queues = self.shared.queues.lock();
        pop_runnable(&mut queues, now)
    }

    /// Waits up to `timeout` for a runnable message.
    ///
    /// Also wakes early when a delayed message falls due. Returns `None` on
    /// timeout or when the queue is closed and empty.
    pub fn next_timeout(&self, timeout: std::time::Duration) -> Option<M> {
        let deadline = std::time::Instant::now() + timeout;
        let mut queues = self.shared.queues.lock();
        loop {
            let now = self.shared.clock.now();
            if let Some(msg) = pop_runnable(&mut queues, now) {
                return Some(msg);
            }
            if queues.closed {
                return None;
            }
            // Sleep until the earliest delayed message is due, capped by the
            // caller's deadline.
            let wake = match queues.delayed.peek() {
                Some(d) => {
                    let wait: std::time::Duration = d.due.saturating_duration_since(now).into();
                    (std::time::Instant::now() + wait).min(deadline)
                }
                None => deadline,
            };
            let timed_out = self.shared.posted.wait_until(&mut queues, wake).timed_out();
            if timed_out && std::time::Instant::now() >= deadline {
                let now = self.shared.clock.now();
                return pop_runnable(&mut queues, now);
            }
        }
    }

    /// Due time of the earliest delayed message, if any.
    #[must_use]
    pub fn next_due(&self) -> Option<HostTime> {
        self.shared.queues.lock().delayed.peek().map(|d| d.due)
    }

    /// Number of queued messages, delayed ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        let queues = self.shared.queues.lock();
        queues.immediate.len() + queues.delayed.len()
    }

    /// Whether no messages are queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stops accepting messages and wakes a waiting [`next_timeout`](Self::next_timeout).
    pub fn close(&self) {
        self.shared.queues.lock().closed = true;
        self.shared.posted.notify_all();
    }
}

impl<M> TaskSender<M> {
    /// Queues `msg` to run as soon as possible. Returns `false` if the
    /// queue was closed.
    pub fn post(&self, msg: M) -> bool {
        let mut queues = self.shared.queues.lock();
        if queues.closed {
            return false;
        }
        queues.immediate.push_back(msg);
        drop(queues);
        self.shared.posted.notify_one();
        true
    }

    /// Queues `msg` to run once `delay` has passed on the queue's clock.
    /// Returns `false` if the queue was closed.
    pub fn post_delayed(&self, msg: M, delay: Duration) -> bool {
        let due = self.shared.clock.now().saturating_add(delay);
        let mut queues = self.shared.queues.lock();
        if queues.closed {
            return false;
        }
        let seq = queues.seq;
        queues.seq += 1;
        queues.delayed.push(Delayed { due, seq, msg });
        drop(queues);
        self.shared.posted.notify_one();
        true
    }

    /// The clock delays are measured on.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.shared.clock
    }
}

fn pop_runnable<M>(queues: &mut Queues<M>, now: HostTime) -> Option<M> {
    if let Some(msg) = queues.immediate.pop_front() {
        return Some(msg);
    }
    if queues.delayed.peek().is_some_and(|d| d.due <= now) {
        return queues.delayed.pop().map(|d| d.msg);
    }
    None
}
