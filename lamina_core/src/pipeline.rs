// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bounded producer/consumer hand-off between the logic and raster threads.
//!
//! A [`Pipeline`] has `depth` slots. The producer reserves one with
//! [`Pipeline::produce`], which never blocks: when every slot is taken it
//! returns `None`, and that is the backpressure signal. The reservation is a
//! move-only [`ProducerContinuation`] that can be completed with a payload
//! exactly once. The consumer takes ready payloads in completion order with
//! [`Pipeline::consume`] or [`Pipeline::consume_blocking`]; a slot only
//! becomes free again once the consumer callback has returned.
//!
//! Slot lifecycle:
//!
//! ```text
//! Empty ──produce──▶ Reserved ──complete──▶ Ready ──consume──▶ Consuming ──▶ Empty
//!                        │
//!                        └──── continuation dropped ─────────────────────────▶ Empty
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

/// Identifies one successful [`Pipeline::produce`] call.
///
/// Ids increase with every reservation, so the consumer can correlate a
/// payload with the production that made it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProductionId(pub u64);

/// Outcome of a consume call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConsumeResult {
    /// Nothing was ready; the callback was not invoked.
    NoneAvailable,
    /// One payload was consumed and no other is ready.
    Done,
    /// One payload was consumed and at least one more is ready.
    MoreAvailable,
}

#[derive(Debug)]
enum SlotState<T> {
    Empty,
    Reserved,
    Ready(T),
    Consuming,
}

#[derive(Debug)]
struct Slot<T> {
    /// Bumped on every reservation so a stale continuation cannot touch a
    /// reused slot.
    generation: u64,
    production: ProductionId,
    state: SlotState<T>,
}

#[derive(Debug)]
struct Slots<T> {
    slots: Vec<Slot<T>>,
    /// Indices of `Ready` slots in completion order.
    ready: VecDeque<usize>,
    next_production: u64,
    closed: bool,
}

impl<T> Slots<T> {
    fn outstanding(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| !matches!(s.state, SlotState::Empty))
            .count()
    }

    /// Moves the oldest ready payload out, leaving its slot `Consuming`.
    fn take_ready(&mut self) -> Option<(usize, T, ProductionId)> {
        let index = self.ready.pop_front()?;
        let slot = &mut self.slots[index];
        match core::mem::replace(&mut slot.state, SlotState::Consuming) {
            SlotState::Ready(payload) => Some((index, payload, slot.production)),
            other => {
                // The ready queue only ever holds `Ready` slots.
                slot.state = other;
                None
            }
        }
    }
}

/// A fixed-depth frame pipeline.
///
/// Shared between threads as `Arc<Pipeline<T>>`.
#[derive(Debug)]
pub struct Pipeline<T> {
    depth: usize,
    slots: Mutex<Slots<T>>,
    ready_changed: Condvar,
}

impl<T> Pipeline<T> {
    /// Creates a pipeline with `depth` slots.
    ///
    /// # Panics
    ///
    /// Panics if `depth` is zero.
    #[must_use]
    pub fn new(depth: usize) -> Self {
        assert!(depth > 0, "pipeline depth must be at least 1");
        let slots = (0..depth)
            .map(|_| Slot {
                generation: 0,
                production: ProductionId(0),
                state: SlotState::Empty,
            })
            .collect();
        Self {
            depth,
            slots: Mutex::new(Slots {
                slots,
                ready: VecDeque::with_capacity(depth),
                next_production: 1,
                closed: false,
            }),
            ready_changed: Condvar::new(),
        }
    }

    /// Maximum number of reservations in flight.
    #[inline]
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Number of slots that are reserved, ready or being consumed.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.slots.lock().outstanding()
    }

    /// Whether [`close`](Self::close) was called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.slots.lock().closed
    }

    /// Reserves a slot without blocking.
    ///
    /// Returns `None` when all `depth` slots are in use or the pipeline is
    /// closed.
    pub fn produce(self: &Arc<Self>) -> Option<ProducerContinuation<T>> {
        let mut guard = self.slots.lock();
        if guard.closed {
            return None;
        }
        let production = ProductionId(guard.next_production);
        let index = guard
            .slots
            .iter()
            .position(|s| matches!(s.state, SlotState::Empty))?;
        guard.next_production += 1;
        let slot = &mut guard.slots[index];
        slot.generation += 1;
        slot.production = production;
        slot.state = SlotState::Reserved;
        Some(ProducerContinuation {
            pipeline: Arc::clone(self),
            index,
            generation: slot.generation,
            production,
            completed: false,
        })
    }

    /// Hands the oldest ready payload to `f`, without blocking.
    ///
    /// `f` runs without the pipeline lock held; the slot is released when
    /// `f` returns (or unwinds).
    pub fn consume<F>(&self, f: F) -> ConsumeResult
    where
        F: FnOnce(T, ProductionId),
    {
        let taken = self.slots.lock().take_ready();
        match taken {
            Some((index, payload, production)) => self.run_consumer(index, payload, production, f),
            None => ConsumeResult::NoneAvailable,
        }
    }

    /// Like [`consume`](Self::consume), but waits for a payload.
    ///
    /// Returns [`ConsumeResult::NoneAvailable`] if `timeout` elapses, or if
    /// the pipeline is closed while nothing is ready. `None` waits without a
    /// timeout (until a payload arrives or the pipeline closes).
    pub fn consume_blocking<F>(&self, timeout: Option<std::time::Duration>, f: F) -> ConsumeResult
    where
        F: FnOnce(T, ProductionId),
    {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut guard = self.slots.lock();
        while guard.ready.is_empty() && !guard.closed {
            match deadline {
                Some(deadline) => {
                    if self.ready_changed.wait_until(&mut guard, deadline).timed_out() {
                        break;
                    }
                }
                None => self.ready_changed.wait(&mut guard),
            }
        }
        let taken = guard.take_ready();
        drop(guard);
        match taken {
            Some((index, payload, production)) => self.run_consumer(index, payload, production, f),
            None => ConsumeResult::NoneAvailable,
        }
    }

    /// Stops accepting reservations and wakes blocked consumers.
    ///
    /// Outstanding continuations may still complete, and their payloads
    /// can still be consumed.
    pub fn close(&self) {
        self.slots.lock().closed = true;
        self.ready_changed.notify_all();
    }

    fn run_consumer<F>(
        &self,
        index: usize,
        payload: T,
        production: ProductionId,
        f: F,
    ) -> ConsumeResult
    where
        F: FnOnce(T, ProductionId),
    {
        let release = ReleaseOnDrop {
            pipeline: self,
            index,
        };
        f(payload, production);
        drop(release);
        if self.slots.lock().ready.is_empty() {
            ConsumeResult::Done
        } else {
            ConsumeResult::MoreAvailable
        }
    }
}

/// Frees a `Consuming` slot once the consumer callback is finished.
struct ReleaseOnDrop<'a, T> {
    pipeline: &'a Pipeline<T>,
    index: usize,
}

impl<T> Drop for ReleaseOnDrop<'_, T> {
    fn drop(&mut self) {
        let mut guard = self.pipeline.slots.lock();
        guard.slots[self.index].state = SlotState::Empty;
    }
}

/// The right to fill one reserved pipeline slot.
///
/// Dropping a continuation that was never completed releases its slot.
pub struct ProducerContinuation<T> {
    pipeline: Arc<Pipeline<T>>,
    index: usize,
    generation: u64,
    production: ProductionId,
    completed: bool,
}

impl<T> core::fmt::Debug for ProducerContinuation<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProducerContinuation")
            .field("slot", &self.index)
            .field("generation", &self.generation)
            .field("production", &self.production)
            .field("completed", &self.completed)
            .finish()
    }
}

impl<T> ProducerContinuation<T> {
    /// Id of the reservation.
    #[inline]
    #[must_use]
    pub fn production_id(&self) -> ProductionId {
        self.production
    }

    /// Whether [`complete`](Self::complete) already succeeded.
    #[inline]
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.completed
    }

    /// Fills the reserved slot with `payload` and wakes a waiting consumer.
    ///
    /// Returns `false` (dropping `payload`) if this continuation was already
    /// completed; the first payload stays in place.
    pub fn complete(&mut self, payload: T) -> bool {
        if self.completed {
            tracing::debug!(production = self.production.0, "continuation already completed");
            return false;
        }
        let mut guard = self.pipeline.slots.lock();
        let slot = &mut guard.slots[self.index];
        if slot.generation != self.generation || !matches!(slot.state, SlotState::Reserved) {
            return false;
        }
        slot.state = SlotState::Ready(payload);
        guard.ready.push_back(self.index);
        drop(guard);
        self.completed = true;
        self.pipeline.ready_changed.notify_one();
        true
    }
}

impl<T> Drop for ProducerContinuation<T> {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        let mut guard = self.pipeline.slots.lock();
        let slot = &mut guard.slots[self.index];
        if slot.generation == self.generation && matches!(slot.state, SlotState::Reserved) {
            slot.state = SlotState::Empty;
        }
    }
}
