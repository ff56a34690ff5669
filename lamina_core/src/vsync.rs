// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Vsync sources.
//!
//! A [`VsyncWaiter`] delivers the display's refresh signal. The animator
//! registers a one-shot primary callback per frame request; other parties
//! may add secondary callbacks keyed by id, which fire on the next vsync
//! whether or not a frame is produced.
//!
//! Callbacks run on whatever thread the source fires on. The animator's
//! callbacks only post a message back to the logic thread.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use crate::error::{LaminaError, LaminaResult};
use crate::time::{Clock, Duration, HostTime};
use crate::timing::FrameTimingsRecorder;

/// Primary vsync callback; receives timings with the vsync recorded.
pub type VsyncCallback = Box<dyn FnOnce(FrameTimingsRecorder) + Send>;

/// Secondary vsync callback.
pub type SecondaryCallback = Box<dyn FnOnce() + Send>;

/// A source of vsync signals.
pub trait VsyncWaiter: Send {
    /// Calls `callback` once, on the next vsync.
    ///
    /// If a primary callback is already pending the new one is dropped: a
    /// frame request is already outstanding.
    fn async_wait_for_vsync(&mut self, callback: VsyncCallback);

    /// Calls `callback` once, on the next vsync. A callback registered
    /// earlier under the same `id` is replaced.
    fn schedule_secondary_callback(&mut self, id: u64, callback: SecondaryCallback);
}

/// Callback bookkeeping shared by vsync sources.
#[derive(Default)]
pub struct VsyncCallbacks {
    primary: Option<VsyncCallback>,
    secondary: BTreeMap<u64, SecondaryCallback>,
}

impl fmt::Debug for VsyncCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VsyncCallbacks")
            .field("primary", &self.primary.is_some())
            .field("secondary", &self.secondary.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl VsyncCallbacks {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the primary callback. Returns `false` (dropping `callback`)
    /// when one is already pending.
    pub fn set_primary(&mut self, callback: VsyncCallback) -> bool {
        if self.primary.is_some() {
            tracing::debug!("vsync already requested; dropping duplicate callback");
            return false;
        }
        self.primary = Some(callback);
        true
    }

    /// Stores a secondary callback, replacing any with the same id.
    pub fn add_secondary(&mut self, id: u64, callback: SecondaryCallback) {
        self.secondary.insert(id, callback);
    }

    /// Whether anything is waiting for the next vsync.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.primary.is_some() || !self.secondary.is_empty()
    }

    /// Whether a primary callback is pending.
    #[must_use]
    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    /// Takes everything registered so far, leaving the set empty.
    #[must_use]
    pub fn take(&mut self) -> FiredCallbacks {
        FiredCallbacks {
            primary: self.primary.take(),
            secondary: core::mem::take(&mut self.secondary),
        }
    }

    /// Runs every pending callback for a vsync interval starting at `start`
    /// and targeting `target`. Returns how many callbacks ran.
    pub fn fire(&mut self, start: HostTime, target: HostTime) -> usize {
        self.take().run(start, target)
    }
}

/// Callbacks taken out of a [`VsyncCallbacks`] so they can run without the
/// owner's lock held.
#[must_use = "taken callbacks do nothing until run"]
pub struct FiredCallbacks {
    primary: Option<VsyncCallback>,
    secondary: BTreeMap<u64, SecondaryCallback>,
}

impl fmt::Debug for FiredCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FiredCallbacks")
            .field("primary", &self.primary.is_some())
            .field("secondary", &self.secondary.len())
            .finish()
    }
}

impl FiredCallbacks {
    /// Runs the primary callback with fresh timings, then the secondary
    /// callbacks in id order. Returns how many callbacks ran.
    pub fn run(self, start: HostTime, target: HostTime) -> usize {
        let mut count = 0;
        if let Some(primary) = self.primary {
            let mut timings = FrameTimingsRecorder::new();
            timings.record_vsync(start, target);
            primary(timings);
            count += 1;
        }
        for (_, callback) in self.secondary {
            callback();
            count += 1;
        }
        count
    }
}

// ---------------------------------------------------------------------------
// TimerVsyncWaiter
// ---------------------------------------------------------------------------

/// A vsync source ticking at a fixed interval on its own thread.
///
/// Used where there is no display, e.g. headless runs and demos.
#[derive(Debug)]
pub struct TimerVsyncWaiter {
    callbacks: Arc<Mutex<VsyncCallbacks>>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl TimerVsyncWaiter {
    /// Starts a ticking thread with the given refresh `interval`.
    pub fn new(clock: Arc<dyn Clock>, interval: Duration) -> LaminaResult<Self> {
        let callbacks = Arc::new(Mutex::new(VsyncCallbacks::new()));
        let stop = Arc::new(AtomicBool::new(false));
        let thread = {
            let callbacks = Arc::clone(&callbacks);
            let stop = Arc::clone(&stop);
            thread::Builder::new()
                .name("lamina-vsync".into())
                .spawn(move || tick_loop(&*clock, interval, &callbacks, &stop))
                .map_err(|source| LaminaError::spawn("lamina-vsync", source))?
        };
        Ok(Self {
            callbacks,
            stop,
            thread: Some(thread),
        })
    }
}

fn tick_loop(
    clock: &dyn Clock,
    interval: Duration,
    callbacks: &Mutex<VsyncCallbacks>,
    stop: &AtomicBool,
) {
    let step = interval.nanos().max(1);
    let origin = clock.now();
    let mut tick: u64 = 1;
    while !stop.load(Ordering::Acquire) {
        let target = HostTime(origin.nanos() + tick * step);
        let now = clock.now();
        if now < target {
            thread::sleep((target - now).into());
        }
        let start = clock.now();
        // Run outside the lock so callbacks can re-register.
        let fired = callbacks.lock().take();
        fired.run(start, start.saturating_add(interval));
        tick += 1;
    }
}

impl VsyncWaiter for TimerVsyncWaiter {
    fn async_wait_for_vsync(&mut self, callback: VsyncCallback) {
        self.callbacks.lock().set_primary(callback);
    }

    fn schedule_secondary_callback(&mut self, id: u64, callback: SecondaryCallback) {
        self.callbacks.lock().add_secondary(id, callback);
    }
}

impl Drop for TimerVsyncWaiter {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::warn!("vsync thread panicked");
        }
    }
}

// ---------------------------------------------------------------------------
// ManualVsyncWaiter
// ---------------------------------------------------------------------------

/// A vsync source that fires only when told to.
///
/// Clones share their callbacks: hand one clone to the animator and keep
/// another to fire vsyncs from a test or a host event loop.
#[derive(Clone, Debug, Default)]
pub struct ManualVsyncWaiter {
    callbacks: Arc<Mutex<VsyncCallbacks>>,
    registrations: Arc<Mutex<u64>>,
}

impl ManualVsyncWaiter {
    /// Creates a waiter with nothing pending.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of primary callbacks accepted so far.
    #[must_use]
    pub fn registrations(&self) -> u64 {
        *self.registrations.lock()
    }

    /// Whether a primary callback is pending.
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.callbacks.lock().has_primary()
    }

    /// Fires one vsync. Returns how many callbacks ran.
    pub fn fire(&self, start: HostTime, target: HostTime) -> usize {
        let fired = self.callbacks.lock().take();
        fired.run(start, target)
    }
}

impl VsyncWaiter for ManualVsyncWaiter {
    fn async_wait_for_vsync(&mut self, callback: VsyncCallback) {
        if self.callbacks.lock().set_primary(callback) {
            *self.registrations.lock() += 1;
        }
    }

    fn schedule_secondary_callback(&mut self, id: u64, callback: SecondaryCallback) {
        self.callbacks.lock().add_secondary(id, callback);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::mpsc;

    use super::*;
    use crate::time::MonotonicClock;
    use crate::timing::RecorderState;

    #[test]
    fn fire_runs_primary_then_secondaries() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut callbacks = VsyncCallbacks::new();
        {
            let order = Arc::clone(&order);
            assert!(callbacks.set_primary(Box::new(move |timings: FrameTimingsRecorder| {
                assert_eq!(timings.state(), RecorderState::Vsync);
                assert_eq!(timings.vsync_target_time(), HostTime(20));
                order.lock().push("primary");
            })));
        }
        for (id, name) in [(2, "two"), (1, "one")] {
            let order = Arc::clone(&order);
            callbacks.add_secondary(id, Box::new(move || order.lock().push(name)));
        }
        assert!(callbacks.has_pending());
        assert_eq!(callbacks.fire(HostTime(4), HostTime(20)), 3);
        assert_eq!(*order.lock(), ["primary", "one", "two"]);
        assert!(!callbacks.has_pending());
    }

    #[test]
    fn duplicate_primary_is_dropped() {
        let hits = Arc::new(AtomicUsize::new(0));
        let mut callbacks = VsyncCallbacks::new();
        for _ in 0..2 {
            let hits = Arc::clone(&hits);
            callbacks.set_primary(Box::new(move |_| {
                hits.fetch_add(1, Ordering::SeqCst);
            }));
        }
        callbacks.fire(HostTime(0), HostTime(1));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn secondary_with_same_id_is_replaced() {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let mut callbacks = VsyncCallbacks::new();
        for value in [1, 2] {
            let hits = Arc::clone(&hits);
            callbacks.add_secondary(7, Box::new(move || hits.lock().push(value)));
        }
        assert_eq!(callbacks.fire(HostTime(0), HostTime(1)), 1);
        assert_eq!(*hits.lock(), [2]);
    }

    #[test]
    fn manual_waiter_counts_registrations() {
        let waiter = ManualVsyncWaiter::new();
        let mut handle = waiter.clone();
        handle.async_wait_for_vsync(Box::new(|_| {}));
        handle.async_wait_for_vsync(Box::new(|_| {}));
        assert_eq!(waiter.registrations(), 1);
        assert!(waiter.is_waiting());
        assert_eq!(waiter.fire(HostTime(0), HostTime(16)), 1);
        assert!(!waiter.is_waiting());
        assert_eq!(waiter.fire(HostTime(16), HostTime(32)), 0);
    }

    #[test]
    fn timer_waiter_delivers_vsync() {
        let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
        let mut waiter = TimerVsyncWaiter::new(clock, Duration::from_millis(2)).unwrap();
        let (tx, rx) = mpsc::channel();
        waiter.async_wait_for_vsync(Box::new(move |timings: FrameTimingsRecorder| {
            tx.send(timings.frame_number()).unwrap();
        }));
        let frame = rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap();
        assert!(frame >= 1);
        drop(waiter);
    }
}
