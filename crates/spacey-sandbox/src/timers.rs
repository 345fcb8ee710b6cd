// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Fake timers driven by a logical clock.
//!
//! Mirrors the runtime event loop's timer machinery (min-heap of deadlines,
//! tick and immediate queues) but replaces wall time with a millisecond
//! counter that test code advances explicitly.

use crate::value::Value;
use parking_lot::Mutex;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};

/// Guard against intervals that reschedule forever under `run_all`.
const MAX_TIMER_LOOPS: usize = 100_000;

/// Unique identifier for a fake timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

#[derive(Debug)]
struct FakeTimer {
    id: TimerId,
    deadline: u64,
    callback: Value,
    repeat: Option<u64>,
}

impl PartialEq for FakeTimer {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.id == other.id
    }
}

impl Eq for FakeTimer {}

impl PartialOrd for FakeTimer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FakeTimer {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse ordering for min-heap (earliest deadline first, then
        // scheduling order)
        other
            .deadline
            .cmp(&self.deadline)
            .then_with(|| other.id.0.cmp(&self.id.0))
    }
}

/// Deterministic timer facility for the test environment.
#[derive(Default)]
pub struct FakeTimers {
    next_timer_id: AtomicU64,
    now_ms: AtomicU64,
    faking: AtomicBool,
    timers: Mutex<BinaryHeap<FakeTimer>>,
    cancelled: Mutex<HashSet<TimerId>>,
    ticks: Mutex<VecDeque<Value>>,
    immediates: Mutex<VecDeque<Value>>,
}

impl FakeTimers {
    /// Creates an inactive fake-timer facility at logical time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Switches timer control to the fake clock, discarding prior state.
    pub fn use_fake_timers(&self) {
        self.reset();
        self.faking.store(true, AtomicOrdering::SeqCst);
    }

    /// Returns timer control to the host, discarding fake state.
    pub fn use_real_timers(&self) {
        self.reset();
        self.faking.store(false, AtomicOrdering::SeqCst);
    }

    /// True while the fake clock is in control.
    pub fn is_faking(&self) -> bool {
        self.faking.load(AtomicOrdering::SeqCst)
    }

    /// Current logical time in milliseconds.
    pub fn now(&self) -> u64 {
        self.now_ms.load(AtomicOrdering::SeqCst)
    }

    /// Schedules a one-shot timer.
    pub fn set_timeout(&self, callback: Value, delay_ms: u64) -> TimerId {
        self.schedule(callback, delay_ms, None)
    }

    /// Schedules a repeating timer.
    pub fn set_interval(&self, callback: Value, interval_ms: u64) -> TimerId {
        self.schedule(callback, interval_ms, Some(interval_ms))
    }

    /// Cancels a timer.
    pub fn clear_timer(&self, id: TimerId) {
        self.cancelled.lock().insert(id);
    }

    /// Queues a microtask (process.nextTick analog).
    pub fn enqueue_tick(&self, callback: Value) {
        self.ticks.lock().push_back(callback);
    }

    /// Queues an immediate callback.
    pub fn set_immediate(&self, callback: Value) -> TimerId {
        self.immediates.lock().push_back(callback);
        TimerId(self.next_timer_id.fetch_add(1, AtomicOrdering::SeqCst))
    }

    /// Number of timers waiting on the clock.
    pub fn timer_count(&self) -> usize {
        let cancelled = self.cancelled.lock();
        self.timers
            .lock()
            .iter()
            .filter(|timer| !cancelled.contains(&timer.id))
            .count()
    }

    /// Drains the tick queue.
    pub fn run_all_ticks(&self) {
        self.drain_queue(&self.ticks);
    }

    /// Drains the immediate queue.
    pub fn run_all_immediates(&self) {
        self.drain_queue(&self.immediates);
    }

    /// Runs ticks, immediates, and then every timer until none remain.
    ///
    /// Intervals reschedule themselves, so the loop is capped; hitting the
    /// cap logs an error and stops.
    pub fn run_all(&self) {
        self.run_all_ticks();
        self.run_all_immediates();
        let mut loops = 0;
        while let Some(timer) = self.pop_due(None) {
            loops += 1;
            if loops > MAX_TIMER_LOOPS {
                tracing::error!(
                    "Aborting after running {} timers; an interval may be rescheduling itself indefinitely",
                    MAX_TIMER_LOOPS
                );
                return;
            }
            self.fire(timer);
        }
    }

    /// Runs the timers scheduled before this call, in time order. Timers
    /// scheduled by the callbacks stay on the clock.
    pub fn run_only_pending(&self) {
        let pending: Vec<FakeTimer> = {
            let mut timers = self.timers.lock();
            let mut drained: Vec<FakeTimer> = std::mem::take(&mut *timers).into_vec();
            drained.sort_by(|a, b| a.deadline.cmp(&b.deadline).then(a.id.0.cmp(&b.id.0)));
            drained
        };
        let cancelled: HashSet<TimerId> = self.cancelled.lock().clone();
        for timer in pending {
            if cancelled.contains(&timer.id) {
                continue;
            }
            self.now_ms.store(timer.deadline, AtomicOrdering::SeqCst);
            self.fire(timer);
        }
    }

    /// Advances the clock by `ms`, firing every timer that comes due.
    pub fn advance_by(&self, ms: u64) {
        let target = self.now() + ms;
        while let Some(timer) = self.pop_due(Some(target)) {
            self.now_ms.store(timer.deadline, AtomicOrdering::SeqCst);
            self.fire(timer);
        }
        self.now_ms.store(target, AtomicOrdering::SeqCst);
    }

    /// Advances the clock to the next pending timer, `steps` times.
    pub fn advance_to_next(&self, steps: u64) {
        for _ in 0..steps {
            match self.pop_due(None) {
                Some(timer) => {
                    self.now_ms.store(timer.deadline, AtomicOrdering::SeqCst);
                    self.fire(timer);
                }
                None => return,
            }
        }
    }

    /// Cancels every timer and queued callback.
    pub fn clear_all(&self) {
        self.timers.lock().clear();
        self.cancelled.lock().clear();
        self.ticks.lock().clear();
        self.immediates.lock().clear();
    }

    /// Clears all state and rewinds the clock to zero.
    pub fn reset(&self) {
        self.clear_all();
        self.now_ms.store(0, AtomicOrdering::SeqCst);
    }

    fn schedule(&self, callback: Value, delay_ms: u64, repeat: Option<u64>) -> TimerId {
        let id = TimerId(self.next_timer_id.fetch_add(1, AtomicOrdering::SeqCst));
        self.timers.lock().push(FakeTimer {
            id,
            deadline: self.now() + delay_ms,
            callback,
            repeat,
        });
        id
    }

    /// Pops the earliest live timer, bounded by `limit` when given. The
    /// lock is released before the caller fires the callback.
    fn pop_due(&self, limit: Option<u64>) -> Option<FakeTimer> {
        let mut timers = self.timers.lock();
        let mut cancelled = self.cancelled.lock();
        loop {
            let due = match timers.peek() {
                Some(timer) => limit.map_or(true, |limit| timer.deadline <= limit),
                None => false,
            };
            if !due {
                return None;
            }
            let timer = timers.pop().expect("peeked timer");
            if cancelled.remove(&timer.id) {
                continue;
            }
            return Some(timer);
        }
    }

    fn fire(&self, timer: FakeTimer) {
        if let Some(interval) = timer.repeat {
            self.timers.lock().push(FakeTimer {
                id: timer.id,
                deadline: timer.deadline + interval,
                callback: timer.callback.clone(),
                repeat: Some(interval),
            });
        }
        if let Value::Function(callback) = &timer.callback {
            callback.call(&[]);
        }
    }

    fn drain_queue(&self, queue: &Mutex<VecDeque<Value>>) {
        loop {
            let callback = queue.lock().pop_front();
            match callback {
                Some(Value::Function(function)) => {
                    function.call(&[]);
                }
                Some(_) => {}
                None => return,
            }
        }
    }
}
