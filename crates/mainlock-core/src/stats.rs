// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Lock-free contention counters for a Mainlock.
//!
//! Every counter is updated with relaxed atomics: they are diagnostics and
//! never take part in the locking protocol itself.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Measures the time elapsed since it was started.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    start_time: Instant,
}

impl Stopwatch {
    /// Creates a stopwatch and starts it immediately.
    #[inline]
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }

    /// Returns the elapsed time since the stopwatch was started.
    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns the elapsed time in whole microseconds, saturating at `u64::MAX`.
    #[inline]
    pub fn elapsed_us(&self) -> u64 {
        u64::try_from(self.elapsed().as_micros()).unwrap_or(u64::MAX)
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}

/// Running counters owned by a Mainlock.
#[derive(Debug, Default)]
pub(crate) struct MainlockStats {
    controller_acquisitions: AtomicU64,
    yield_calls: AtomicU64,
    yield_handoffs: AtomicU64,
    yield_windows: AtomicU64,
    longest_controller_wait_us: AtomicU64,
}

impl MainlockStats {
    pub(crate) fn record_acquisition(&self, waited: &Stopwatch) {
        self.controller_acquisitions.fetch_add(1, Ordering::Relaxed);
        self.longest_controller_wait_us
            .fetch_max(waited.elapsed_us(), Ordering::Relaxed);
    }

    pub(crate) fn record_yield_call(&self) {
        self.yield_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_handoff(&self) {
        self.yield_handoffs.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_window(&self) {
        self.yield_windows.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            controller_acquisitions: self.controller_acquisitions.load(Ordering::Relaxed),
            yield_calls: self.yield_calls.load(Ordering::Relaxed),
            yield_handoffs: self.yield_handoffs.load(Ordering::Relaxed),
            yield_windows: self.yield_windows.load(Ordering::Relaxed),
            longest_controller_wait_us: self.longest_controller_wait_us.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of a Mainlock's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    /// Blocking acquisitions made through [`Mainlock::acquire`](crate::Mainlock::acquire)
    /// by threads other than the worker.
    pub controller_acquisitions: u64,
    /// Calls to [`WorkerSession::yield_now`](crate::WorkerSession::yield_now).
    pub yield_calls: u64,
    /// Yields that released the lock and slept because a controller was waiting.
    pub yield_handoffs: u64,
    /// Completed `yield_begin`/`yield_end` windows.
    pub yield_windows: u64,
    /// Longest time a controller spent blocked in `acquire`, in microseconds.
    pub longest_controller_wait_us: u64,
}
