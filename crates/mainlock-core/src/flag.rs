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

//! Atomic signal flags shared between the worker and controller threads.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A boolean signal with release stores and acquire loads.
///
/// A `set`/`clear` on one thread is visible to a later `is_set` on another
/// thread without taking the main lock.
#[derive(Debug)]
pub struct SignalFlag(AtomicBool);

impl SignalFlag {
    /// Creates a flag with the given initial value.
    pub const fn new(initial: bool) -> Self {
        Self(AtomicBool::new(initial))
    }

    /// Raises the flag.
    #[inline]
    pub fn set(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Lowers the flag.
    #[inline]
    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }

    /// Returns the current value.
    #[inline]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Lowers the flag and returns `true` if this call is the one that
    /// lowered it.
    ///
    /// Used for one-way transitions where exactly one caller must observe
    /// the change.
    #[inline]
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }
}

impl Default for SignalFlag {
    fn default() -> Self {
        Self::new(false)
    }
}

/// Counts threads blocked on the main lock.
///
/// Reads as "set" while at least one waiter is registered, so a helper thread
/// finishing its own acquisition does not hide a controller that is still
/// waiting.
#[derive(Debug, Default)]
pub struct WaiterCount(AtomicUsize);

impl WaiterCount {
    /// Creates a counter with no waiters.
    pub const fn new() -> Self {
        Self(AtomicUsize::new(0))
    }

    /// Registers the calling thread as waiting.
    #[inline]
    pub fn enter(&self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }

    /// Unregisters a waiter previously added with [`enter`](Self::enter).
    #[inline]
    pub fn leave(&self) {
        let previous = self.0.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "WaiterCount::leave without matching enter");
    }

    /// Returns `true` while any waiter is registered.
    #[inline]
    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire) > 0
    }

    /// Returns the number of registered waiters.
    #[inline]
    pub fn count(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }
}
