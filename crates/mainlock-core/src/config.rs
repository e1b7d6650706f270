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

//! Tunables for a [`Mainlock`](crate::Mainlock).

use crate::error::MainlockError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a Mainlock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MainlockConfig {
    /// How long the worker sleeps after releasing the lock in a contended
    /// yield.
    ///
    /// Liveness only needs this to be nonzero. A bare unlock/relock on the
    /// same thread can re-win the lock before a queued controller runs; the
    /// sleep hands the CPU over. The exact magnitude is scheduler-dependent.
    pub yield_sleep: Duration,
    /// Name given to worker threads started with
    /// [`spawn_worker`](crate::spawn_worker).
    pub worker_thread_name: String,
    /// Log a warning when the worker thread calls
    /// [`acquire`](crate::Mainlock::acquire) on itself.
    pub warn_on_worker_acquire: bool,
}

impl MainlockConfig {
    /// Checks the configuration for values the protocol cannot work with.
    pub fn validate(&self) -> Result<(), MainlockError> {
        if self.yield_sleep.is_zero() {
            return Err(MainlockError::ZeroYieldSleep);
        }
        Ok(())
    }
}

impl Default for MainlockConfig {
    fn default() -> Self {
        Self {
            yield_sleep: Duration::from_micros(100),
            worker_thread_name: "mainlock-worker".to_string(),
            warn_on_worker_acquire: cfg!(debug_assertions),
        }
    }
}
