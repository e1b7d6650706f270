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

//! Error types for setting up and tearing down a Mainlock.
//!
//! The lock protocol itself has no recoverable failures. These errors only
//! cover configuration and the worker thread's lifecycle around it.

use thiserror::Error;

/// Errors surfaced while configuring a lock or managing its worker thread.
#[derive(Debug, Error)]
pub enum MainlockError {
    /// The yield sleep was configured as zero, which lets the worker win
    /// back the lock before a waiting controller is scheduled.
    #[error("yield sleep must be nonzero")]
    ZeroYieldSleep,

    /// The operating system refused to create the worker thread.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] std::io::Error),

    /// The worker thread unwound instead of returning.
    #[error("worker thread panicked: {0}")]
    WorkerPanicked(String),
}

impl MainlockError {
    /// Builds a [`MainlockError::WorkerPanicked`] from a thread's panic payload.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        MainlockError::WorkerPanicked(message)
    }
}
