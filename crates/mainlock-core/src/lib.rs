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

//! # Mainlock Core
//!
//! A cooperative mutual-exclusion protocol between one long-running **worker**
//! thread (a simulation loop) and a **controller** thread (UI events).
//!
//! The worker holds the lock by default and offers it at safe points with
//! [`WorkerSession::yield_now`]. The controller takes it with
//! [`Mainlock::acquire`], which raises a flag the worker checks at its next
//! yield point. Shutdown is cooperative: [`Mainlock::request_shutdown`] clears
//! the keep-alive flag and the worker observes it as [`WorkerFlow::Exit`].
//!
//! ```rust,no_run
//! use mainlock_core::{spawn_worker, Mainlock, WorkerFlow};
//! use std::cell::Cell;
//! use std::sync::Arc;
//!
//! let lock = Arc::new(Mainlock::new(Cell::new(0u64)));
//!
//! let worker = spawn_worker(Arc::clone(&lock), |session| loop {
//!     session.shared().set(session.shared().get() + 1);
//!     if session.yield_now() == WorkerFlow::Exit {
//!         break;
//!     }
//! })
//! .unwrap();
//!
//! {
//!     let state = lock.acquire();
//!     println!("frame {}", state.get());
//! }
//!
//! lock.request_shutdown();
//! worker.join().unwrap();
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod flag;
pub mod lock;
pub mod session;
pub mod sleeper;
pub mod stats;
pub mod worker;

pub use config::MainlockConfig;
pub use error::MainlockError;
pub use lock::{ControllerGuard, Mainlock, ShutdownRequest};
pub use session::{WorkerFlow, WorkerSession};
pub use sleeper::{Sleeper, ThreadSleeper};
pub use stats::{StatsSnapshot, Stopwatch};
pub use worker::{spawn_worker, WorkerHandle};
