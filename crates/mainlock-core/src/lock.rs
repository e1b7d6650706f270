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

//! The shared lock context: reentrant lock, signal flags and worker identity.
//!
//! A [`Mainlock`] is constructed explicitly and shared by reference (usually
//! through an `Arc`) with both the worker and the controller. Nothing here is
//! process-global, so independent instances can coexist.

use crate::config::MainlockConfig;
use crate::error::MainlockError;
use crate::flag::{SignalFlag, WaiterCount};
use crate::session::WorkerSession;
use crate::sleeper::{Sleeper, ThreadSleeper};
use crate::stats::{MainlockStats, StatsSnapshot, Stopwatch};
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use std::fmt;
use std::ops::Deref;
use std::sync::OnceLock;
use std::thread::{self, ThreadId};

type Teardown = Box<dyn FnOnce() + Send>;

/// Outcome of [`Mainlock::request_shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownRequest {
    /// Shutdown was initiated from a non-worker thread. The worker exits at
    /// its next yield point.
    Signalled,
    /// Shutdown was initiated from the worker thread itself. Its next call to
    /// [`WorkerSession::yield_now`] or [`WorkerSession::yield_end`] returns
    /// [`WorkerFlow::Exit`](crate::WorkerFlow::Exit); the caller should break
    /// out of its loop.
    WorkerMustExit,
    /// Shutdown had already been requested; nothing changed.
    AlreadyRequested,
}

/// A reentrant lock shared between one worker thread and any number of
/// controller threads, guarding a value of type `T`.
///
/// Because the lock is reentrant, access is handed out as `&T`; use interior
/// mutability (`Cell`, `RefCell`) for state that changes.
pub struct Mainlock<T> {
    pub(crate) state: ReentrantMutex<T>,
    pub(crate) waiters: WaiterCount,
    pub(crate) keep_alive: SignalFlag,
    pub(crate) terminated: SignalFlag,
    pub(crate) worker: OnceLock<ThreadId>,
    pub(crate) sleeper: Box<dyn Sleeper>,
    pub(crate) config: MainlockConfig,
    pub(crate) stats: MainlockStats,
    teardown: Mutex<Option<Teardown>>,
}

impl<T> Mainlock<T> {
    /// Creates a lock around `state` with the default configuration.
    pub fn new(state: T) -> Self {
        Self::build(state, MainlockConfig::default())
    }

    /// Creates a lock around `state` with a validated configuration.
    pub fn with_config(state: T, config: MainlockConfig) -> Result<Self, MainlockError> {
        config.validate()?;
        Ok(Self::build(state, config))
    }

    fn build(state: T, config: MainlockConfig) -> Self {
        Self {
            state: ReentrantMutex::new(state),
            waiters: WaiterCount::new(),
            keep_alive: SignalFlag::new(true),
            terminated: SignalFlag::new(false),
            worker: OnceLock::new(),
            sleeper: Box::new(ThreadSleeper),
            config,
            stats: MainlockStats::default(),
            teardown: Mutex::new(None),
        }
    }

    /// Replaces the sleep used by contended yields.
    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    /// Installs the platform teardown run once on the worker thread when it
    /// terminates, after the lock has been released.
    pub fn with_teardown(self, teardown: impl FnOnce() + Send + 'static) -> Self {
        *self.teardown.lock() = Some(Box::new(teardown));
        self
    }

    /// Returns the configuration this lock was built with.
    pub fn config(&self) -> &MainlockConfig {
        &self.config
    }

    /// Makes the calling thread the worker.
    ///
    /// Blocks until the lock is free, then records the caller's identity. The
    /// returned session holds the lock until it yields or terminates.
    ///
    /// ## Returns
    /// * The worker's session, holding the lock.
    ///
    /// # Panics
    ///
    /// Panics if a worker has already been adopted on this lock.
    pub fn adopt_as_worker(&self) -> WorkerSession<'_, T> {
        // Checked before locking too: the existing worker may hold the lock for good.
        assert!(
            self.worker.get().is_none(),
            "Mainlock: a worker thread has already been adopted"
        );
        let guard = self.state.lock();
        let current = thread::current();
        if self.worker.set(current.id()).is_err() {
            drop(guard);
            panic!("Mainlock: a worker thread has already been adopted");
        }

        log::info!(
            "Mainlock: adopted worker thread '{}'",
            current.name().unwrap_or("<unnamed>")
        );
        WorkerSession::new(self, guard)
    }

    /// Blocks until the calling thread holds the lock.
    ///
    /// While waiting, the caller is counted as a waiter so the worker releases
    /// the lock at its next yield point. Release by dropping the returned
    /// guard.
    ///
    /// Calling this from the worker thread re-enters the lock it already
    /// holds. That works, but means worker code is running controller code
    /// synchronously; it is logged as a warning when
    /// [`MainlockConfig::warn_on_worker_acquire`] is set.
    ///
    /// ## Returns
    /// * A guard giving shared access to the state until it is dropped.
    pub fn acquire(&self) -> ControllerGuard<'_, T> {
        if self.is_worker_thread() {
            if self.config.warn_on_worker_acquire {
                log::warn!("Mainlock: worker thread is acquiring the lock it already owns");
            }
            return ControllerGuard {
                guard: self.state.lock(),
            };
        }

        let waited = Stopwatch::new();
        self.waiters.enter();
        let guard = self.state.lock();
        self.waiters.leave();
        self.stats.record_acquisition(&waited);

        ControllerGuard { guard }
    }

    /// Takes the lock only if it is free or already held by the caller.
    ///
    /// Does not register the caller as a waiter, so the worker is not asked
    /// to yield.
    pub fn try_acquire(&self) -> Option<ControllerGuard<'_, T>> {
        self.state
            .try_lock()
            .map(|guard| ControllerGuard { guard })
    }

    /// Returns `true` if the calling thread is the adopted worker.
    pub fn is_worker_thread(&self) -> bool {
        self.worker.get() == Some(&thread::current().id())
    }

    /// Returns the adopted worker's thread id, if any.
    pub fn worker_thread_id(&self) -> Option<ThreadId> {
        self.worker.get().copied()
    }

    /// Asks the worker loop to stop.
    ///
    /// Idempotent: only the first call has any effect. From a non-worker
    /// thread this returns immediately and the worker terminates at its next
    /// check point. From the worker thread itself, prefer
    /// [`WorkerSession::request_shutdown`], which terminates on the spot.
    pub fn request_shutdown(&self) -> ShutdownRequest {
        if !self.keep_alive.take() {
            return ShutdownRequest::AlreadyRequested;
        }

        if self.is_worker_thread() {
            log::info!("Mainlock: worker thread initiating shutdown");
            ShutdownRequest::WorkerMustExit
        } else {
            log::info!("Mainlock: shutdown requested, waiting for worker to yield");
            ShutdownRequest::Signalled
        }
    }

    /// Returns `false` once shutdown has been requested.
    pub fn keep_alive(&self) -> bool {
        self.keep_alive.is_set()
    }

    /// Returns `true` if the worker should release the lock at its next
    /// yield point: a controller is waiting or shutdown was requested.
    pub fn controller_waiting(&self) -> bool {
        self.waiters.is_set() || !self.keep_alive.is_set()
    }

    /// Returns the number of threads currently blocked in [`acquire`](Self::acquire).
    pub fn waiting_controllers(&self) -> usize {
        self.waiters.count()
    }

    /// Returns `true` once the worker has released the lock for good and
    /// run the teardown.
    pub fn is_terminated(&self) -> bool {
        self.terminated.is_set()
    }

    /// Returns `true` if any thread holds the lock.
    pub fn is_locked(&self) -> bool {
        self.state.is_locked()
    }

    /// Returns `true` if the calling thread holds the lock.
    pub fn is_held_by_current_thread(&self) -> bool {
        self.state.is_owned_by_current_thread()
    }

    /// Returns a copy of the contention counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Consumes the lock and returns the guarded state.
    pub fn into_inner(self) -> T {
        self.state.into_inner()
    }

    /// Worker-side shutdown check: keep-alive cleared and the caller is the worker.
    pub(crate) fn should_exit(&self) -> bool {
        !self.keep_alive.is_set() && self.is_worker_thread()
    }

    /// Runs the teardown at most once and marks the lock terminated.
    pub(crate) fn finish_worker(&self) {
        let teardown = self.teardown.lock().take();
        if let Some(teardown) = teardown {
            teardown();
        }
        self.terminated.set();
    }
}

impl<T> fmt::Debug for Mainlock<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mainlock")
            .field("worker", &self.worker.get())
            .field("waiting_controllers", &self.waiters.count())
            .field("keep_alive", &self.keep_alive.is_set())
            .field("terminated", &self.terminated.is_set())
            .field("locked", &self.state.is_locked())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Exclusive access held by a controller. Dropping it releases one level of
/// the lock.
///
/// The guard cannot be sent to another thread, so it is always released on
/// the thread that acquired it.
#[must_use = "dropping the guard releases the lock immediately"]
pub struct ControllerGuard<'a, T> {
    guard: ReentrantMutexGuard<'a, T>,
}

impl<T> ControllerGuard<'_, T> {
    /// Releases this level of the lock. Same as dropping the guard.
    pub fn release(self) {
        drop(self);
    }
}

impl<T> Deref for ControllerGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &*self.guard
    }
}

impl<T: fmt::Debug> fmt::Debug for ControllerGuard<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ControllerGuard").field(&*self.guard).finish()
    }
}
