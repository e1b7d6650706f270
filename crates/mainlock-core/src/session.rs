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

//! The worker side of the protocol.
//!
//! A [`WorkerSession`] is what [`Mainlock::adopt_as_worker`] hands back. It
//! owns the worker's hold on the lock and moves through three phases:
//!
//! - **Running**: the lock is held and shared state is reachable through
//!   [`WorkerSession::shared`].
//! - **Yielding**: between `yield_begin` and `yield_end` the lock is released
//!   and shared state is off limits.
//! - **Terminated**: shutdown was observed, the lock was released for good and
//!   the teardown ran. Every further call reports [`WorkerFlow::Exit`].
//!
//! Instead of a call that never returns, termination is reported as
//! [`WorkerFlow::Exit`] and the worker loop is expected to break.

use crate::lock::Mainlock;
use parking_lot::ReentrantMutexGuard;
use std::fmt;
use std::thread;

/// What the worker loop should do after a check point.
#[must_use = "the worker loop must stop when this is `Exit`"]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerFlow {
    /// Keep running; the lock is held again.
    Continue,
    /// Shutdown was observed. The lock has been released, the teardown has
    /// run, and the loop must not touch shared state again.
    Exit,
}

impl WorkerFlow {
    /// Returns `true` for [`WorkerFlow::Exit`].
    pub fn is_exit(self) -> bool {
        self == WorkerFlow::Exit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Running,
    Yielding,
    Terminated,
}

/// The worker thread's hold on a [`Mainlock`].
///
/// Not `Send`: the session stays on the thread that adopted the lock.
pub struct WorkerSession<'a, T> {
    lock: &'a Mainlock<T>,
    guard: Option<ReentrantMutexGuard<'a, T>>,
    phase: Phase,
}

impl<'a, T> WorkerSession<'a, T> {
    pub(crate) fn new(lock: &'a Mainlock<T>, guard: ReentrantMutexGuard<'a, T>) -> Self {
        Self {
            lock,
            guard: Some(guard),
            phase: Phase::Running,
        }
    }

    /// Returns the lock this session belongs to.
    pub fn lock(&self) -> &'a Mainlock<T> {
        self.lock
    }

    /// Returns the shared state.
    ///
    /// # Panics
    ///
    /// Panics between [`yield_begin`](Self::yield_begin) and
    /// [`yield_end`](Self::yield_end), and after the session terminated: the
    /// worker does not hold the lock at those times.
    pub fn shared(&self) -> &T {
        match &self.guard {
            Some(guard) => &**guard,
            None => panic!(
                "Mainlock: worker touched shared state while not holding the lock ({:?})",
                self.phase
            ),
        }
    }

    /// Returns `true` until the session has terminated.
    pub fn is_running(&self) -> bool {
        self.phase != Phase::Terminated
    }

    /// Offers the lock to a waiting controller.
    ///
    /// Call this at points where shared state is consistent. With nobody
    /// waiting it is a single atomic load and returns immediately. When a
    /// controller is waiting, the lock is released, the worker sleeps for
    /// [`yield_sleep`](crate::MainlockConfig::yield_sleep) so the waiter can
    /// be scheduled, and the lock is taken back.
    ///
    /// ## Returns
    /// * [`WorkerFlow::Continue`] with the lock held again.
    /// * [`WorkerFlow::Exit`] once shutdown has been requested. The lock has
    ///   been released and the teardown has run.
    pub fn yield_now(&mut self) -> WorkerFlow {
        match self.phase {
            Phase::Terminated => return self.continued_after_exit(),
            Phase::Yielding => {
                debug_assert!(false, "Mainlock: yield_now called inside a yield window");
                return WorkerFlow::Continue;
            }
            Phase::Running => {}
        }
        self.lock.stats.record_yield_call();

        if self.lock.should_exit() {
            return self.terminate();
        }

        if self.lock.waiters.is_set() {
            let lock = self.lock;
            // Counted while still locked so the controller that gets in next sees it.
            lock.stats.record_handoff();
            if let Some(guard) = self.guard.as_mut() {
                ReentrantMutexGuard::unlocked(guard, || {
                    debug_assert!(
                        !lock.state.is_owned_by_current_thread(),
                        "Mainlock: worker yielded while holding nested acquisitions"
                    );
                    lock.sleeper.sleep(lock.config.yield_sleep);
                });
            }
            log::trace!("Mainlock: worker handed the lock to a waiting controller");

            // The controller may have requested shutdown while it held the lock.
            if lock.should_exit() {
                return self.terminate();
            }
        }

        WorkerFlow::Continue
    }

    /// Releases the lock unconditionally for a longer stretch, such as a
    /// blocking host call.
    ///
    /// Anyone may take the lock until [`yield_end`](Self::yield_end). Shared
    /// state must not be touched in between.
    pub fn yield_begin(&mut self) {
        match self.phase {
            Phase::Running => {
                self.guard = None;
                debug_assert!(
                    !self.lock.state.is_owned_by_current_thread(),
                    "Mainlock: worker opened a yield window while holding nested acquisitions"
                );
                self.phase = Phase::Yielding;
            }
            Phase::Yielding => {
                debug_assert!(false, "Mainlock: yield_begin called twice");
            }
            Phase::Terminated => {
                log::error!("Mainlock: yield_begin called after the worker terminated");
            }
        }
    }

    /// Takes the lock back after [`yield_begin`](Self::yield_begin), then
    /// checks for shutdown.
    ///
    /// Blocks like [`Mainlock::acquire`].
    pub fn yield_end(&mut self) -> WorkerFlow {
        match self.phase {
            Phase::Yielding => {
                self.guard = Some(self.lock.state.lock());
                self.phase = Phase::Running;
                self.lock.stats.record_window();
            }
            Phase::Running => {
                debug_assert!(false, "Mainlock: yield_end called without yield_begin");
            }
            Phase::Terminated => return self.continued_after_exit(),
        }

        if self.lock.should_exit() {
            return self.terminate();
        }
        WorkerFlow::Continue
    }

    /// Runs `f` with the lock released, bracketed by
    /// [`yield_begin`](Self::yield_begin) and [`yield_end`](Self::yield_end).
    pub fn run_unlocked<R>(&mut self, f: impl FnOnce() -> R) -> (R, WorkerFlow) {
        self.yield_begin();
        let result = f();
        (result, self.yield_end())
    }

    /// Requests shutdown from the worker and terminates immediately.
    ///
    /// The lock is released, the teardown runs, and [`WorkerFlow::Exit`] is
    /// returned. Calling it again is a no-op.
    pub fn request_shutdown(&mut self) -> WorkerFlow {
        if self.phase == Phase::Terminated {
            return WorkerFlow::Exit;
        }
        if self.lock.keep_alive.take() {
            log::info!("Mainlock: worker thread initiating shutdown");
        }
        self.terminate()
    }

    /// Releases the lock for good and runs the teardown.
    fn terminate(&mut self) -> WorkerFlow {
        if self.phase == Phase::Terminated {
            return WorkerFlow::Exit;
        }

        self.lock.keep_alive.clear();
        self.guard = None;
        if !thread::panicking() {
            debug_assert!(
                !self.lock.state.is_owned_by_current_thread(),
                "Mainlock: worker exiting while holding nested acquisitions"
            );
        }
        self.phase = Phase::Terminated;

        log::info!("Mainlock: worker thread is exiting");
        self.lock.finish_worker();
        WorkerFlow::Exit
    }

    fn continued_after_exit(&self) -> WorkerFlow {
        log::error!("Mainlock: worker thread kept running after it was told to exit");
        WorkerFlow::Exit
    }
}

impl<T> Drop for WorkerSession<'_, T> {
    fn drop(&mut self) {
        let _ = self.terminate();
    }
}

impl<T> fmt::Debug for WorkerSession<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerSession")
            .field("phase", &self.phase)
            .field("holds_lock", &self.guard.is_some())
            .finish()
    }
}
