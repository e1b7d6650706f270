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

//! Starting the worker thread.

use crate::error::MainlockError;
use crate::lock::Mainlock;
use crate::session::WorkerSession;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};

/// Handle to a worker thread started with [`spawn_worker`].
#[derive(Debug)]
pub struct WorkerHandle {
    handle: JoinHandle<()>,
}

impl WorkerHandle {
    /// Returns the worker thread's id.
    pub fn thread_id(&self) -> ThreadId {
        self.handle.thread().id()
    }

    /// Returns `true` once the worker thread has finished.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Waits for the worker thread to finish.
    pub fn join(self) -> Result<(), MainlockError> {
        self.handle.join().map_err(MainlockError::from_panic)
    }
}

/// Spawns the worker thread.
///
/// The new thread, named after
/// [`worker_thread_name`](crate::MainlockConfig::worker_thread_name), adopts
/// `lock` and runs `body` with the session. When `body` returns, the session
/// terminates: the lock is released and the teardown runs, whether or not
/// shutdown was requested.
pub fn spawn_worker<T, F>(lock: Arc<Mainlock<T>>, body: F) -> Result<WorkerHandle, MainlockError>
where
    T: Send + 'static,
    F: FnOnce(&mut WorkerSession<'_, T>) + Send + 'static,
{
    let name = lock.config().worker_thread_name.clone();
    let handle = thread::Builder::new().name(name).spawn(move || {
        let mut session = lock.adopt_as_worker();
        body(&mut session);
    })?;

    Ok(WorkerHandle { handle })
}
