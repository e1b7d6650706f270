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

//! A toy machine driven by the worker thread.

use mainlock_core::{WorkerFlow, WorkerSession};
use std::cell::Cell;
use std::thread;
use std::time::Duration;

/// Cycles executed per emulated frame.
const CYCLES_PER_FRAME: u64 = 19_656;

/// Emulated machine state. Only touched while holding the main lock.
#[derive(Debug, Default)]
pub struct Machine {
    pub frame: Cell<u64>,
    pub cycles: Cell<u64>,
    pub border_color: Cell<u8>,
}

impl Machine {
    fn run_frame(&self) {
        self.cycles.set(self.cycles.get() + CYCLES_PER_FRAME);
        self.frame.set(self.frame.get() + 1);
    }
}

/// Pacing for the worker loop.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    /// Wall-clock time spent per frame, outside the lock.
    pub frame_time: Duration,
    /// Every this many frames the worker makes a blocking host call.
    pub host_call_every: u64,
    /// Duration of that blocking call.
    pub host_call_time: Duration,
}

/// The worker loop: run a frame, yield, and now and then block in a host
/// call with the lock released.
pub fn run(session: &mut WorkerSession<'_, Machine>, pacing: Pacing) {
    loop {
        let machine = session.shared();
        machine.run_frame();
        let frame = machine.frame.get();

        if pacing.host_call_every > 0 && frame % pacing.host_call_every == 0 {
            log::debug!("frame {frame}: blocking host call");
            let ((), flow) = session.run_unlocked(|| thread::sleep(pacing.host_call_time));
            if flow.is_exit() {
                break;
            }
        }

        // Frame pacing happens with the lock released, like vsync.
        let ((), flow) = session.run_unlocked(|| thread::sleep(pacing.frame_time));
        if flow.is_exit() {
            break;
        }

        if session.yield_now() == WorkerFlow::Exit {
            break;
        }
    }
}
