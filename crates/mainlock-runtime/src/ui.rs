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

//! Synthetic UI events and the controller loop that handles them.

use crate::machine::Machine;
use crossbeam_channel::{Receiver, Sender};
use mainlock_core::{Mainlock, ShutdownRequest};
use std::thread;
use std::time::Duration;

/// An input the controller reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiEvent {
    /// Read the machine state, like refreshing a status bar.
    Inspect,
    /// Change machine state, like picking a border colour in a menu.
    Poke(u8),
    /// The user asked to quit.
    Quit,
}

/// Starts a thread that plays the part of the windowing system, sending
/// `count` events `interval` apart and then [`UiEvent::Quit`].
pub fn spawn_event_source(
    tx: Sender<UiEvent>,
    count: usize,
    interval: Duration,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("ui-events".to_string())
        .spawn(move || {
            for i in 0..count {
                thread::sleep(interval);
                let event = if i % 3 == 2 {
                    UiEvent::Poke((i % 16) as u8)
                } else {
                    UiEvent::Inspect
                };
                if tx.send(event).is_err() {
                    return;
                }
            }
            let _ = tx.send(UiEvent::Quit);
        })
}

/// Waits for the event source thread, reporting a panic in it as an error.
pub fn join_event_source(source: thread::JoinHandle<()>) -> anyhow::Result<()> {
    source
        .join()
        .map_err(|_| anyhow::anyhow!("UI event source thread panicked"))
}

/// Handles events until [`UiEvent::Quit`] or the source disconnects.
///
/// Returns the number of events that touched machine state.
pub fn run_controller(lock: &Mainlock<Machine>, events: Receiver<UiEvent>) -> usize {
    let mut handled = 0;

    for event in events.iter() {
        match event {
            UiEvent::Inspect => {
                let machine = lock.acquire();
                log::info!(
                    "status: frame {} ({} cycles), border {}",
                    machine.frame.get(),
                    machine.cycles.get(),
                    machine.border_color.get()
                );
                handled += 1;
            }
            UiEvent::Poke(color) => {
                let machine = lock.acquire();
                machine.border_color.set(color);
                log::debug!("border colour set to {color}");
                handled += 1;
            }
            UiEvent::Quit => break,
        }
    }

    if lock.request_shutdown() == ShutdownRequest::Signalled {
        log::info!("Quit requested, waiting for the machine to stop...");
    }
    handled
}
