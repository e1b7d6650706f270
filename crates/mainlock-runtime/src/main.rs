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

//! Runs a toy machine on a Mainlock worker thread while the main thread
//! plays the UI controller.
//!
//! Usage: `mainlock-runtime [config.json]`

mod machine;
mod ui;

use anyhow::{Context, Result};
use machine::{Machine, Pacing};
use mainlock_core::{spawn_worker, Mainlock, MainlockConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Settings for a demo run, read from an optional JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
struct RuntimeConfig {
    /// Lock tunables.
    lock: MainlockConfig,
    /// Milliseconds per emulated frame.
    frame_time_ms: u64,
    /// Frames between blocking host calls (0 disables them).
    host_call_every: u64,
    /// Milliseconds spent in each blocking host call.
    host_call_time_ms: u64,
    /// UI events sent before quitting.
    ui_events: usize,
    /// Milliseconds between UI events.
    ui_event_interval_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            lock: MainlockConfig {
                worker_thread_name: "machine".to_string(),
                ..Default::default()
            },
            frame_time_ms: 20,
            host_call_every: 50,
            host_call_time_ms: 5,
            ui_events: 12,
            ui_event_interval_ms: 100,
        }
    }
}

impl RuntimeConfig {
    fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file '{}'", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("failed to parse config file '{}'", path.display()))
    }

    fn pacing(&self) -> Pacing {
        Pacing {
            frame_time: Duration::from_millis(self.frame_time_ms),
            host_call_every: self.host_call_every,
            host_call_time: Duration::from_millis(self.host_call_time_ms),
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match std::env::args_os().nth(1) {
        Some(path) => RuntimeConfig::load(Path::new(&path))?,
        None => RuntimeConfig::default(),
    };
    log::info!("Starting mainlock runtime with {config:?}");

    let lock = Arc::new(
        Mainlock::with_config(Machine::default(), config.lock.clone())
            .context("invalid lock configuration")?
            .with_teardown(|| log::info!("Machine thread released its resources.")),
    );

    let pacing = config.pacing();
    let worker = spawn_worker(Arc::clone(&lock), move |session| {
        machine::run(session, pacing)
    })
    .context("failed to start the machine thread")?;

    let (tx, rx) = crossbeam_channel::bounded(16);
    let source = ui::spawn_event_source(
        tx,
        config.ui_events,
        Duration::from_millis(config.ui_event_interval_ms),
    )
    .context("failed to start the UI event source")?;

    let handled = ui::run_controller(&lock, rx);
    worker.join().context("machine thread failed")?;
    ui::join_event_source(source)?;

    let frames = lock.acquire().frame.get();
    log::info!("Handled {handled} UI events over {frames} frames.");
    println!("{}", serde_json::to_string_pretty(&lock.stats())?);

    Ok(())
}
