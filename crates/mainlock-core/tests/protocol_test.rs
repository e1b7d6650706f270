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

use mainlock_core::{
    spawn_worker, Mainlock, ShutdownRequest, Sleeper, WorkerFlow, WorkerHandle,
};
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

// --- TEST FIXTURES ---

/// Shared state that detects overlapping critical sections.
#[derive(Default)]
struct Machine {
    holders: AtomicUsize,
    frames: Cell<u64>,
    pokes: Cell<u64>,
}

impl Machine {
    /// Enters a critical section, asserting nobody else is inside.
    fn touch(&self, counter: &Cell<u64>) {
        let inside = self.holders.fetch_add(1, Ordering::SeqCst);
        assert_eq!(inside, 0, "Two threads inside the critical section");
        counter.set(counter.get() + 1);
        thread::yield_now();
        self.holders.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Clone, Default)]
struct CountingSleeper(Arc<AtomicUsize>);

impl Sleeper for CountingSleeper {
    fn sleep(&self, duration: Duration) {
        self.0.fetch_add(1, Ordering::SeqCst);
        thread::sleep(duration);
    }
}

fn join_within(worker: WorkerHandle, limit: Duration) {
    let deadline = Instant::now() + limit;
    while !worker.is_finished() {
        assert!(
            Instant::now() < deadline,
            "Worker did not exit within {limit:?}"
        );
        thread::sleep(Duration::from_millis(1));
    }
    worker.join().expect("Worker thread should not panic");
}

// --- MUTUAL EXCLUSION ---

#[test]
fn test_worker_and_controllers_never_overlap() {
    let lock = Arc::new(Mainlock::new(Machine::default()));

    let worker = spawn_worker(Arc::clone(&lock), |session| loop {
        session.shared().touch(&session.shared().frames);
        if session.yield_now().is_exit() {
            break;
        }
    })
    .unwrap();

    let controllers: Vec<_> = (0..3)
        .map(|_| {
            let lock = Arc::clone(&lock);
            thread::spawn(move || {
                for _ in 0..200 {
                    let machine = lock.acquire();
                    machine.touch(&machine.pokes);
                }
            })
        })
        .collect();

    for controller in controllers {
        controller.join().unwrap();
    }

    let pokes = lock.acquire().pokes.get();
    assert_eq!(pokes, 600, "Every controller increment must survive");

    lock.request_shutdown();
    join_within(worker, Duration::from_secs(5));
    assert!(lock.acquire().frames.get() > 0);
}

#[test]
fn test_reentrant_acquire_from_controller() {
    let lock = Arc::new(Mainlock::new(Machine::default()));
    let outer = lock.acquire();
    let inner = lock.acquire();
    inner.touch(&inner.pokes);
    drop(inner);
    outer.touch(&outer.pokes);

    let other = Arc::clone(&lock);
    assert!(
        thread::spawn(move || other.try_acquire().is_none())
            .join()
            .unwrap(),
        "Lock must stay held until the outer release"
    );
    drop(outer);
    assert!(!lock.is_locked());
}

// --- LIVENESS ---

#[test]
fn test_controller_acquire_returns_within_bounded_worker_iterations() {
    let lock = Arc::new(Mainlock::new(Machine::default()));
    let iterations = Arc::new(AtomicU64::new(0));
    let started = Arc::new(Barrier::new(2));

    let worker = {
        let iterations = Arc::clone(&iterations);
        let started = Arc::clone(&started);
        spawn_worker(Arc::clone(&lock), move |session| {
            started.wait();
            loop {
                session.shared().touch(&session.shared().frames);
                iterations.fetch_add(1, Ordering::SeqCst);
                if session.yield_now().is_exit() {
                    break;
                }
            }
        })
        .unwrap()
    };

    started.wait();
    let before = iterations.load(Ordering::SeqCst);
    let machine = lock.acquire();
    let after = iterations.load(Ordering::SeqCst);
    machine.touch(&machine.pokes);
    // The only way in is a worker yield, and it is counted before the lock is released.
    let handoffs = lock.stats().yield_handoffs;
    drop(machine);

    assert!(
        after - before < 1_000,
        "Controller waited {} worker iterations",
        after - before
    );
    assert!(handoffs >= 1, "Controller got in without a counted handoff");

    lock.request_shutdown();
    join_within(worker, Duration::from_secs(5));
}

#[test]
fn test_two_concurrent_controllers_both_get_through() {
    let lock = Arc::new(Mainlock::new(Machine::default()));
    let worker = spawn_worker(Arc::clone(&lock), |session| {
        while session.yield_now() == WorkerFlow::Continue {
            session.shared().touch(&session.shared().frames);
        }
    })
    .unwrap();

    thread::scope(|s| {
        for _ in 0..2 {
            s.spawn(|| {
                for _ in 0..50 {
                    let machine = lock.acquire();
                    machine.touch(&machine.pokes);
                }
            });
        }
    });

    assert_eq!(lock.acquire().pokes.get(), 100);
    assert_eq!(lock.waiting_controllers(), 0);

    lock.request_shutdown();
    join_within(worker, Duration::from_secs(5));
}

#[test]
fn test_yield_window_lets_controller_in_without_yield_now() {
    let lock = Arc::new(Mainlock::new(Machine::default()));
    let (host_tx, host_rx) = std::sync::mpsc::channel::<()>();

    let worker = spawn_worker(Arc::clone(&lock), move |session| {
        // Simulated blocking host call with the lock released.
        let (_, flow) = session.run_unlocked(|| host_rx.recv());
        if flow.is_exit() {
            return;
        }
        session.shared().touch(&session.shared().frames);
        while session.yield_now() == WorkerFlow::Continue {}
    })
    .unwrap();

    {
        let machine = lock.acquire();
        machine.touch(&machine.pokes);
    }
    host_tx.send(()).unwrap();

    lock.request_shutdown();
    join_within(worker, Duration::from_secs(5));
    assert_eq!(lock.acquire().pokes.get(), 1);
}

// --- SHUTDOWN ---

#[test]
fn test_controller_shutdown_stops_worker_promptly() {
    let lock = Arc::new(Mainlock::new(Machine::default()));
    let iterations = Arc::new(AtomicU64::new(0));
    let stopped = Arc::new(AtomicBool::new(false));

    let worker = {
        let iterations = Arc::clone(&iterations);
        let stopped = Arc::clone(&stopped);
        spawn_worker(Arc::clone(&lock), move |session| loop {
            session.shared().touch(&session.shared().frames);
            iterations.fetch_add(1, Ordering::SeqCst);
            if session.yield_now().is_exit() {
                stopped.store(true, Ordering::SeqCst);
                break;
            }
        })
        .unwrap()
    };

    while iterations.load(Ordering::SeqCst) < 10 {
        thread::yield_now();
    }

    assert_eq!(lock.request_shutdown(), ShutdownRequest::Signalled);
    let at_request = iterations.load(Ordering::SeqCst);
    join_within(worker, Duration::from_secs(5));

    assert!(stopped.load(Ordering::SeqCst));
    assert!(
        iterations.load(Ordering::SeqCst) - at_request <= 1,
        "Worker must stop at its next yield point"
    );
    assert!(lock.is_terminated());
    assert!(!lock.is_locked());
}

#[test]
fn test_worker_self_shutdown_runs_teardown_once_and_ends_loop() {
    let teardowns = Arc::new(AtomicUsize::new(0));
    let after_shutdown = Arc::new(AtomicBool::new(false));
    let lock = {
        let teardowns = Arc::clone(&teardowns);
        Arc::new(Mainlock::new(Machine::default()).with_teardown(move || {
            teardowns.fetch_add(1, Ordering::SeqCst);
        }))
    };

    let worker = {
        let teardowns = Arc::clone(&teardowns);
        let after_shutdown = Arc::clone(&after_shutdown);
        spawn_worker(Arc::clone(&lock), move |session| {
            for frame in 0.. {
                session.shared().touch(&session.shared().frames);
                if frame == 5 {
                    assert_eq!(session.request_shutdown(), WorkerFlow::Exit);
                    assert_eq!(teardowns.load(Ordering::SeqCst), 1);
                    break;
                }
                if session.yield_now().is_exit() {
                    after_shutdown.store(true, Ordering::SeqCst);
                    break;
                }
            }
        })
        .unwrap()
    };

    join_within(worker, Duration::from_secs(5));
    assert_eq!(teardowns.load(Ordering::SeqCst), 1);
    assert!(!after_shutdown.load(Ordering::SeqCst));
    assert_eq!(lock.acquire().frames.get(), 6);
    assert_eq!(lock.request_shutdown(), ShutdownRequest::AlreadyRequested);
}

#[test]
fn test_repeated_shutdown_requests_are_noops() {
    let teardowns = Arc::new(AtomicUsize::new(0));
    let lock = {
        let teardowns = Arc::clone(&teardowns);
        Arc::new(Mainlock::new(()).with_teardown(move || {
            teardowns.fetch_add(1, Ordering::SeqCst);
        }))
    };
    let worker = spawn_worker(Arc::clone(&lock), |session| {
        while session.yield_now() == WorkerFlow::Continue {}
    })
    .unwrap();

    assert_eq!(lock.request_shutdown(), ShutdownRequest::Signalled);
    assert_eq!(lock.request_shutdown(), ShutdownRequest::AlreadyRequested);
    join_within(worker, Duration::from_secs(5));
    assert_eq!(lock.request_shutdown(), ShutdownRequest::AlreadyRequested);
    assert_eq!(teardowns.load(Ordering::SeqCst), 1);
}

#[test]
fn test_shutdown_not_hidden_by_later_acquire() {
    let lock = Arc::new(Mainlock::new(()));
    let (go_tx, go_rx) = std::sync::mpsc::channel::<()>();

    let worker = spawn_worker(Arc::clone(&lock), move |session| {
        let (_, flow) = session.run_unlocked(|| go_rx.recv());
        if flow.is_exit() {
            return;
        }
        while session.yield_now() == WorkerFlow::Continue {}
    })
    .unwrap();

    // Request shutdown, then finish an acquisition so no waiter is left.
    lock.request_shutdown();
    drop(lock.acquire());
    assert_eq!(lock.waiting_controllers(), 0);
    go_tx.send(()).unwrap();

    join_within(worker, Duration::from_secs(5));
    assert!(lock.is_terminated());
}

// --- IDENTITY ---

#[test]
fn test_is_worker_thread_only_on_adopting_thread() {
    let lock = Arc::new(Mainlock::new(()));
    assert!(!lock.is_worker_thread());

    let seen_inside = Arc::new(AtomicBool::new(false));
    let worker = {
        let seen_inside = Arc::clone(&seen_inside);
        spawn_worker(Arc::clone(&lock), move |session| {
            seen_inside.store(session.lock().is_worker_thread(), Ordering::SeqCst);
            while session.yield_now() == WorkerFlow::Continue {}
        })
        .unwrap()
    };

    let other = Arc::clone(&lock);
    let on_helper = thread::spawn(move || other.is_worker_thread())
        .join()
        .unwrap();
    assert!(!on_helper);
    assert!(!lock.is_worker_thread());

    lock.request_shutdown();
    join_within(worker, Duration::from_secs(5));
    assert!(seen_inside.load(Ordering::SeqCst));
    assert!(!lock.is_worker_thread(), "Identity checks stay stable after exit");
}

// --- PERFORMANCE PROPERTY ---

#[test]
fn test_thousand_uncontended_yields_keep_lock_and_never_sleep() {
    let sleeps = CountingSleeper::default();
    let lock = Arc::new(Mainlock::new(()).with_sleeper(sleeps.clone()));
    let yielded = Arc::new(Barrier::new(2));
    let checked = Arc::new(Barrier::new(2));

    let worker = {
        let yielded = Arc::clone(&yielded);
        let checked = Arc::clone(&checked);
        spawn_worker(Arc::clone(&lock), move |session| {
            for _ in 0..1000 {
                assert_eq!(session.yield_now(), WorkerFlow::Continue);
            }
            yielded.wait();
            checked.wait();
        })
        .unwrap()
    };

    yielded.wait();
    assert!(lock.is_locked(), "Worker keeps the lock throughout");
    assert!(lock.try_acquire().is_none());
    checked.wait();
    join_within(worker, Duration::from_secs(5));

    assert_eq!(sleeps.0.load(Ordering::SeqCst), 0);
    let stats = lock.stats();
    assert_eq!(stats.yield_calls, 1000);
    assert_eq!(stats.yield_handoffs, 0);
    assert_eq!(stats.controller_acquisitions, 0);
}
