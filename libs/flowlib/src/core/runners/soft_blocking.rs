// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Single background worker, waited on when idle.

use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

use crate::core::engine::CycleWork;
use crate::core::runners::{run_coalesced, Runner};

struct SoftState {
    tasks: Vec<CycleWork>,
    busy: bool,
    stopped: bool,
}

struct Shared {
    state: Mutex<SoftState>,
    work_cv: Condvar,
    idle_cv: Condvar,
}

/// A dedicated worker thread services commits. A commit submitted while
/// the worker is idle blocks the caller until the worker has drained the
/// queue again, so the first commit is synchronous from the caller's
/// perspective. Commits submitted while the worker is busy coalesce and
/// return immediately.
pub struct SoftBlocking {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl Default for SoftBlocking {
    fn default() -> Self {
        Self::new()
    }
}

impl SoftBlocking {
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(SoftState {
                tasks: Vec::new(),
                busy: false,
                stopped: false,
            }),
            work_cv: Condvar::new(),
            idle_cv: Condvar::new(),
        });
        let worker = Arc::clone(&shared);
        let thread = std::thread::Builder::new()
            .name("flowlib-soft-runner".into())
            .spawn(move || worker_loop(&worker))
            .expect("failed to spawn SoftBlocking worker");
        Self {
            shared,
            thread: Some(thread),
        }
    }
}

fn worker_loop(shared: &Shared) {
    loop {
        let batch = {
            let mut state = shared.state.lock();
            loop {
                if state.stopped {
                    state.busy = false;
                    shared.idle_cv.notify_all();
                    return;
                }
                if !state.tasks.is_empty() {
                    state.busy = true;
                    break std::mem::take(&mut state.tasks);
                }
                state.busy = false;
                shared.idle_cv.notify_all();
                shared.work_cv.wait(&mut state);
            }
        };
        run_coalesced(batch);
    }
}

impl Runner for SoftBlocking {
    fn run(&self, work: CycleWork) {
        let mut state = self.shared.state.lock();
        if state.stopped {
            return;
        }
        let worker_was_idle = !state.busy;
        state.tasks.push(work);
        self.shared.work_cv.notify_one();
        if worker_was_idle {
            while !state.stopped && (state.busy || !state.tasks.is_empty()) {
                self.shared.idle_cv.wait(&mut state);
            }
        }
    }
}

impl Drop for SoftBlocking {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.stopped = true;
            self.shared.work_cv.notify_all();
            self.shared.idle_cv.notify_all();
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
