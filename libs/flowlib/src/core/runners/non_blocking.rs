// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Single background worker, fire-and-forget.

use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::{Condvar, Mutex};

use crate::core::engine::CycleWork;
use crate::core::runners::{run_coalesced, Runner};

struct State {
    tasks: Vec<CycleWork>,
    stopped: bool,
}

struct Shared {
    state: Mutex<State>,
    work_cv: Condvar,
}

/// A dedicated worker thread services commits; `commit()` returns
/// immediately after enqueuing. Commits that pile up while the worker is
/// busy coalesce into one cycle.
pub struct NonBlocking {
    shared: Arc<Shared>,
    thread: Option<JoinHandle<()>>,
}

impl Default for NonBlocking {
    fn default() -> Self {
        Self::new()
    }
}

impl NonBlocking {
    pub fn new() -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                tasks: Vec::new(),
                stopped: false,
            }),
            work_cv: Condvar::new(),
        });
        let worker = Arc::clone(&shared);
        let thread = std::thread::Builder::new()
            .name("flowlib-runner".into())
            .spawn(move || worker_loop(&worker))
            .expect("failed to spawn NonBlocking worker");
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
                    return;
                }
                if !state.tasks.is_empty() {
                    break std::mem::take(&mut state.tasks);
                }
                shared.work_cv.wait(&mut state);
            }
        };
        run_coalesced(batch);
    }
}

impl Runner for NonBlocking {
    fn run(&self, work: CycleWork) {
        let mut state = self.shared.state.lock();
        if state.stopped {
            return;
        }
        state.tasks.push(work);
        self.shared.work_cv.notify_one();
    }
}

impl Drop for NonBlocking {
    fn drop(&mut self) {
        {
            let mut state = self.shared.state.lock();
            state.stopped = true;
            self.shared.work_cv.notify_all();
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
