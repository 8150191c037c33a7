// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Thread-pool execution with a serialized main loop.
//!
//! Two logical queues: a size-1 *main* queue that owns every structural
//! step (draining diffs, sorting, walking the topological order, done
//! bookkeeping) and an *exec* pool of N workers that only ever run node
//! bodies. The graph's structure therefore never changes while bodies run.
//!
//! Freshness rule: diffs that arrive while a cycle is executing are
//! deferred; once the last in-flight node lands, the remaining waiting set
//! is dropped wholesale and the next cycle starts immediately with the new
//! diffs applied. A stale cycle is never completed for its own sake.

use std::collections::HashSet;
use std::thread::JoinHandle;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::core::engine::CycleWork;
use crate::core::node::{RunOutcome, ScheduledNode};
use crate::core::runners::Runner;

enum MainMsg {
    Commit(CycleWork),
    Done(ScheduledNode, RunOutcome),
    Shutdown,
}

enum ExecMsg {
    Exec(ScheduledNode),
    Shutdown,
}

/// Parallel runner with `thread_count` exec workers.
pub struct Parallel {
    main_tx: Sender<MainMsg>,
    main_thread: Option<JoinHandle<()>>,
    exec_threads: Vec<JoinHandle<()>>,
}

impl Parallel {
    pub fn new(thread_count: usize) -> Self {
        let workers = thread_count.max(1);
        let (main_tx, main_rx) = unbounded::<MainMsg>();
        let (exec_tx, exec_rx) = unbounded::<ExecMsg>();

        let mut exec_threads = Vec::with_capacity(workers);
        for index in 0..workers {
            let rx = exec_rx.clone();
            let done_tx = main_tx.clone();
            let thread = std::thread::Builder::new()
                .name(format!("flowlib-exec-{index}"))
                .spawn(move || exec_loop(&rx, &done_tx))
                .expect("failed to spawn Parallel exec worker");
            exec_threads.push(thread);
        }

        let main_thread = std::thread::Builder::new()
            .name("flowlib-main".into())
            .spawn(move || main_loop(&main_rx, exec_tx, workers))
            .expect("failed to spawn Parallel main worker");

        tracing::debug!("[Parallel] Started with {} exec workers", workers);
        Self {
            main_tx,
            main_thread: Some(main_thread),
            exec_threads,
        }
    }
}

impl Runner for Parallel {
    fn run(&self, work: CycleWork) {
        let _ = self.main_tx.send(MainMsg::Commit(work));
    }
}

impl Drop for Parallel {
    fn drop(&mut self) {
        let _ = self.main_tx.send(MainMsg::Shutdown);
        if let Some(thread) = self.main_thread.take() {
            let _ = thread.join();
        }
        for thread in self.exec_threads.drain(..) {
            let _ = thread.join();
        }
    }
}

fn exec_loop(rx: &Receiver<ExecMsg>, done_tx: &Sender<MainMsg>) {
    while let Ok(msg) = rx.recv() {
        match msg {
            ExecMsg::Exec(node) => {
                let outcome = node.exec();
                if done_tx.send(MainMsg::Done(node, outcome)).is_err() {
                    break;
                }
            }
            ExecMsg::Shutdown => break,
        }
    }
}

struct MainState {
    exec_tx: Sender<ExecMsg>,
    /// Cycles deferred while nodes are still executing.
    pending_cycles: Vec<CycleWork>,
    /// Nodes currently on an exec worker, by identity.
    running: HashSet<usize>,
    /// Pending nodes whose inputs were not ready when visited.
    waiting: Vec<ScheduledNode>,
    /// Set when a body failed; suppresses further dispatch this cycle.
    cycle_failed: bool,
}

fn main_loop(rx: &Receiver<MainMsg>, exec_tx: Sender<ExecMsg>, workers: usize) {
    let mut state = MainState {
        exec_tx,
        pending_cycles: Vec::new(),
        running: HashSet::new(),
        waiting: Vec::new(),
        cycle_failed: false,
    };
    let mut shutting_down = false;

    while let Ok(msg) = rx.recv() {
        match msg {
            MainMsg::Commit(work) => {
                state.pending_cycles.push(work);
                if state.running.is_empty() {
                    state.start_cycle();
                }
            }
            MainMsg::Done(node, outcome) => state.finish_node(node, outcome),
            MainMsg::Shutdown => shutting_down = true,
        }
        if shutting_down && state.running.is_empty() {
            break;
        }
    }

    for _ in 0..workers {
        let _ = state.exec_tx.send(ExecMsg::Shutdown);
    }
    tracing::debug!("[Parallel] Main loop exited");
}

impl MainState {
    /// Drain every deferred cycle's diffs in order, then walk the newest
    /// sorted view. Runs only while no node is executing, which is what
    /// keeps structure changes and bodies apart.
    fn start_cycle(&mut self) {
        self.cycle_failed = false;
        // The sorted view re-lists every pending node, including ones a
        // stalled previous cycle left waiting.
        self.waiting.clear();
        let mut nodes = Vec::new();
        for work in std::mem::take(&mut self.pending_cycles) {
            nodes = work.prepare();
        }
        for node in nodes {
            if !node.is_pending() {
                continue;
            }
            if node.is_ready() {
                self.dispatch(node);
            } else {
                self.waiting.push(node);
            }
        }
    }

    fn dispatch(&mut self, node: ScheduledNode) {
        if node.is_input_changed() {
            let id = node.id();
            self.running.insert(id);
            if self.exec_tx.send(ExecMsg::Exec(node)).is_err() {
                tracing::warn!("[Parallel] Exec pool gone, dropping node dispatch");
                self.running.remove(&id);
            }
        } else {
            // Nothing to recompute; settle bookkeeping inline.
            self.finish_node(node, RunOutcome::Skipped);
        }
    }

    fn finish_node(&mut self, node: ScheduledNode, outcome: RunOutcome) {
        node.mark_done();
        self.running.remove(&node.id());

        if outcome.is_failure() {
            tracing::warn!("[Parallel] Cycle torn down after node failure");
            self.cycle_failed = true;
            self.waiting.clear();
        }

        if !self.pending_cycles.is_empty() {
            // Freshness over completion: once the in-flight nodes land,
            // abandon the stale waiting set and apply the new diffs.
            if self.running.is_empty() {
                self.waiting.clear();
                self.start_cycle();
            }
        } else if !self.cycle_failed {
            let mut index = 0;
            while index < self.waiting.len() {
                if self.waiting[index].is_ready() {
                    let ready = self.waiting.remove(index);
                    self.dispatch(ready);
                } else {
                    index += 1;
                }
            }
        }
    }
}
