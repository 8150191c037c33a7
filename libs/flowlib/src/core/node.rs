// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Node execution cells.
//!
//! A node binds a callable to typed input slots and owns its output ports.
//! The typed callable machinery (see `callable.rs`) erases itself into a
//! plain execution closure at bind time, so one cell type serves every
//! node shape, uniform nodes included.
//!
//! Protocol per commit cycle: a node in `Pending` whose inputs are all
//! ready runs at most once; the callable itself fires only when at least
//! one input actually changed since the last run. `done` always cascades
//! to the required outputs so downstream readiness settles even when the
//! body was skipped.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::core::adapter::SlotOps;
use crate::core::error::FlowError;
use crate::core::port::PortOps;

/// Outcome of offering a node to the runner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The callable executed and outputs were written.
    Ran,
    /// Nothing to do: not pending, not ready, or inputs unchanged.
    Skipped,
    /// The body panicked or violated its shape; the cycle must stop.
    Failed,
}

impl RunOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, RunOutcome::Failed)
    }
}

struct NodeState {
    pending: bool,
    input_changed: bool,
}

type ExecBody = Box<dyn FnMut() -> Result<(), FlowError> + Send>;

pub(crate) struct NodeCell {
    /// 1 + max input-port score; fixed at bind time.
    score: u32,
    state: Mutex<NodeState>,
    body: Mutex<ExecBody>,
    /// Required outputs, cascaded on pend/done.
    req_outputs: Vec<Arc<dyn PortOps>>,
    /// Optional outputs are owned but never cascaded; writes to them ride
    /// the diff queue.
    _opt_outputs: Vec<Arc<dyn PortOps>>,
    inputs: Vec<Box<dyn SlotOps>>,
}

impl NodeCell {
    pub(crate) fn new(
        score: u32,
        body: ExecBody,
        req_outputs: Vec<Arc<dyn PortOps>>,
        opt_outputs: Vec<Arc<dyn PortOps>>,
        inputs: Vec<Box<dyn SlotOps>>,
    ) -> Arc<Self> {
        Arc::new(Self {
            score,
            state: Mutex::new(NodeState {
                pending: true,
                input_changed: true,
            }),
            body: Mutex::new(body),
            req_outputs,
            _opt_outputs: opt_outputs,
            inputs,
        })
    }

    pub(crate) fn score(&self) -> u32 {
        self.score
    }

    /// Register this node as a dependent of every input's source port.
    /// Called once, right after construction.
    pub(crate) fn attach_inputs(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        for slot in &self.inputs {
            slot.attach(weak.clone());
        }
    }

    /// Unregister from every input source. Called by the graph on removal.
    pub(crate) fn detach_inputs(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        for slot in &self.inputs {
            slot.detach(&weak);
        }
    }

    pub(crate) fn is_pending(&self) -> bool {
        self.state.lock().pending
    }

    pub(crate) fn is_input_changed(&self) -> bool {
        self.state.lock().input_changed
    }

    pub(crate) fn is_ready(&self) -> bool {
        self.inputs.iter().all(|slot| slot.is_ready())
    }

    /// Done -> Pending, cascading to required outputs.
    pub(crate) fn pend(&self) {
        {
            let mut state = self.state.lock();
            if state.pending {
                return;
            }
            state.pending = true;
        }
        for output in &self.req_outputs {
            output.pend();
        }
    }

    pub(crate) fn input_changed(&self) {
        self.state.lock().input_changed = true;
    }

    /// Pending -> Done; inputs return to stale, required outputs settle.
    pub(crate) fn done(&self) {
        {
            let mut state = self.state.lock();
            if !state.pending {
                return;
            }
            state.pending = false;
            state.input_changed = false;
        }
        for output in &self.req_outputs {
            output.done();
        }
    }

    /// Execute the callable, containing panics at the node boundary.
    /// Required outputs keep their prior values on failure.
    pub(crate) fn exec(&self) -> RunOutcome {
        let Some(mut body) = self.body.try_lock() else {
            // Re-entrant execution (a node body committing through the
            // core under the Immediate runner lands back here).
            tracing::warn!("[Node] exec re-entered while running, skipping");
            return RunOutcome::Skipped;
        };
        match catch_unwind(AssertUnwindSafe(|| (*body)())) {
            Ok(Ok(())) => RunOutcome::Ran,
            Ok(Err(err)) => {
                tracing::error!("[Node] body failed, tearing down cycle: {err}");
                RunOutcome::Failed
            }
            Err(payload) => {
                let msg = panic_message(payload.as_ref());
                tracing::error!("[Node] body panicked, tearing down cycle: {msg}");
                RunOutcome::Failed
            }
        }
    }

    /// Full per-cycle protocol for serial runners.
    pub(crate) fn run(&self) -> RunOutcome {
        if !self.is_pending() || !self.is_ready() {
            return RunOutcome::Skipped;
        }
        let outcome = if self.is_input_changed() {
            self.exec()
        } else {
            RunOutcome::Skipped
        };
        self.done();
        outcome
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// A node as seen by a [`Runner`](crate::core::runners::Runner): the sorted
/// view element. Serial runners call [`run`](ScheduledNode::run); parallel
/// runners split readiness checks, [`exec`](ScheduledNode::exec) on worker
/// threads, and [`mark_done`](ScheduledNode::mark_done) on their main
/// thread.
#[derive(Clone)]
pub struct ScheduledNode(pub(crate) Arc<NodeCell>);

impl ScheduledNode {
    pub fn run(&self) -> RunOutcome {
        self.0.run()
    }

    pub fn exec(&self) -> RunOutcome {
        self.0.exec()
    }

    pub fn mark_done(&self) {
        self.0.done();
    }

    pub fn is_pending(&self) -> bool {
        self.0.is_pending()
    }

    pub fn is_ready(&self) -> bool {
        self.0.is_ready()
    }

    pub fn is_input_changed(&self) -> bool {
        self.0.is_input_changed()
    }

    /// Stable identity for bookkeeping sets.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }
}

/// Opaque handle to a node, used for structural removal.
#[derive(Clone)]
pub struct NodeHandle {
    pub(crate) cell: Weak<NodeCell>,
}

/// A freshly created node plus its typed output handles (required outputs
/// first, optional outputs second).
pub struct NodeRef<O> {
    pub(crate) cell: Weak<NodeCell>,
    outputs: O,
}

impl<O: Clone> NodeRef<O> {
    pub(crate) fn new(cell: &Arc<NodeCell>, outputs: O) -> Self {
        Self {
            cell: Arc::downgrade(cell),
            outputs,
        }
    }

    pub fn outputs(&self) -> O {
        self.outputs.clone()
    }

    pub fn handle(&self) -> NodeHandle {
        NodeHandle {
            cell: self.cell.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_node(counter: Arc<AtomicUsize>) -> Arc<NodeCell> {
        NodeCell::new(
            1,
            Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
            Vec::new(),
            Vec::new(),
            Vec::new(),
        )
    }

    #[test]
    fn test_new_node_runs_once() {
        let counter = Arc::new(AtomicUsize::new(0));
        let node = counting_node(Arc::clone(&counter));
        assert!(node.is_pending());
        assert_eq!(node.run(), RunOutcome::Ran);
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        // Done until pended again.
        assert_eq!(node.run(), RunOutcome::Skipped);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_pend_without_input_change_skips_body() {
        let counter = Arc::new(AtomicUsize::new(0));
        let node = counting_node(Arc::clone(&counter));
        node.run();

        node.pend();
        assert_eq!(node.run(), RunOutcome::Skipped);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!node.is_pending());
    }

    #[test]
    fn test_pend_then_change_reruns() {
        let counter = Arc::new(AtomicUsize::new(0));
        let node = counting_node(Arc::clone(&counter));
        node.run();

        node.pend();
        node.input_changed();
        assert_eq!(node.run(), RunOutcome::Ran);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panic_is_contained_and_marks_done() {
        let node = NodeCell::new(
            1,
            Box::new(|| panic!("boom")),
            Vec::new(),
            Vec::new(),
            Vec::new(),
        );
        assert_eq!(node.run(), RunOutcome::Failed);
        // Marked done despite the failure, so the graph cannot livelock.
        assert!(!node.is_pending());
    }
}
