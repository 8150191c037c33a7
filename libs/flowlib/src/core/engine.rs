// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The core facade and the commit protocol.
//!
//! [`FlowCore`] is the entry point: it owns the graph and the diff queue,
//! and references the runner that decides where cycles execute. One commit
//! cycle is: drain the diff queue in FIFO order, re-sort the graph if the
//! topology changed, then execute the sorted node view in order. The drain
//! and sort are packaged as a [`CycleWork`] the runner invokes at a moment
//! of its choosing; diffs produced during a cycle stay queued for the next
//! one.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::core::batch::Batch;
use crate::core::callable::{IntoSlots, NodeCallable};
use crate::core::diffs::DiffQueue;
use crate::core::error::Result;
use crate::core::graph::Graph;
use crate::core::node::{NodeHandle, NodeRef, ScheduledNode};
use crate::core::port::{Output, Port, PortSource};
use crate::core::runners::{Immediate, Runner};
use crate::core::uniform::UniformNode;
use crate::core::value::{Adapt, PortValue};

pub(crate) struct CoreInner {
    pub(crate) graph: Mutex<Graph>,
    pub(crate) diffs: Arc<DiffQueue>,
    pub(crate) runner: Mutex<Arc<dyn Runner>>,
}

/// The engine facade. Owns the graph and diff queue; the runner is
/// supplied externally and can be swapped at runtime.
pub struct FlowCore {
    inner: Arc<CoreInner>,
}

impl Default for FlowCore {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowCore {
    /// Core with the default [`Immediate`] runner.
    pub fn new() -> Self {
        Self::with_runner(Arc::new(Immediate))
    }

    pub fn with_runner(runner: Arc<dyn Runner>) -> Self {
        let diffs = Arc::new(DiffQueue::new());
        let inner = Arc::new_cyclic(|weak: &Weak<CoreInner>| {
            let graph = Graph::new(
                CoreHandle {
                    inner: weak.clone(),
                },
                Arc::clone(&diffs),
            );
            CoreInner {
                graph: Mutex::new(graph),
                diffs: Arc::clone(&diffs),
                runner: Mutex::new(runner),
            }
        });
        Self { inner }
    }

    /// Swap the execution strategy. Cycles already handed to the previous
    /// runner still complete there.
    pub fn set_runner(&self, runner: Arc<dyn Runner>) {
        *self.inner.runner.lock() = runner;
    }

    /// Weak handle for node bodies and application threads.
    pub fn handle(&self) -> CoreHandle {
        CoreHandle {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn port<T: PortValue>(&self) -> Port<T> {
        self.inner.graph.lock().port::<T>()
    }

    pub fn port_with<T: PortValue>(&self, value: T) -> Port<T> {
        self.inner.graph.lock().port_with(value)
    }

    pub fn node<F, M, I>(&self, f: F, inputs: I) -> NodeRef<F::Handles>
    where
        F: NodeCallable<M>,
        I: IntoSlots<F::Slots>,
    {
        self.inner.graph.lock().node(f, inputs)
    }

    pub fn unode<T: PortValue>(&self, info: UniformNode<T>) -> Result<Vec<Output<T>>> {
        self.inner.graph.lock().unode(info)
    }

    pub fn link<S, To>(&self, from: &S, to: &Port<To>) -> NodeHandle
    where
        S: PortSource,
        To: PortValue,
        S::Elem: Adapt<To>,
    {
        self.inner.graph.lock().link(from, to)
    }

    /// Open a write batch. All writes staged on the returned guard land in
    /// the diff queue as one atomic group when it is dropped (or
    /// explicitly closed), so a single drain pass applies them together.
    pub fn batch(&self) -> Batch {
        Batch::new(Some(Arc::clone(&self.inner.diffs)))
    }

    /// Enqueue a closure that mutates the graph at the next drain. The
    /// closure runs with exclusive graph access; do not call `commit` from
    /// inside it.
    pub fn post<F>(&self, f: F)
    where
        F: FnOnce(&mut Graph) + Send + 'static,
    {
        self.inner.diffs.push(Box::new(f));
    }

    /// `post` followed by `commit`.
    pub fn apply<F>(&self, f: F)
    where
        F: FnOnce(&mut Graph) + Send + 'static,
    {
        self.post(f);
        self.commit();
    }

    /// Schedule a node removal for the next drain.
    pub fn remove_node(&self, handle: &NodeHandle) {
        let handle = handle.clone();
        self.post(move |graph| graph.remove_node(&handle));
    }

    /// Schedule an independent-port removal for the next drain.
    pub fn remove_port<T: PortValue>(&self, handle: &Port<T>) {
        let handle = handle.clone();
        self.post(move |graph| graph.remove_port(&handle));
    }

    /// Commit all scheduled changes and run the affected sub-graph.
    pub fn commit(&self) {
        let runner = Arc::clone(&*self.inner.runner.lock());
        runner.run(CycleWork {
            core: Arc::clone(&self.inner),
        });
    }
}

/// Clonable weak reference to a core, passed to node bodies that declared
/// a leading core parameter. Once the core is dropped, every operation
/// becomes a no-op.
#[derive(Clone)]
pub struct CoreHandle {
    pub(crate) inner: Weak<CoreInner>,
}

impl CoreHandle {
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self { inner: Weak::new() }
    }

    /// Enqueue a graph mutation for the next cycle.
    pub fn post<F>(&self, f: F)
    where
        F: FnOnce(&mut Graph) + Send + 'static,
    {
        if let Some(inner) = self.inner.upgrade() {
            inner.diffs.push(Box::new(f));
        }
    }

    /// Request a commit. Dispatches through the current runner, exactly
    /// like [`FlowCore::commit`].
    pub fn commit(&self) {
        if let Some(inner) = self.inner.upgrade() {
            let runner = Arc::clone(&*inner.runner.lock());
            runner.run(CycleWork { core: inner });
        }
    }

    /// Open a write batch against this core's diff queue.
    pub fn batch(&self) -> Batch {
        Batch::new(self.inner.upgrade().map(|inner| Arc::clone(&inner.diffs)))
    }
}

/// One commit cycle, handed to the runner. `prepare` drains the diff
/// queue, re-sorts if needed, and returns the sorted node view; the runner
/// then walks the view in order. `prepare` must run serially (runner
/// property P5); node execution policy is the runner's.
pub struct CycleWork {
    pub(crate) core: Arc<CoreInner>,
}

impl CycleWork {
    pub fn prepare(&self) -> Vec<ScheduledNode> {
        let apply = self.core.diffs.flush();
        let mut graph = self.core.graph.lock();
        apply(&mut graph);
        graph.sorted()
    }
}
