// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Graph ownership and topological order.
//!
//! The graph owns every node and every independently created port. Nodes
//! are kept sorted by their cached topological score; the sort is lazy and
//! re-runs only after a structural change. Nodes with equal score may be
//! reordered freely; only the non-decreasing score order is guaranteed.
//!
//! Structural reads and writes happen inside the serialized commit drain
//! (or before the first commit), never concurrently with node execution.

use std::any::Any;
use std::sync::Arc;

use crate::core::callable::{BindContext, IntoSlots, NodeCallable};
use crate::core::diffs::DiffQueue;
use crate::core::engine::CoreHandle;
use crate::core::node::{NodeCell, NodeHandle, NodeRef, ScheduledNode};
use crate::core::port::{Port, PortCell, PortSource};
use crate::core::value::{Adapt, PortValue};

pub struct Graph {
    core: CoreHandle,
    diffs: Arc<DiffQueue>,
    nodes: Vec<Arc<NodeCell>>,
    /// Independently created ports. Node-owned ports live with their node.
    ports: Vec<Arc<dyn Any + Send + Sync>>,
    needs_sort: bool,
}

impl Graph {
    pub(crate) fn new(core: CoreHandle, diffs: Arc<DiffQueue>) -> Self {
        Self {
            core,
            diffs,
            nodes: Vec::new(),
            ports: Vec::new(),
            needs_sort: true,
        }
    }

    /// Graph with no owning core, for unit tests of graph-local behavior.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self::new(CoreHandle::detached(), Arc::new(DiffQueue::new()))
    }

    /// Create an independent port with no value. It stays not-ready until
    /// the first `set_value` is drained.
    pub fn port<T: PortValue>(&mut self) -> Port<T> {
        let cell = PortCell::<T>::new(0, Arc::downgrade(&self.diffs), None);
        let handle = Port::from_cell(&cell);
        self.ports.push(cell as Arc<dyn Any + Send + Sync>);
        handle
    }

    /// Create an independent port that is immediately ready.
    pub fn port_with<T: PortValue>(&mut self, value: T) -> Port<T> {
        let cell = PortCell::<T>::new(0, Arc::downgrade(&self.diffs), Some(value));
        let handle = Port::from_cell(&cell);
        self.ports.push(cell as Arc<dyn Any + Send + Sync>);
        handle
    }

    /// Create a node from a classified callable and its input wiring.
    /// Zero-input callables pass `()` for `inputs`.
    pub fn node<F, M, I>(&mut self, f: F, inputs: I) -> NodeRef<F::Handles>
    where
        F: NodeCallable<M>,
        I: IntoSlots<F::Slots>,
    {
        let cx = BindContext {
            diffs: Arc::downgrade(&self.diffs),
            core: self.core.clone(),
        };
        let bound = f.bind(&cx, inputs.into_slots());
        bound.cell.attach_inputs();
        let node_ref = NodeRef::new(&bound.cell, bound.handles);
        self.nodes.push(bound.cell);
        self.needs_sort = true;
        node_ref
    }

    /// Couple a producer into a user-controlled sink port: inserts a
    /// 1-input 0-output node that copies (and, if needed, adapts) `from`
    /// into `to` on every change.
    pub fn link<S, To>(&mut self, from: &S, to: &Port<To>) -> NodeHandle
    where
        S: PortSource,
        To: PortValue,
        S::Elem: Adapt<To>,
    {
        let sink = to.clone();
        let node = self.node(
            move |value: &To| {
                sink.set_value(value.clone());
            },
            (from,),
        );
        node.handle()
    }

    /// Remove a node. Its output ports go with it; downstream nodes detach
    /// and become not-ready if they lose their only source.
    pub fn remove_node(&mut self, handle: &NodeHandle) {
        let Some(cell) = handle.cell.upgrade() else {
            tracing::warn!("[Graph] remove_node on an already-removed node, ignoring");
            return;
        };
        let before = self.nodes.len();
        self.nodes.retain(|node| !Arc::ptr_eq(node, &cell));
        if self.nodes.len() != before {
            cell.detach_inputs();
            self.needs_sort = true;
            tracing::debug!("[Graph] Removed node, {} remain", self.nodes.len());
        }
    }

    /// Remove an independently created port. Ports owned by a node are
    /// released with their parent node, not here.
    pub fn remove_port<T: PortValue>(&mut self, handle: &Port<T>) {
        let Some(cell) = handle.cell.upgrade() else {
            tracing::warn!("[Graph] remove_port on an already-removed port, ignoring");
            return;
        };
        let target = Arc::as_ptr(&cell) as *const ();
        let before = self.ports.len();
        self.ports
            .retain(|port| Arc::as_ptr(port) as *const () != target);
        if self.ports.len() != before {
            self.needs_sort = true;
        } else {
            tracing::warn!("[Graph] remove_port on a node-owned port, ignoring");
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    pub(crate) fn core_handle(&self) -> CoreHandle {
        self.core.clone()
    }

    pub(crate) fn diffs(&self) -> &Arc<DiffQueue> {
        &self.diffs
    }

    pub(crate) fn insert_node(&mut self, cell: Arc<NodeCell>) {
        self.nodes.push(cell);
        self.needs_sort = true;
    }

    /// The runner-facing view: stable-sorted by score, recomputed only when
    /// the topology changed.
    pub(crate) fn sorted(&mut self) -> Vec<ScheduledNode> {
        if self.needs_sort {
            self.needs_sort = false;
            self.nodes.sort_by_key(|node| node.score());
            tracing::debug!("[Graph] Re-sorted {} nodes", self.nodes.len());
        }
        self.nodes
            .iter()
            .map(|node| ScheduledNode(Arc::clone(node)))
            .collect()
    }
}
