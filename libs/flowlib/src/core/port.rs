// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Typed port store.
//!
//! A port owns the current value of one typed channel and fans change
//! notifications out to its dependent nodes. The port state machine is
//! deliberately small:
//!
//! - `Stale` + value present: readable, nothing pending (`is_ready`).
//! - `Pending`: a dependent computation has not yet absorbed the latest
//!   value, or the value was invalidated.
//!
//! All mutation goes through the diff queue; the `apply_*` methods here run
//! only inside the serialized commit drain (or from a node body writing its
//! own required outputs, which the runner contract isolates).

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::core::adapter::{adapter_for, AdapterSink};
use crate::core::diffs::DiffQueue;
use crate::core::node::NodeCell;
use crate::core::value::PortValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PortState {
    Stale,
    Pending,
}

struct PortInner<T> {
    state: PortState,
    value: Option<T>,
}

/// Type-erased cascade surface for required-output ports.
pub(crate) trait PortOps: Send + Sync {
    fn pend(&self);
    fn done(&self);
}

pub(crate) struct AdapterEntry<T> {
    pub(crate) sink: Arc<dyn AdapterSink<T>>,
    pub(crate) any: Arc<dyn Any + Send + Sync>,
}

/// Owning half of a port. Handles ([`Port`], [`Output`]) hold weak
/// references; the cell is kept alive by its owner (graph for independent
/// ports, node for dependent ports).
pub struct PortCell<T: PortValue> {
    /// Topological score: 0 for independent ports, the parent node's score
    /// for node-owned ports. Fixed at creation; ports are never rewired.
    score: u32,
    pub(crate) diffs: Weak<DiffQueue>,
    inner: RwLock<PortInner<T>>,
    deps: Mutex<Vec<Weak<NodeCell>>>,
    adapters: Mutex<HashMap<TypeId, AdapterEntry<T>>>,
}

impl<T: PortValue> PortCell<T> {
    pub(crate) fn new(score: u32, diffs: Weak<DiffQueue>, initial: Option<T>) -> Arc<Self> {
        let state = if initial.is_some() {
            PortState::Stale
        } else {
            PortState::Pending
        };
        Arc::new(Self {
            score,
            diffs,
            inner: RwLock::new(PortInner {
                state,
                value: initial,
            }),
            deps: Mutex::new(Vec::new()),
            adapters: Mutex::new(HashMap::new()),
        })
    }

    pub(crate) fn score(&self) -> u32 {
        self.score
    }

    pub(crate) fn read(&self) -> Option<T> {
        self.inner.read().value.clone()
    }

    pub(crate) fn has_value(&self) -> bool {
        self.inner.read().value.is_some()
    }

    pub(crate) fn is_ready(&self) -> bool {
        let inner = self.inner.read();
        inner.state == PortState::Stale && inner.value.is_some()
    }

    fn is_same(&self, value: &T) -> bool {
        match &self.inner.read().value {
            Some(current) => current.same(value),
            None => false,
        }
    }

    /// Diff body for `set_value`: equality short circuit, then the
    /// pend / apply / done sequence.
    pub(crate) fn apply_set(&self, value: T) {
        if self.is_same(&value) {
            return;
        }
        self.pend();
        self.set(value);
        self.done();
    }

    /// Diff body for `unset_value`.
    pub(crate) fn apply_unset(&self) {
        if !self.has_value() {
            return;
        }
        self.pend();
        self.unset();
        self.done();
    }

    /// Replace the stored value if it differs. Refreshes adapters and marks
    /// every dependent node's input as changed. Returns whether a write
    /// happened.
    ///
    /// Locks are never held across the adapter or dependent callouts.
    pub(crate) fn set(&self, value: T) -> bool {
        {
            let mut inner = self.inner.write();
            if let Some(current) = &inner.value {
                if current.same(&value) {
                    return false;
                }
            }
            inner.value = Some(value.clone());
        }
        self.refresh_adapters(Some(&value));
        self.notify_input_changed();
        true
    }

    pub(crate) fn unset(&self) {
        {
            let mut inner = self.inner.write();
            if inner.value.is_none() {
                return;
            }
            inner.value = None;
        }
        self.refresh_adapters(None);
        self.notify_input_changed();
    }

    /// Stale -> Pending, cascading to dependent nodes. Re-entrant pend is a
    /// no-op, which bounds the cascade to each node once per cycle.
    pub(crate) fn pend(&self) {
        {
            let mut inner = self.inner.write();
            if inner.state == PortState::Pending {
                return;
            }
            inner.state = PortState::Pending;
        }
        for dep in self.deps_snapshot() {
            if let Some(node) = dep.upgrade() {
                node.pend();
            }
        }
    }

    /// Finalization is split from `pend` so a parallel runner can run it on
    /// the main thread.
    pub(crate) fn done(&self) {
        self.inner.write().state = PortState::Stale;
    }

    fn refresh_adapters(&self, value: Option<&T>) {
        let sinks: Vec<Arc<dyn AdapterSink<T>>> = self
            .adapters
            .lock()
            .values()
            .map(|entry| Arc::clone(&entry.sink))
            .collect();
        for sink in sinks {
            match value {
                Some(v) => sink.refresh(v),
                None => sink.clear(),
            }
        }
    }

    fn notify_input_changed(&self) {
        for dep in self.deps_snapshot() {
            if let Some(node) = dep.upgrade() {
                node.input_changed();
            }
        }
    }

    fn deps_snapshot(&self) -> Vec<Weak<NodeCell>> {
        self.deps.lock().clone()
    }

    pub(crate) fn attach_dep(&self, node: Weak<NodeCell>) {
        self.deps.lock().push(node);
    }

    pub(crate) fn detach_dep(&self, node: &Weak<NodeCell>) {
        self.deps.lock().retain(|dep| !dep.ptr_eq(node));
    }

    /// Memoized adapter lookup: at most one adapter per destination type is
    /// ever created for a given source port.
    pub(crate) fn adapter<To>(self: &Arc<Self>) -> Arc<dyn crate::core::adapter::AdaptedRead<To>>
    where
        T: crate::core::value::Adapt<To>,
        To: PortValue,
    {
        adapter_for::<T, To>(self)
    }

    pub(crate) fn adapters_map(&self) -> &Mutex<HashMap<TypeId, AdapterEntry<T>>> {
        &self.adapters
    }
}

impl<T: PortValue> PortOps for PortCell<T> {
    fn pend(&self) {
        PortCell::pend(self);
    }

    fn done(&self) {
        PortCell::done(self);
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Internal accessor handed out by [`PortSource`] implementors.
#[doc(hidden)]
pub struct SourceRef<T: PortValue>(pub(crate) Weak<PortCell<T>>);

/// Anything a node input can be wired from: a mutable [`Port`] or a node
/// output [`Output`].
pub trait PortSource: sealed::Sealed {
    type Elem: PortValue;
    #[doc(hidden)]
    fn source(&self) -> SourceRef<Self::Elem>;
}

/// Mutable, readable handle to a port.
///
/// Writes are deferred: `set_value` / `unset_value` enqueue a diff that is
/// applied on the next commit drain. Handles are weak; once the owning
/// graph or node releases the port, writes become no-ops and reads report
/// no value.
pub struct Port<T: PortValue> {
    pub(crate) cell: Weak<PortCell<T>>,
}

impl<T: PortValue> Clone for Port<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T: PortValue> Port<T> {
    pub(crate) fn from_cell(cell: &Arc<PortCell<T>>) -> Self {
        Self {
            cell: Arc::downgrade(cell),
        }
    }

    /// The last applied value.
    ///
    /// # Panics
    ///
    /// Panics if the port has no value (`has_value()` is false) or has been
    /// removed. Check `has_value` first.
    pub fn value(&self) -> T {
        self.cell
            .upgrade()
            .and_then(|cell| cell.read())
            .expect("value() called on a port with no value")
    }

    pub fn has_value(&self) -> bool {
        self.cell
            .upgrade()
            .is_some_and(|cell| cell.has_value())
    }

    pub fn is_ready(&self) -> bool {
        self.cell.upgrade().is_some_and(|cell| cell.is_ready())
    }

    /// Schedule a value replacement. Applied on the next commit; writes
    /// equal (by `PortValue::same`) to the then-current value are dropped
    /// without waking anything downstream.
    pub fn set_value(&self, value: T) {
        let Some(cell) = self.cell.upgrade() else {
            tracing::trace!("[Port] set_value on a removed port, ignoring");
            return;
        };
        let Some(diffs) = cell.diffs.upgrade() else {
            return;
        };
        let weak = self.cell.clone();
        diffs.push(Box::new(move |_| {
            if let Some(cell) = weak.upgrade() {
                cell.apply_set(value);
            }
        }));
    }

    /// Schedule the value to be cleared. Downstream nodes become not-ready
    /// until the port is set again.
    pub fn unset_value(&self) {
        let Some(cell) = self.cell.upgrade() else {
            tracing::trace!("[Port] unset_value on a removed port, ignoring");
            return;
        };
        let Some(diffs) = cell.diffs.upgrade() else {
            return;
        };
        let weak = self.cell.clone();
        diffs.push(Box::new(move |_| {
            if let Some(cell) = weak.upgrade() {
                cell.apply_unset();
            }
        }));
    }
}

impl<T: PortValue> sealed::Sealed for Port<T> {}

impl<T: PortValue> PortSource for Port<T> {
    type Elem = T;

    fn source(&self) -> SourceRef<T> {
        SourceRef(self.cell.clone())
    }
}

impl<T: PortValue> std::fmt::Debug for Port<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Port")
            .field("has_value", &self.has_value())
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Read-only handle to a node's required output port.
pub struct Output<T: PortValue> {
    pub(crate) cell: Weak<PortCell<T>>,
}

impl<T: PortValue> Clone for Output<T> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
        }
    }
}

impl<T: PortValue> Output<T> {
    pub(crate) fn from_cell(cell: &Arc<PortCell<T>>) -> Self {
        Self {
            cell: Arc::downgrade(cell),
        }
    }

    /// The last value the owning node produced.
    ///
    /// # Panics
    ///
    /// Panics if the node has not produced a value yet or has been removed.
    pub fn value(&self) -> T {
        self.cell
            .upgrade()
            .and_then(|cell| cell.read())
            .expect("value() called on a port with no value")
    }

    pub fn has_value(&self) -> bool {
        self.cell
            .upgrade()
            .is_some_and(|cell| cell.has_value())
    }

    pub fn is_ready(&self) -> bool {
        self.cell.upgrade().is_some_and(|cell| cell.is_ready())
    }
}

impl<T: PortValue> sealed::Sealed for Output<T> {}

impl<T: PortValue> PortSource for Output<T> {
    type Elem = T;

    fn source(&self) -> SourceRef<T> {
        SourceRef(self.cell.clone())
    }
}

impl<T: PortValue> std::fmt::Debug for Output<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Output")
            .field("has_value", &self.has_value())
            .field("ready", &self.is_ready())
            .finish()
    }
}
