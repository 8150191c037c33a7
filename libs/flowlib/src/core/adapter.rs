// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Lazy type adaptation between structurally compatible ports.
//!
//! When a node input of type `To` is wired to a port of type `From`, the
//! wiring goes through an adapter that runs the [`Adapt`] conversion once
//! per applied source value and caches the result. Same-type wiring skips
//! the cache entirely and reads the source port directly.
//!
//! Readiness is always delegated to the source port: an unset source means
//! a not-ready input, converted or not.

use std::any::{Any, TypeId};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::core::node::NodeCell;
use crate::core::port::{AdapterEntry, PortCell};
use crate::core::value::{Adapt, PortValue};

/// Source-port-side view of an adapter: called on every applied value.
pub(crate) trait AdapterSink<T>: Send + Sync {
    fn refresh(&self, value: &T);
    fn clear(&self);
}

/// Input-side view of an adapter: what a node input slot reads through.
pub(crate) trait AdaptedRead<To>: Send + Sync {
    fn read(&self) -> Option<To>;
    fn is_ready(&self) -> bool;
    fn score(&self) -> u32;
    fn attach(&self, node: Weak<NodeCell>);
    fn detach(&self, node: &Weak<NodeCell>);
}

struct AdapterCell<Src: PortValue, To: PortValue> {
    source: Weak<PortCell<Src>>,
    cache: RwLock<Option<To>>,
}

impl<Src: Adapt<To>, To: PortValue> AdapterSink<Src> for AdapterCell<Src, To> {
    fn refresh(&self, value: &Src) {
        *self.cache.write() = Some(value.adapt());
    }

    fn clear(&self) {
        *self.cache.write() = None;
    }
}

impl<Src: PortValue, To: PortValue> AdaptedRead<To> for AdapterCell<Src, To> {
    fn read(&self) -> Option<To> {
        self.cache.read().clone()
    }

    fn is_ready(&self) -> bool {
        self.source.upgrade().is_some_and(|port| port.is_ready())
    }

    fn score(&self) -> u32 {
        self.source.upgrade().map_or(0, |port| port.score())
    }

    fn attach(&self, node: Weak<NodeCell>) {
        if let Some(port) = self.source.upgrade() {
            port.attach_dep(node);
        }
    }

    fn detach(&self, node: &Weak<NodeCell>) {
        if let Some(port) = self.source.upgrade() {
            port.detach_dep(node);
        }
    }
}

/// Memoized adapter construction, keyed by destination type. The `Adapt`
/// impl is unique per (From, To) pair, so the destination `TypeId` doubles
/// as the conversion identity.
pub(crate) fn adapter_for<Src, To>(source: &Arc<PortCell<Src>>) -> Arc<dyn AdaptedRead<To>>
where
    Src: Adapt<To>,
    To: PortValue,
{
    let mut map = source.adapters_map().lock();
    if let Some(entry) = map.get(&TypeId::of::<To>()) {
        let cell = Arc::clone(&entry.any)
            .downcast::<AdapterCell<Src, To>>()
            .expect("adapter entry keyed by destination type");
        return cell;
    }

    let cell = Arc::new(AdapterCell::<Src, To> {
        source: Arc::downgrade(source),
        cache: RwLock::new(source.read().map(|value| value.adapt())),
    });
    map.insert(
        TypeId::of::<To>(),
        AdapterEntry {
            sink: Arc::clone(&cell) as Arc<dyn AdapterSink<Src>>,
            any: Arc::clone(&cell) as Arc<dyn Any + Send + Sync>,
        },
    );
    cell
}

enum SlotKind<To: PortValue> {
    /// Source port already gone at bind time; permanently not ready.
    Dead,
    /// Same-type wiring: read the source storage directly.
    Direct(Weak<PortCell<To>>),
    /// Cross-type wiring through a cached conversion.
    Adapted(Arc<dyn AdaptedRead<To>>),
}

impl<To: PortValue> Clone for SlotKind<To> {
    fn clone(&self) -> Self {
        match self {
            SlotKind::Dead => SlotKind::Dead,
            SlotKind::Direct(weak) => SlotKind::Direct(weak.clone()),
            SlotKind::Adapted(adapter) => SlotKind::Adapted(Arc::clone(adapter)),
        }
    }
}

/// One bound node input.
pub struct InputSlot<To: PortValue> {
    kind: SlotKind<To>,
}

impl<To: PortValue> Clone for InputSlot<To> {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind.clone(),
        }
    }
}

impl<To: PortValue> InputSlot<To> {
    pub(crate) fn dead() -> Self {
        Self {
            kind: SlotKind::Dead,
        }
    }

    pub(crate) fn read(&self) -> Option<To> {
        match &self.kind {
            SlotKind::Dead => None,
            SlotKind::Direct(weak) => weak.upgrade().and_then(|port| port.read()),
            SlotKind::Adapted(adapter) => adapter.read(),
        }
    }

    pub(crate) fn is_ready(&self) -> bool {
        match &self.kind {
            SlotKind::Dead => false,
            SlotKind::Direct(weak) => weak.upgrade().is_some_and(|port| port.is_ready()),
            SlotKind::Adapted(adapter) => adapter.is_ready(),
        }
    }

    pub(crate) fn score(&self) -> u32 {
        match &self.kind {
            SlotKind::Dead => 0,
            SlotKind::Direct(weak) => weak.upgrade().map_or(0, |port| port.score()),
            SlotKind::Adapted(adapter) => adapter.score(),
        }
    }

    pub(crate) fn attach(&self, node: Weak<NodeCell>) {
        match &self.kind {
            SlotKind::Dead => {}
            SlotKind::Direct(weak) => {
                if let Some(port) = weak.upgrade() {
                    port.attach_dep(node);
                }
            }
            SlotKind::Adapted(adapter) => adapter.attach(node),
        }
    }

    pub(crate) fn detach(&self, node: &Weak<NodeCell>) {
        match &self.kind {
            SlotKind::Dead => {}
            SlotKind::Direct(weak) => {
                if let Some(port) = weak.upgrade() {
                    port.detach_dep(node);
                }
            }
            SlotKind::Adapted(adapter) => adapter.detach(node),
        }
    }
}

/// Object-safe slot surface kept on the node for readiness checks and
/// teardown.
pub(crate) trait SlotOps: Send + Sync {
    fn is_ready(&self) -> bool;
    fn attach(&self, node: Weak<NodeCell>);
    fn detach(&self, node: &Weak<NodeCell>);
}

impl<To: PortValue> SlotOps for InputSlot<To> {
    fn is_ready(&self) -> bool {
        InputSlot::is_ready(self)
    }

    fn attach(&self, node: Weak<NodeCell>) {
        InputSlot::attach(self, node);
    }

    fn detach(&self, node: &Weak<NodeCell>) {
        InputSlot::detach(self, node);
    }
}

/// Build the slot for one input, bypassing the adapter when source and
/// destination types coincide.
pub(crate) fn make_slot<Src, To>(source: Weak<PortCell<Src>>) -> InputSlot<To>
where
    Src: Adapt<To>,
    To: PortValue,
{
    let Some(port) = source.upgrade() else {
        return InputSlot::dead();
    };
    if TypeId::of::<Src>() == TypeId::of::<To>() {
        let any: Arc<dyn Any + Send + Sync> = port;
        let typed = any
            .downcast::<PortCell<To>>()
            .expect("same-type slot downcast");
        InputSlot {
            kind: SlotKind::Direct(Arc::downgrade(&typed)),
        }
    } else {
        InputSlot {
            kind: SlotKind::Adapted(port.adapter::<To>()),
        }
    }
}
