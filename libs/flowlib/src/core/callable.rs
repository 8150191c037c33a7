// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Callable shape classification.
//!
//! A node callable is classified at configuration time into:
//!
//! - an optional leading `&CoreHandle` parameter,
//! - an optional tuple-of-[`Port`] optional-outputs parameter,
//! - zero or more `&T` value inputs,
//! - a return of `()`, a single value, or a tuple of values (the required
//!   outputs).
//!
//! Each accepted combination is a [`NodeCallable`] impl; anything else
//! (mutable references, by-value inputs, non-[`PortValue`] element types)
//! simply has no impl and is rejected by the compiler at the registration
//! call site. The marker parameter keeps the impl family coherent and lets
//! inference pick the right shape from the closure's own signature.

use std::sync::{Arc, Weak};

use crate::core::adapter::{make_slot, InputSlot, SlotOps};
use crate::core::diffs::DiffQueue;
use crate::core::engine::CoreHandle;
use crate::core::error::FlowError;
use crate::core::node::NodeCell;
use crate::core::port::{Output, Port, PortCell, PortOps, PortSource};
use crate::core::value::{Adapt, PortValue};

/// Shape tags embedded in [`NodeCallable`] markers.
pub mod shapes {
    pub struct Plain;
    pub struct WithCore;
    pub struct WithOpt;
    pub struct WithCoreOpt;
}

/// Return-shape tags embedded in [`OutputBundle`] markers.
pub struct VoidOutput;
pub struct SingleOutput;
pub struct TupleOutput;

/// Everything a callable needs to materialize itself as a node.
pub struct BindContext {
    pub(crate) diffs: Weak<DiffQueue>,
    pub(crate) core: CoreHandle,
}

/// Result of binding: the execution cell plus the typed output handles.
pub struct BoundNode<H> {
    pub(crate) cell: Arc<NodeCell>,
    pub(crate) handles: H,
}

fn node_score(input_scores: &[u32]) -> u32 {
    1 + input_scores.iter().copied().max().unwrap_or(0)
}

fn make_opt_port<Z: PortValue>(score: u32, diffs: &Weak<DiffQueue>) -> (Arc<PortCell<Z>>, Port<Z>) {
    let cell = PortCell::new(score, diffs.clone(), None);
    let handle = Port::from_cell(&cell);
    (cell, handle)
}

/// Classification of a callable's return value into required output ports.
pub trait OutputBundle<M>: Send + 'static {
    type Cells: Send + Sync + Clone + 'static;
    type Handles: Clone;

    fn create(score: u32, diffs: &Weak<DiffQueue>)
        -> (Self::Cells, Self::Handles, Vec<Arc<dyn PortOps>>);

    /// Apply the required-output write rule: each value is compared to the
    /// port's current one and only written (and propagated) on inequality.
    fn write(self, cells: &Self::Cells);
}

impl OutputBundle<VoidOutput> for () {
    type Cells = ();
    type Handles = ();

    fn create(_: u32, _: &Weak<DiffQueue>) -> ((), (), Vec<Arc<dyn PortOps>>) {
        ((), (), Vec::new())
    }

    fn write(self, _: &()) {}
}

impl<T: PortValue> OutputBundle<SingleOutput> for T {
    type Cells = (Arc<PortCell<T>>,);
    type Handles = (Output<T>,);

    fn create(
        score: u32,
        diffs: &Weak<DiffQueue>,
    ) -> (Self::Cells, Self::Handles, Vec<Arc<dyn PortOps>>) {
        let cell = PortCell::new(score, diffs.clone(), None);
        let handles = (Output::from_cell(&cell),);
        let ops: Vec<Arc<dyn PortOps>> = vec![Arc::clone(&cell) as Arc<dyn PortOps>];
        ((cell,), handles, ops)
    }

    fn write(self, cells: &Self::Cells) {
        cells.0.set(self);
    }
}

macro_rules! impl_output_bundle_tuple {
    ($(($T:ident, $cell:ident, $idx:tt)),+) => {
        impl<$($T: PortValue),+> OutputBundle<TupleOutput> for ($($T,)+) {
            type Cells = ($(Arc<PortCell<$T>>,)+);
            type Handles = ($(Output<$T>,)+);

            fn create(
                score: u32,
                diffs: &Weak<DiffQueue>,
            ) -> (Self::Cells, Self::Handles, Vec<Arc<dyn PortOps>>) {
                $(let $cell: Arc<PortCell<$T>> = PortCell::new(score, diffs.clone(), None);)+
                let handles = ($(Output::from_cell(&$cell),)+);
                let ops: Vec<Arc<dyn PortOps>> =
                    vec![$(Arc::clone(&$cell) as Arc<dyn PortOps>),+];
                (($($cell,)+), handles, ops)
            }

            fn write(self, cells: &Self::Cells) {
                $(cells.$idx.set(self.$idx);)+
            }
        }
    };
}

impl_output_bundle_tuple!((O0, c0, 0));
impl_output_bundle_tuple!((O0, c0, 0), (O1, c1, 1));
impl_output_bundle_tuple!((O0, c0, 0), (O1, c1, 1), (O2, c2, 2));
impl_output_bundle_tuple!((O0, c0, 0), (O1, c1, 1), (O2, c2, 2), (O3, c3, 3));
impl_output_bundle_tuple!((O0, c0, 0), (O1, c1, 1), (O2, c2, 2), (O3, c3, 3), (O4, c4, 4));

/// Conversion from user-facing handle tuples to typed input slots,
/// inserting adapters where the element types differ.
pub trait IntoSlots<S> {
    fn into_slots(self) -> S;
}

impl IntoSlots<()> for () {
    fn into_slots(self) {}
}

macro_rules! impl_into_slots {
    ($(($S:ident, $A:ident, $idx:tt)),+) => {
        impl<'a, $($S, $A),+> IntoSlots<($(InputSlot<$A>,)+)> for ($(&'a $S,)+)
        where
            $(
                $S: PortSource,
                $A: PortValue,
                <$S as PortSource>::Elem: Adapt<$A>,
            )+
        {
            fn into_slots(self) -> ($(InputSlot<$A>,)+) {
                (
                    $(make_slot::<<$S as PortSource>::Elem, $A>(self.$idx.source().0),)+
                )
            }
        }
    };
}

impl_into_slots!((S0, A0, 0));
impl_into_slots!((S0, A0, 0), (S1, A1, 1));
impl_into_slots!((S0, A0, 0), (S1, A1, 1), (S2, A2, 2));
impl_into_slots!((S0, A0, 0), (S1, A1, 1), (S2, A2, 2), (S3, A3, 3));
impl_into_slots!((S0, A0, 0), (S1, A1, 1), (S2, A2, 2), (S3, A3, 3), (S4, A4, 4));

/// A callable acceptable as a node body, classified by the marker `M`.
pub trait NodeCallable<M>: Send + Sized + 'static {
    /// Tuple of typed input slots consumed at bind time.
    type Slots;
    /// Output handles exposed to the caller.
    type Handles: Clone;

    #[doc(hidden)]
    fn bind(self, cx: &BindContext, slots: Self::Slots) -> BoundNode<Self::Handles>;
}

macro_rules! impl_node_callable_plain {
    ($(($A:ident, $slot:ident, $val:ident)),*) => {
        impl<Fun, Ret, RM $(, $A)*> NodeCallable<(shapes::Plain, ($($A,)*), Ret, RM)> for Fun
        where
            Fun: Fn($(&$A),*) -> Ret + Send + 'static,
            Ret: OutputBundle<RM>,
            RM: 'static,
            $($A: PortValue,)*
        {
            type Slots = ($(InputSlot<$A>,)*);
            type Handles = <Ret as OutputBundle<RM>>::Handles;

            fn bind(self, cx: &BindContext, slots: Self::Slots) -> BoundNode<Self::Handles> {
                let ($($slot,)*) = slots;
                let score = node_score(&[$($slot.score()),*]);
                let (cells, handles, ops) = <Ret as OutputBundle<RM>>::create(score, &cx.diffs);
                let slot_ops: Vec<Box<dyn SlotOps>> = vec![$(Box::new($slot.clone())),*];
                let f = self;
                let body = move || {
                    $(
                        let Some($val) = $slot.read() else {
                            return Err(FlowError::InputUnavailable);
                        };
                    )*
                    let result = f($(&$val),*);
                    result.write(&cells);
                    Ok(())
                };
                let cell = NodeCell::new(score, Box::new(body), ops, Vec::new(), slot_ops);
                BoundNode { cell, handles }
            }
        }
    };
}

impl_node_callable_plain!();
impl_node_callable_plain!((A0, s0, v0));
impl_node_callable_plain!((A0, s0, v0), (A1, s1, v1));
impl_node_callable_plain!((A0, s0, v0), (A1, s1, v1), (A2, s2, v2));
impl_node_callable_plain!((A0, s0, v0), (A1, s1, v1), (A2, s2, v2), (A3, s3, v3));
impl_node_callable_plain!(
    (A0, s0, v0),
    (A1, s1, v1),
    (A2, s2, v2),
    (A3, s3, v3),
    (A4, s4, v4)
);

macro_rules! impl_node_callable_core {
    ($(($A:ident, $slot:ident, $val:ident)),*) => {
        impl<Fun, Ret, RM $(, $A)*> NodeCallable<(shapes::WithCore, ($($A,)*), Ret, RM)> for Fun
        where
            Fun: Fn(&CoreHandle $(, &$A)*) -> Ret + Send + 'static,
            Ret: OutputBundle<RM>,
            RM: 'static,
            $($A: PortValue,)*
        {
            type Slots = ($(InputSlot<$A>,)*);
            type Handles = <Ret as OutputBundle<RM>>::Handles;

            fn bind(self, cx: &BindContext, slots: Self::Slots) -> BoundNode<Self::Handles> {
                let ($($slot,)*) = slots;
                let score = node_score(&[$($slot.score()),*]);
                let (cells, handles, ops) = <Ret as OutputBundle<RM>>::create(score, &cx.diffs);
                let slot_ops: Vec<Box<dyn SlotOps>> = vec![$(Box::new($slot.clone())),*];
                let core = cx.core.clone();
                let f = self;
                let body = move || {
                    $(
                        let Some($val) = $slot.read() else {
                            return Err(FlowError::InputUnavailable);
                        };
                    )*
                    let result = f(&core $(, &$val)*);
                    result.write(&cells);
                    Ok(())
                };
                let cell = NodeCell::new(score, Box::new(body), ops, Vec::new(), slot_ops);
                BoundNode { cell, handles }
            }
        }
    };
}

impl_node_callable_core!();
impl_node_callable_core!((A0, s0, v0));
impl_node_callable_core!((A0, s0, v0), (A1, s1, v1));
impl_node_callable_core!((A0, s0, v0), (A1, s1, v1), (A2, s2, v2));
impl_node_callable_core!((A0, s0, v0), (A1, s1, v1), (A2, s2, v2), (A3, s3, v3));

macro_rules! impl_node_callable_opt {
    (($(($Z:ident, $zcell:ident, $zport:ident)),+); $(($A:ident, $slot:ident, $val:ident)),*) => {
        impl<Fun, Ret, RM $(, $Z)+ $(, $A)*>
            NodeCallable<(shapes::WithOpt, ($($Z,)+), ($($A,)*), Ret, RM)> for Fun
        where
            Fun: Fn(($(Port<$Z>,)+) $(, &$A)*) -> Ret + Send + 'static,
            Ret: OutputBundle<RM>,
            RM: 'static,
            $($Z: PortValue,)+
            $($A: PortValue,)*
        {
            type Slots = ($(InputSlot<$A>,)*);
            type Handles = (<Ret as OutputBundle<RM>>::Handles, ($(Port<$Z>,)+));

            fn bind(self, cx: &BindContext, slots: Self::Slots) -> BoundNode<Self::Handles> {
                let ($($slot,)*) = slots;
                let score = node_score(&[$($slot.score()),*]);
                let (cells, req_handles, ops) =
                    <Ret as OutputBundle<RM>>::create(score, &cx.diffs);
                $(let ($zcell, $zport) = make_opt_port::<$Z>(score, &cx.diffs);)+
                let opt_keep: Vec<Arc<dyn PortOps>> =
                    vec![$(Arc::clone(&$zcell) as Arc<dyn PortOps>),+];
                let opt_handles = ($($zport,)+);
                let handles = (req_handles, opt_handles.clone());
                let slot_ops: Vec<Box<dyn SlotOps>> = vec![$(Box::new($slot.clone())),*];
                let f = self;
                let body = move || {
                    $(
                        let Some($val) = $slot.read() else {
                            return Err(FlowError::InputUnavailable);
                        };
                    )*
                    let result = f(opt_handles.clone() $(, &$val)*);
                    result.write(&cells);
                    Ok(())
                };
                let cell = NodeCell::new(score, Box::new(body), ops, opt_keep, slot_ops);
                BoundNode { cell, handles }
            }
        }
    };
}

impl_node_callable_opt!(((Z0, zc0, zp0)); );
impl_node_callable_opt!(((Z0, zc0, zp0)); (A0, s0, v0));
impl_node_callable_opt!(((Z0, zc0, zp0)); (A0, s0, v0), (A1, s1, v1));
impl_node_callable_opt!(((Z0, zc0, zp0)); (A0, s0, v0), (A1, s1, v1), (A2, s2, v2));
impl_node_callable_opt!(((Z0, zc0, zp0), (Z1, zc1, zp1)); );
impl_node_callable_opt!(((Z0, zc0, zp0), (Z1, zc1, zp1)); (A0, s0, v0));
impl_node_callable_opt!(((Z0, zc0, zp0), (Z1, zc1, zp1)); (A0, s0, v0), (A1, s1, v1));
impl_node_callable_opt!(((Z0, zc0, zp0), (Z1, zc1, zp1), (Z2, zc2, zp2)); );
impl_node_callable_opt!(((Z0, zc0, zp0), (Z1, zc1, zp1), (Z2, zc2, zp2)); (A0, s0, v0));

macro_rules! impl_node_callable_core_opt {
    (($(($Z:ident, $zcell:ident, $zport:ident)),+); $(($A:ident, $slot:ident, $val:ident)),*) => {
        impl<Fun, Ret, RM $(, $Z)+ $(, $A)*>
            NodeCallable<(shapes::WithCoreOpt, ($($Z,)+), ($($A,)*), Ret, RM)> for Fun
        where
            Fun: Fn(&CoreHandle, ($(Port<$Z>,)+) $(, &$A)*) -> Ret + Send + 'static,
            Ret: OutputBundle<RM>,
            RM: 'static,
            $($Z: PortValue,)+
            $($A: PortValue,)*
        {
            type Slots = ($(InputSlot<$A>,)*);
            type Handles = (<Ret as OutputBundle<RM>>::Handles, ($(Port<$Z>,)+));

            fn bind(self, cx: &BindContext, slots: Self::Slots) -> BoundNode<Self::Handles> {
                let ($($slot,)*) = slots;
                let score = node_score(&[$($slot.score()),*]);
                let (cells, req_handles, ops) =
                    <Ret as OutputBundle<RM>>::create(score, &cx.diffs);
                $(let ($zcell, $zport) = make_opt_port::<$Z>(score, &cx.diffs);)+
                let opt_keep: Vec<Arc<dyn PortOps>> =
                    vec![$(Arc::clone(&$zcell) as Arc<dyn PortOps>),+];
                let opt_handles = ($($zport,)+);
                let handles = (req_handles, opt_handles.clone());
                let slot_ops: Vec<Box<dyn SlotOps>> = vec![$(Box::new($slot.clone())),*];
                let core = cx.core.clone();
                let f = self;
                let body = move || {
                    $(
                        let Some($val) = $slot.read() else {
                            return Err(FlowError::InputUnavailable);
                        };
                    )*
                    let result = f(&core, opt_handles.clone() $(, &$val)*);
                    result.write(&cells);
                    Ok(())
                };
                let cell = NodeCell::new(score, Box::new(body), ops, opt_keep, slot_ops);
                BoundNode { cell, handles }
            }
        }
    };
}

impl_node_callable_core_opt!(((Z0, zc0, zp0)); );
impl_node_callable_core_opt!(((Z0, zc0, zp0)); (A0, s0, v0));
impl_node_callable_core_opt!(((Z0, zc0, zp0)); (A0, s0, v0), (A1, s1, v1));
impl_node_callable_core_opt!(((Z0, zc0, zp0), (Z1, zc1, zp1)); (A0, s0, v0));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_score_floor() {
        assert_eq!(node_score(&[]), 1);
        assert_eq!(node_score(&[0, 3, 2]), 4);
    }
}
