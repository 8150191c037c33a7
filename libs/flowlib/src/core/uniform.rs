// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The uniform (type-erased) node API.
//!
//! Registers nodes whose shape (input count, required and optional
//! output counts) is plain runtime data instead of a typed signature.
//! Every port of a uniform node carries the same element type; foreign
//! shims wrap their opaque values in one such type and drive the engine
//! entirely through this surface.
//!
//! Unlike the typed API, shape problems here cannot be compile errors:
//! registration returns a typed [`FlowError`], and a body returning the
//! wrong number of required outputs is a cycle-fatal fault.

use std::sync::{Arc, Weak};

use crate::core::adapter::{make_slot, InputSlot, SlotOps};
use crate::core::engine::CoreHandle;
use crate::core::error::{FlowError, Result};
use crate::core::graph::Graph;
use crate::core::node::NodeCell;
use crate::core::port::{Output, Port, PortCell, PortOps, PortSource};
use crate::core::value::PortValue;

/// One wired input of a uniform node.
pub struct UniformInput<T: PortValue> {
    cell: Weak<PortCell<T>>,
}

impl<T: PortValue> UniformInput<T> {
    pub fn new<S: PortSource<Elem = T>>(source: &S) -> Self {
        Self {
            cell: source.source().0,
        }
    }
}

/// What a uniform body sees on each execution. Handles are clones, so the
/// struct is self-contained and owns everything it carries.
pub struct UniformArgs<T: PortValue> {
    /// Handle to the owning core, for deferred posts and commits.
    pub core: CoreHandle,
    /// Input values, in declaration order.
    pub inputs: Vec<T>,
    /// Optional-output handles; writes ride the diff queue and surface
    /// next cycle.
    pub optional: Vec<Port<T>>,
    /// Number of values the body must return.
    pub required: usize,
}

pub type UniformBody<T> = Box<dyn FnMut(UniformArgs<T>) -> Vec<T> + Send>;

/// Registration data for a uniform node.
pub struct UniformNode<T: PortValue> {
    pub inputs: Vec<UniformInput<T>>,
    pub required: usize,
    pub optional: usize,
    pub body: UniformBody<T>,
}

impl Graph {
    /// Register a uniform node. Returns its output handles, required
    /// outputs first, then optional outputs.
    pub fn unode<T: PortValue>(&mut self, info: UniformNode<T>) -> Result<Vec<Output<T>>> {
        for (index, input) in info.inputs.iter().enumerate() {
            if input.cell.upgrade().is_none() {
                return Err(FlowError::DeadInputPort { index });
            }
        }

        let diffs = Arc::downgrade(self.diffs());
        let score = 1 + info
            .inputs
            .iter()
            .filter_map(|input| input.cell.upgrade())
            .map(|cell| cell.score())
            .max()
            .unwrap_or(0);

        let req_cells: Vec<Arc<PortCell<T>>> = (0..info.required)
            .map(|_| PortCell::new(score, diffs.clone(), None))
            .collect();
        let opt_cells: Vec<Arc<PortCell<T>>> = (0..info.optional)
            .map(|_| PortCell::new(score, diffs.clone(), None))
            .collect();

        let mut outputs: Vec<Output<T>> = req_cells.iter().map(Output::from_cell).collect();
        outputs.extend(opt_cells.iter().map(Output::from_cell));

        let slots: Vec<InputSlot<T>> = info
            .inputs
            .iter()
            .map(|input| make_slot::<T, T>(input.cell.clone()))
            .collect();
        let slot_ops: Vec<Box<dyn SlotOps>> = slots
            .iter()
            .map(|slot| Box::new(slot.clone()) as Box<dyn SlotOps>)
            .collect();
        let ops: Vec<Arc<dyn PortOps>> = req_cells
            .iter()
            .map(|cell| Arc::clone(cell) as Arc<dyn PortOps>)
            .collect();
        let opt_keep: Vec<Arc<dyn PortOps>> = opt_cells
            .iter()
            .map(|cell| Arc::clone(cell) as Arc<dyn PortOps>)
            .collect();

        let core = self.core_handle();
        let opt_handles: Vec<Port<T>> = opt_cells.iter().map(Port::from_cell).collect();
        let required = info.required;
        let mut body = info.body;
        let exec = move || -> std::result::Result<(), FlowError> {
            let mut values = Vec::with_capacity(slots.len());
            for slot in &slots {
                match slot.read() {
                    Some(value) => values.push(value),
                    None => return Err(FlowError::InputUnavailable),
                }
            }
            let result = body(UniformArgs {
                core: core.clone(),
                inputs: values,
                optional: opt_handles.clone(),
                required,
            });
            if result.len() != required {
                return Err(FlowError::OutputShape {
                    expected: required,
                    got: result.len(),
                });
            }
            for (cell, value) in req_cells.iter().zip(result) {
                cell.set(value);
            }
            Ok(())
        };

        let cell = NodeCell::new(score, Box::new(exec), ops, opt_keep, slot_ops);
        cell.attach_inputs();
        self.insert_node(cell);
        Ok(outputs)
    }
}
