// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! flowlib: reactive dataflow engine
//!
//! A directed acyclic graph of computational nodes connected by typed
//! ports. Port writes are batched as diffs and applied atomically at
//! commit time, which re-executes only the affected sub-graph in
//! topological order. Execution strategy is pluggable: synchronous,
//! single background worker (waited or fire-and-forget), or a thread
//! pool with a serialized main loop.
//!
//! ```
//! use flowlib::FlowCore;
//!
//! let core = FlowCore::new();
//! let a = core.port_with(0_i32);
//! let b = core.node(|x: &i32| *x + 1, (&a,));
//! let (b_out,) = b.outputs();
//! let c = core.node(|x: &i32| *x + 1, (&b_out,));
//! let (c_out,) = c.outputs();
//!
//! core.commit();
//! assert_eq!(b_out.value(), 1);
//! assert_eq!(c_out.value(), 2);
//!
//! a.set_value(10);
//! core.commit();
//! assert_eq!(c_out.value(), 12);
//! ```

pub mod core;

pub use core::{
    Adapt, Batch, CoreHandle, CycleWork, FlowCore, FlowError, Graph, Immediate, NodeHandle,
    NodeRef, NonBlocking, Output, Parallel, Port, PortSource, PortValue, Result, RunOutcome,
    Runner, ScheduledNode, SoftBlocking, UniformArgs, UniformInput, UniformNode,
};
