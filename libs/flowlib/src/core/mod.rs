// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Core engine: graph data model, commit protocol, and runner contract.

pub mod adapter;
pub mod batch;
pub mod callable;
mod diffs;
pub mod engine;
pub mod error;
pub mod graph;
pub mod node;
pub mod port;
pub mod runners;
pub mod uniform;
pub mod value;

pub use adapter::InputSlot;
pub use batch::Batch;
pub use callable::{
    shapes, BindContext, BoundNode, IntoSlots, NodeCallable, OutputBundle, SingleOutput,
    TupleOutput, VoidOutput,
};
pub use engine::{CoreHandle, CycleWork, FlowCore};
pub use error::{FlowError, Result};
pub use graph::Graph;
pub use node::{NodeHandle, NodeRef, RunOutcome, ScheduledNode};
pub use port::{Output, Port, PortSource, SourceRef};
pub use runners::{Immediate, NonBlocking, Parallel, Runner, SoftBlocking};
pub use uniform::{UniformArgs, UniformBody, UniformInput, UniformNode};
pub use value::{Adapt, PortValue};
