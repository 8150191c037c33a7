// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Synchronous in-place execution.

use crate::core::engine::CycleWork;
use crate::core::runners::Runner;

/// Runs the drain and every node on the calling thread; `commit()` returns
/// only after the cycle completed. The default runner, and the one that
/// makes commits fully deterministic.
pub struct Immediate;

impl Runner for Immediate {
    fn run(&self, work: CycleWork) {
        let nodes = work.prepare();
        for node in &nodes {
            if node.run().is_failure() {
                tracing::warn!("[Immediate] Cycle torn down after node failure");
                break;
            }
        }
    }
}
