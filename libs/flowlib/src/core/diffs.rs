// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! The deferred-mutation queue.
//!
//! Every externally visible mutation (port writes, structural edits, user
//! closures) lands here as a diff and is applied in FIFO order at the start
//! of the next commit cycle. `push` is callable from any thread; `flush` is
//! called only from the serialized commit path.

use parking_lot::Mutex;

use crate::core::graph::Graph;

/// A deferred mutation. Port-write diffs ignore the graph argument;
/// structural diffs use it.
pub(crate) type Diff = Box<dyn FnOnce(&mut Graph) + Send>;

#[derive(Default)]
pub(crate) struct DiffQueue {
    queue: Mutex<Vec<Diff>>,
}

impl DiffQueue {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&self, diff: Diff) {
        self.queue.lock().push(diff);
    }

    /// Swap the buffer for an empty one and return a single-shot closure
    /// that applies the drained diffs in enqueue order.
    pub(crate) fn flush(&self) -> Box<dyn FnOnce(&mut Graph) + Send> {
        let drained = std::mem::take(&mut *self.queue.lock());
        if !drained.is_empty() {
            tracing::trace!("[DiffQueue] Draining {} diffs", drained.len());
        }
        Box::new(move |graph: &mut Graph| {
            for diff in drained {
                diff(graph);
            }
        })
    }
}
