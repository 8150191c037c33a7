// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Atomic write groups.
//!
//! A [`Batch`] stages port writes locally and appends them to the diff
//! queue as one group when released, so every write in the group becomes
//! visible in the same drain pass. Release happens on drop (any exit path)
//! or through an explicit [`close`](Batch::close).

use std::sync::Arc;

use crate::core::diffs::{Diff, DiffQueue};
use crate::core::port::Port;
use crate::core::value::PortValue;

pub struct Batch {
    /// None when the owning core is already gone; writes are then dropped.
    diffs: Option<Arc<DiffQueue>>,
    staged: Vec<Diff>,
}

impl Batch {
    pub(crate) fn new(diffs: Option<Arc<DiffQueue>>) -> Self {
        Self {
            diffs,
            staged: Vec::new(),
        }
    }

    /// Stage a value replacement. Same deferred semantics as
    /// [`Port::set_value`], but grouped with the rest of the batch.
    pub fn set_value<T: PortValue>(&mut self, port: &Port<T>, value: T) {
        let weak = port.cell.clone();
        self.staged.push(Box::new(move |_| {
            if let Some(cell) = weak.upgrade() {
                cell.apply_set(value);
            }
        }));
    }

    /// Stage a value clear.
    pub fn unset_value<T: PortValue>(&mut self, port: &Port<T>) {
        let weak = port.cell.clone();
        self.staged.push(Box::new(move |_| {
            if let Some(cell) = weak.upgrade() {
                cell.apply_unset();
            }
        }));
    }

    /// Explicit release. Equivalent to dropping the batch.
    pub fn close(self) {}
}

impl Drop for Batch {
    fn drop(&mut self) {
        if self.staged.is_empty() {
            return;
        }
        let staged = std::mem::take(&mut self.staged);
        if let Some(diffs) = &self.diffs {
            tracing::trace!("[Batch] Releasing {} grouped writes", staged.len());
            diffs.push(Box::new(move |graph| {
                for diff in staged {
                    diff(graph);
                }
            }));
        }
    }
}
