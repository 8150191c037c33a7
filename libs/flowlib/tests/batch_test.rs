// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Integration tests for atomic write batches.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use flowlib::FlowCore;

#[test]
fn test_batch_writes_apply_in_one_drain() {
    let core = FlowCore::new();
    let p = core.port_with(0_i32);
    let q = core.port_with(0_i32);

    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    let s = core.node(
        move |p: &i32, q: &i32| {
            counter.fetch_add(1, Ordering::SeqCst);
            *p + *q
        },
        (&p, &q),
    );
    let (s_out,) = s.outputs();

    core.commit();
    assert_eq!(s_out.value(), 0);
    assert_eq!(runs.load(Ordering::SeqCst), 1);

    let mut batch = core.batch();
    batch.set_value(&p, 3);
    batch.set_value(&q, 4);
    batch.close();

    core.commit();
    // One execution observing the pair atomically.
    assert_eq!(s_out.value(), 7);
    assert_eq!(runs.load(Ordering::SeqCst), 2);
}

#[test]
fn test_batch_releases_on_drop() {
    let core = FlowCore::new();
    let p = core.port_with(0_i32);

    {
        let mut batch = core.batch();
        batch.set_value(&p, 11);
        // Dropped here without an explicit close.
    }

    core.commit();
    assert_eq!(p.value(), 11);
}

#[test]
fn test_writes_staged_before_release_are_invisible() {
    let core = FlowCore::new();
    let p = core.port_with(0_i32);

    let mut batch = core.batch();
    batch.set_value(&p, 11);

    // The batch is still open: a commit sees nothing.
    core.commit();
    assert_eq!(p.value(), 0);

    batch.close();
    core.commit();
    assert_eq!(p.value(), 11);
}

#[test]
fn test_empty_batch_enqueues_nothing() {
    let core = FlowCore::new();
    let p = core.port_with(1_i32);

    let runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&runs);
    core.node(
        move |v: &i32| {
            counter.fetch_add(1, Ordering::SeqCst);
            *v
        },
        (&p,),
    );
    core.commit();

    core.batch().close();
    core.commit();
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_batch_set_and_unset_mix() {
    let core = FlowCore::new();
    let p = core.port_with(1_i32);
    let q = core.port_with(2_i32);

    let mut batch = core.batch();
    batch.set_value(&p, 10);
    batch.unset_value(&q);
    batch.close();

    core.commit();
    assert_eq!(p.value(), 10);
    assert!(!q.has_value());
}
