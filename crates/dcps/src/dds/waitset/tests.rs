// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

use super::*;
use crate::dds::condition::{GuardCondition, StatusCondition, StatusMask};
use std::thread;

#[test]
fn test_waitset_new() {
    let ws = WaitSet::new();
    assert!(ws.get_conditions().is_empty());
}

#[test]
fn test_attach_is_idempotent() {
    let ws = WaitSet::new();
    let guard = Arc::new(GuardCondition::new());

    assert!(ws.attach_condition(guard.clone()).is_ok());
    assert!(ws.attach_condition(guard).is_ok());
    assert_eq!(ws.get_conditions().len(), 1);
}

#[test]
fn test_detach() {
    let ws = WaitSet::new();
    let guard = Arc::new(GuardCondition::new());

    ws.attach_condition(guard.clone()).unwrap();
    assert!(ws.detach_condition(guard.clone()).is_ok());
    assert!(ws.get_conditions().is_empty());
    assert!(matches!(
        ws.detach_condition(guard),
        Err(Error::PreconditionNotMet(_))
    ));
}

#[test]
fn test_null_sequences_rejected() {
    let ws = WaitSet::new();
    assert!(matches!(
        ws.get_conditions_into(None),
        Err(Error::BadParameter(_))
    ));
    assert!(matches!(
        ws.wait_into(None, Some(Duration::from_millis(1))),
        Err(Error::BadParameter(_))
    ));
}

#[test]
fn test_get_conditions_into() {
    let ws = WaitSet::new();
    let guard = Arc::new(GuardCondition::new());
    ws.attach_condition(guard).unwrap();

    let mut out = Vec::new();
    ws.get_conditions_into(Some(&mut out)).unwrap();
    assert_eq!(out.len(), 1);
}

#[test]
fn test_wait_immediate_trigger() {
    let ws = WaitSet::new();
    let guard = Arc::new(GuardCondition::new());
    guard.set_trigger_value(true);
    ws.attach_condition(guard.clone()).unwrap();

    let triggered = ws.wait(Some(Duration::from_millis(100))).unwrap();
    assert_eq!(triggered.len(), 1);
    assert_eq!(triggered[0].condition_id(), guard.condition_id());
}

#[test]
fn test_wait_timeout() {
    let ws = WaitSet::new();
    ws.attach_condition(Arc::new(GuardCondition::new())).unwrap();

    let start = Instant::now();
    let result = ws.wait(Some(Duration::from_millis(100)));
    assert_eq!(result.err(), Some(Error::Timeout));
    assert!(start.elapsed() >= Duration::from_millis(100));
}

#[test]
fn test_wait_into_timeout_clears_output() {
    let ws = WaitSet::new();
    ws.attach_condition(Arc::new(GuardCondition::new())).unwrap();

    let mut out: Vec<Arc<dyn Condition>> = vec![Arc::new(GuardCondition::new())];
    let result = ws.wait_into(Some(&mut out), Some(Duration::from_millis(20)));
    assert_eq!(result, Err(Error::Timeout));
    assert!(out.is_empty());
}

#[test]
fn test_wait_async_trigger() {
    let ws = WaitSet::new();
    let guard = Arc::new(GuardCondition::new());
    ws.attach_condition(guard.clone()).unwrap();

    let remote = Arc::clone(&guard);
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        remote.set_trigger_value(true);
    });

    let start = Instant::now();
    let triggered = ws.wait(Some(Duration::from_secs(5))).unwrap();
    assert_eq!(triggered.len(), 1);
    assert!(start.elapsed() >= Duration::from_millis(40));
    handle.join().unwrap();
}

#[test]
fn test_wait_forever_wakes() {
    let ws = WaitSet::new();
    let guard = Arc::new(GuardCondition::new());
    ws.attach_condition(guard.clone()).unwrap();

    let remote = Arc::clone(&guard);
    let handle = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        remote.set_trigger_value(true);
    });

    assert_eq!(ws.wait(None).unwrap().len(), 1);
    handle.join().unwrap();
}

#[test]
fn test_mixed_conditions() {
    let ws = WaitSet::new();
    let guard1 = Arc::new(GuardCondition::new());
    let guard2 = Arc::new(GuardCondition::new());
    let status = Arc::new(StatusCondition::new());
    status.set_enabled_statuses(StatusMask::DATA_AVAILABLE);

    ws.attach_condition(guard1.clone()).unwrap();
    ws.attach_condition(guard2.clone()).unwrap();
    ws.attach_condition(status.clone()).unwrap();

    status.activate(StatusMask::DATA_AVAILABLE);
    let triggered = ws.wait(Some(Duration::from_millis(100))).unwrap();
    assert_eq!(triggered.len(), 1);
    assert_eq!(triggered[0].condition_id(), status.condition_id());

    guard1.set_trigger_value(true);
    let triggered = ws.wait(Some(Duration::from_millis(100))).unwrap();
    assert_eq!(triggered.len(), 2);
}

#[test]
fn test_independent_waitsets_in_parallel() {
    let guards: Vec<Arc<GuardCondition>> = (0..4).map(|_| Arc::new(GuardCondition::new())).collect();

    let handles: Vec<_> = guards
        .iter()
        .map(|guard| {
            let guard = Arc::clone(guard);
            thread::spawn(move || {
                let ws = WaitSet::new();
                ws.attach_condition(guard).unwrap();
                ws.wait(Some(Duration::from_secs(5))).map(|t| t.len())
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(30));
    for guard in &guards {
        guard.set_trigger_value(true);
    }
    for handle in handles {
        assert_eq!(handle.join().unwrap(), Ok(1));
    }
}

#[test]
fn test_drop_detaches_hooks() {
    let guard = Arc::new(GuardCondition::new());
    {
        let ws = WaitSet::new();
        ws.attach_condition(guard.clone()).unwrap();
    }
    guard.set_trigger_value(true);
    assert!(guard.get_trigger_value());
}
