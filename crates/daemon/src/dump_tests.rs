// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use bolo_core::{Event, Retention, StateType, Status, Store, Window};
use std::sync::Arc;

fn store_with_states() -> Store {
    let mut store = Store::new(Retention::Count(10));
    let t = store.add_type(StateType::new("default", 60, Status::Warning, None));
    store.insert_state("svc.b", Arc::clone(&t), 1000);
    store.insert_state("svc.a", t, 1000);
    store
        .find_state("svc.a", 1000)
        .unwrap()
        .observe(1000, Status::Ok, "all good");
    store
}

#[test]
fn states_dump_is_sorted_yaml_with_header() {
    let yaml = dump_states(&store_with_states()).unwrap();

    assert!(yaml.starts_with("---\n# generated by bolo\n"));
    // Sorted by name, with the observed fields rendered.
    let a = yaml.find("svc.a:").unwrap();
    let b = yaml.find("svc.b:").unwrap();
    assert!(a < b);
    assert!(yaml.contains("status: OK"));
    assert!(yaml.contains("message: all good"));
    assert!(yaml.contains("last_seen: 1000"));
    // Emitters may quote "yes"; only the value matters.
    let fresh = yaml
        .lines()
        .find(|l| l.trim_start().starts_with("fresh:"))
        .unwrap();
    assert!(fresh.contains("yes"));
}

#[test]
fn pending_states_dump_as_unknown() {
    let yaml = dump_states(&store_with_states()).unwrap();
    assert!(yaml.contains("status: UNKNOWN"));
    assert!(yaml.contains("message: (state is pending results)"));
}

#[test]
fn events_dump_filters_by_since() {
    let mut store = Store::new(Retention::Count(10));
    for (ts, name) in [(100, "boot"), (200, "deploy")] {
        store.events.push(Event {
            timestamp: ts,
            name: name.to_string(),
            extra: "x".to_string(),
        });
    }

    let yaml = dump_events(&store, 150).unwrap();
    assert!(yaml.starts_with("---\n# generated by bolo\n"));
    assert!(yaml.contains("name: deploy"));
    assert!(yaml.contains("when: 200"));
    assert!(!yaml.contains("boot"));
}
