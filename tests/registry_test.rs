//! Registry behaviour under concurrent use.

mod common;

use common::path_tags;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::thread;
use tagstats::metrics::{MetricRecord, Registry, TagSet};

#[test]
fn test_concurrent_adds_sum_exactly() {
    let registry = Arc::new(Registry::new());
    let handles: Vec<_> = (0..10)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for _ in 0..100 {
                    registry.add("requests", &TagSet::from([("path", "/a")]), 1);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(
        registry.snapshot(),
        vec![MetricRecord::new("requests", TagSet::from([("path", "/a")]), 1000)]
    );
}

#[test]
fn test_mixed_deltas_from_many_threads() {
    let registry = Arc::new(Registry::new());
    let handles: Vec<_> = (0..16i64)
        .map(|i| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                let delta = if i % 2 == 0 { i } else { -i };
                for _ in 0..500 {
                    registry.add("balance", &TagSet::new(), delta);
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let expected: i64 = (0..16i64).map(|i| if i % 2 == 0 { i } else { -i }).sum::<i64>() * 500;
    assert_eq!(registry.counter_value("balance", &TagSet::new()), Some(expected));
}

#[test]
fn test_racing_first_access_creates_one_instance() {
    let registry = Arc::new(Registry::new());
    let barrier = Arc::new(std::sync::Barrier::new(32));
    let handles: Vec<_> = (0..32)
        .map(|i| {
            let registry = Arc::clone(&registry);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                // Insertion order of the tags differs between threads.
                let tags = if i % 2 == 0 {
                    TagSet::from([("path", "/race"), ("server", "test-server")])
                } else {
                    TagSet::from([("server", "test-server"), ("path", "/race")])
                };
                barrier.wait();
                registry.add("requests", &tags, 1);
                registry.observe("response_time", &tags, i);
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(registry.len(), 2);
    assert_eq!(registry.counter_value("requests", &path_tags("/race")), Some(32));
    assert_eq!(registry.sample("response_time", &path_tags("/race")).unwrap().len(), 32);
}

#[test]
fn test_snapshot_while_writing() {
    let registry = Arc::new(Registry::new());
    let writer = {
        let registry = Arc::clone(&registry);
        thread::spawn(move || {
            for i in 0..2000 {
                let path = format!("/p{}", i % 50);
                registry.add("requests", &path_tags(&path), 1);
                registry.observe("response_time", &path_tags(&path), i);
            }
        })
    };

    for _ in 0..50 {
        let snapshot = registry.snapshot();
        assert!(snapshot.iter().all(|r| r.value >= 0));
    }
    writer.join().unwrap();

    let snapshot = registry.snapshot();
    let total: i64 = snapshot
        .iter()
        .filter(|r| r.metric == "requests")
        .map(|r| r.value)
        .sum();
    assert_eq!(total, 2000);
    assert_eq!(snapshot.len(), 50 + 50 * 3);
}

#[test]
fn test_registered_source_appears_in_every_snapshot() {
    let registry = Registry::new();
    registry.register_fn(|| vec![MetricRecord::new("uptime", TagSet::new(), 42)]);

    for _ in 0..3 {
        assert_eq!(
            registry.snapshot(),
            vec![MetricRecord::new("uptime", TagSet::new(), 42)]
        );
    }

    registry.add("requests", &TagSet::new(), 1);
    assert_eq!(registry.snapshot().len(), 2);
}

#[test]
fn test_json_rendering_of_snapshot() {
    let registry = Registry::new();
    registry.add("status_codes", &path_tags("/").with("code", "200"), 3);

    let json = serde_json::to_string(&registry).unwrap();
    assert_eq!(
        json,
        r#"[{"metric":"status_codes","tags":{"code":"200","path":"/","server":"test-server"},"value":3}]"#
    );
}
