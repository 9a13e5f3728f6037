// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use bolo_config::Config;
use bolo_core::FakeClock;
use tempfile::TempDir;

const TEST_CONFIG: &str = r#"
default_type = "default"

[types.default]
freshness = 60

[types.fragile]
freshness = 1
status = "critical"

[windows]
minutely = 60

[[states]]
name = "svc.a"

[[states]]
name = "fragile.svc"
type = "fragile"

[[states]]
match = "\\.noise$"
ignore = true

[[counters]]
name = "logins"
window = "minutely"

[[samples]]
name = "cpu"
window = 2

[[rates]]
name = "req.permin"
window = "minutely"
"#;

struct Fixture {
    kernel: Kernel,
    rx: broadcast::Receiver<Pdu>,
    clock: Arc<FakeClock>,
    _dir: TempDir,
}

fn fixture(now: i64) -> Fixture {
    let dir = TempDir::new().unwrap();
    let clock = Arc::new(FakeClock::new(now));
    let store = Config::parse(TEST_CONFIG)
        .unwrap()
        .build_store(now)
        .unwrap();

    let config = KernelConfig {
        savefile: dir.path().join("save.db"),
        keysfile: dir.path().join("keys"),
        snapshot_size_mib: 1,
        freshness_interval: 2,
        savestate_interval: 1_000_000,
        grace_period: 15,
    };

    let (kernel, handle) = Kernel::new(store, HashMap::new(), clock.clone(), config);
    let rx = handle.broadcasts.subscribe();
    Fixture {
        kernel,
        rx,
        clock,
        _dir: dir,
    }
}

fn next_frames(rx: &mut broadcast::Receiver<Pdu>) -> Vec<String> {
    rx.try_recv().expect("expected a broadcast").frames().to_vec()
}

fn assert_quiet(rx: &mut broadcast::Receiver<Pdu>) {
    assert!(rx.try_recv().is_err(), "expected no further broadcasts");
}

fn state_submission(ts: i64, name: &str, code: u8, summary: &str) -> Submission {
    Submission::State {
        ts,
        name: name.to_string(),
        code,
        summary: summary.to_string(),
    }
}

#[test]
fn first_state_update_emits_transition_then_state() {
    let mut f = fixture(1000);
    f.kernel
        .handle_submission(state_submission(1000, "svc.a", 0, "ok"))
        .unwrap();

    assert_eq!(
        next_frames(&mut f.rx),
        ["TRANSITION", "svc.a", "1000", "fresh", "OK", "ok"]
    );
    assert_eq!(
        next_frames(&mut f.rx),
        ["STATE", "svc.a", "1000", "fresh", "OK", "ok"]
    );
    assert_quiet(&mut f.rx);
}

#[test]
fn steady_state_update_emits_state_only() {
    let mut f = fixture(1000);
    f.kernel
        .handle_submission(state_submission(1000, "svc.a", 0, "ok"))
        .unwrap();
    let _ = next_frames(&mut f.rx);
    let _ = next_frames(&mut f.rx);

    f.kernel
        .handle_submission(state_submission(1010, "svc.a", 0, "still ok"))
        .unwrap();
    assert_eq!(
        next_frames(&mut f.rx),
        ["STATE", "svc.a", "1010", "fresh", "OK", "still ok"]
    );
    assert_quiet(&mut f.rx);
}

#[test]
fn unknown_names_are_rejected_without_side_effects() {
    let mut f = fixture(1000);

    let err = f
        .kernel
        .handle_submission(state_submission(1000, "mystery", 0, "ok"))
        .unwrap_err();
    assert_eq!(err, SubmitError::StateNotFound);
    assert_eq!(err.to_string(), "State Not Found");

    assert_eq!(
        f.kernel
            .handle_submission(Submission::Counter {
                ts: 1000,
                name: "mystery".to_string(),
                delta: 1,
            })
            .unwrap_err()
            .to_string(),
        "Counter Not Found"
    );

    assert_quiet(&mut f.rx);
    assert!(f.kernel.store.state("mystery").is_none());
}

#[test]
fn ignored_metrics_absorb_submissions_silently() {
    let mut f = fixture(1000);
    f.kernel
        .handle_submission(state_submission(1000, "fan.noise", 0, "whir"))
        .unwrap();
    assert_quiet(&mut f.rx);
    // Materialized (cached) but untouched by the submission.
    assert_eq!(f.kernel.store.state("fan.noise").unwrap().last_seen, 0);
}

#[test]
fn sample_window_rollover_broadcasts_closing_window_first() {
    let mut f = fixture(1000);
    for (ts, v) in [(1000, 10.0), (1000, 10.0), (1001, 10.0)] {
        f.kernel
            .handle_submission(Submission::Sample {
                ts,
                name: "cpu".to_string(),
                values: vec![v],
            })
            .unwrap();
    }
    assert_quiet(&mut f.rx);

    // 1002 starts a new 2-second window; the old one closes first.
    f.kernel
        .handle_submission(Submission::Sample {
            ts: 1002,
            name: "cpu".to_string(),
            values: vec![11.0],
        })
        .unwrap();

    assert_eq!(
        next_frames(&mut f.rx),
        ["SAMPLE", "1000", "cpu", "3", "1e1", "1e1", "3e1", "1e1", "0e0"]
    );
    assert_quiet(&mut f.rx);

    let cpu = f.kernel.store.sample("cpu").unwrap();
    assert_eq!(cpu.n, 1);
    assert_eq!(cpu.sum, 11.0);
    assert_eq!(cpu.last_seen, 1002);
}

#[test]
fn counter_rollover_resets_before_applying_the_new_delta() {
    let mut f = fixture(1000);
    f.kernel
        .handle_submission(Submission::Counter {
            ts: 1000,
            name: "logins".to_string(),
            delta: 7,
        })
        .unwrap();
    assert_quiet(&mut f.rx);

    f.kernel
        .handle_submission(Submission::Counter {
            ts: 1061,
            name: "logins".to_string(),
            delta: 2,
        })
        .unwrap();

    // window of ts=1000 starts at 960
    assert_eq!(next_frames(&mut f.rx), ["COUNTER", "960", "logins", "7"]);
    assert_eq!(f.kernel.store.counter("logins").unwrap().value, 2);
}

#[test]
fn rate_submissions_capture_first_and_last() {
    let mut f = fixture(1000);
    for (ts, v) in [(1000u32, 100u64), (1030, 400)] {
        f.kernel
            .handle_submission(Submission::Rate {
                ts: ts as i64,
                name: "req.permin".to_string(),
                value: v,
            })
            .unwrap();
    }
    assert_quiet(&mut f.rx);

    let rate = f.kernel.store.rate("req.permin").unwrap();
    assert_eq!(rate.first, 100);
    assert_eq!(rate.last, 400);
    assert_eq!(rate.first_seen, 1000);
    assert_eq!(rate.last_seen, 1030);
}

#[test]
fn event_submission_broadcasts_and_buffers() {
    let mut f = fixture(1000);
    f.kernel
        .handle_submission(Submission::Event {
            ts: 1000,
            name: "deploy".to_string(),
            extra: "v2".to_string(),
        })
        .unwrap();

    assert_eq!(next_frames(&mut f.rx), ["EVENT", "1000", "deploy", "v2"]);
    assert_eq!(f.kernel.store.events.len(), 1);
}

#[test]
fn freshness_sweep_marks_and_broadcasts_stale_states() {
    let mut f = fixture(1000);
    f.kernel
        .handle_submission(state_submission(1000, "fragile.svc", 0, "ok"))
        .unwrap();
    let _ = next_frames(&mut f.rx);
    let _ = next_frames(&mut f.rx);

    // freshness=1, so the state expires at 1001.
    f.clock.set(1003);
    f.kernel.handle_tick();

    let summary = "No results received for more than 1 second";
    assert_eq!(
        next_frames(&mut f.rx),
        ["TRANSITION", "fragile.svc", "1000", "stale", "CRITICAL", summary]
    );
    assert_eq!(
        next_frames(&mut f.rx),
        ["STATE", "fragile.svc", "1000", "stale", "CRITICAL", summary]
    );
    assert_quiet(&mut f.rx);

    // A second sweep repeats the STATE broadcast but not the transition.
    f.clock.set(1010);
    f.kernel.handle_tick();
    assert_eq!(next_frames(&mut f.rx)[0], "STATE");
    assert_quiet(&mut f.rx);
}

#[test]
fn tick_closes_windows_past_the_grace_period() {
    let mut f = fixture(1000);
    f.kernel
        .handle_submission(Submission::Counter {
            ts: 1000,
            name: "logins".to_string(),
            delta: 5,
        })
        .unwrap();

    // Window [960, 1020) has ended, but the grace period holds it open.
    // (The freshness sweep may broadcast for unrelated states here.)
    f.clock.set(1030);
    f.kernel.handle_tick();
    while let Ok(pdu) = f.rx.try_recv() {
        assert_ne!(
            pdu.tag(),
            "COUNTER",
            "window must stay open inside the grace period"
        );
    }

    f.clock.set(1040);
    f.kernel.handle_tick();
    // Window closure runs before the freshness sweep, so COUNTER is first.
    assert_eq!(next_frames(&mut f.rx), ["COUNTER", "960", "logins", "5"]);
    assert_eq!(f.kernel.store.counter("logins").unwrap().value, 0);
    assert_eq!(f.kernel.store.counter("logins").unwrap().last_seen, 0);
}

#[test]
fn keys_crud_and_search() {
    let mut f = fixture(1000);
    f.kernel
        .handle_submission(Submission::SetKeys {
            pairs: vec![
                ("host.ip".to_string(), "1.2.3.4".to_string()),
                ("host.mask".to_string(), "255.255.255.0".to_string()),
                ("other".to_string(), "x".to_string()),
            ],
        })
        .unwrap();

    let reply = f.kernel.handle_request(Request::SearchKeys {
        pattern: "^host\\.".to_string(),
    });
    assert_eq!(
        reply,
        Reply::Keys {
            keys: vec!["host.ip".to_string(), "host.mask".to_string()],
        }
    );

    let reply = f.kernel.handle_request(Request::GetKeys {
        keys: vec!["host.ip".to_string(), "missing".to_string()],
    });
    assert_eq!(
        reply,
        Reply::Values {
            pairs: vec![("host.ip".to_string(), "1.2.3.4".to_string())],
        }
    );

    assert_eq!(
        f.kernel.handle_request(Request::DelKeys {
            keys: vec!["host.ip".to_string()],
        }),
        Reply::Ok
    );
    assert_eq!(
        f.kernel.handle_request(Request::GetKeys {
            keys: vec!["host.ip".to_string()],
        }),
        Reply::Values { pairs: vec![] }
    );
}

#[test]
fn search_keys_reports_bad_patterns() {
    let mut f = fixture(1000);
    let reply = f.kernel.handle_request(Request::SearchKeys {
        pattern: "[".to_string(),
    });
    assert!(matches!(reply, Reply::Error { .. }));
}

#[test]
fn state_request_answers_point_lookups() {
    let mut f = fixture(1000);
    f.kernel
        .handle_submission(state_submission(1000, "svc.a", 2, "down"))
        .unwrap();

    let reply = f.kernel.handle_request(Request::State {
        name: "svc.a".to_string(),
    });
    assert_eq!(
        reply,
        Reply::State {
            name: "svc.a".to_string(),
            last_seen: 1000,
            stale: false,
            status: "CRITICAL".to_string(),
            summary: "down".to_string(),
        }
    );

    assert_eq!(
        f.kernel.handle_request(Request::State {
            name: "mystery".to_string(),
        }),
        Reply::error("State Not Found")
    );
}

#[test]
fn savestate_writes_both_files_and_restores() {
    let mut f = fixture(1000);
    f.kernel
        .handle_submission(state_submission(1000, "svc.a", 0, "ok"))
        .unwrap();
    f.kernel
        .handle_submission(Submission::SetKeys {
            pairs: vec![("host.ip".to_string(), "1.2.3.4".to_string())],
        })
        .unwrap();

    assert_eq!(f.kernel.handle_request(Request::SaveState), Reply::Ok);
    assert!(f.kernel.config.savefile.exists());
    assert!(f.kernel.config.keysfile.exists());

    // A fresh kernel over the same files picks the state back up.
    let store = Config::parse(TEST_CONFIG)
        .unwrap()
        .build_store(2000)
        .unwrap();
    let (mut restored, _handle) = Kernel::new(
        store,
        HashMap::new(),
        f.clock.clone(),
        f.kernel.config.clone(),
    );
    restored.load_state();

    assert_eq!(restored.store.state("svc.a").unwrap().summary, "ok");
    assert_eq!(restored.store.state("svc.a").unwrap().last_seen, 1000);
    assert_eq!(restored.keys["host.ip"], "1.2.3.4");
}

#[test]
fn get_events_dumps_since() {
    let mut f = fixture(1000);
    for (ts, name) in [(1000, "old"), (1200, "new")] {
        f.kernel
            .handle_submission(Submission::Event {
                ts,
                name: name.to_string(),
                extra: String::new(),
            })
            .unwrap();
    }

    let Reply::Events { yaml } = f.kernel.handle_request(Request::GetEvents { since: 1100 })
    else {
        panic!("expected EVENTS reply");
    };
    assert!(yaml.contains("new"));
    assert!(!yaml.contains("old"));
}
