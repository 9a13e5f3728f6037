// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::window::Window;
use std::sync::Arc;

fn win60() -> Arc<Window> {
    Arc::new(Window::anonymous(60))
}

#[test]
fn first_observation_captures_both_ends() {
    let mut r = Rate::new("req.permin", win60());
    r.observe(1000, 100);
    assert_eq!(r.first_seen, 1000);
    assert_eq!(r.last_seen, 1000);
    assert_eq!(r.first, 100);
    assert_eq!(r.last, 100);
}

#[test]
fn later_observations_only_move_last() {
    let mut r = Rate::new("req.permin", win60());
    r.observe(1000, 100);
    r.observe(1030, 400);
    assert_eq!(r.first_seen, 1000);
    assert_eq!(r.last_seen, 1030);
    assert_eq!(r.first, 100);
    assert_eq!(r.last, 400);
}

#[test]
fn rate_scales_delta_to_the_span() {
    let mut r = Rate::new("req.permin", win60());
    r.observe(1000, 100);
    r.observe(1030, 400);
    // 300 over 30s, scaled to a 60s span
    assert_eq!(r.rate(60), 600.0);
}

#[test]
fn single_observation_rates_zero() {
    let mut r = Rate::new("req.permin", win60());
    r.observe(1000, 100);
    assert_eq!(r.rate(60), 0.0);
}

#[test]
fn small_first_uses_16bit_wrap() {
    let mut r = Rate::new("req.permin", win60());
    r.observe(1000, 0xff00);
    r.observe(1060, 0x0100);
    // delta = 0xffff - 0xff00 + 0x0100
    let delta = (0xffffu64 - 0xff00 + 0x0100) as f64;
    assert_eq!(r.rate(60), delta / 60.0 * 60.0);
}

#[test]
fn large_first_uses_32bit_wrap() {
    let mut r = Rate::new("req.permin", win60());
    r.observe(1000, 0xffff_ff00);
    r.observe(1060, 0x0000_0100);
    let delta = (0xffff_ffffu64 - 0xffff_ff00 + 0x0000_0100) as f64;
    assert_eq!(r.rate(60), delta / 60.0 * 60.0);
}

#[test]
fn reset_zeroes_everything() {
    let mut r = Rate::new("req.permin", win60());
    r.observe(1000, 100);
    r.reset();
    assert_eq!(r.first_seen, 0);
    assert_eq!(r.last_seen, 0);
    assert_eq!(r.first, 0);
    assert_eq!(r.last, 0);
}
