// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::window::Window;
use std::sync::Arc;

fn win(seconds: i64) -> Arc<Window> {
    Arc::new(Window::anonymous(seconds))
}

fn feed(s: &mut Sample, values: &[f64]) {
    let mut ts = 1000;
    for v in values {
        s.observe(ts, *v);
        ts += 1;
    }
}

#[test]
fn first_value_sets_min_and_max() {
    let mut s = Sample::new("cpu", win(60));
    s.observe(1000, 4.5);
    assert_eq!(s.n, 1);
    assert_eq!(s.min, 4.5);
    assert_eq!(s.max, 4.5);
    assert_eq!(s.mean, 4.5);
    assert_eq!(s.var, 0.0);
}

#[test]
fn mean_matches_arithmetic_mean() {
    let mut s = Sample::new("cpu", win(60));
    let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
    feed(&mut s, &values);

    let expected = values.iter().sum::<f64>() / values.len() as f64;
    assert!((s.mean - expected).abs() < 1e-9);
    assert_eq!(s.n, values.len() as u64);
    assert_eq!(s.sum, values.iter().sum::<f64>());
}

#[test]
fn variance_matches_population_variance() {
    let mut s = Sample::new("cpu", win(60));
    let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
    feed(&mut s, &values);

    // Population variance of this classic set is exactly 4.
    assert!((s.var - 4.0).abs() < 1e-9);
}

#[test]
fn min_and_max_bracket_all_values() {
    let mut s = Sample::new("cpu", win(60));
    feed(&mut s, &[10.0, -2.0, 3.5]);
    assert_eq!(s.min, -2.0);
    assert_eq!(s.max, 10.0);
}

#[test]
fn identical_values_have_zero_variance() {
    let mut s = Sample::new("cpu", win(2));
    feed(&mut s, &[10.0, 10.0, 10.0]);
    assert_eq!(s.mean, 10.0);
    assert_eq!(s.var, 0.0);
    assert_eq!(s.sum, 30.0);
}

#[test]
fn reset_zeroes_every_field() {
    let mut s = Sample::new("cpu", win(60));
    feed(&mut s, &[1.0, 2.0, 3.0]);
    s.reset();
    assert_eq!(s.n, 0);
    assert_eq!(s.min, 0.0);
    assert_eq!(s.max, 0.0);
    assert_eq!(s.sum, 0.0);
    assert_eq!(s.mean, 0.0);
    assert_eq!(s.mean_, 0.0);
    assert_eq!(s.var, 0.0);
    assert_eq!(s.var_, 0.0);
    assert_eq!(s.last_seen, 0);
}
