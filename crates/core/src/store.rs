// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The in-memory metric store.
//!
//! Lookup-or-create semantics, keyed by name and scoped by metric kind:
//! a miss scans the kind's match rules in declaration order, and the
//! first match materializes the metric into the map. Names no rule
//! covers are not configured, and their submissions are rejected.

use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;

use crate::counter::Counter;
use crate::event::{EventRing, Retention};
use crate::rate::Rate;
use crate::sample::Sample;
use crate::state::State;
use crate::state_type::StateType;
use crate::window::Window;

/// A pattern rule binding matching state names to a type.
#[derive(Debug)]
pub struct StateRule {
    pub pattern: Regex,
    pub state_type: Arc<StateType>,
    pub ignore: bool,
}

/// A pattern rule binding matching metric names to a window.
#[derive(Debug)]
pub struct WindowRule {
    pub pattern: Regex,
    pub window: Arc<Window>,
    pub ignore: bool,
}

/// All metric state owned by one aggregator instance.
#[derive(Debug)]
pub struct Store {
    types: HashMap<String, Arc<StateType>>,
    windows: HashMap<String, Arc<Window>>,

    states: HashMap<String, State>,
    counters: HashMap<String, Counter>,
    samples: HashMap<String, Sample>,
    rates: HashMap<String, Rate>,
    pub events: EventRing,

    state_rules: Vec<StateRule>,
    counter_rules: Vec<WindowRule>,
    sample_rules: Vec<WindowRule>,
    rate_rules: Vec<WindowRule>,
}

impl Store {
    pub fn new(retention: Retention) -> Self {
        Self {
            types: HashMap::new(),
            windows: HashMap::new(),
            states: HashMap::new(),
            counters: HashMap::new(),
            samples: HashMap::new(),
            rates: HashMap::new(),
            events: EventRing::new(retention),
            state_rules: Vec::new(),
            counter_rules: Vec::new(),
            sample_rules: Vec::new(),
            rate_rules: Vec::new(),
        }
    }

    // -- configuration-time shape --

    pub fn add_type(&mut self, state_type: StateType) -> Arc<StateType> {
        let shared = Arc::new(state_type);
        self.types
            .insert(shared.name().to_string(), Arc::clone(&shared));
        shared
    }

    pub fn type_named(&self, name: &str) -> Option<Arc<StateType>> {
        self.types.get(name).cloned()
    }

    pub fn add_window(&mut self, window: Window) -> Arc<Window> {
        let shared = Arc::new(window);
        if let Some(name) = shared.name() {
            self.windows.insert(name.to_string(), Arc::clone(&shared));
        }
        shared
    }

    pub fn window_named(&self, name: &str) -> Option<Arc<Window>> {
        self.windows.get(name).cloned()
    }

    pub fn insert_state(&mut self, name: &str, state_type: Arc<StateType>, now: i64) {
        self.states
            .insert(name.to_string(), State::pending(name, state_type, now));
    }

    pub fn insert_counter(&mut self, name: &str, window: Arc<Window>) {
        self.counters
            .insert(name.to_string(), Counter::new(name, window));
    }

    pub fn insert_sample(&mut self, name: &str, window: Arc<Window>) {
        self.samples
            .insert(name.to_string(), Sample::new(name, window));
    }

    pub fn insert_rate(&mut self, name: &str, window: Arc<Window>) {
        self.rates.insert(name.to_string(), Rate::new(name, window));
    }

    pub fn add_state_rule(&mut self, pattern: Regex, state_type: Arc<StateType>, ignore: bool) {
        self.state_rules.push(StateRule {
            pattern,
            state_type,
            ignore,
        });
    }

    pub fn add_counter_rule(&mut self, pattern: Regex, window: Arc<Window>, ignore: bool) {
        self.counter_rules.push(WindowRule {
            pattern,
            window,
            ignore,
        });
    }

    pub fn add_sample_rule(&mut self, pattern: Regex, window: Arc<Window>, ignore: bool) {
        self.sample_rules.push(WindowRule {
            pattern,
            window,
            ignore,
        });
    }

    pub fn add_rate_rule(&mut self, pattern: Regex, window: Arc<Window>, ignore: bool) {
        self.rate_rules.push(WindowRule {
            pattern,
            window,
            ignore,
        });
    }

    // -- lookup-or-create --

    /// Find a state by name, materializing it from the first matching
    /// rule when unknown. `None` means the name is not configured.
    pub fn find_state(&mut self, name: &str, now: i64) -> Option<&mut State> {
        if !self.states.contains_key(name) {
            let rule = self.state_rules.iter().find(|r| r.pattern.is_match(name))?;
            let mut state = State::pending(name, Arc::clone(&rule.state_type), now);
            state.ignore = rule.ignore;
            self.states.insert(name.to_string(), state);
        }
        self.states.get_mut(name)
    }

    pub fn find_counter(&mut self, name: &str) -> Option<&mut Counter> {
        if !self.counters.contains_key(name) {
            let rule = self
                .counter_rules
                .iter()
                .find(|r| r.pattern.is_match(name))?;
            let mut counter = Counter::new(name, Arc::clone(&rule.window));
            counter.ignore = rule.ignore;
            self.counters.insert(name.to_string(), counter);
        }
        self.counters.get_mut(name)
    }

    pub fn find_sample(&mut self, name: &str) -> Option<&mut Sample> {
        if !self.samples.contains_key(name) {
            let rule = self.sample_rules.iter().find(|r| r.pattern.is_match(name))?;
            let mut sample = Sample::new(name, Arc::clone(&rule.window));
            sample.ignore = rule.ignore;
            self.samples.insert(name.to_string(), sample);
        }
        self.samples.get_mut(name)
    }

    pub fn find_rate(&mut self, name: &str) -> Option<&mut Rate> {
        if !self.rates.contains_key(name) {
            let rule = self.rate_rules.iter().find(|r| r.pattern.is_match(name))?;
            let mut rate = Rate::new(name, Arc::clone(&rule.window));
            rate.ignore = rule.ignore;
            self.rates.insert(name.to_string(), rate);
        }
        self.rates.get_mut(name)
    }

    // -- non-creating access --

    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.get(name)
    }

    pub fn counter(&self, name: &str) -> Option<&Counter> {
        self.counters.get(name)
    }

    pub fn sample(&self, name: &str) -> Option<&Sample> {
        self.samples.get(name)
    }

    pub fn rate(&self, name: &str) -> Option<&Rate> {
        self.rates.get(name)
    }

    pub fn states(&self) -> impl Iterator<Item = &State> {
        self.states.values()
    }

    pub fn counters(&self) -> impl Iterator<Item = &Counter> {
        self.counters.values()
    }

    pub fn samples(&self) -> impl Iterator<Item = &Sample> {
        self.samples.values()
    }

    pub fn rates(&self) -> impl Iterator<Item = &Rate> {
        self.rates.values()
    }

    pub fn states_mut(&mut self) -> impl Iterator<Item = &mut State> {
        self.states.values_mut()
    }

    pub fn counters_mut(&mut self) -> impl Iterator<Item = &mut Counter> {
        self.counters.values_mut()
    }

    pub fn samples_mut(&mut self) -> impl Iterator<Item = &mut Sample> {
        self.samples.values_mut()
    }

    pub fn rates_mut(&mut self) -> impl Iterator<Item = &mut Rate> {
        self.rates.values_mut()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
