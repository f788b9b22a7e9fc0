//! A small, allocation-free finite-state machine driver.
//!
//! A [`StateMachine`] owns the active state and two tables: transitions (`from`, `to`, predicate) and runtime actions
//! (`state`, action). The context the predicates and actions operate on is owned by the caller and lent to
//! [`StateMachine::tick`], so a machine can drive any struct without holding a reference to it.
//!
//! One tick runs every action registered for the active state, in registration order, then evaluates the predicates
//! registered for that state, again in registration order. The first predicate returning `true` moves the machine to
//! its target state and ends the tick; the new state's actions first run on the following tick.

use crate::error::CapacityError;
use heapless::Vec;

/// Decides whether a transition fires. Must return promptly; predicates may perform non-blocking I/O.
pub type Predicate<C> = fn(&mut C) -> bool;

/// Recurring work performed each tick while a state is active. Must return promptly.
pub type Action<C> = fn(&mut C);

/// Default number of transitions a machine can hold.
pub const DEFAULT_TRANSITIONS: usize = 8;

/// Default number of runtime actions a machine can hold.
pub const DEFAULT_ACTIONS: usize = 8;

struct Transition<S, C> {
    from: S,
    to: S,
    predicate: Predicate<C>,
}

struct RuntimeAction<S, C> {
    state: S,
    action: Action<C>,
}

/// Drives a closed set of states `S` over a caller-owned context `C`.
pub struct StateMachine<S, C, const T: usize = DEFAULT_TRANSITIONS, const A: usize = DEFAULT_ACTIONS> {
    state: S,
    transitions: Vec<Transition<S, C>, T>,
    actions: Vec<RuntimeAction<S, C>, A>,
}

impl<S, C, const T: usize, const A: usize> StateMachine<S, C, T, A>
where
    S: Copy + PartialEq,
{
    /// Constructs a machine resting in `initial`, with no transitions or actions.
    pub fn new(initial: S) -> Self {
        Self {
            state: initial,
            transitions: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Returns the active state.
    pub fn state(&self) -> S {
        self.state
    }

    /// Registers a transition from `from` to `to`, taken when `predicate` returns `true`.
    pub fn add_transition(&mut self, from: S, to: S, predicate: Predicate<C>) -> Result<(), CapacityError> {
        self.transitions
            .push(Transition { from, to, predicate })
            .map_err(|_| CapacityError)
    }

    /// Registers an action to run every tick while `state` is active.
    pub fn add_runtime_action(&mut self, state: S, action: Action<C>) -> Result<(), CapacityError> {
        self.actions
            .push(RuntimeAction { state, action })
            .map_err(|_| CapacityError)
    }

    /// Advances the machine by one tick. Returns the new state if a transition fired.
    pub fn tick(&mut self, context: &mut C) -> Option<S> {
        let current = self.state;

        self.actions
            .iter()
            .filter(|runtime| runtime.state == current)
            .for_each(|runtime| (runtime.action)(context));

        let next = self
            .transitions
            .iter()
            .filter(|transition| transition.from == current)
            .find(|transition| (transition.predicate)(context))
            .map(|transition| transition.to)?;

        self.state = next;
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, PartialEq)]
    enum Light {
        Red,
        Green,
        Amber,
    }

    #[derive(Default)]
    struct Counters {
        go: bool,
        red_ticks: u8,
        green_ticks: u8,
        checks: u8,
    }

    fn go(c: &mut Counters) -> bool {
        c.checks += 1;
        c.go
    }

    fn never(c: &mut Counters) -> bool {
        c.checks += 1;
        false
    }

    fn always(_: &mut Counters) -> bool {
        true
    }

    fn count_red(c: &mut Counters) {
        c.red_ticks += 1;
    }

    fn count_green(c: &mut Counters) {
        c.green_ticks += 1;
    }

    fn machine() -> StateMachine<Light, Counters> {
        let mut m = StateMachine::new(Light::Red);
        m.add_transition(Light::Red, Light::Green, go).unwrap();
        m.add_runtime_action(Light::Red, count_red).unwrap();
        m.add_runtime_action(Light::Green, count_green).unwrap();
        m
    }

    #[test]
    fn repeats_actions_while_predicate_is_false() {
        let mut m = machine();
        let mut c = Counters::default();

        for _ in 0..3 {
            assert_eq!(None, m.tick(&mut c), "Should not transition");
        }
        assert_eq!(Light::Red, m.state(), "Expected left but got right");
        assert_eq!(3, c.red_ticks, "Expected left but got right");
        assert_eq!(0, c.green_ticks, "Expected left but got right");
    }

    #[test]
    fn transition_tick_runs_only_the_old_state_actions() {
        let mut m = machine();
        let mut c = Counters::default();
        m.tick(&mut c);

        c.go = true;
        assert_eq!(Some(Light::Green), m.tick(&mut c), "Expected left but got right");
        assert_eq!(2, c.red_ticks, "Old state's action should fire on the transition tick");
        assert_eq!(0, c.green_ticks, "New state's action should wait for the next tick");

        m.tick(&mut c);
        assert_eq!(2, c.red_ticks, "Expected left but got right");
        assert_eq!(1, c.green_ticks, "Expected left but got right");
    }

    #[test]
    fn first_satisfied_predicate_wins_and_short_circuits() {
        let mut m: StateMachine<Light, Counters> = StateMachine::new(Light::Red);
        m.add_transition(Light::Red, Light::Amber, always).unwrap();
        m.add_transition(Light::Red, Light::Green, never).unwrap();
        let mut c = Counters::default();

        assert_eq!(Some(Light::Amber), m.tick(&mut c), "Expected left but got right");
        assert_eq!(0, c.checks, "Later predicates should not be evaluated");
    }

    #[test]
    fn ignores_transitions_from_other_states() {
        let mut m: StateMachine<Light, Counters> = StateMachine::new(Light::Red);
        m.add_transition(Light::Green, Light::Amber, always).unwrap();
        let mut c = Counters::default();

        assert_eq!(None, m.tick(&mut c), "Expected left but got right");
        assert_eq!(Light::Red, m.state(), "Expected left but got right");
    }

    #[test]
    fn reports_full_tables() {
        let mut m: StateMachine<Light, Counters, 1, 1> = StateMachine::new(Light::Red);
        assert_eq!(Ok(()), m.add_transition(Light::Red, Light::Green, always));
        assert_eq!(Err(CapacityError), m.add_transition(Light::Green, Light::Red, always));
        assert_eq!(Ok(()), m.add_runtime_action(Light::Red, count_red));
        assert_eq!(Err(CapacityError), m.add_runtime_action(Light::Green, count_green));
    }
}
