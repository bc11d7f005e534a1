//! Reference executor for plans.
//!
//! Effects of one happening are all evaluated against the state preceding it, then applied
//! together. Two active effects writing different values to the same state variable make the
//! plan invalid.

pub mod eval;
pub mod state;

use std::cmp::Reverse;

use malachite::Rational;
use priority_queue::PriorityQueue;
use tracing::debug;

use crate::model::{Action, ActionInstance, Effect, Expression, Parameter, Plan, Problem};
use crate::service::{Validator, Verdict};
pub use eval::{EvalError, Evaluator};
pub use state::{State, StateVariable, Value};

/// Reason a plan does not execute.
pub type Failure = String;

fn bindings(instance: &ActionInstance) -> Vec<(Parameter, Value)> {
    instance
        .action()
        .parameters()
        .iter()
        .cloned()
        .zip(instance.arguments().map(Value::from))
        .collect()
}

/// Pending writes of one happening.
#[derive(Default)]
struct Updates(Vec<(StateVariable, Value)>);

impl Updates {
    fn collect(&mut self, eval: &Evaluator, effects: &[Effect], who: &str) -> Result<(), Failure> {
        for effect in effects {
            let active = match effect.condition() {
                Some(c) => eval.holds(c).map_err(|e| format!("{}: {}", who, e))?,
                None => true,
            };
            if !active {
                continue;
            }
            let key = eval.target(effect.target()).map_err(|e| format!("{}: {}", who, e))?;
            let value = eval.eval(effect.value()).map_err(|e| format!("{}: {}", who, e))?;
            if let (Some(n), Some((f, _))) = (value.as_number(), effect.target().as_fluent()) {
                if !f.value_type().contains(n) {
                    return Err(format!("{}: {} := {} leaves {}", who, key, value, f.value_type()));
                }
            }
            if let Some((_, previous)) = self.0.iter().find(|(k, _)| *k == key) {
                if *previous != value {
                    return Err(format!("{}: conflicting effects on {} ({} and {})", who, key, previous, value));
                }
                continue;
            }
            self.0.push((key, value));
        }
        Ok(())
    }

    fn apply(self, state: &mut State) {
        self.0.into_iter().for_each(|(k, v)| state.set(k, v));
    }
}

fn check(eval: &Evaluator, conditions: &[&Expression], who: &str) -> Result<(), Failure> {
    for c in conditions {
        match eval.holds(c) {
            Ok(true) => (),
            Ok(false) => return Err(format!("{}: {} does not hold", who, c)),
            Err(e) => return Err(format!("{}: {}", who, e)),
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
enum EventKind {
    /// Duration constraint and interval bounds, checked before anything happens at that time.
    Start,
    Condition(usize),
    Instant,
    Effects(usize),
}

impl EventKind {
    fn rank(&self) -> u8 {
        match self {
            EventKind::Start | EventKind::Condition(_) => 0,
            EventKind::Instant | EventKind::Effects(_) => 1,
        }
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Simulator;

impl Simulator {
    pub fn new() -> Self {
        Self
    }

    /// Applies one instantaneous action.
    pub fn apply(&self, problem: &Problem, state: &State, instance: &ActionInstance) -> Result<State, Failure> {
        let action = match instance.action().as_ref() {
            Action::Instantaneous(a) => a,
            Action::Durative(_) => return Err(format!("{} is durative", instance)),
        };
        let params = bindings(instance);
        let eval = Evaluator::new(problem, state, &params);
        let who = instance.to_string();
        check(&eval, &action.preconditions().iter().collect::<Vec<_>>(), &who)?;
        let mut updates = Updates::default();
        updates.collect(&eval, action.effects(), &who)?;
        let mut next = state.clone();
        updates.apply(&mut next);
        Ok(next)
    }

    /// Final state reached by the plan, goals are not checked.
    pub fn execute(&self, problem: &Problem, plan: &Plan) -> Result<State, Failure> {
        match plan {
            Plan::Sequential(p) => p
                .actions()
                .iter()
                .try_fold(State::initial(problem), |state, instance| self.apply(problem, &state, instance)),
            Plan::TimeTriggered(p) => {
                let entries: Vec<_> = p.actions().iter().map(|a| (a.start(), a.instance(), a.duration())).collect();
                self.execute_timed(problem, &entries)
            }
        }
    }

    fn execute_timed(
        &self,
        problem: &Problem,
        entries: &[(&Rational, &ActionInstance, Option<&Rational>)],
    ) -> Result<State, Failure> {
        let zero = Rational::from(0);
        let mut events: Vec<(usize, EventKind)> = Vec::new();
        let mut queue = PriorityQueue::new();
        // interval conditions to re-check after every happening within [lower, upper)
        let mut invariants: Vec<(Rational, Rational, usize, usize)> = Vec::new();
        let mut schedule = |time: Rational, entry: usize, kind: EventKind, events: &mut Vec<(usize, EventKind)>| {
            let id = events.len();
            events.push((entry, kind));
            queue.push(id, Reverse((time, kind.rank(), id)));
        };

        for (i, (start, instance, duration)) in entries.iter().enumerate() {
            match instance.action().as_ref() {
                Action::Instantaneous(_) => schedule((*start).clone(), i, EventKind::Instant, &mut events),
                Action::Durative(a) => {
                    let d = (*duration).unwrap_or(&zero);
                    schedule((*start).clone(), i, EventKind::Start, &mut events);
                    for (c, (interval, _)) in a.conditions().iter().enumerate() {
                        let (lo, hi) = interval.resolve(d);
                        let (lo, hi) = (*start + &lo, *start + &hi);
                        if !interval.is_left_open() {
                            schedule(lo.clone(), i, EventKind::Condition(c), &mut events);
                        }
                        if !interval.is_right_open() && hi != lo {
                            schedule(hi.clone(), i, EventKind::Condition(c), &mut events);
                        }
                        if lo < hi {
                            invariants.push((lo, hi, i, c));
                        }
                    }
                    for (g, (timing, _)) in a.effects().iter().enumerate() {
                        schedule(*start + &timing.resolve(d), i, EventKind::Effects(g), &mut events);
                    }
                }
            }
        }

        let mut state = State::initial(problem);
        let params: Vec<_> = entries.iter().map(|(_, instance, _)| bindings(instance)).collect();
        while let Some((first, Reverse((time, _, _)))) = queue.pop() {
            let mut batch = vec![first];
            while let Some((_, Reverse((next, _, _)))) = queue.peek() {
                if *next != time {
                    break;
                }
                if let Some((id, _)) = queue.pop() {
                    batch.push(id);
                }
            }
            debug!(time = %time, events = batch.len(), "happening");

            let mut updates = Updates::default();
            for id in batch {
                let (entry, kind) = events[id];
                let (start, instance, duration) = entries[entry];
                let eval = Evaluator::new(problem, &state, &params[entry]);
                let who = format!("{} at {}", instance, time);
                match (instance.action().as_ref(), kind) {
                    (Action::Instantaneous(a), _) => {
                        check(&eval, &a.preconditions().iter().collect::<Vec<_>>(), &who)?;
                        updates.collect(&eval, a.effects(), &who)?;
                    }
                    (Action::Durative(a), EventKind::Start) => {
                        let d = duration.unwrap_or(&zero);
                        let bounds = a.duration();
                        let lo = eval.eval(bounds.lower()).map_err(|e| format!("{}: {}", who, e))?;
                        let hi = eval.eval(bounds.upper()).map_err(|e| format!("{}: {}", who, e))?;
                        match (lo.as_number(), hi.as_number()) {
                            (Some(lo), Some(hi)) if bounds.admits(lo, hi, d) => (),
                            _ => return Err(format!("{}: duration {} violates {}", who, d, bounds)),
                        }
                        debug!(action = %instance, start = %start, "started");
                    }
                    (Action::Durative(a), EventKind::Condition(c)) => {
                        let exprs: Vec<_> = a.conditions()[c].1.iter().collect();
                        check(&eval, &exprs, &who)?;
                    }
                    (Action::Durative(a), EventKind::Effects(g)) => {
                        updates.collect(&eval, &a.effects()[g].1, &who)?;
                    }
                    (Action::Durative(_), EventKind::Instant) => (),
                }
            }
            updates.apply(&mut state);

            for (lo, hi, entry, c) in &invariants {
                if *lo <= time && time < *hi {
                    let (_, instance, _) = entries[*entry];
                    if let Action::Durative(a) = instance.action().as_ref() {
                        let eval = Evaluator::new(problem, &state, &params[*entry]);
                        let exprs: Vec<_> = a.conditions()[*c].1.iter().collect();
                        check(&eval, &exprs, &format!("{} after {}", instance, time))?;
                    }
                }
            }
        }
        Ok(state)
    }

    pub fn goals_hold(&self, problem: &Problem, state: &State) -> Result<(), Failure> {
        let eval = Evaluator::new(problem, state, &[]);
        check(&eval, &problem.goals().iter().collect::<Vec<_>>(), "goal")
    }

    /// Executes the plan and checks the goals in the final state.
    pub fn check(&self, problem: &Problem, plan: &Plan) -> Verdict {
        let outcome = self.execute(problem, plan).and_then(|state| self.goals_hold(problem, &state));
        match outcome {
            Ok(()) => Verdict::Valid,
            Err(reason) => Verdict::Invalid(reason),
        }
    }
}

impl Validator for Simulator {
    fn validate(&self, problem: &Problem, plan: &Plan) -> Verdict {
        self.check(problem, plan)
    }
}
