use std::fmt;
use std::sync::Arc;

use malachite::Rational;

use super::action::Action;
use super::error::{ModelError, Result};
use super::expression::{self, Constant, Expression};

/// An action applied to ground arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ActionInstance {
    action: Arc<Action>,
    parameters: Vec<Expression>,
}

impl ActionInstance {
    pub fn new(action: &Arc<Action>, parameters: Vec<Expression>) -> Result<Self> {
        let declared = action.parameters();
        if parameters.len() != declared.len() {
            return Err(ModelError::value_error(format!(
                "action {} expects {} parameters, got {}",
                action.name(),
                declared.len(),
                parameters.len()
            )));
        }
        for (actual, p) in parameters.iter().zip(declared) {
            if actual.as_constant().is_none() || !expression::fits(p.tpe(), actual) {
                return Err(ModelError::value_error(format!(
                    "{} is not a ground value of type {} for parameter {} of {}",
                    actual,
                    p.tpe(),
                    p.name(),
                    action.name()
                )));
            }
        }
        Ok(Self { action: action.clone(), parameters })
    }

    pub fn action(&self) -> &Arc<Action> {
        &self.action
    }

    pub fn parameters(&self) -> &[Expression] {
        &self.parameters
    }

    pub fn arguments(&self) -> impl Iterator<Item = &Constant> {
        self.parameters.iter().filter_map(Expression::as_constant)
    }
}

impl fmt::Display for ActionInstance {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}(", self.action.name())?;
        let mut it = self.parameters.iter();
        it.by_ref().take(1).try_for_each(|p| write!(f, "{}", p))?;
        it.try_for_each(|p| write!(f, ", {}", p))?;
        write!(f, ")")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SequentialPlan {
    actions: Vec<ActionInstance>,
}

impl SequentialPlan {
    pub fn new(actions: Vec<ActionInstance>) -> Self {
        Self { actions }
    }

    pub fn actions(&self) -> &[ActionInstance] {
        &self.actions
    }

    pub fn push(&mut self, instance: ActionInstance) {
        self.actions.push(instance)
    }
}

/// A plan entry starting at an absolute time. `duration` is set exactly for durative actions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedAction {
    start: Rational,
    instance: ActionInstance,
    duration: Option<Rational>,
}

impl TimedAction {
    pub fn new(start: Rational, instance: ActionInstance, duration: Option<Rational>) -> Result<Self> {
        if start < 0 {
            return Err(ModelError::value_error(format!("{} starts at negative time {}", instance, start)));
        }
        match (&duration, instance.action().is_durative()) {
            (Some(d), true) if *d < 0 => {
                Err(ModelError::value_error(format!("{} has negative duration {}", instance, d)))
            }
            (Some(_), true) | (None, false) => Ok(Self { start, instance, duration }),
            (None, true) => Err(ModelError::value_error(format!("durative {} needs a duration", instance))),
            (Some(_), false) => Err(ModelError::value_error(format!("instantaneous {} cannot have a duration", instance))),
        }
    }

    pub fn start(&self) -> &Rational {
        &self.start
    }

    pub fn instance(&self) -> &ActionInstance {
        &self.instance
    }

    pub fn duration(&self) -> Option<&Rational> {
        self.duration.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TimeTriggeredPlan {
    actions: Vec<TimedAction>,
}

impl TimeTriggeredPlan {
    /// Entries are kept ordered by start time, ties in the given order.
    pub fn new(mut actions: Vec<TimedAction>) -> Self {
        actions.sort_by(|a, b| a.start.cmp(&b.start));
        Self { actions }
    }

    pub fn actions(&self) -> &[TimedAction] {
        &self.actions
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Sequential(SequentialPlan),
    TimeTriggered(TimeTriggeredPlan),
}

impl Plan {
    pub fn instances(&self) -> Vec<&ActionInstance> {
        match self {
            Plan::Sequential(p) => p.actions.iter().collect(),
            Plan::TimeTriggered(p) => p.actions.iter().map(|a| &a.instance).collect(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Plan::Sequential(p) => p.actions.len(),
            Plan::TimeTriggered(p) => p.actions.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<SequentialPlan> for Plan {
    fn from(value: SequentialPlan) -> Self {
        Plan::Sequential(value)
    }
}

impl From<TimeTriggeredPlan> for Plan {
    fn from(value: TimeTriggeredPlan) -> Self {
        Plan::TimeTriggered(value)
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Plan::Sequential(p) => p.actions.iter().try_for_each(|a| writeln!(f, "{}", a)),
            Plan::TimeTriggered(p) => p.actions.iter().try_for_each(|a| match &a.duration {
                Some(d) => writeln!(f, "{}: {} [{}]", a.start, a.instance, d),
                None => writeln!(f, "{}: {}", a.start, a.instance),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::action::{DurativeAction, InstantaneousAction};
    use crate::model::expression::Parameter;
    use crate::model::types::{Object, UserType};

    fn move_action() -> Arc<Action> {
        let location = UserType::new("Location");
        let params = vec![Parameter::new("l_from", location.clone()), Parameter::new("l_to", location)];
        Arc::new(InstantaneousAction::new("move", params).unwrap().into())
    }

    #[test]
    fn test_instance_arguments() {
        let mv = move_action();
        let l1 = Object::new("l1", UserType::new("Location"));
        let l2 = Object::new("l2", UserType::new("Location"));
        let r1 = Object::new("r1", UserType::new("Robot"));
        let i = ActionInstance::new(&mv, vec![(&l1).into(), (&l2).into()]).unwrap();
        assert_eq!(i.to_string(), "move(l1, l2)");
        assert_eq!(i.arguments().count(), 2);
        assert!(matches!(ActionInstance::new(&mv, vec![(&l1).into()]), Err(ModelError::Value(_))));
        assert!(matches!(ActionInstance::new(&mv, vec![(&l1).into(), (&r1).into()]), Err(ModelError::Value(_))));
        let p = Parameter::new("l", UserType::new("Location"));
        assert!(matches!(ActionInstance::new(&mv, vec![(&l1).into(), (&p).into()]), Err(ModelError::Value(_))));
    }

    #[test]
    fn test_time_triggered_order() {
        let mut d = DurativeAction::new("d", vec![]).unwrap();
        d.set_fixed_duration(1i64).unwrap();
        let d: Arc<Action> = Arc::new(d.into());
        let a: Arc<Action> = Arc::new(InstantaneousAction::new("a", vec![]).unwrap().into());
        let di = ActionInstance::new(&d, vec![]).unwrap();
        let ai = ActionInstance::new(&a, vec![]).unwrap();
        let late = TimedAction::new(Rational::from(1), di.clone(), Some(Rational::from(1))).unwrap();
        let early = TimedAction::new(Rational::from_signeds(1, 100), ai.clone(), None).unwrap();
        let first = TimedAction::new(Rational::from(0), ai.clone(), None).unwrap();
        let plan = TimeTriggeredPlan::new(vec![late.clone(), early.clone(), first.clone()]);
        assert_eq!(plan.actions(), &[first, early, late]);
        assert_eq!(Plan::from(plan).to_string(), "0: a()\n1/100: a()\n1: d() [1]\n");

        assert!(matches!(TimedAction::new(Rational::from(-1), ai.clone(), None), Err(ModelError::Value(_))));
        assert!(matches!(TimedAction::new(Rational::from(0), di.clone(), Some(Rational::from(-1))), Err(ModelError::Value(_))));
        assert!(matches!(TimedAction::new(Rational::from(0), di, None), Err(ModelError::Value(_))));
        assert!(matches!(TimedAction::new(Rational::from(0), ai, Some(Rational::from(1))), Err(ModelError::Value(_))));
    }
}
