use malachite::Rational;

use super::error::ResolutionError;
use crate::model::{
    ActionInstance, Constant, Expression, Plan, Problem, SequentialPlan, TimeTriggeredPlan, TimedAction, Type,
};

/// A plan step as it travels: the action is only known by name and parameter types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedStep {
    pub action: String,
    pub signature: Vec<Type>,
    pub arguments: Vec<Constant>,
}

/// Structurally decoded plan, not yet bound to the actions of a problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedPlan {
    Sequential(Vec<UnresolvedStep>),
    TimeTriggered(Vec<(Rational, UnresolvedStep, Option<Rational>)>),
}

impl UnresolvedPlan {
    pub fn len(&self) -> usize {
        match self {
            UnresolvedPlan::Sequential(steps) => steps.len(),
            UnresolvedPlan::TimeTriggered(steps) => steps.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Binds every step to the problem action with the same name and signature.
    pub fn resolve(&self, problem: &Problem) -> Result<Plan, ResolutionError> {
        match self {
            UnresolvedPlan::Sequential(steps) => {
                let actions = steps
                    .iter()
                    .enumerate()
                    .map(|(i, s)| resolve_step(i, s, problem))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SequentialPlan::new(actions).into())
            }
            UnresolvedPlan::TimeTriggered(steps) => {
                let mut actions = Vec::with_capacity(steps.len());
                for (i, (start, step, duration)) in steps.iter().enumerate() {
                    let instance = resolve_step(i, step, problem)?;
                    let timed = TimedAction::new(start.clone(), instance, duration.clone())
                        .map_err(|source| ResolutionError::Instance { step: i, source })?;
                    actions.push(timed);
                }
                Ok(TimeTriggeredPlan::new(actions).into())
            }
        }
    }
}

fn resolve_step(index: usize, step: &UnresolvedStep, problem: &Problem) -> Result<ActionInstance, ResolutionError> {
    let action = problem.action_with_signature(&step.action, &step.signature).ok_or_else(|| {
        let signature: Vec<String> = step.signature.iter().map(|t| t.to_string()).collect();
        ResolutionError::UnknownAction {
            step: index,
            problem: problem.name().to_owned(),
            name: step.action.clone(),
            signature: signature.join(", "),
        }
    })?;
    for arg in &step.arguments {
        if let Constant::Object(o) = arg {
            if problem.object(o.name(), o.tpe()).is_none() {
                return Err(ResolutionError::UnknownObject {
                    step: index,
                    problem: problem.name().to_owned(),
                    name: o.name().to_owned(),
                    tpe: o.tpe().to_string(),
                });
            }
        }
    }
    let arguments = step.arguments.iter().cloned().map(Expression::from).collect();
    ActionInstance::new(action, arguments).map_err(|source| ResolutionError::Instance { step: index, source })
}
