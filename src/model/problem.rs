use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use super::action::Action;
use super::error::{ModelError, Result};
use super::expression::{self, Constant, Expression};
use super::types::{Fluent, Object, Type, UserType};

/// A complete planning problem. Only obtainable from [`ProblemBuilder::build`], and immutable from then on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Problem {
    name: String,
    fluents: Vec<(Arc<Fluent>, Option<Expression>)>,
    objects: Vec<Object>,
    actions: Vec<Arc<Action>>,
    initial_values: Vec<(Expression, Expression)>,
    goals: Vec<Expression>,
}

/// Staged construction of a [`Problem`]. Every collection keeps insertion order.
#[derive(Debug, Clone, Default)]
pub struct ProblemBuilder {
    name: String,
    fluents: Vec<(Arc<Fluent>, Option<Expression>)>,
    objects: Vec<Object>,
    actions: Vec<Arc<Action>>,
    initial_values: Vec<(Expression, Expression)>,
    goals: Vec<Expression>,
}

impl ProblemBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    pub fn add_fluent(&mut self, fluent: &Arc<Fluent>, default_initial_value: Option<Expression>) -> Result<()> {
        if self.fluents.iter().any(|(f, _)| f.name() == fluent.name()) {
            return Err(ModelError::value_error(format!("fluent {} is already declared", fluent.name())));
        }
        if let Some(default) = &default_initial_value {
            if default.as_constant().is_none() || !expression::fits(fluent.value_type(), default) {
                return Err(ModelError::value_error(format!(
                    "{} is not a valid default value for fluent {}",
                    default, fluent
                )));
            }
            self.check_symbols(default)?;
        }
        self.fluents.push((fluent.clone(), default_initial_value));
        Ok(())
    }

    pub fn add_object(&mut self, object: Object) -> Result<()> {
        if self.objects.contains(&object) {
            return Err(ModelError::value_error(format!(
                "object {} of type {} is already declared",
                object.name(),
                object.tpe()
            )));
        }
        self.objects.push(object);
        Ok(())
    }

    pub fn add_objects(&mut self, objects: impl IntoIterator<Item = Object>) -> Result<()> {
        objects.into_iter().try_for_each(|o| self.add_object(o))
    }

    /// Freezes the action and hands back the shared reference plans should point to.
    pub fn add_action(&mut self, action: impl Into<Action>) -> Result<Arc<Action>> {
        let action = action.into();
        let signature = action.signature();
        if self.actions.iter().any(|a| a.name() == action.name() && a.signature() == signature) {
            return Err(ModelError::value_error(format!("action {} is already declared", action.name())));
        }
        action.expressions().into_iter().try_for_each(|e| self.check_symbols(e))?;
        let action = Arc::new(action);
        self.actions.push(action.clone());
        Ok(action)
    }

    pub fn set_initial_value(&mut self, fluent: Expression, value: impl Into<Expression>) -> Result<()> {
        let value = value.into();
        if !fluent.is_ground_fluent() {
            return Err(ModelError::value_error(format!("{} is not a grounded fluent expression", fluent)));
        }
        if value.as_constant().is_none() || !expression::fits(fluent.tpe(), &value) {
            return Err(ModelError::value_error(format!(
                "{} of type {} is not a valid value for {} of type {}",
                value,
                value.tpe(),
                fluent,
                fluent.tpe()
            )));
        }
        self.check_symbols(&fluent)?;
        self.check_symbols(&value)?;
        match self.initial_values.iter_mut().find(|(f, _)| *f == fluent) {
            Some((_, v)) => *v = value,
            None => self.initial_values.push((fluent, value)),
        }
        Ok(())
    }

    pub fn add_goal(&mut self, goal: Expression) -> Result<()> {
        if !goal.tpe().is_bool() {
            return Err(ModelError::type_error(format!("goal {} is not boolean", goal)));
        }
        goal.check_closed(&[])?;
        self.check_symbols(&goal)?;
        if !self.goals.contains(&goal) {
            self.goals.push(goal);
        }
        Ok(())
    }

    pub fn objects_of(&self, tpe: &UserType) -> impl Iterator<Item = &Object> {
        let tpe = tpe.clone();
        self.objects.iter().filter(move |o| *o.tpe() == tpe)
    }

    fn check_symbols(&self, e: &Expression) -> Result<()> {
        let (mut fluents, mut objects) = (Vec::new(), Vec::new());
        e.visit_symbols(&mut fluents, &mut objects);
        for f in fluents {
            if !self.fluents.iter().any(|(declared, _)| declared == f) {
                return Err(ModelError::value_error(format!("fluent {} is not declared in problem {}", f.name(), self.name)));
            }
        }
        for o in objects {
            if !self.objects.contains(o) {
                return Err(ModelError::value_error(format!("object {} is not declared in problem {}", o, self.name)));
            }
        }
        Ok(())
    }

    /// Completion check: every grounding of a fluent without default must have an initial value.
    pub fn build(self) -> Result<Problem> {
        let problem = Problem {
            name: self.name,
            fluents: self.fluents,
            objects: self.objects,
            actions: self.actions,
            initial_values: self.initial_values,
            goals: self.goals,
        };
        let known: HashSet<(&str, Vec<&Constant>)> = problem
            .initial_values
            .iter()
            .filter_map(|(f, _)| f.as_fluent())
            .map(|(f, args)| (f.name(), args.iter().filter_map(Expression::as_constant).collect()))
            .collect();
        for (fluent, default) in &problem.fluents {
            if default.is_some() {
                continue;
            }
            for args in problem.groundings(fluent)? {
                let key: (&str, Vec<&Constant>) = (fluent.name(), args.iter().collect());
                if !known.contains(&key) {
                    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                    return Err(ModelError::value_error(format!(
                        "initial value of {}({}) is missing in problem {}",
                        fluent.name(),
                        args.join(", "),
                        problem.name
                    )));
                }
            }
        }
        Ok(problem)
    }
}

impl Problem {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fluents(&self) -> &[(Arc<Fluent>, Option<Expression>)] {
        &self.fluents
    }

    pub fn fluent(&self, name: &str) -> Option<&Arc<Fluent>> {
        self.fluents.iter().map(|(f, _)| f).find(|f| f.name() == name)
    }

    pub fn objects(&self) -> &[Object] {
        &self.objects
    }

    pub fn object(&self, name: &str, tpe: &UserType) -> Option<&Object> {
        self.objects.iter().find(|o| o.name() == name && o.tpe() == tpe)
    }

    pub fn objects_of<'a>(&'a self, tpe: &'a UserType) -> impl Iterator<Item = &'a Object> + 'a {
        self.objects.iter().filter(move |o| o.tpe() == tpe)
    }

    pub fn actions(&self) -> &[Arc<Action>] {
        &self.actions
    }

    /// First action declared with this name.
    pub fn action(&self, name: &str) -> Option<&Arc<Action>> {
        self.actions.iter().find(|a| a.name() == name)
    }

    pub fn action_with_signature(&self, name: &str, signature: &[Type]) -> Option<&Arc<Action>> {
        self.actions.iter().find(|a| a.name() == name && a.signature() == signature)
    }

    pub fn initial_values(&self) -> &[(Expression, Expression)] {
        &self.initial_values
    }

    /// Explicit initial value of a grounded fluent, falling back to the fluent default.
    pub fn initial_value(&self, fluent: &Expression) -> Option<&Expression> {
        self.initial_values.iter().find(|(f, _)| f == fluent).map(|(_, v)| v).or_else(|| {
            let (f, _) = fluent.as_fluent()?;
            self.fluents.iter().find(|(declared, _)| declared == f).and_then(|(_, d)| d.as_ref())
        })
    }

    pub fn goals(&self) -> &[Expression] {
        &self.goals
    }

    /// User types in first-appearance order over fluents, objects and action parameters.
    pub fn user_types(&self) -> Vec<UserType> {
        let mut types: Vec<UserType> = Vec::new();
        let mut visit = |t: &Type| {
            if let Some(u) = t.as_user() {
                if !types.contains(u) {
                    types.push(u.clone())
                }
            }
        };
        for (f, _) in &self.fluents {
            visit(f.value_type());
            f.signature().iter().for_each(&mut visit);
        }
        for o in &self.objects {
            visit(&Type::User(o.tpe().clone()));
        }
        for a in &self.actions {
            a.parameters().iter().for_each(|p| visit(p.tpe()));
        }
        types
    }

    /// Number of values of a type, `None` when it is unbounded.
    pub fn domain_size(&self, tpe: &Type) -> Option<u128> {
        match tpe {
            Type::Bool => Some(2),
            Type::User(u) => Some(self.objects_of(u).count() as u128),
            Type::Int { lower: Some(lo), upper: Some(hi) } => Some((*hi as i128 - *lo as i128 + 1).max(0) as u128),
            _ => None,
        }
    }

    /// Finite domain of a type, `None` when it is unbounded or larger than [`MAX_GROUNDINGS`].
    pub fn domain(&self, tpe: &Type) -> Option<Vec<Constant>> {
        if self.domain_size(tpe)? > MAX_GROUNDINGS {
            return None;
        }
        match tpe {
            Type::Bool => Some(vec![Constant::Bool(false), Constant::Bool(true)]),
            Type::User(u) => Some(self.objects_of(u).cloned().map(Constant::Object).collect()),
            Type::Int { lower: Some(lo), upper: Some(hi) } => Some((*lo..=*hi).map(Constant::Int).collect()),
            _ => None,
        }
    }

    /// Size of the product of the given domains, `None` when one of them is unbounded or the product overflows.
    pub fn product_size<'a>(&self, types: impl IntoIterator<Item = &'a Type>) -> Option<u128> {
        types.into_iter().try_fold(1u128, |acc, t| acc.checked_mul(self.domain_size(t)?))
    }

    /// Every argument tuple the fluent can be applied to, produced lazily.
    pub fn groundings(&self, fluent: &Fluent) -> Result<Groundings> {
        match self.product_size(fluent.signature()) {
            Some(n) if n <= MAX_GROUNDINGS => (),
            Some(n) => {
                return Err(ModelError::value_error(format!(
                    "fluent {} has {} groundings, more than the limit of {}",
                    fluent, n, MAX_GROUNDINGS
                )))
            }
            None => return Err(ModelError::value_error(format!("fluent {} has an unbounded signature", fluent))),
        }
        let domains = fluent.signature().iter().map(|t| self.domain(t).unwrap_or_default()).collect();
        Ok(Groundings::new(domains))
    }
}

/// Upper bound on the number of groundings of one fluent, and on the size of any domain
/// enumerated for it or for a quantifier.
pub const MAX_GROUNDINGS: u128 = 1 << 20;

/// Odometer over the cartesian product of some domains, last position varying fastest.
pub struct Groundings {
    domains: Vec<Vec<Constant>>,
    index: Vec<usize>,
    done: bool,
}

impl Groundings {
    fn new(domains: Vec<Vec<Constant>>) -> Self {
        let done = domains.iter().any(Vec::is_empty);
        Self { index: vec![0; domains.len()], domains, done }
    }
}

impl Iterator for Groundings {
    type Item = Vec<Constant>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.index.iter().zip(&self.domains).map(|(i, d)| d[*i].clone()).collect();
        self.done = true;
        for pos in (0..self.index.len()).rev() {
            self.index[pos] += 1;
            if self.index[pos] < self.domains[pos].len() {
                self.done = false;
                break;
            }
            self.index[pos] = 0;
        }
        Some(item)
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "(define (problem {})", self.name)?;
        write!(f, " (:objects")?;
        self.objects.iter().try_for_each(|o| write!(f, " {} - {}", o, o.tpe()))?;
        write!(f, ")\n (:fluents")?;
        self.fluents.iter().try_for_each(|(fl, d)| match d {
            Some(d) => write!(f, " ({} default {})", fl, d),
            None => write!(f, " ({})", fl),
        })?;
        writeln!(f, ")")?;
        self.actions.iter().try_for_each(|a| writeln!(f, "{}", a))?;
        write!(f, " (:init")?;
        self.initial_values.iter().try_for_each(|(fl, v)| write!(f, " (= {} {})", fl, v))?;
        write!(f, ")\n (:goal (and")?;
        self.goals.iter().try_for_each(|g| write!(f, " {}", g))?;
        write!(f, ")))")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::action::InstantaneousAction;
    use crate::model::expression::{fluent, not, Parameter, Variable};

    fn robot() -> (Arc<Fluent>, Object, Object, UserType) {
        let location = UserType::new("Location");
        let robot_at = Arc::new(Fluent::new("robot_at", Type::Bool, vec![location.clone().into()]).unwrap());
        (robot_at, Object::new("l1", location.clone()), Object::new("l2", location.clone()), location)
    }

    #[test]
    fn test_duplicate_object() {
        let (_, l1, _, location) = robot();
        let mut builder = ProblemBuilder::new("robot");
        builder.add_object(l1.clone()).unwrap();
        assert!(matches!(builder.add_object(l1), Err(ModelError::Value(_))));
        // same name under another type is a different object
        builder.add_object(Object::new("l1", UserType::new("Robot"))).unwrap();
        assert_eq!(builder.objects_of(&location).count(), 1);
    }

    #[test]
    fn test_initial_values() {
        let (robot_at, l1, l2, location) = robot();
        let mut builder = ProblemBuilder::new("robot");
        builder.add_fluent(&robot_at, None).unwrap();
        builder.add_objects(vec![l1.clone(), l2.clone()]).unwrap();
        let at_l1 = fluent(&robot_at, vec![(&l1).into()]).unwrap();
        builder.set_initial_value(at_l1.clone(), true).unwrap();
        assert!(matches!(builder.set_initial_value(at_l1.clone(), 5i64), Err(ModelError::Value(_))));
        let p = Parameter::new("l", location);
        let lifted = fluent(&robot_at, vec![(&p).into()]).unwrap();
        assert!(matches!(builder.set_initial_value(lifted, true), Err(ModelError::Value(_))));
        assert!(matches!(builder.set_initial_value(true.into(), true), Err(ModelError::Value(_))));

        // robot_at(l2) has neither value nor default
        let incomplete = builder.clone().build();
        assert!(matches!(incomplete, Err(ModelError::Value(msg)) if msg.contains("robot_at(l2)")));

        builder.set_initial_value(fluent(&robot_at, vec![(&l2).into()]).unwrap(), false).unwrap();
        // overwriting keeps the original position
        builder.set_initial_value(at_l1.clone(), false).unwrap();
        let problem = builder.build().unwrap();
        assert_eq!(problem.initial_values().len(), 2);
        assert_eq!(problem.initial_values()[0], (at_l1.clone(), false.into()));
        assert_eq!(problem.initial_value(&at_l1), Some(&false.into()));
    }

    #[test]
    fn test_defaults_complete_the_initial_state() {
        let (robot_at, l1, l2, _) = robot();
        let mut builder = ProblemBuilder::new("robot");
        builder.add_fluent(&robot_at, Some(false.into())).unwrap();
        builder.add_objects(vec![l1.clone(), l2.clone()]).unwrap();
        let problem = builder.build().unwrap();
        let at_l2 = fluent(&robot_at, vec![(&l2).into()]).unwrap();
        assert_eq!(problem.initial_value(&at_l2), Some(&false.into()));
        assert_eq!(problem.groundings(&robot_at).unwrap().count(), 2);

        let mut bad = ProblemBuilder::new("bad");
        assert!(matches!(bad.add_fluent(&robot_at, Some(3i64.into())), Err(ModelError::Value(_))));
        bad.add_fluent(&robot_at, None).unwrap();
        assert!(matches!(bad.add_fluent(&robot_at, None), Err(ModelError::Value(_))));
    }

    #[test]
    fn test_goals_and_symbols() {
        let (robot_at, l1, l2, location) = robot();
        let mut builder = ProblemBuilder::new("robot");
        builder.add_fluent(&robot_at, Some(false.into())).unwrap();
        builder.add_object(l1.clone()).unwrap();
        let at_l2 = fluent(&robot_at, vec![(&l2).into()]).unwrap();
        assert!(matches!(builder.add_goal(at_l2), Err(ModelError::Value(_))));
        assert!(matches!(builder.add_goal(1i64.into()), Err(ModelError::Type(_))));
        let v = Variable::new("v", location.clone());
        let free = fluent(&robot_at, vec![(&v).into()]).unwrap();
        assert!(matches!(builder.add_goal(free.clone()), Err(ModelError::Scope(_))));
        builder.add_goal(expression::forall(vec![v], free).unwrap()).unwrap();

        let undeclared = Arc::new(Fluent::boolean("undeclared").unwrap());
        let mut a = InstantaneousAction::new("a", vec![]).unwrap();
        a.add_precondition(not(fluent(&undeclared, vec![]).unwrap()).unwrap()).unwrap();
        assert!(matches!(builder.add_action(a), Err(ModelError::Value(_))));

        let mut mv = InstantaneousAction::new("move", vec![Parameter::new("to", location)]).unwrap();
        mv.add_effect(fluent(&robot_at, vec![mv.parameter("to").unwrap()]).unwrap(), true).unwrap();
        let mv = builder.add_action(mv).unwrap();
        assert!(matches!(builder.add_action(mv.as_ref().clone()), Err(ModelError::Value(_))));
        let problem = builder.build().unwrap();
        assert_eq!(problem.user_types(), vec![UserType::new("Location")]);
        assert!(problem.action_with_signature("move", &[Type::user("Location")]).is_some());
        assert!(problem.action_with_signature("move", &[]).is_none());
    }

    #[test]
    fn test_bounded_int_signature_totality() {
        let level = Arc::new(Fluent::new("level", Type::int(), vec![Type::int_range(Some(1), Some(3)).unwrap()]).unwrap());
        let mut builder = ProblemBuilder::new("levels");
        builder.add_fluent(&level, None).unwrap();
        for i in 1..=2i64 {
            builder.set_initial_value(fluent(&level, vec![i.into()]).unwrap(), i * 10).unwrap();
        }
        let missing = builder.clone().build();
        assert!(matches!(missing, Err(ModelError::Value(msg)) if msg.contains("level(3)")));

        builder.set_initial_value(fluent(&level, vec![3i64.into()]).unwrap(), 30i64).unwrap();
        let problem = builder.build().unwrap();
        let args: Vec<Vec<Constant>> = problem.groundings(&level).unwrap().collect();
        assert_eq!(args, vec![vec![Constant::Int(1)], vec![Constant::Int(2)], vec![Constant::Int(3)]]);
    }

    #[test]
    fn test_wide_int_signature_is_rejected_without_enumeration() {
        let wide = Type::int_range(Some(0), Some(3000)).unwrap();
        let grid = Arc::new(Fluent::new("grid", Type::Bool, vec![wide.clone(), wide]).unwrap());
        let mut builder = ProblemBuilder::new("grid");
        builder.add_fluent(&grid, None).unwrap();
        assert!(matches!(builder.clone().build(), Err(ModelError::Value(msg)) if msg.contains("limit")));

        let huge = Type::int_range(Some(i64::MIN), Some(i64::MAX)).unwrap();
        let cell = Arc::new(Fluent::new("cell", Type::Bool, vec![huge.clone()]).unwrap());
        let mut builder = ProblemBuilder::new("cells");
        builder.add_fluent(&cell, None).unwrap();
        assert!(matches!(builder.build(), Err(ModelError::Value(_))));

        // a default makes the initial state total without enumerating anything
        let mut builder = ProblemBuilder::new("cells");
        builder.add_fluent(&cell, Some(false.into())).unwrap();
        let problem = builder.build().unwrap();
        assert_eq!(problem.domain_size(&huge), Some(1u128 << 64));
        assert!(problem.domain(&huge).is_none());
        assert!(problem.groundings(&cell).is_err());
    }

    #[test]
    fn test_first_missing_grounding_is_reported() {
        let (robot_at, l1, l2, location) = robot();
        let pair = Arc::new(Fluent::new("linked", Type::Bool, vec![location.clone().into(), location.into()]).unwrap());
        let mut builder = ProblemBuilder::new("robot");
        builder.add_fluent(&robot_at, Some(false.into())).unwrap();
        builder.add_fluent(&pair, None).unwrap();
        builder.add_objects(vec![l1, l2]).unwrap();
        // last position varies fastest
        assert!(matches!(builder.build(), Err(ModelError::Value(msg)) if msg.contains("linked(l1, l1)")));
    }
}
