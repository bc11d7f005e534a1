use std::fmt;

use malachite::Rational;

use super::error::{ModelError, Result};
use super::expression::{self, Expression, ExpressionKind, Parameter};
use super::timing::{Duration, TimeInterval, Timing};
use super::types::Type;

/// `target := value`, applied only when `condition` holds (always when it is absent).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Effect {
    target: Expression,
    value: Expression,
    condition: Option<Expression>,
}

impl Effect {
    pub fn new(target: Expression, value: Expression, condition: Option<Expression>) -> Result<Self> {
        if target.as_fluent().is_none() {
            return Err(ModelError::value_error(format!("effect target {} is not a fluent expression", target)));
        }
        if !expression::fits(target.tpe(), &value) {
            return Err(ModelError::type_error(format!(
                "cannot assign {} of type {} to {} of type {}",
                value,
                value.tpe(),
                target,
                target.tpe()
            )));
        }
        if let Some(c) = &condition {
            if !c.tpe().is_bool() {
                return Err(ModelError::type_error(format!("effect condition {} is not boolean", c)));
            }
        }
        Ok(Self { target, value, condition })
    }

    pub fn target(&self) -> &Expression {
        &self.target
    }

    pub fn value(&self) -> &Expression {
        &self.value
    }

    pub fn condition(&self) -> Option<&Expression> {
        self.condition.as_ref()
    }

    /// Two effects of one simultaneous set are ambiguous when they write different values to the
    /// same target and nothing shows their conditions exclude each other.
    pub fn conflicts_with(&self, other: &Effect) -> bool {
        self.target == other.target
            && self.value != other.value
            && !mutually_exclusive(self.condition.as_ref(), other.condition.as_ref())
    }

    fn check_scope(&self, scope: &[Parameter]) -> Result<()> {
        self.target.check_closed(scope)?;
        self.value.check_closed(scope)?;
        if let Some(c) = &self.condition {
            c.check_closed(scope)?;
        }
        Ok(())
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.condition {
            Some(c) => write!(f, "(when {} (assign {} {}))", c, self.target, self.value),
            None => write!(f, "(assign {} {})", self.target, self.value),
        }
    }
}

/// Syntactic check only: some conjunct of one condition is the negation of a conjunct of the other.
fn mutually_exclusive(a: Option<&Expression>, b: Option<&Expression>) -> bool {
    fn literals<'a>(e: &'a Expression, out: &mut Vec<(&'a Expression, bool)>) {
        match e.kind() {
            ExpressionKind::And(args) => args.iter().for_each(|a| literals(a, out)),
            ExpressionKind::Not(inner) => out.push((inner.as_ref(), false)),
            _ => out.push((e, true)),
        }
    }
    let (a, b) = match (a, b) {
        (Some(a), Some(b)) => (a, b),
        _ => return false,
    };
    let (mut la, mut lb) = (Vec::new(), Vec::new());
    literals(a, &mut la);
    literals(b, &mut lb);
    let is_false = |(e, positive): &(&Expression, bool)| {
        matches!(e.as_constant(), Some(expression::Constant::Bool(v)) if *v != *positive)
    };
    if la.iter().any(is_false) || lb.iter().any(is_false) {
        return true;
    }
    la.iter().any(|(x, px)| lb.iter().any(|(y, py)| x == y && px != py))
}

fn check_parameters(action: &str, parameters: &[Parameter]) -> Result<()> {
    if action.is_empty() {
        return Err(ModelError::value_error("action name must not be empty"));
    }
    for (i, p) in parameters.iter().enumerate() {
        if parameters[..i].iter().any(|prev| prev.name() == p.name()) {
            return Err(ModelError::value_error(format!("action {} declares parameter {} twice", action, p.name())));
        }
    }
    Ok(())
}

fn lookup_parameter(action: &str, parameters: &[Parameter], name: &str) -> Result<Expression> {
    parameters
        .iter()
        .find(|p| p.name() == name)
        .map(Expression::from)
        .ok_or_else(|| ModelError::value_error(format!("action {} has no parameter {}", action, name)))
}

fn check_condition(parameters: &[Parameter], e: &Expression) -> Result<()> {
    if !e.tpe().is_bool() {
        return Err(ModelError::type_error(format!("condition {} is not boolean", e)));
    }
    e.check_closed(parameters)
}

fn push_effect(effects: &mut Vec<Effect>, parameters: &[Parameter], effect: Effect) -> Result<()> {
    effect.check_scope(parameters)?;
    if let Some(other) = effects.iter().find(|other| other.conflicts_with(&effect)) {
        return Err(ModelError::value_error(format!("effect {} is ambiguous with {}", effect, other)));
    }
    effects.push(effect);
    Ok(())
}

fn increase(target: &Expression, delta: Expression) -> Result<Expression> {
    expression::plus(target.clone(), delta)
}

fn decrease(target: &Expression, delta: Expression) -> Result<Expression> {
    expression::minus(target.clone(), delta)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstantaneousAction {
    name: String,
    parameters: Vec<Parameter>,
    preconditions: Vec<Expression>,
    effects: Vec<Effect>,
}

impl InstantaneousAction {
    pub fn new(name: impl Into<String>, parameters: Vec<Parameter>) -> Result<Self> {
        let name = name.into();
        check_parameters(&name, &parameters)?;
        Ok(Self { name, parameters, preconditions: Vec::new(), effects: Vec::new() })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Result<Expression> {
        lookup_parameter(&self.name, &self.parameters, name)
    }

    pub fn preconditions(&self) -> &[Expression] {
        &self.preconditions
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    pub fn add_precondition(&mut self, precondition: Expression) -> Result<()> {
        check_condition(&self.parameters, &precondition)?;
        if !self.preconditions.contains(&precondition) {
            self.preconditions.push(precondition);
        }
        Ok(())
    }

    pub fn add_effect(&mut self, target: Expression, value: impl Into<Expression>) -> Result<()> {
        self.push(Effect::new(target, value.into(), None)?)
    }

    pub fn add_conditional_effect(&mut self, target: Expression, value: impl Into<Expression>, condition: Expression) -> Result<()> {
        self.push(Effect::new(target, value.into(), Some(condition))?)
    }

    pub fn add_increase_effect(&mut self, target: Expression, delta: impl Into<Expression>) -> Result<()> {
        let value = increase(&target, delta.into())?;
        self.push(Effect::new(target, value, None)?)
    }

    pub fn add_decrease_effect(&mut self, target: Expression, delta: impl Into<Expression>) -> Result<()> {
        let value = decrease(&target, delta.into())?;
        self.push(Effect::new(target, value, None)?)
    }

    pub fn push(&mut self, effect: Effect) -> Result<()> {
        push_effect(&mut self.effects, &self.parameters, effect)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DurativeAction {
    name: String,
    parameters: Vec<Parameter>,
    duration: Duration,
    conditions: Vec<(TimeInterval, Vec<Expression>)>,
    effects: Vec<(Timing, Vec<Effect>)>,
}

impl DurativeAction {
    /// The duration is fixed to zero until one of the `set_*duration*` methods is called.
    pub fn new(name: impl Into<String>, parameters: Vec<Parameter>) -> Result<Self> {
        let name = name.into();
        check_parameters(&name, &parameters)?;
        Ok(Self {
            name,
            parameters,
            duration: Duration::fixed(0i64.into())?,
            conditions: Vec::new(),
            effects: Vec::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Result<Expression> {
        lookup_parameter(&self.name, &self.parameters, name)
    }

    pub fn duration(&self) -> &Duration {
        &self.duration
    }

    pub fn conditions(&self) -> &[(TimeInterval, Vec<Expression>)] {
        &self.conditions
    }

    pub fn effects(&self) -> &[(Timing, Vec<Effect>)] {
        &self.effects
    }

    pub fn set_duration(&mut self, duration: Duration) -> Result<()> {
        duration.lower().check_closed(&self.parameters)?;
        duration.upper().check_closed(&self.parameters)?;
        self.duration = duration;
        Ok(())
    }

    pub fn set_fixed_duration(&mut self, value: impl Into<Expression>) -> Result<()> {
        self.set_duration(Duration::fixed(value.into())?)
    }

    pub fn set_closed_duration_interval(&mut self, lower: impl Into<Expression>, upper: impl Into<Expression>) -> Result<()> {
        self.set_duration(Duration::new(lower.into(), upper.into(), false, false)?)
    }

    pub fn set_open_duration_interval(&mut self, lower: impl Into<Expression>, upper: impl Into<Expression>) -> Result<()> {
        self.set_duration(Duration::new(lower.into(), upper.into(), true, true)?)
    }

    /// Registers a condition at a single timing or over an interval.
    pub fn add_condition(&mut self, at: impl Into<TimeInterval>, condition: Expression) -> Result<()> {
        check_condition(&self.parameters, &condition)?;
        let at = at.into();
        match self.conditions.iter_mut().find(|(i, _)| *i == at) {
            Some((_, exprs)) => {
                if !exprs.contains(&condition) {
                    exprs.push(condition)
                }
            }
            None => self.conditions.push((at, vec![condition])),
        }
        Ok(())
    }

    pub fn add_effect(&mut self, at: Timing, target: Expression, value: impl Into<Expression>) -> Result<()> {
        self.push(at, Effect::new(target, value.into(), None)?)
    }

    pub fn add_conditional_effect(
        &mut self,
        at: Timing,
        target: Expression,
        value: impl Into<Expression>,
        condition: Expression,
    ) -> Result<()> {
        self.push(at, Effect::new(target, value.into(), Some(condition))?)
    }

    pub fn add_increase_effect(&mut self, at: Timing, target: Expression, delta: impl Into<Expression>) -> Result<()> {
        let value = increase(&target, delta.into())?;
        self.push(at, Effect::new(target, value, None)?)
    }

    pub fn add_decrease_effect(&mut self, at: Timing, target: Expression, delta: impl Into<Expression>) -> Result<()> {
        let value = decrease(&target, delta.into())?;
        self.push(at, Effect::new(target, value, None)?)
    }

    pub fn push(&mut self, at: Timing, effect: Effect) -> Result<()> {
        let index = match self.effects.iter().position(|(t, _)| *t == at) {
            Some(index) => index,
            None => {
                self.effects.push((at, Vec::new()));
                self.effects.len() - 1
            }
        };
        let parameters = &self.parameters;
        let effects = &mut self.effects[index].1;
        let result = push_effect(effects, parameters, effect);
        if self.effects[index].1.is_empty() {
            self.effects.remove(index);
        }
        result
    }

    /// Conditions that must hold somewhere within `interval` when the action lasts `duration`:
    /// point conditions whose timing falls inside it, and interval conditions overlapping it.
    pub fn conditions_during(&self, interval: &TimeInterval, duration: &Rational) -> Vec<&Expression> {
        self.conditions
            .iter()
            .filter(|(at, _)| {
                if at.is_point() {
                    interval.contains(&at.lower().resolve(duration), duration)
                } else {
                    at.overlaps(interval, duration)
                }
            })
            .flat_map(|(_, exprs)| exprs.iter())
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Action {
    Instantaneous(InstantaneousAction),
    Durative(DurativeAction),
}

impl Action {
    pub fn name(&self) -> &str {
        match self {
            Action::Instantaneous(a) => a.name(),
            Action::Durative(a) => a.name(),
        }
    }

    pub fn parameters(&self) -> &[Parameter] {
        match self {
            Action::Instantaneous(a) => a.parameters(),
            Action::Durative(a) => a.parameters(),
        }
    }

    pub fn signature(&self) -> Vec<Type> {
        self.parameters().iter().map(|p| p.tpe().clone()).collect()
    }

    pub fn is_durative(&self) -> bool {
        matches!(self, Action::Durative(_))
    }

    /// Every expression held by the action, in declaration order.
    pub fn expressions(&self) -> Vec<&Expression> {
        fn effect_exprs<'a>(e: &'a Effect, out: &mut Vec<&'a Expression>) {
            out.push(&e.target);
            out.push(&e.value);
            out.extend(e.condition.iter());
        }
        let mut out = Vec::new();
        match self {
            Action::Instantaneous(a) => {
                out.extend(a.preconditions.iter());
                a.effects.iter().for_each(|e| effect_exprs(e, &mut out));
            }
            Action::Durative(a) => {
                out.push(a.duration.lower());
                out.push(a.duration.upper());
                a.conditions.iter().for_each(|(_, exprs)| out.extend(exprs.iter()));
                a.effects.iter().for_each(|(_, effects)| effects.iter().for_each(|e| effect_exprs(e, &mut out)));
            }
        }
        out
    }
}

impl From<InstantaneousAction> for Action {
    fn from(value: InstantaneousAction) -> Self {
        Action::Instantaneous(value)
    }
}

impl From<DurativeAction> for Action {
    fn from(value: DurativeAction) -> Self {
        Action::Durative(value)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = if self.is_durative() { ":durative-action" } else { ":action" };
        write!(f, "({} {}\n :parameters (", kind, self.name())?;
        let mut it = self.parameters().iter();
        it.by_ref().take(1).try_for_each(|p| write!(f, "?{} - {}", p.name(), p.tpe()))?;
        it.try_for_each(|p| write!(f, " ?{} - {}", p.name(), p.tpe()))?;
        writeln!(f, ")")?;
        match self {
            Action::Instantaneous(a) => {
                write!(f, " :precondition (and")?;
                a.preconditions.iter().try_for_each(|p| write!(f, " {}", p))?;
                write!(f, ")\n :effect (and")?;
                a.effects.iter().try_for_each(|e| write!(f, " {}", e))?;
                write!(f, "))")
            }
            Action::Durative(a) => {
                writeln!(f, " :duration {}", a.duration)?;
                write!(f, " :condition (and")?;
                a.conditions.iter().try_for_each(|(at, exprs)| exprs.iter().try_for_each(|e| write!(f, " (at {} {})", at, e)))?;
                write!(f, ")\n :effect (and")?;
                a.effects.iter().try_for_each(|(at, effects)| effects.iter().try_for_each(|e| write!(f, " (at {} {})", at, e)))?;
                write!(f, "))")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::expression::{fluent, not};
    use crate::model::types::{Fluent, UserType};

    fn x() -> Arc<Fluent> {
        Arc::new(Fluent::boolean("x").unwrap())
    }

    #[test]
    fn test_basic_action() {
        let x = fluent(&x(), vec![]).unwrap();
        let mut a = InstantaneousAction::new("a", vec![]).unwrap();
        a.add_precondition(not(x.clone()).unwrap()).unwrap();
        a.add_effect(x.clone(), true).unwrap();
        assert_eq!(a.preconditions().len(), 1);
        assert_eq!(a.effects()[0].target(), &x);
        assert!(a.effects()[0].condition().is_none());
        // preconditions form a set
        a.add_precondition(not(x.clone()).unwrap()).unwrap();
        assert_eq!(a.preconditions().len(), 1);
    }

    #[test]
    fn test_effect_validation() {
        let xf = x();
        let x = fluent(&xf, vec![]).unwrap();
        let mut a = InstantaneousAction::new("a", vec![]).unwrap();
        assert!(matches!(a.add_effect(true.into(), false), Err(ModelError::Value(_))));
        assert!(matches!(a.add_effect(x.clone(), 3i64), Err(ModelError::Type(_))));
        assert!(matches!(a.add_conditional_effect(x.clone(), true, 1i64.into()), Err(ModelError::Type(_))));
        assert!(matches!(a.add_precondition(1i64.into()), Err(ModelError::Type(_))));
        assert!(matches!(a.add_increase_effect(x.clone(), 1i64), Err(ModelError::Type(_))));
        assert!(a.effects().is_empty());
    }

    #[test]
    fn test_parameters() {
        let location = UserType::new("Location");
        let robot_at = Arc::new(Fluent::new("robot_at", Type::Bool, vec![location.clone().into()]).unwrap());
        let params = vec![Parameter::new("l_from", location.clone()), Parameter::new("l_to", location.clone())];
        let mut mv = InstantaneousAction::new("move", params.clone()).unwrap();
        let l_from = mv.parameter("l_from").unwrap();
        assert!(matches!(mv.parameter("nowhere"), Err(ModelError::Value(_))));
        mv.add_precondition(fluent(&robot_at, vec![l_from.clone()]).unwrap()).unwrap();

        let other = InstantaneousAction::new("other", vec![Parameter::new("loc", location.clone())]).unwrap();
        let foreign = fluent(&robot_at, vec![other.parameter("loc").unwrap()]).unwrap();
        assert!(matches!(mv.add_precondition(foreign), Err(ModelError::Scope(_))));

        let twice = vec![Parameter::new("l", location.clone()), Parameter::new("l", location)];
        assert!(matches!(InstantaneousAction::new("bad", twice), Err(ModelError::Value(_))));
        assert_eq!(Action::from(mv).signature(), vec![Type::user("Location"), Type::user("Location")]);
    }

    #[test]
    fn test_ambiguous_effects() {
        let xf = x();
        let cf = Arc::new(Fluent::boolean("c").unwrap());
        let x = fluent(&xf, vec![]).unwrap();
        let c = fluent(&cf, vec![]).unwrap();
        let mut a = InstantaneousAction::new("a", vec![]).unwrap();
        a.add_conditional_effect(c.clone(), false, c.clone()).unwrap();
        // exclusive guards are fine
        a.add_conditional_effect(c.clone(), true, not(c.clone()).unwrap()).unwrap();
        a.add_effect(x.clone(), true).unwrap();
        // redundant duplicates are tolerated
        a.add_effect(x.clone(), true).unwrap();
        assert!(matches!(a.add_effect(x.clone(), false), Err(ModelError::Value(_))));
        assert!(matches!(a.add_conditional_effect(c.clone(), true, x.clone()), Err(ModelError::Value(_))));
        assert_eq!(a.effects().len(), 4);
    }

    #[test]
    fn test_decrease_effect_is_plain_assignment() {
        let battery = Arc::new(Fluent::new("battery_charge", Type::real(), vec![]).unwrap());
        let b = fluent(&battery, vec![]).unwrap();
        let mut a = InstantaneousAction::new("move", vec![]).unwrap();
        a.add_decrease_effect(b.clone(), 10i64).unwrap();
        assert_eq!(a.effects()[0].value(), &expression::minus(b.clone(), 10i64.into()).unwrap());
    }

    #[test]
    fn test_durative_conditions_during() {
        let light = fluent(&Arc::new(Fluent::boolean("light").unwrap()), vec![]).unwrap();
        let handfree = fluent(&Arc::new(Fluent::boolean("handfree").unwrap()), vec![]).unwrap();
        let mended = fluent(&Arc::new(Fluent::boolean("mended").unwrap()), vec![]).unwrap();
        let mut mend = DurativeAction::new("mend_fuse", vec![]).unwrap();
        mend.set_fixed_duration(5i64).unwrap();
        mend.add_condition(Timing::start(), handfree.clone()).unwrap();
        mend.add_condition(TimeInterval::closed(Timing::start(), Timing::end()), light.clone()).unwrap();
        mend.add_condition(Timing::end_plus(1), mended.clone()).unwrap();
        mend.add_effect(Timing::start(), handfree.clone(), false).unwrap();
        mend.add_effect(Timing::end(), handfree.clone(), true).unwrap();

        let five = Rational::from(5);
        let whole = TimeInterval::closed(Timing::start(), Timing::end());
        assert_eq!(mend.conditions_during(&whole, &five), vec![&handfree, &light]);
        let inner = TimeInterval::open(Timing::start(), Timing::end());
        assert_eq!(mend.conditions_during(&inner, &five), vec![&light]);
        let after = TimeInterval::point(Timing::end_plus(1));
        assert_eq!(mend.conditions_during(&after, &five), vec![&mended]);
        assert_eq!(mend.effects().len(), 2);
    }

    #[test]
    fn test_durative_effects_are_grouped_by_timing() {
        let xf = x();
        let x = fluent(&xf, vec![]).unwrap();
        let mut a = DurativeAction::new("a", vec![]).unwrap();
        a.add_effect(Timing::start(), x.clone(), true).unwrap();
        // the same target at another timing is a different happening
        a.add_effect(Timing::end(), x.clone(), false).unwrap();
        assert!(matches!(a.add_effect(Timing::end(), x.clone(), true), Err(ModelError::Value(_))));
        assert_eq!(a.effects().len(), 2);
        assert!(a.set_fixed_duration(true).is_err());
    }
}
