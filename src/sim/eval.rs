use std::cmp::Ordering;

use thiserror::Error;

use super::state::{State, StateVariable, Value};
use crate::model::{Expression, ExpressionKind, Fluent, Parameter, Problem, Variable, MAX_GROUNDINGS};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EvalError {
    #[error("{0} has no value")]
    Unknown(String),

    #[error("{0} is not bound")]
    Unbound(String),

    #[error("division by zero in {0}")]
    DivisionByZero(String),

    #[error("{0} does not evaluate to a {1}")]
    Mistyped(String, &'static str),

    #[error("cannot enumerate the domain of {0}")]
    Unbounded(String),

    #[error("{0} is outside the signature of its fluent")]
    OutOfRange(String),
}

/// Evaluates expressions of one action instance (or of the problem itself) against a state.
pub struct Evaluator<'a> {
    problem: &'a Problem,
    state: &'a State,
    parameters: &'a [(Parameter, Value)],
}

impl<'a> Evaluator<'a> {
    pub fn new(problem: &'a Problem, state: &'a State, parameters: &'a [(Parameter, Value)]) -> Self {
        Self { problem, state, parameters }
    }

    pub fn eval(&self, e: &Expression) -> Result<Value, EvalError> {
        self.eval_in(e, &mut Vec::new())
    }

    pub fn holds(&self, e: &Expression) -> Result<bool, EvalError> {
        self.eval(e)?.as_bool().ok_or_else(|| EvalError::Mistyped(e.to_string(), "boolean"))
    }

    /// State variable written by an effect target.
    pub fn target(&self, e: &Expression) -> Result<StateVariable, EvalError> {
        let (f, args) = e.as_fluent().ok_or_else(|| EvalError::Mistyped(e.to_string(), "fluent"))?;
        let mut env = Vec::new();
        let args = args.iter().map(|a| self.eval_in(a, &mut env)).collect::<Result<Vec<_>, _>>()?;
        let key = StateVariable::new(f.name(), args);
        check_signature(f, &key)?;
        Ok(key)
    }

    fn boolean(&self, e: &Expression, env: &mut Vec<(Variable, Value)>) -> Result<bool, EvalError> {
        self.eval_in(e, env)?.as_bool().ok_or_else(|| EvalError::Mistyped(e.to_string(), "boolean"))
    }

    fn number(&self, e: &Expression, env: &mut Vec<(Variable, Value)>) -> Result<malachite::Rational, EvalError> {
        match self.eval_in(e, env)? {
            Value::Number(n) => Ok(n),
            _ => Err(EvalError::Mistyped(e.to_string(), "number")),
        }
    }

    fn compare(&self, l: &Expression, r: &Expression, env: &mut Vec<(Variable, Value)>) -> Result<Ordering, EvalError> {
        let l = self.number(l, env)?;
        let r = self.number(r, env)?;
        Ok(l.cmp(&r))
    }

    fn eval_in(&self, e: &Expression, env: &mut Vec<(Variable, Value)>) -> Result<Value, EvalError> {
        use ExpressionKind::*;
        let v = match e.kind() {
            Constant(c) => Value::from(c),
            Fluent(f, args) => {
                let args = args.iter().map(|a| self.eval_in(a, env)).collect::<Result<Vec<_>, _>>()?;
                let key = StateVariable::new(f.name(), args);
                check_signature(f, &key)?;
                self.state.get(&key).cloned().ok_or_else(|| EvalError::Unknown(key.to_string()))?
            }
            Parameter(p) => self
                .parameters
                .iter()
                .find(|(bound, _)| bound == p)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| EvalError::Unbound(e.to_string()))?,
            Variable(v) => env
                .iter()
                .rev()
                .find(|(bound, _)| bound == v)
                .map(|(_, v)| v.clone())
                .ok_or_else(|| EvalError::Unbound(e.to_string()))?,
            Not(x) => Value::Bool(!self.boolean(x, env)?),
            And(xs) => {
                for x in xs {
                    if !self.boolean(x, env)? {
                        return Ok(Value::Bool(false));
                    }
                }
                Value::Bool(true)
            }
            Or(xs) => {
                for x in xs {
                    if self.boolean(x, env)? {
                        return Ok(Value::Bool(true));
                    }
                }
                Value::Bool(false)
            }
            Implies(l, r) => Value::Bool(!self.boolean(l, env)? || self.boolean(r, env)?),
            Iff(l, r) => Value::Bool(self.boolean(l, env)? == self.boolean(r, env)?),
            Equals(l, r) => Value::Bool(self.eval_in(l, env)? == self.eval_in(r, env)?),
            Ge(l, r) => Value::Bool(self.compare(l, r, env)? != Ordering::Less),
            Gt(l, r) => Value::Bool(self.compare(l, r, env)? == Ordering::Greater),
            Le(l, r) => Value::Bool(self.compare(l, r, env)? != Ordering::Greater),
            Lt(l, r) => Value::Bool(self.compare(l, r, env)? == Ordering::Less),
            Plus(l, r) => Value::Number(self.number(l, env)? + self.number(r, env)?),
            Minus(l, r) => Value::Number(self.number(l, env)? - self.number(r, env)?),
            Times(l, r) => Value::Number(self.number(l, env)? * self.number(r, env)?),
            Div(l, r) => {
                let (l, r) = (self.number(l, env)?, self.number(r, env)?);
                if r == 0 {
                    return Err(EvalError::DivisionByZero(e.to_string()));
                }
                Value::Number(l / r)
            }
            Exists(vars, body) => {
                self.check_domain(vars)?;
                Value::Bool(self.quantify(vars, body, env, true)?)
            }
            Forall(vars, body) => {
                self.check_domain(vars)?;
                Value::Bool(self.quantify(vars, body, env, false)?)
            }
        };
        Ok(v)
    }

    fn check_domain(&self, vars: &[Variable]) -> Result<(), EvalError> {
        match self.problem.product_size(vars.iter().map(Variable::tpe)) {
            Some(n) if n <= MAX_GROUNDINGS => Ok(()),
            _ => {
                let types: Vec<String> = vars.iter().map(|v| v.tpe().to_string()).collect();
                Err(EvalError::Unbounded(types.join(" x ")))
            }
        }
    }

    /// Existential when `any`, universal otherwise. Variables range over the problem objects of their type,
    /// and the joint domain may not exceed [`MAX_GROUNDINGS`].
    fn quantify(
        &self,
        vars: &[Variable],
        body: &Expression,
        env: &mut Vec<(Variable, Value)>,
        any: bool,
    ) -> Result<bool, EvalError> {
        let (v, rest) = match vars.split_first() {
            Some(split) => split,
            None => return self.boolean(body, env),
        };
        let domain = self.problem.domain(v.tpe()).ok_or_else(|| EvalError::Unbounded(v.tpe().to_string()))?;
        for value in &domain {
            env.push((v.clone(), Value::from(value)));
            let result = self.quantify(rest, body, env, any);
            env.pop();
            if result? == any {
                return Ok(any);
            }
        }
        Ok(!any)
    }
}

/// Numeric arguments must lie in the bounds of the fluent's signature.
fn check_signature(f: &Fluent, key: &StateVariable) -> Result<(), EvalError> {
    let fits = f.signature().iter().zip(key.args()).all(|(t, v)| match v {
        Value::Number(n) => t.contains(n),
        _ => true,
    });
    if fits {
        Ok(())
    } else {
        Err(EvalError::OutOfRange(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use malachite::Rational;

    use super::*;
    use crate::model::expression::{self, fluent};
    use crate::model::{Fluent, Object, ProblemBuilder, Type, UserType};

    #[test]
    fn test_quantifiers_range_over_objects() {
        let location = UserType::new("Location");
        let visited = Arc::new(Fluent::new("visited", Type::Bool, vec![location.clone().into()]).unwrap());
        let l1 = Object::new("l1", location.clone());
        let l2 = Object::new("l2", location.clone());
        let mut builder = ProblemBuilder::new("visits");
        builder.add_fluent(&visited, Some(false.into())).unwrap();
        builder.add_objects(vec![l1.clone(), l2.clone()]).unwrap();
        builder.set_initial_value(fluent(&visited, vec![(&l1).into()]).unwrap(), true).unwrap();
        let problem = builder.build().unwrap();
        let state = State::initial(&problem);

        let v = crate::model::Variable::new("l", location);
        let body = fluent(&visited, vec![(&v).into()]).unwrap();
        let some = expression::exists(vec![v.clone()], body.clone()).unwrap();
        let all = expression::forall(vec![v], body).unwrap();
        let eval = Evaluator::new(&problem, &state, &[]);
        assert_eq!(eval.holds(&some), Ok(true));
        assert_eq!(eval.holds(&all), Ok(false));
    }

    #[test]
    fn test_exact_arithmetic() {
        let problem = ProblemBuilder::new("empty").build().unwrap();
        let state = State::initial(&problem);
        let eval = Evaluator::new(&problem, &state, &[]);
        let third = expression::div(1i64.into(), 3i64.into()).unwrap();
        let sum = expression::plus(expression::plus(third.clone(), third.clone()).unwrap(), third).unwrap();
        assert_eq!(eval.eval(&sum), Ok(Value::Number(Rational::from(1))));
        let by_zero = expression::div(1i64.into(), 0i64.into()).unwrap();
        assert!(matches!(eval.eval(&by_zero), Err(EvalError::DivisionByZero(_))));
        let cmp = expression::equals(1i64.into(), Rational::from(1).into()).unwrap();
        assert_eq!(eval.holds(&cmp), Ok(true));
    }

    #[test]
    fn test_quantifier_over_wide_range() {
        let wide = Type::int_range(Some(0), Some(1 << 40)).unwrap();
        let seen = Arc::new(Fluent::new("seen", Type::Bool, vec![wide.clone()]).unwrap());
        let mut builder = ProblemBuilder::new("seen");
        builder.add_fluent(&seen, Some(false.into())).unwrap();
        let problem = builder.build().unwrap();
        let state = State::initial(&problem);
        let eval = Evaluator::new(&problem, &state, &[]);

        let n = crate::model::Variable::new("n", wide);
        let all = expression::forall(vec![n.clone()], fluent(&seen, vec![(&n).into()]).unwrap()).unwrap();
        assert!(matches!(eval.holds(&all), Err(EvalError::Unbounded(_))));

        // each range fits on its own, the product does not
        let half = Type::int_range(Some(0), Some(1 << 11)).unwrap();
        let (a, b) = (crate::model::Variable::new("a", half.clone()), crate::model::Variable::new("b", half));
        let pair = expression::exists(vec![a.clone(), b.clone()], expression::equals((&a).into(), (&b).into()).unwrap()).unwrap();
        assert!(matches!(eval.holds(&pair), Err(EvalError::Unbounded(msg)) if msg.contains(" x ")));
    }

    #[test]
    fn test_argument_outside_signature() {
        let slot = Type::int_range(Some(1), Some(3)).unwrap();
        let level = Arc::new(Fluent::new("level", Type::int(), vec![slot.clone()]).unwrap());
        let mut builder = ProblemBuilder::new("levels");
        builder.add_fluent(&level, Some(0i64.into())).unwrap();
        let problem = builder.build().unwrap();
        let state = State::initial(&problem);

        let p = Parameter::new("i", slot);
        let read = fluent(&level, vec![(&p).into()]).unwrap();
        let inside = [(p.clone(), Value::Number(Rational::from(2)))];
        assert_eq!(Evaluator::new(&problem, &state, &inside).eval(&read), Ok(Value::Number(Rational::from(0))));
        let outside = [(p, Value::Number(Rational::from(9)))];
        let eval = Evaluator::new(&problem, &state, &outside);
        assert!(matches!(eval.eval(&read), Err(EvalError::OutOfRange(_))));
        assert!(matches!(eval.target(&read), Err(EvalError::OutOfRange(_))));
    }
}
