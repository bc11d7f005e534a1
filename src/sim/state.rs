use std::collections::HashMap;
use std::fmt;

use malachite::Rational;

use crate::model::{Constant, Expression, Object, Problem};

/// Runtime value of a state variable. Integers and reals share the exact rational representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Bool(bool),
    Number(Rational),
    Object(Object),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<&Rational> {
        match self {
            Value::Number(n) => Some(n),
            _ => None,
        }
    }
}

impl From<&Constant> for Value {
    fn from(value: &Constant) -> Self {
        match value {
            Constant::Bool(b) => Value::Bool(*b),
            Constant::Int(i) => Value::Number(Rational::from(*i)),
            Constant::Real(r) => Value::Number(r.clone()),
            Constant::Object(o) => Value::Object(o.clone()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", n),
            Value::Object(o) => write!(f, "{}", o),
        }
    }
}

/// A fluent applied to concrete argument values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateVariable {
    fluent: String,
    args: Vec<Value>,
}

impl StateVariable {
    pub fn new(fluent: impl Into<String>, args: Vec<Value>) -> Self {
        Self { fluent: fluent.into(), args }
    }

    pub fn fluent(&self) -> &str {
        &self.fluent
    }

    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Key of a grounded fluent expression, `None` for anything else.
    pub fn of(e: &Expression) -> Option<Self> {
        let (f, args) = e.as_fluent()?;
        let args = args.iter().map(|a| a.as_constant().map(Value::from)).collect::<Option<Vec<_>>>()?;
        Some(Self::new(f.name(), args))
    }
}

impl fmt::Display for StateVariable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}(", self.fluent)?;
        let mut it = self.args.iter();
        it.by_ref().take(1).try_for_each(|a| write!(f, "{}", a))?;
        it.try_for_each(|a| write!(f, ", {}", a))?;
        write!(f, ")")
    }
}

/// Total assignment of the problem's state variables. Variables never written read as their fluent's default.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct State {
    defaults: HashMap<String, Value>,
    values: HashMap<StateVariable, Value>,
}

impl State {
    /// Defaults first, explicit initial values on top. Nothing is enumerated, so wide signatures stay cheap.
    pub fn initial(problem: &Problem) -> Self {
        let defaults = problem
            .fluents()
            .iter()
            .filter_map(|(fluent, default)| {
                let default = default.as_ref().and_then(Expression::as_constant)?;
                Some((fluent.name().to_string(), Value::from(default)))
            })
            .collect();
        let values = problem
            .initial_values()
            .iter()
            .filter_map(|(fluent, value)| Some((StateVariable::of(fluent)?, Value::from(value.as_constant()?))))
            .collect();
        Self { defaults, values }
    }

    pub fn get(&self, key: &StateVariable) -> Option<&Value> {
        self.values.get(key).or_else(|| self.defaults.get(&key.fluent))
    }

    pub fn set(&mut self, key: StateVariable, value: Value) {
        self.values.insert(key, value);
    }

    /// Value of a grounded fluent expression.
    pub fn value(&self, fluent: &Expression) -> Option<&Value> {
        StateVariable::of(fluent).and_then(|key| self.get(&key))
    }

    /// Number of state variables written explicitly, by the initial values or by effects.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
