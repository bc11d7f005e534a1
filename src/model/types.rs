use std::fmt;

use malachite::Rational;

use super::error::{ModelError, Result};

/// Problem-specific symbolic type. Two user types are the same type iff their names are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UserType {
    name: String,
}

impl UserType {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for UserType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Type tag of expressions, fluent values and parameters.
/// A missing numeric bound means the range is unbounded on that side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Type {
    Bool,
    Int { lower: Option<i64>, upper: Option<i64> },
    Real { lower: Option<Rational>, upper: Option<Rational> },
    User(UserType),
}

impl Type {
    pub fn int() -> Self {
        Type::Int { lower: None, upper: None }
    }

    pub fn real() -> Self {
        Type::Real { lower: None, upper: None }
    }

    pub fn user(name: impl Into<String>) -> Self {
        Type::User(UserType::new(name))
    }

    pub fn int_range(lower: Option<i64>, upper: Option<i64>) -> Result<Self> {
        if let (Some(lo), Some(hi)) = (lower, upper) {
            if lo > hi {
                return Err(ModelError::value_error(format!("empty integer range [{}, {}]", lo, hi)));
            }
        }
        Ok(Type::Int { lower, upper })
    }

    pub fn real_range(lower: Option<Rational>, upper: Option<Rational>) -> Result<Self> {
        if let (Some(lo), Some(hi)) = (&lower, &upper) {
            if lo > hi {
                return Err(ModelError::value_error(format!("empty real range [{}, {}]", lo, hi)));
            }
        }
        Ok(Type::Real { lower, upper })
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Type::Bool)
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Type::Int { .. })
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int { .. } | Type::Real { .. })
    }

    pub fn as_user(&self) -> Option<&UserType> {
        match self {
            Type::User(u) => Some(u),
            _ => None,
        }
    }

    /// Whether a value of type `other` may be stored where `self` is expected.
    /// Integers widen to reals, nothing else converts.
    pub fn accepts(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Bool, Type::Bool) => true,
            (Type::Int { .. }, Type::Int { .. }) => true,
            (Type::Real { .. }, Type::Int { .. }) | (Type::Real { .. }, Type::Real { .. }) => true,
            (Type::User(l), Type::User(r)) => l == r,
            _ => false,
        }
    }

    /// Whether two operands can be compared for equality.
    pub fn unifies(&self, other: &Type) -> bool {
        match (self, other) {
            (Type::Bool, Type::Bool) => true,
            (Type::User(l), Type::User(r)) => l == r,
            (l, r) => l.is_numeric() && r.is_numeric(),
        }
    }

    /// Types a fluent may be indexed by: their domain must be finite.
    pub fn is_enumerable(&self) -> bool {
        match self {
            Type::Bool | Type::User(_) => true,
            Type::Int { lower: Some(_), upper: Some(_) } => true,
            _ => false,
        }
    }

    pub fn contains(&self, value: &Rational) -> bool {
        match self {
            Type::Int { lower, upper } => {
                lower.map_or(true, |lo| *value >= Rational::from(lo)) && upper.map_or(true, |hi| *value <= Rational::from(hi))
            }
            Type::Real { lower, upper } => {
                lower.as_ref().map_or(true, |lo| value >= lo) && upper.as_ref().map_or(true, |hi| value <= hi)
            }
            _ => false,
        }
    }
}

impl From<UserType> for Type {
    fn from(value: UserType) -> Self {
        Type::User(value)
    }
}

impl From<&UserType> for Type {
    fn from(value: &UserType) -> Self {
        Type::User(value.clone())
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fn bound<T: fmt::Display>(b: &Option<T>, inf: &str) -> String {
            b.as_ref().map_or_else(|| inf.to_owned(), |v| v.to_string())
        }
        match self {
            Type::Bool => write!(f, "bool"),
            Type::Int { lower: None, upper: None } => write!(f, "integer"),
            Type::Int { lower, upper } => write!(f, "integer[{}, {}]", bound(lower, "-inf"), bound(upper, "inf")),
            Type::Real { lower: None, upper: None } => write!(f, "real"),
            Type::Real { lower, upper } => write!(f, "real[{}, {}]", bound(lower, "-inf"), bound(upper, "inf")),
            Type::User(u) => write!(f, "{}", u),
        }
    }
}

/// A named constant of some user type. Identity is the (name, type) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Object {
    name: String,
    tpe: UserType,
}

impl Object {
    pub fn new(name: impl Into<String>, tpe: UserType) -> Self {
        Self { name: name.into(), tpe }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tpe(&self) -> &UserType {
        &self.tpe
    }
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A state variable, possibly indexed by a tuple of typed arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fluent {
    name: String,
    value_type: Type,
    signature: Vec<Type>,
}

impl Fluent {
    pub fn new(name: impl Into<String>, value_type: Type, signature: Vec<Type>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(ModelError::value_error("fluent name must not be empty"));
        }
        if let Some(t) = signature.iter().find(|t| !t.is_enumerable()) {
            return Err(ModelError::type_error(format!("fluent {} cannot be indexed by unbounded type {}", name, t)));
        }
        Ok(Self { name, value_type, signature })
    }

    /// 0-ary boolean state variable.
    pub fn boolean(name: impl Into<String>) -> Result<Self> {
        Self::new(name, Type::Bool, Vec::new())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> &Type {
        &self.value_type
    }

    pub fn signature(&self) -> &[Type] {
        &self.signature
    }

    pub fn arity(&self) -> usize {
        self.signature.len()
    }
}

impl fmt::Display for Fluent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {}(", self.value_type, self.name)?;
        let mut it = self.signature.iter();
        it.by_ref().take(1).try_for_each(|t| write!(f, "{}", t))?;
        it.try_for_each(|t| write!(f, ", {}", t))?;
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ranges() {
        assert!(Type::int_range(Some(0), Some(10)).is_ok());
        assert!(Type::int_range(None, Some(-3)).is_ok());
        assert!(matches!(Type::int_range(Some(5), Some(1)), Err(ModelError::Value(_))));
        let r = Type::real_range(Some(Rational::from(0)), Some(Rational::from(100))).unwrap();
        assert!(r.contains(&Rational::from(100)));
        assert!(!r.contains(&Rational::from(101)));
        assert_eq!(r.to_string(), "real[0, 100]");
        assert_eq!(Type::int_range(Some(1), None).unwrap().to_string(), "integer[1, inf]");
    }

    #[test]
    fn test_accepts() {
        let location = Type::user("Location");
        assert!(location.accepts(&Type::user("Location")));
        assert!(!location.accepts(&Type::user("Robot")));
        assert!(Type::real().accepts(&Type::int()));
        assert!(!Type::int().accepts(&Type::real()));
        assert!(!Type::Bool.accepts(&Type::int()));
        assert!(Type::int().unifies(&Type::real()));
        assert!(!Type::Bool.unifies(&location));
    }

    #[test]
    fn test_fluent_signature_must_be_enumerable() {
        assert!(Fluent::new("robot_at", Type::Bool, vec![Type::user("Location")]).is_ok());
        assert!(Fluent::new("level", Type::real(), vec![Type::int_range(Some(0), Some(3)).unwrap()]).is_ok());
        assert!(matches!(Fluent::new("f", Type::Bool, vec![Type::real()]), Err(ModelError::Type(_))));
        assert!(matches!(Fluent::boolean(""), Err(ModelError::Value(_))));
        assert_eq!(Fluent::new("robot_at", Type::Bool, vec![Type::user("Location")]).unwrap().to_string(), "bool robot_at(Location)");
    }
}
