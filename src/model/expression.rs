use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use malachite::Rational;

use super::error::{ModelError, Result};
use super::types::{Fluent, Object, Type};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Constant {
    Bool(bool),
    Int(i64),
    Real(Rational),
    Object(Object),
}

impl Constant {
    pub fn tpe(&self) -> Type {
        match self {
            Constant::Bool(_) => Type::Bool,
            Constant::Int(_) => Type::int(),
            Constant::Real(_) => Type::real(),
            Constant::Object(o) => Type::User(o.tpe().clone()),
        }
    }

    pub fn as_rational(&self) -> Option<Rational> {
        match self {
            Constant::Int(i) => Some(Rational::from(*i)),
            Constant::Real(r) => Some(r.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Constant::Bool(b) => write!(f, "{}", b),
            Constant::Int(i) => write!(f, "{}", i),
            Constant::Real(r) => write!(f, "{}", r),
            Constant::Object(o) => write!(f, "{}", o),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Parameter {
    name: String,
    tpe: Type,
}

impl Parameter {
    pub fn new(name: impl Into<String>, tpe: impl Into<Type>) -> Self {
        Self { name: name.into(), tpe: tpe.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tpe(&self) -> &Type {
        &self.tpe
    }
}

/// Quantified variable. Only meaningful inside the body of a quantifier declaring it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable {
    name: String,
    tpe: Type,
}

impl Variable {
    pub fn new(name: impl Into<String>, tpe: impl Into<Type>) -> Self {
        Self { name: name.into(), tpe: tpe.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tpe(&self) -> &Type {
        &self.tpe
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ExpressionKind {
    Constant(Constant),
    Fluent(Arc<Fluent>, Vec<Expression>),
    Parameter(Parameter),
    Variable(Variable),
    Not(Box<Expression>),
    And(Vec<Expression>),
    Or(Vec<Expression>),
    Implies(Box<Expression>, Box<Expression>),
    Iff(Box<Expression>, Box<Expression>),
    Equals(Box<Expression>, Box<Expression>),
    Ge(Box<Expression>, Box<Expression>),
    Gt(Box<Expression>, Box<Expression>),
    Le(Box<Expression>, Box<Expression>),
    Lt(Box<Expression>, Box<Expression>),
    Plus(Box<Expression>, Box<Expression>),
    Minus(Box<Expression>, Box<Expression>),
    Times(Box<Expression>, Box<Expression>),
    Div(Box<Expression>, Box<Expression>),
    Exists(Vec<Variable>, Box<Expression>),
    Forall(Vec<Variable>, Box<Expression>),
}

/// Type-checked expression tree, built only through the constructor functions below.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Expression {
    kind: ExpressionKind,
    tpe: Type,
}

impl Expression {
    pub fn kind(&self) -> &ExpressionKind {
        &self.kind
    }

    pub fn tpe(&self) -> &Type {
        &self.tpe
    }

    pub fn children(&self) -> Vec<&Expression> {
        use ExpressionKind::*;
        match &self.kind {
            Constant(_) | Parameter(_) | Variable(_) => Vec::new(),
            Fluent(_, args) | And(args) | Or(args) => args.iter().collect(),
            Not(e) | Exists(_, e) | Forall(_, e) => vec![e.as_ref()],
            Implies(l, r) | Iff(l, r) | Equals(l, r) | Ge(l, r) | Gt(l, r) | Le(l, r) | Lt(l, r) | Plus(l, r)
            | Minus(l, r) | Times(l, r) | Div(l, r) => vec![l.as_ref(), r.as_ref()],
        }
    }

    pub fn as_constant(&self) -> Option<&Constant> {
        match &self.kind {
            ExpressionKind::Constant(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_fluent(&self) -> Option<(&Arc<Fluent>, &[Expression])> {
        match &self.kind {
            ExpressionKind::Fluent(f, args) => Some((f, args)),
            _ => None,
        }
    }

    pub fn is_true(&self) -> bool {
        matches!(self.kind, ExpressionKind::Constant(Constant::Bool(true)))
    }

    pub fn is_ground_fluent(&self) -> bool {
        match self.as_fluent() {
            Some((_, args)) => args.iter().all(|a| a.as_constant().is_some()),
            None => false,
        }
    }

    pub fn free_variables(&self) -> BTreeSet<Variable> {
        fn rec_collect(e: &Expression, set: &mut BTreeSet<Variable>) {
            match &e.kind {
                ExpressionKind::Variable(v) => {
                    set.insert(v.clone());
                }
                ExpressionKind::Exists(vars, body) | ExpressionKind::Forall(vars, body) => {
                    let mut inner = BTreeSet::new();
                    rec_collect(body, &mut inner);
                    vars.iter().for_each(|v| {
                        inner.remove(v);
                    });
                    set.extend(inner);
                }
                _ => e.children().into_iter().for_each(|c| rec_collect(c, set)),
            }
        }
        let mut variable_set = BTreeSet::new();
        rec_collect(self, &mut variable_set);
        variable_set
    }

    pub fn parameters(&self) -> BTreeSet<Parameter> {
        fn rec_collect(e: &Expression, set: &mut BTreeSet<Parameter>) {
            match &e.kind {
                ExpressionKind::Parameter(p) => {
                    set.insert(p.clone());
                }
                _ => e.children().into_iter().for_each(|c| rec_collect(c, set)),
            }
        }
        let mut parameter_set = BTreeSet::new();
        rec_collect(self, &mut parameter_set);
        parameter_set
    }

    /// Every fluent and object constant mentioned in the tree, in first-appearance order.
    pub fn visit_symbols<'a>(&'a self, fluents: &mut Vec<&'a Arc<Fluent>>, objects: &mut Vec<&'a Object>) {
        match &self.kind {
            ExpressionKind::Constant(Constant::Object(o)) => {
                if !objects.contains(&o) {
                    objects.push(o)
                }
            }
            ExpressionKind::Fluent(f, _) => {
                if !fluents.contains(&f) {
                    fluents.push(f)
                }
            }
            _ => (),
        }
        self.children().into_iter().for_each(|c| c.visit_symbols(fluents, objects));
    }

    /// No free variables, and no parameters outside `scope`.
    pub fn check_closed(&self, scope: &[Parameter]) -> Result<()> {
        if let Some(v) = self.free_variables().into_iter().next() {
            return Err(ModelError::scope_error(format!(
                "variable ?{} is used outside the quantifier declaring it in {}",
                v.name, self
            )));
        }
        for p in self.parameters() {
            if !scope.contains(&p) {
                return Err(ModelError::scope_error(format!("parameter ?{} is not visible in {}", p.name, self)));
            }
        }
        Ok(())
    }
}

impl From<Constant> for Expression {
    fn from(value: Constant) -> Self {
        let tpe = value.tpe();
        Expression { kind: ExpressionKind::Constant(value), tpe }
    }
}

impl From<bool> for Expression {
    fn from(value: bool) -> Self {
        Constant::Bool(value).into()
    }
}

impl From<i64> for Expression {
    fn from(value: i64) -> Self {
        Constant::Int(value).into()
    }
}

impl From<Rational> for Expression {
    fn from(value: Rational) -> Self {
        Constant::Real(value).into()
    }
}

impl From<Object> for Expression {
    fn from(value: Object) -> Self {
        Constant::Object(value).into()
    }
}

impl From<&Object> for Expression {
    fn from(value: &Object) -> Self {
        Constant::Object(value.clone()).into()
    }
}

impl From<&Parameter> for Expression {
    fn from(value: &Parameter) -> Self {
        Expression { tpe: value.tpe.clone(), kind: ExpressionKind::Parameter(value.clone()) }
    }
}

impl From<&Variable> for Expression {
    fn from(value: &Variable) -> Self {
        Expression { tpe: value.tpe.clone(), kind: ExpressionKind::Variable(value.clone()) }
    }
}

#[macro_export]
macro_rules! expNot {
    ( $e: expr ) => {
        $crate::model::expression::not($e.clone())
    };
}

#[macro_export]
macro_rules! expAnd {
    ( $($e: expr), * ) => {
        {
            let mut temp_vec = Vec::new();
            $(
                temp_vec.push($e.clone());
            )*
            $crate::model::expression::and(temp_vec)
        }
    };
}

#[macro_export]
macro_rules! expOr {
    ( $($e: expr), * ) => {
        {
            let mut temp_vec = Vec::new();
            $(
                temp_vec.push($e.clone());
            )*
            $crate::model::expression::or(temp_vec)
        }
    };
}

fn require_bool(op: &str, e: &Expression) -> Result<()> {
    if e.tpe.is_bool() {
        Ok(())
    } else {
        Err(ModelError::type_error(format!("{} expects a boolean operand, got {} of type {}", op, e, e.tpe)))
    }
}

fn require_numeric(op: &str, e: &Expression) -> Result<()> {
    if e.tpe.is_numeric() {
        Ok(())
    } else {
        Err(ModelError::type_error(format!("{} expects a numeric operand, got {} of type {}", op, e, e.tpe)))
    }
}

fn boolean(kind: ExpressionKind) -> Expression {
    Expression { kind, tpe: Type::Bool }
}

/// Constant operands must also lie inside the bounds of a ranged numeric type.
pub(crate) fn fits(expected: &Type, e: &Expression) -> bool {
    if !expected.accepts(&e.tpe) {
        return false;
    }
    match e.as_constant().and_then(Constant::as_rational) {
        Some(value) if expected.is_numeric() => expected.contains(&value),
        _ => true,
    }
}

pub fn fluent(f: &Arc<Fluent>, args: Vec<Expression>) -> Result<Expression> {
    if args.len() != f.arity() {
        return Err(ModelError::type_error(format!(
            "fluent {} expects {} arguments, got {}",
            f.name(),
            f.arity(),
            args.len()
        )));
    }
    for (i, (arg, expected)) in args.iter().zip(f.signature()).enumerate() {
        if !fits(expected, arg) {
            return Err(ModelError::type_error(format!(
                "argument {} of fluent {} must be of type {}, got {} of type {}",
                i,
                f.name(),
                expected,
                arg,
                arg.tpe
            )));
        }
    }
    Ok(Expression { tpe: f.value_type().clone(), kind: ExpressionKind::Fluent(f.clone(), args) })
}

pub fn not(e: Expression) -> Result<Expression> {
    require_bool("not", &e)?;
    Ok(boolean(ExpressionKind::Not(Box::new(e))))
}

pub fn and(args: Vec<Expression>) -> Result<Expression> {
    args.iter().try_for_each(|e| require_bool("and", e))?;
    Ok(boolean(ExpressionKind::And(args)))
}

pub fn or(args: Vec<Expression>) -> Result<Expression> {
    args.iter().try_for_each(|e| require_bool("or", e))?;
    Ok(boolean(ExpressionKind::Or(args)))
}

pub fn implies(left: Expression, right: Expression) -> Result<Expression> {
    require_bool("implies", &left)?;
    require_bool("implies", &right)?;
    Ok(boolean(ExpressionKind::Implies(Box::new(left), Box::new(right))))
}

pub fn iff(left: Expression, right: Expression) -> Result<Expression> {
    require_bool("iff", &left)?;
    require_bool("iff", &right)?;
    Ok(boolean(ExpressionKind::Iff(Box::new(left), Box::new(right))))
}

pub fn equals(left: Expression, right: Expression) -> Result<Expression> {
    if !left.tpe.unifies(&right.tpe) {
        return Err(ModelError::type_error(format!(
            "cannot compare {} of type {} with {} of type {}",
            left, left.tpe, right, right.tpe
        )));
    }
    Ok(boolean(ExpressionKind::Equals(Box::new(left), Box::new(right))))
}

macro_rules! comparison {
    ($name: ident, $variant: ident, $op: expr) => {
        pub fn $name(left: Expression, right: Expression) -> Result<Expression> {
            require_numeric($op, &left)?;
            require_numeric($op, &right)?;
            Ok(boolean(ExpressionKind::$variant(Box::new(left), Box::new(right))))
        }
    };
}

comparison!(ge, Ge, ">=");
comparison!(gt, Gt, ">");
comparison!(le, Le, "<=");
comparison!(lt, Lt, "<");

macro_rules! arithmetic {
    ($name: ident, $variant: ident, $op: expr) => {
        pub fn $name(left: Expression, right: Expression) -> Result<Expression> {
            require_numeric($op, &left)?;
            require_numeric($op, &right)?;
            let tpe = if $op != "/" && left.tpe.is_int() && right.tpe.is_int() { Type::int() } else { Type::real() };
            Ok(Expression { kind: ExpressionKind::$variant(Box::new(left), Box::new(right)), tpe })
        }
    };
}

arithmetic!(plus, Plus, "+");
arithmetic!(minus, Minus, "-");
arithmetic!(times, Times, "*");
arithmetic!(div, Div, "/");

fn check_quantifier(op: &str, vars: &[Variable], body: &Expression) -> Result<()> {
    if vars.is_empty() {
        return Err(ModelError::value_error(format!("{} must bind at least one variable", op)));
    }
    for (i, v) in vars.iter().enumerate() {
        if vars[..i].iter().any(|prev| prev.name == v.name) {
            return Err(ModelError::scope_error(format!("{} binds ?{} twice", op, v.name)));
        }
        if !v.tpe.is_enumerable() {
            return Err(ModelError::type_error(format!("cannot quantify ?{} over type {}", v.name, v.tpe)));
        }
    }
    require_bool(op, body)
}

pub fn exists(vars: Vec<Variable>, body: Expression) -> Result<Expression> {
    check_quantifier("exists", &vars, &body)?;
    Ok(boolean(ExpressionKind::Exists(vars, Box::new(body))))
}

pub fn forall(vars: Vec<Variable>, body: Expression) -> Result<Expression> {
    check_quantifier("forall", &vars, &body)?;
    Ok(boolean(ExpressionKind::Forall(vars, Box::new(body))))
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fn list(f: &mut fmt::Formatter, head: &str, args: &[Expression]) -> fmt::Result {
            write!(f, "({}", head)?;
            args.iter().try_for_each(|item| write!(f, " {}", item))?;
            write!(f, ")")
        }
        fn quantified(f: &mut fmt::Formatter, head: &str, vars: &[self::Variable], body: &Expression) -> fmt::Result {
            write!(f, "({} (", head)?;
            let mut it = vars.iter();
            it.by_ref().take(1).try_for_each(|v| write!(f, "?{} - {}", v.name, v.tpe))?;
            it.try_for_each(|v| write!(f, " ?{} - {}", v.name, v.tpe))?;
            write!(f, ") {})", body)
        }
        use ExpressionKind::*;
        match &self.kind {
            Constant(c) => write!(f, "{}", c),
            Fluent(fl, args) => list(f, fl.name(), args),
            Parameter(p) => write!(f, "?{}", p.name),
            Variable(v) => write!(f, "?{}", v.name),
            Not(e) => write!(f, "(not {})", e),
            And(v) => list(f, "and", v),
            Or(v) => list(f, "or", v),
            Implies(l, r) => write!(f, "(imply {} {})", l, r),
            Iff(l, r) => write!(f, "(iff {} {})", l, r),
            Equals(l, r) => write!(f, "(= {} {})", l, r),
            Ge(l, r) => write!(f, "(>= {} {})", l, r),
            Gt(l, r) => write!(f, "(> {} {})", l, r),
            Le(l, r) => write!(f, "(<= {} {})", l, r),
            Lt(l, r) => write!(f, "(< {} {})", l, r),
            Plus(l, r) => write!(f, "(+ {} {})", l, r),
            Minus(l, r) => write!(f, "(- {} {})", l, r),
            Times(l, r) => write!(f, "(* {} {})", l, r),
            Div(l, r) => write!(f, "(/ {} {})", l, r),
            Exists(vars, body) => quantified(f, "exists", vars, body),
            Forall(vars, body) => quantified(f, "forall", vars, body),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::UserType;

    fn location() -> UserType {
        UserType::new("Location")
    }

    fn robot_at() -> Arc<Fluent> {
        Arc::new(Fluent::new("robot_at", Type::Bool, vec![location().into()]).unwrap())
    }

    #[test]
    fn test_fluent_arity_and_types() {
        let l1 = Object::new("l1", location());
        let r1 = Object::new("r1", UserType::new("Robot"));
        let f = robot_at();
        let e = fluent(&f, vec![(&l1).into()]).unwrap();
        assert_eq!(e.tpe(), &Type::Bool);
        assert!(e.is_ground_fluent());
        assert_eq!(e.to_string(), "(robot_at l1)");

        assert!(matches!(fluent(&f, vec![]), Err(ModelError::Type(_))));
        assert!(matches!(fluent(&f, vec![(&l1).into(), (&l1).into()]), Err(ModelError::Type(_))));
        assert!(matches!(fluent(&f, vec![(&r1).into()]), Err(ModelError::Type(_))));
        assert!(matches!(fluent(&f, vec![true.into()]), Err(ModelError::Type(_))));
    }

    #[test]
    fn test_ranged_fluent_argument() {
        let level = Arc::new(Fluent::new("level", Type::Bool, vec![Type::int_range(Some(0), Some(3)).unwrap()]).unwrap());
        assert!(fluent(&level, vec![2i64.into()]).is_ok());
        assert!(matches!(fluent(&level, vec![7i64.into()]), Err(ModelError::Type(_))));
    }

    #[test]
    fn test_connectives_require_booleans() {
        let battery = Arc::new(Fluent::new("battery", Type::real(), vec![]).unwrap());
        let b = fluent(&battery, vec![]).unwrap();
        assert!(matches!(and(vec![true.into(), b.clone()]), Err(ModelError::Type(_))));
        assert!(matches!(not(b.clone()), Err(ModelError::Type(_))));
        assert!(matches!(implies(b.clone(), true.into()), Err(ModelError::Type(_))));
        assert!(matches!(plus(b.clone(), true.into()), Err(ModelError::Type(_))));
        assert!(ge(b.clone(), 10i64.into()).is_ok());
        assert_eq!(minus(b.clone(), 10i64.into()).unwrap().tpe(), &Type::real());
        assert_eq!(plus(1i64.into(), 2i64.into()).unwrap().tpe(), &Type::int());
        assert_eq!(div(1i64.into(), 2i64.into()).unwrap().tpe(), &Type::real());
        assert!(and(vec![]).is_ok());
    }

    #[test]
    fn test_equals_requires_unifying_types() {
        let l1 = Object::new("l1", location());
        let r1 = Object::new("r1", UserType::new("Robot"));
        assert!(equals((&l1).into(), (&l1).into()).is_ok());
        assert!(equals(1i64.into(), Rational::from_signeds(1, 2).into()).is_ok());
        assert!(matches!(equals((&l1).into(), (&r1).into()), Err(ModelError::Type(_))));
        assert!(matches!(equals(true.into(), 1i64.into()), Err(ModelError::Type(_))));
    }

    #[test]
    fn test_quantifier_scope() {
        let f = robot_at();
        let mid = Variable::new("mid_loc", location());
        let body = fluent(&f, vec![(&mid).into()]).unwrap();
        assert_eq!(body.free_variables().len(), 1);
        assert!(matches!(body.check_closed(&[]), Err(ModelError::Scope(_))));

        let q = exists(vec![mid.clone()], body.clone()).unwrap();
        assert!(q.free_variables().is_empty());
        assert!(q.check_closed(&[]).is_ok());
        assert_eq!(q.to_string(), "(exists (?mid_loc - Location) (robot_at ?mid_loc))");

        // the variable escapes when used next to its quantifier
        let escaped = and(vec![q.clone(), body.clone()]).unwrap();
        assert!(matches!(escaped.check_closed(&[]), Err(ModelError::Scope(_))));

        // nested quantifiers over the same name shadow
        let nested = forall(vec![mid.clone()], exists(vec![mid.clone()], body.clone()).unwrap()).unwrap();
        assert!(nested.check_closed(&[]).is_ok());

        assert!(matches!(exists(vec![mid.clone(), mid.clone()], body.clone()), Err(ModelError::Scope(_))));
        assert!(matches!(exists(vec![], true.into()), Err(ModelError::Value(_))));
        assert!(matches!(exists(vec![Variable::new("x", Type::real())], true.into()), Err(ModelError::Type(_))));
    }

    #[test]
    fn test_parameter_scope() {
        let f = robot_at();
        let l_from = Parameter::new("l_from", location());
        let e = fluent(&f, vec![(&l_from).into()]).unwrap();
        assert!(e.check_closed(&[l_from.clone()]).is_ok());
        assert!(matches!(e.check_closed(&[]), Err(ModelError::Scope(_))));
        assert!(matches!(e.check_closed(&[Parameter::new("l_from", Type::user("Robot"))]), Err(ModelError::Scope(_))));
    }

    #[test]
    fn test_structural_equality_and_macros() {
        let x = Arc::new(Fluent::boolean("x").unwrap());
        let y = Arc::new(Fluent::boolean("y").unwrap());
        let ex = fluent(&x, vec![]).unwrap();
        let ey = fluent(&y, vec![]).unwrap();
        let a = crate::expAnd!(ex, crate::expNot!(ey).unwrap()).unwrap();
        let b = and(vec![ex.clone(), not(ey.clone()).unwrap()]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "(and (x) (not (y)))");
        assert_ne!(a, crate::expOr!(ex, ey).unwrap());
    }
}
