//! Wire messages exchanged with remote planners and validators.
//!
//! Definitions are maintained by hand with the `prost` derives, so no `protoc` is needed at
//! build time. Tags must never be reused once published.

use std::collections::BTreeMap;

// ================== Scalars ==================

/// Exact rational. `numerator` carries the sign, `denominator` is a positive decimal integer.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Real {
    #[prost(string, tag = "1")]
    pub numerator: String,
    #[prost(string, tag = "2")]
    pub denominator: String,
}

// ================== Symbol tables ==================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum TypeKind {
    Unspecified = 0,
    Bool = 1,
    Int = 2,
    Real = 3,
    User = 4,
}

/// Every type used in a message is declared once here and referenced by its position.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct TypeEntry {
    #[prost(enumeration = "TypeKind", tag = "1")]
    pub kind: i32,
    /// Only set for user types.
    #[prost(string, tag = "2")]
    pub name: String,
    #[prost(int64, optional, tag = "3")]
    pub int_lower: Option<i64>,
    #[prost(int64, optional, tag = "4")]
    pub int_upper: Option<i64>,
    #[prost(message, optional, tag = "5")]
    pub real_lower: Option<Real>,
    #[prost(message, optional, tag = "6")]
    pub real_upper: Option<Real>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ObjectEntry {
    #[prost(string, tag = "1")]
    pub name: String,
    /// Must point to a user type.
    #[prost(uint32, tag = "2")]
    pub type_index: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FluentEntry {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(uint32, tag = "2")]
    pub value_type: u32,
    #[prost(uint32, repeated, tag = "3")]
    pub signature: Vec<u32>,
    #[prost(message, optional, tag = "4")]
    pub default_value: Option<ExpressionTree>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct VariableEntry {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(uint32, tag = "2")]
    pub type_index: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ParameterEntry {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(uint32, tag = "2")]
    pub type_index: u32,
}

// ================== Expressions ==================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum NodeKind {
    Unspecified = 0,
    BoolConstant = 1,
    IntConstant = 2,
    RealConstant = 3,
    ObjectConstant = 4,
    FluentRef = 5,
    ParameterRef = 6,
    VariableRef = 7,
    Not = 8,
    And = 9,
    Or = 10,
    Implies = 11,
    Iff = 12,
    Equals = 13,
    Ge = 14,
    Gt = 15,
    Le = 16,
    Lt = 17,
    Plus = 18,
    Minus = 19,
    Times = 20,
    Div = 21,
    Exists = 22,
    Forall = 23,
}

/// One operator or leaf of a post-order expression.
///
/// `index` points into the object table for object constants, the fluent table for fluent
/// references, the enclosing action parameters for parameter references and the tree variable
/// table for variable references. `arity` is the number of operands popped by the node.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Node {
    #[prost(enumeration = "NodeKind", tag = "1")]
    pub kind: i32,
    #[prost(uint32, tag = "2")]
    pub index: u32,
    #[prost(uint32, tag = "3")]
    pub arity: u32,
    #[prost(bool, tag = "4")]
    pub bool_value: bool,
    #[prost(int64, tag = "5")]
    pub int_value: i64,
    #[prost(message, optional, tag = "6")]
    pub real_value: Option<Real>,
    /// Variables bound by a quantifier node, as indices in the tree variable table.
    #[prost(uint32, repeated, tag = "7")]
    pub variables: Vec<u32>,
}

/// Flat post-order expression, root last.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExpressionTree {
    #[prost(message, repeated, tag = "1")]
    pub nodes: Vec<Node>,
    #[prost(message, repeated, tag = "2")]
    pub variables: Vec<VariableEntry>,
}

// ================== Actions ==================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum TimingKind {
    Unspecified = 0,
    Start = 1,
    End = 2,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Timing {
    #[prost(enumeration = "TimingKind", tag = "1")]
    pub kind: i32,
    #[prost(message, optional, tag = "2")]
    pub delay: Option<Real>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Interval {
    #[prost(message, optional, tag = "1")]
    pub lower: Option<Timing>,
    #[prost(message, optional, tag = "2")]
    pub upper: Option<Timing>,
    #[prost(bool, tag = "3")]
    pub left_open: bool,
    #[prost(bool, tag = "4")]
    pub right_open: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Effect {
    #[prost(message, optional, tag = "1")]
    pub target: Option<ExpressionTree>,
    #[prost(message, optional, tag = "2")]
    pub value: Option<ExpressionTree>,
    /// Absent for unconditional effects. Distinct from a constant `true` condition.
    #[prost(message, optional, tag = "3")]
    pub condition: Option<ExpressionTree>,
    /// Only set for effects of durative actions.
    #[prost(message, optional, tag = "4")]
    pub timing: Option<Timing>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Duration {
    #[prost(message, optional, tag = "1")]
    pub lower: Option<ExpressionTree>,
    #[prost(message, optional, tag = "2")]
    pub upper: Option<ExpressionTree>,
    #[prost(bool, tag = "3")]
    pub left_open: bool,
    #[prost(bool, tag = "4")]
    pub right_open: bool,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Condition {
    #[prost(message, optional, tag = "1")]
    pub interval: Option<Interval>,
    #[prost(message, repeated, tag = "2")]
    pub expressions: Vec<ExpressionTree>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum ActionKind {
    Unspecified = 0,
    Instantaneous = 1,
    Durative = 2,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ActionEntry {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(enumeration = "ActionKind", tag = "2")]
    pub kind: i32,
    #[prost(message, repeated, tag = "3")]
    pub parameters: Vec<ParameterEntry>,
    #[prost(message, repeated, tag = "4")]
    pub preconditions: Vec<ExpressionTree>,
    #[prost(message, repeated, tag = "5")]
    pub effects: Vec<Effect>,
    #[prost(message, optional, tag = "6")]
    pub duration: Option<Duration>,
    #[prost(message, repeated, tag = "7")]
    pub conditions: Vec<Condition>,
}

// ================== Problem ==================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct InitialValue {
    #[prost(message, optional, tag = "1")]
    pub fluent: Option<ExpressionTree>,
    #[prost(message, optional, tag = "2")]
    pub value: Option<ExpressionTree>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ProblemMessage {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(message, repeated, tag = "2")]
    pub types: Vec<TypeEntry>,
    #[prost(message, repeated, tag = "3")]
    pub objects: Vec<ObjectEntry>,
    #[prost(message, repeated, tag = "4")]
    pub fluents: Vec<FluentEntry>,
    #[prost(message, repeated, tag = "5")]
    pub actions: Vec<ActionEntry>,
    #[prost(message, repeated, tag = "6")]
    pub initial_values: Vec<InitialValue>,
    #[prost(message, repeated, tag = "7")]
    pub goals: Vec<ExpressionTree>,
}

// ================== Plan ==================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum PlanKind {
    Unspecified = 0,
    Sequential = 1,
    TimeTriggered = 2,
}

/// An action instance. The action is referenced by name and parameter types, since the plan
/// does not carry the problem's action table.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PlanStep {
    #[prost(string, tag = "1")]
    pub action: String,
    #[prost(uint32, repeated, tag = "2")]
    pub signature: Vec<u32>,
    /// One single-constant tree per parameter.
    #[prost(message, repeated, tag = "3")]
    pub arguments: Vec<ExpressionTree>,
    #[prost(message, optional, tag = "4")]
    pub start: Option<Real>,
    #[prost(message, optional, tag = "5")]
    pub duration: Option<Real>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct PlanMessage {
    #[prost(enumeration = "PlanKind", tag = "1")]
    pub kind: i32,
    #[prost(message, repeated, tag = "2")]
    pub types: Vec<TypeEntry>,
    #[prost(message, repeated, tag = "3")]
    pub objects: Vec<ObjectEntry>,
    #[prost(message, repeated, tag = "4")]
    pub steps: Vec<PlanStep>,
}

// ================== Services ==================

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SolverEntry {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(btree_map = "string, string", tag = "2")]
    pub parameters: BTreeMap<String, String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SolveRequest {
    #[prost(message, optional, tag = "1")]
    pub problem: Option<ProblemMessage>,
    #[prost(message, repeated, tag = "2")]
    pub config: Vec<SolverEntry>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum AnswerStatus {
    Unspecified = 0,
    PlanFound = 1,
    NotFound = 2,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Answer {
    #[prost(enumeration = "AnswerStatus", tag = "1")]
    pub status: i32,
    #[prost(message, optional, tag = "2")]
    pub plan: Option<PlanMessage>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ValidateRequest {
    #[prost(message, optional, tag = "1")]
    pub problem: Option<ProblemMessage>,
    #[prost(message, optional, tag = "2")]
    pub plan: Option<PlanMessage>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ValidationAnswer {
    #[prost(bool, tag = "1")]
    pub valid: bool,
    #[prost(string, tag = "2")]
    pub reason: String,
}
