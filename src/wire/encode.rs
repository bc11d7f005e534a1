use std::sync::Arc;

use malachite::Rational;
use tracing::debug;

use super::proto;
use crate::model::{
    Action, ActionInstance, Constant, Effect, Expression, ExpressionKind, Fluent, Object, Parameter, Plan, Problem,
    TimeInterval, TimepointKind, Timing, Type, Variable,
};

pub fn encode_rational(r: &Rational) -> proto::Real {
    let numerator = r.numerator_ref().to_string();
    proto::Real {
        numerator: if *r < 0 { format!("-{}", numerator) } else { numerator },
        denominator: r.denominator_ref().to_string(),
    }
}

fn intern<T: PartialEq + Clone>(table: &mut Vec<T>, item: &T) -> u32 {
    let index = match table.iter().position(|x| x == item) {
        Some(index) => index,
        None => {
            table.push(item.clone());
            table.len() - 1
        }
    };
    index as u32
}

/// Symbol tables of a message under construction. Entries are appended in first-use order,
/// which makes the output a pure function of the encoded value.
#[derive(Default)]
struct Symbols {
    types: Vec<Type>,
    objects: Vec<Object>,
    fluents: Vec<Arc<Fluent>>,
}

impl Symbols {
    fn tpe(&mut self, t: &Type) -> u32 {
        intern(&mut self.types, t)
    }

    fn object(&mut self, o: &Object) -> u32 {
        self.tpe(&o.tpe().into());
        intern(&mut self.objects, o)
    }

    fn fluent(&mut self, f: &Arc<Fluent>) -> u32 {
        intern(&mut self.fluents, f)
    }

    fn object_table(&mut self) -> Vec<proto::ObjectEntry> {
        let objects = self.objects.clone();
        objects
            .iter()
            .map(|o| proto::ObjectEntry { name: o.name().to_owned(), type_index: self.tpe(&o.tpe().into()) })
            .collect()
    }

    fn type_table(&self) -> Vec<proto::TypeEntry> {
        self.types.iter().map(type_entry).collect()
    }
}

fn type_entry(t: &Type) -> proto::TypeEntry {
    let mut entry = proto::TypeEntry::default();
    match t {
        Type::Bool => entry.kind = proto::TypeKind::Bool as i32,
        Type::Int { lower, upper } => {
            entry.kind = proto::TypeKind::Int as i32;
            entry.int_lower = *lower;
            entry.int_upper = *upper;
        }
        Type::Real { lower, upper } => {
            entry.kind = proto::TypeKind::Real as i32;
            entry.real_lower = lower.as_ref().map(encode_rational);
            entry.real_upper = upper.as_ref().map(encode_rational);
        }
        Type::User(u) => {
            entry.kind = proto::TypeKind::User as i32;
            entry.name = u.name().to_owned();
        }
    }
    entry
}

fn node(kind: proto::NodeKind) -> proto::Node {
    proto::Node { kind: kind as i32, ..Default::default() }
}

struct TreeEncoder<'a> {
    symbols: &'a mut Symbols,
    parameters: &'a [Parameter],
    tree: proto::ExpressionTree,
    // innermost binder last
    scope: Vec<(Variable, u32)>,
}

impl<'a> TreeEncoder<'a> {
    fn variable_entry(&mut self, v: &Variable) -> u32 {
        let index = self.tree.variables.len() as u32;
        let type_index = self.symbols.tpe(v.tpe());
        self.tree.variables.push(proto::VariableEntry { name: v.name().to_owned(), type_index });
        index
    }

    fn operator(&mut self, kind: proto::NodeKind, operands: &[&Expression]) {
        operands.iter().for_each(|e| self.visit(e));
        let mut n = node(kind);
        n.arity = operands.len() as u32;
        self.tree.nodes.push(n);
    }

    fn visit(&mut self, e: &Expression) {
        use proto::NodeKind as K;
        match e.kind() {
            ExpressionKind::Constant(c) => {
                let n = match c {
                    Constant::Bool(b) => proto::Node { bool_value: *b, ..node(K::BoolConstant) },
                    Constant::Int(i) => proto::Node { int_value: *i, ..node(K::IntConstant) },
                    Constant::Real(r) => proto::Node { real_value: Some(encode_rational(r)), ..node(K::RealConstant) },
                    Constant::Object(o) => proto::Node { index: self.symbols.object(o), ..node(K::ObjectConstant) },
                };
                self.tree.nodes.push(n);
            }
            ExpressionKind::Fluent(f, args) => {
                args.iter().for_each(|a| self.visit(a));
                let index = self.symbols.fluent(f);
                self.tree.nodes.push(proto::Node { index, arity: args.len() as u32, ..node(K::FluentRef) });
            }
            ExpressionKind::Parameter(p) => {
                // parameters are scope-checked when the action is built, so a miss is a model bug;
                // release builds emit an index past the table, which the decoder rejects
                let found = self.parameters.iter().position(|x| x == p);
                debug_assert!(found.is_some(), "parameter {} is not in scope", p.name());
                let index = found.unwrap_or(self.parameters.len());
                self.tree.nodes.push(proto::Node { index: index as u32, ..node(K::ParameterRef) });
            }
            ExpressionKind::Variable(v) => {
                let index = match self.scope.iter().rev().find(|(bound, _)| bound == v) {
                    Some((_, index)) => *index,
                    None => self.variable_entry(v),
                };
                self.tree.nodes.push(proto::Node { index, ..node(K::VariableRef) });
            }
            ExpressionKind::Not(x) => self.operator(K::Not, &[x.as_ref()]),
            ExpressionKind::And(xs) => self.operator(K::And, &xs.iter().collect::<Vec<_>>()),
            ExpressionKind::Or(xs) => self.operator(K::Or, &xs.iter().collect::<Vec<_>>()),
            ExpressionKind::Implies(l, r) => self.operator(K::Implies, &[l.as_ref(), r.as_ref()]),
            ExpressionKind::Iff(l, r) => self.operator(K::Iff, &[l.as_ref(), r.as_ref()]),
            ExpressionKind::Equals(l, r) => self.operator(K::Equals, &[l.as_ref(), r.as_ref()]),
            ExpressionKind::Ge(l, r) => self.operator(K::Ge, &[l.as_ref(), r.as_ref()]),
            ExpressionKind::Gt(l, r) => self.operator(K::Gt, &[l.as_ref(), r.as_ref()]),
            ExpressionKind::Le(l, r) => self.operator(K::Le, &[l.as_ref(), r.as_ref()]),
            ExpressionKind::Lt(l, r) => self.operator(K::Lt, &[l.as_ref(), r.as_ref()]),
            ExpressionKind::Plus(l, r) => self.operator(K::Plus, &[l.as_ref(), r.as_ref()]),
            ExpressionKind::Minus(l, r) => self.operator(K::Minus, &[l.as_ref(), r.as_ref()]),
            ExpressionKind::Times(l, r) => self.operator(K::Times, &[l.as_ref(), r.as_ref()]),
            ExpressionKind::Div(l, r) => self.operator(K::Div, &[l.as_ref(), r.as_ref()]),
            ExpressionKind::Exists(vars, body) => self.quantifier(K::Exists, vars, body),
            ExpressionKind::Forall(vars, body) => self.quantifier(K::Forall, vars, body),
        }
    }

    fn quantifier(&mut self, kind: proto::NodeKind, vars: &[Variable], body: &Expression) {
        let mut bound = Vec::with_capacity(vars.len());
        for v in vars {
            let index = self.variable_entry(v);
            self.scope.push((v.clone(), index));
            bound.push(index);
        }
        self.visit(body);
        self.scope.truncate(self.scope.len() - vars.len());
        self.tree.nodes.push(proto::Node { arity: 1, variables: bound, ..node(kind) });
    }
}

fn encode_tree(symbols: &mut Symbols, parameters: &[Parameter], e: &Expression) -> proto::ExpressionTree {
    let mut encoder = TreeEncoder { symbols, parameters, tree: proto::ExpressionTree::default(), scope: Vec::new() };
    encoder.visit(e);
    encoder.tree
}

fn encode_timing(t: &Timing) -> proto::Timing {
    let kind = match t.kind() {
        TimepointKind::Start => proto::TimingKind::Start,
        TimepointKind::End => proto::TimingKind::End,
    };
    proto::Timing { kind: kind as i32, delay: Some(encode_rational(t.delay())) }
}

fn encode_interval(i: &TimeInterval) -> proto::Interval {
    proto::Interval {
        lower: Some(encode_timing(i.lower())),
        upper: Some(encode_timing(i.upper())),
        left_open: i.is_left_open(),
        right_open: i.is_right_open(),
    }
}

fn encode_effect(symbols: &mut Symbols, parameters: &[Parameter], e: &Effect, at: Option<&Timing>) -> proto::Effect {
    proto::Effect {
        target: Some(encode_tree(symbols, parameters, e.target())),
        value: Some(encode_tree(symbols, parameters, e.value())),
        condition: e.condition().map(|c| encode_tree(symbols, parameters, c)),
        timing: at.map(encode_timing),
    }
}

fn encode_action(symbols: &mut Symbols, action: &Action) -> proto::ActionEntry {
    let params = action.parameters();
    let mut entry = proto::ActionEntry { name: action.name().to_owned(), ..Default::default() };
    for p in params {
        let type_index = symbols.tpe(p.tpe());
        entry.parameters.push(proto::ParameterEntry { name: p.name().to_owned(), type_index });
    }
    match action {
        Action::Instantaneous(a) => {
            entry.kind = proto::ActionKind::Instantaneous as i32;
            for p in a.preconditions() {
                entry.preconditions.push(encode_tree(symbols, params, p));
            }
            for e in a.effects() {
                entry.effects.push(encode_effect(symbols, params, e, None));
            }
        }
        Action::Durative(a) => {
            entry.kind = proto::ActionKind::Durative as i32;
            let d = a.duration();
            entry.duration = Some(proto::Duration {
                lower: Some(encode_tree(symbols, params, d.lower())),
                upper: Some(encode_tree(symbols, params, d.upper())),
                left_open: d.is_left_open(),
                right_open: d.is_right_open(),
            });
            for (interval, exprs) in a.conditions() {
                let expressions = exprs.iter().map(|e| encode_tree(symbols, params, e)).collect();
                entry.conditions.push(proto::Condition { interval: Some(encode_interval(interval)), expressions });
            }
            for (at, effects) in a.effects() {
                for e in effects {
                    entry.effects.push(encode_effect(symbols, params, e, Some(at)));
                }
            }
        }
    }
    entry
}

/// Collections are written in declaration order, never re-sorted.
pub fn encode_problem(problem: &Problem) -> proto::ProblemMessage {
    let mut symbols = Symbols::default();
    problem.objects().iter().for_each(|o| {
        symbols.object(o);
    });
    symbols.fluents = problem.fluents().iter().map(|(f, _)| f.clone()).collect();

    let mut fluents = Vec::with_capacity(problem.fluents().len());
    for (f, default) in problem.fluents() {
        let value_type = symbols.tpe(f.value_type());
        let signature = f.signature().iter().map(|t| symbols.tpe(t)).collect();
        let default_value = default.as_ref().map(|d| encode_tree(&mut symbols, &[], d));
        fluents.push(proto::FluentEntry { name: f.name().to_owned(), value_type, signature, default_value });
    }
    let actions: Vec<_> = problem.actions().iter().map(|a| encode_action(&mut symbols, a)).collect();
    let initial_values: Vec<_> = problem
        .initial_values()
        .iter()
        .map(|(f, v)| proto::InitialValue {
            fluent: Some(encode_tree(&mut symbols, &[], f)),
            value: Some(encode_tree(&mut symbols, &[], v)),
        })
        .collect();
    let goals: Vec<_> = problem.goals().iter().map(|g| encode_tree(&mut symbols, &[], g)).collect();

    let objects = symbols.object_table();
    debug!(
        problem = problem.name(),
        types = symbols.types.len(),
        objects = objects.len(),
        fluents = fluents.len(),
        actions = actions.len(),
        "encoded problem"
    );
    proto::ProblemMessage {
        name: problem.name().to_owned(),
        types: symbols.type_table(),
        objects,
        fluents,
        actions,
        initial_values,
        goals,
    }
}

fn encode_step(
    symbols: &mut Symbols,
    instance: &ActionInstance,
    start: Option<&Rational>,
    duration: Option<&Rational>,
) -> proto::PlanStep {
    proto::PlanStep {
        action: instance.action().name().to_owned(),
        signature: instance.action().parameters().iter().map(|p| symbols.tpe(p.tpe())).collect(),
        arguments: instance.parameters().iter().map(|a| encode_tree(symbols, &[], a)).collect(),
        start: start.map(encode_rational),
        duration: duration.map(encode_rational),
    }
}

/// Only the types and objects mentioned by the steps are interned.
pub fn encode_plan(plan: &Plan) -> proto::PlanMessage {
    let mut symbols = Symbols::default();
    let (kind, steps): (_, Vec<_>) = match plan {
        Plan::Sequential(p) => (
            proto::PlanKind::Sequential,
            p.actions().iter().map(|i| encode_step(&mut symbols, i, None, None)).collect(),
        ),
        Plan::TimeTriggered(p) => (
            proto::PlanKind::TimeTriggered,
            p.actions()
                .iter()
                .map(|a| encode_step(&mut symbols, a.instance(), Some(a.start()), a.duration()))
                .collect(),
        ),
    };
    let objects = symbols.object_table();
    debug!(steps = steps.len(), objects = objects.len(), "encoded plan");
    proto::PlanMessage { kind: kind as i32, types: symbols.type_table(), objects, steps }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rational_strings() {
        let r = encode_rational(&Rational::from_signeds(-3, 4));
        assert_eq!((r.numerator.as_str(), r.denominator.as_str()), ("-3", "4"));
        let r = encode_rational(&Rational::from_signeds(2, 200));
        assert_eq!((r.numerator.as_str(), r.denominator.as_str()), ("1", "100"));
        let r = encode_rational(&Rational::from(0));
        assert_eq!((r.numerator.as_str(), r.denominator.as_str()), ("0", "1"));
    }

    #[test]
    fn test_shadowed_variables_get_their_own_entries() {
        let location = crate::model::UserType::new("Location");
        let f = Arc::new(Fluent::new("robot_at", Type::Bool, vec![location.clone().into()]).unwrap());
        let v = Variable::new("l", location);
        let body = crate::model::expression::fluent(&f, vec![(&v).into()]).unwrap();
        let inner = crate::model::expression::exists(vec![v.clone()], body.clone()).unwrap();
        let outer = crate::model::expression::forall(vec![v], crate::expAnd!(inner, body).unwrap()).unwrap();

        let mut symbols = Symbols::default();
        let tree = encode_tree(&mut symbols, &[], &outer);
        assert_eq!(tree.variables.len(), 2);
        let refs: Vec<u32> = tree
            .nodes
            .iter()
            .filter(|n| n.kind == proto::NodeKind::VariableRef as i32)
            .map(|n| n.index)
            .collect();
        // first reference sits under the inner exists, second only under the forall
        assert_eq!(refs, vec![1, 0]);
        assert_eq!(tree.nodes.last().map(|n| n.kind), Some(proto::NodeKind::Forall as i32));
        assert_eq!(symbols.fluents.len(), 1);
    }

    fn parameter_tree(parameters: &[Parameter]) -> proto::ExpressionTree {
        let location = crate::model::UserType::new("Location");
        let f = Arc::new(Fluent::new("robot_at", Type::Bool, vec![location.clone().into()]).unwrap());
        let to = Parameter::new("to", location);
        let e = crate::model::expression::fluent(&f, vec![(&to).into()]).unwrap();
        encode_tree(&mut Symbols::default(), parameters, &e)
    }

    #[test]
    fn test_parameter_reference_uses_position() {
        let location = crate::model::UserType::new("Location");
        let params = [Parameter::new("from", location.clone()), Parameter::new("to", location)];
        let tree = parameter_tree(&params);
        assert_eq!(tree.nodes[0].kind, proto::NodeKind::ParameterRef as i32);
        assert_eq!(tree.nodes[0].index, 1);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "not in scope")]
    fn test_out_of_scope_parameter_panics() {
        parameter_tree(&[]);
    }
}
