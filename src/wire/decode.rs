use std::str::FromStr;
use std::sync::Arc;

use malachite::{Integer, Natural, Rational};
use tracing::debug;

use super::error::DecodeError;
use super::proto::{self, NodeKind};
use super::resolve::{UnresolvedPlan, UnresolvedStep};
use crate::model::expression;
use crate::model::{
    Action, Duration, DurativeAction, Effect, Expression, Fluent, InstantaneousAction, ModelError, Object, Parameter,
    Problem, ProblemBuilder, TimeInterval, TimepointKind, Timing, Type, Variable,
};

type Result<T> = std::result::Result<T, DecodeError>;

fn at(path: &str, source: ModelError) -> DecodeError {
    DecodeError::Model { path: path.to_owned(), source }
}

fn missing(path: &str, field: &'static str) -> DecodeError {
    DecodeError::Missing { path: path.to_owned(), field }
}

fn lookup<'a, T>(table: &'a [T], name: &'static str, index: u32, path: &str) -> Result<&'a T> {
    table.get(index as usize).ok_or_else(|| DecodeError::IndexOutOfRange {
        path: path.to_owned(),
        table: name,
        index,
        len: table.len(),
    })
}

pub fn decode_rational(r: &proto::Real, path: &str) -> Result<Rational> {
    let malformed = || DecodeError::Rational { path: path.to_owned(), value: format!("{}/{}", r.numerator, r.denominator) };
    let numerator = Integer::from_str(&r.numerator).map_err(|_| malformed())?;
    let denominator = Natural::from_str(&r.denominator).map_err(|_| malformed())?;
    if denominator == 0u32 {
        return Err(malformed());
    }
    Ok(Rational::from_integers(numerator, Integer::from(denominator)))
}

fn decode_types(entries: &[proto::TypeEntry], path: &str) -> Result<Vec<Type>> {
    let mut types = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let path = format!("{}.types[{}]", path, i);
        let bound = |r: &Option<proto::Real>| r.as_ref().map(|r| decode_rational(r, &path)).transpose();
        let tpe = match proto::TypeKind::try_from(entry.kind) {
            Ok(proto::TypeKind::Bool) => Type::Bool,
            Ok(proto::TypeKind::Int) => Type::int_range(entry.int_lower, entry.int_upper).map_err(|e| at(&path, e))?,
            Ok(proto::TypeKind::Real) => {
                Type::real_range(bound(&entry.real_lower)?, bound(&entry.real_upper)?).map_err(|e| at(&path, e))?
            }
            Ok(proto::TypeKind::User) if entry.name.is_empty() => return Err(missing(&path, "name")),
            Ok(proto::TypeKind::User) => Type::user(entry.name.clone()),
            Ok(proto::TypeKind::Unspecified) | Err(_) => {
                return Err(DecodeError::UnknownTag { path, what: "type kind", tag: entry.kind })
            }
        };
        types.push(tpe);
    }
    Ok(types)
}

fn decode_objects(entries: &[proto::ObjectEntry], types: &[Type], path: &str) -> Result<Vec<Object>> {
    let mut objects = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let path = format!("{}.objects[{}]", path, i);
        let tpe = lookup(types, "type", entry.type_index, &path)?;
        let tpe = tpe
            .as_user()
            .ok_or_else(|| at(&path, ModelError::type_error(format!("object {} has non user type {}", entry.name, tpe))))?;
        objects.push(Object::new(entry.name.clone(), tpe.clone()));
    }
    Ok(objects)
}

/// Symbols an expression tree may refer to.
#[derive(Default)]
struct Tables {
    types: Vec<Type>,
    objects: Vec<Object>,
    fluents: Vec<Arc<Fluent>>,
}

fn single(operands: Vec<Expression>, path: &str) -> Result<Expression> {
    let found = operands.len();
    let mut it = operands.into_iter();
    match (it.next(), it.next()) {
        (Some(x), None) => Ok(x),
        _ => Err(DecodeError::Arity { path: path.to_owned(), expected: 1, found }),
    }
}

fn pair(operands: Vec<Expression>, path: &str) -> Result<(Expression, Expression)> {
    let found = operands.len();
    let mut it = operands.into_iter();
    match (it.next(), it.next(), it.next()) {
        (Some(l), Some(r), None) => Ok((l, r)),
        _ => Err(DecodeError::Arity { path: path.to_owned(), expected: 2, found }),
    }
}

impl Tables {
    fn tree(&self, tree: &proto::ExpressionTree, parameters: &[Parameter], path: &str) -> Result<Expression> {
        let mut variables = Vec::with_capacity(tree.variables.len());
        for (i, v) in tree.variables.iter().enumerate() {
            let tpe = lookup(&self.types, "type", v.type_index, &format!("{}.variables[{}]", path, i))?;
            variables.push(Variable::new(v.name.clone(), tpe.clone()));
        }

        let mut stack: Vec<Expression> = Vec::new();
        for (i, node) in tree.nodes.iter().enumerate() {
            let path = format!("{}.nodes[{}]", path, i);
            let kind = NodeKind::try_from(node.kind)
                .ok()
                .filter(|k| *k != NodeKind::Unspecified)
                .ok_or_else(|| DecodeError::UnknownTag { path: path.clone(), what: "node kind", tag: node.kind })?;
            let expected = match kind {
                NodeKind::BoolConstant
                | NodeKind::IntConstant
                | NodeKind::RealConstant
                | NodeKind::ObjectConstant
                | NodeKind::ParameterRef
                | NodeKind::VariableRef => 0,
                NodeKind::FluentRef => lookup(&self.fluents, "fluent", node.index, &path)?.arity(),
                NodeKind::And | NodeKind::Or => node.arity as usize,
                NodeKind::Not | NodeKind::Exists | NodeKind::Forall => 1,
                _ => 2,
            };
            if node.arity as usize != expected {
                return Err(DecodeError::Arity { path, expected, found: node.arity as usize });
            }
            if stack.len() < expected {
                return Err(DecodeError::Arity { path, expected, found: stack.len() });
            }
            let operands = stack.split_off(stack.len() - expected);
            let e = self.node(kind, node, operands, parameters, &variables, &path)?;
            stack.push(e);
        }

        let found = stack.len();
        match (stack.pop(), found) {
            (Some(root), 1) => Ok(root),
            _ => Err(DecodeError::Arity { path: path.to_owned(), expected: 1, found }),
        }
    }

    fn node(
        &self,
        kind: NodeKind,
        node: &proto::Node,
        operands: Vec<Expression>,
        parameters: &[Parameter],
        variables: &[Variable],
        path: &str,
    ) -> Result<Expression> {
        let model = |e| at(path, e);
        let e: Expression = match kind {
            NodeKind::BoolConstant => node.bool_value.into(),
            NodeKind::IntConstant => node.int_value.into(),
            NodeKind::RealConstant => {
                let r = node.real_value.as_ref().ok_or_else(|| missing(path, "real_value"))?;
                decode_rational(r, path)?.into()
            }
            NodeKind::ObjectConstant => lookup(&self.objects, "object", node.index, path)?.into(),
            NodeKind::ParameterRef => lookup(parameters, "parameter", node.index, path)?.into(),
            NodeKind::VariableRef => lookup(variables, "variable", node.index, path)?.into(),
            NodeKind::FluentRef => {
                let f = lookup(&self.fluents, "fluent", node.index, path)?;
                expression::fluent(f, operands).map_err(model)?
            }
            NodeKind::Not => expression::not(single(operands, path)?).map_err(model)?,
            NodeKind::And => expression::and(operands).map_err(model)?,
            NodeKind::Or => expression::or(operands).map_err(model)?,
            NodeKind::Exists | NodeKind::Forall => {
                let body = single(operands, path)?;
                let bound = node
                    .variables
                    .iter()
                    .map(|i| lookup(variables, "variable", *i, path).cloned())
                    .collect::<Result<Vec<_>>>()?;
                if kind == NodeKind::Exists {
                    expression::exists(bound, body).map_err(model)?
                } else {
                    expression::forall(bound, body).map_err(model)?
                }
            }
            binary => {
                let (l, r) = pair(operands, path)?;
                let build: fn(Expression, Expression) -> std::result::Result<Expression, ModelError> = match binary {
                    NodeKind::Implies => expression::implies,
                    NodeKind::Iff => expression::iff,
                    NodeKind::Equals => expression::equals,
                    NodeKind::Ge => expression::ge,
                    NodeKind::Gt => expression::gt,
                    NodeKind::Le => expression::le,
                    NodeKind::Lt => expression::lt,
                    NodeKind::Plus => expression::plus,
                    NodeKind::Minus => expression::minus,
                    NodeKind::Times => expression::times,
                    NodeKind::Div => expression::div,
                    other => {
                        return Err(DecodeError::UnknownTag { path: path.to_owned(), what: "node kind", tag: other as i32 })
                    }
                };
                build(l, r).map_err(model)?
            }
        };
        Ok(e)
    }

    fn required(&self, tree: &Option<proto::ExpressionTree>, parameters: &[Parameter], path: &str, field: &'static str) -> Result<Expression> {
        let tree = tree.as_ref().ok_or_else(|| missing(path, field))?;
        self.tree(tree, parameters, &format!("{}.{}", path, field))
    }
}

fn decode_timing(t: &proto::Timing, path: &str) -> Result<Timing> {
    let kind = match proto::TimingKind::try_from(t.kind) {
        Ok(proto::TimingKind::Start) => TimepointKind::Start,
        Ok(proto::TimingKind::End) => TimepointKind::End,
        Ok(proto::TimingKind::Unspecified) | Err(_) => {
            return Err(DecodeError::UnknownTag { path: path.to_owned(), what: "timing kind", tag: t.kind })
        }
    };
    let delay = t.delay.as_ref().ok_or_else(|| missing(path, "delay"))?;
    Ok(Timing::new(kind, decode_rational(delay, &format!("{}.delay", path))?))
}

fn decode_interval(i: &proto::Interval, path: &str) -> Result<TimeInterval> {
    let lower = i.lower.as_ref().ok_or_else(|| missing(path, "lower"))?;
    let upper = i.upper.as_ref().ok_or_else(|| missing(path, "upper"))?;
    Ok(TimeInterval::new(
        decode_timing(lower, &format!("{}.lower", path))?,
        decode_timing(upper, &format!("{}.upper", path))?,
        i.left_open,
        i.right_open,
    ))
}

fn decode_effect(tables: &Tables, e: &proto::Effect, parameters: &[Parameter], path: &str) -> Result<(Effect, Option<Timing>)> {
    let target = tables.required(&e.target, parameters, path, "target")?;
    let value = tables.required(&e.value, parameters, path, "value")?;
    let condition = match &e.condition {
        Some(c) => Some(tables.tree(c, parameters, &format!("{}.condition", path))?),
        None => None,
    };
    let timing = match &e.timing {
        Some(t) => Some(decode_timing(t, &format!("{}.timing", path))?),
        None => None,
    };
    let effect = Effect::new(target, value, condition).map_err(|err| at(path, err))?;
    Ok((effect, timing))
}

fn decode_action(tables: &Tables, entry: &proto::ActionEntry, path: &str) -> Result<Action> {
    let mut parameters = Vec::with_capacity(entry.parameters.len());
    for (i, p) in entry.parameters.iter().enumerate() {
        let tpe = lookup(&tables.types, "type", p.type_index, &format!("{}.parameters[{}]", path, i))?;
        parameters.push(Parameter::new(p.name.clone(), tpe.clone()));
    }
    match proto::ActionKind::try_from(entry.kind) {
        Ok(proto::ActionKind::Instantaneous) => {
            if entry.duration.is_some() || !entry.conditions.is_empty() {
                let err = ModelError::value_error(format!("instantaneous action {} has timed conditions", entry.name));
                return Err(at(path, err));
            }
            let mut action = InstantaneousAction::new(entry.name.clone(), parameters.clone()).map_err(|e| at(path, e))?;
            for (i, p) in entry.preconditions.iter().enumerate() {
                let path = format!("{}.preconditions[{}]", path, i);
                let p = tables.tree(p, &parameters, &path)?;
                action.add_precondition(p).map_err(|e| at(&path, e))?;
            }
            for (i, e) in entry.effects.iter().enumerate() {
                let path = format!("{}.effects[{}]", path, i);
                match decode_effect(tables, e, &parameters, &path)? {
                    (effect, None) => action.push(effect).map_err(|e| at(&path, e))?,
                    (_, Some(t)) => {
                        let err = ModelError::value_error(format!("instantaneous effect cannot happen at {}", t));
                        return Err(at(&path, err));
                    }
                }
            }
            Ok(action.into())
        }
        Ok(proto::ActionKind::Durative) => {
            if !entry.preconditions.is_empty() {
                let err = ModelError::value_error(format!("durative action {} has untimed preconditions", entry.name));
                return Err(at(path, err));
            }
            let mut action = DurativeAction::new(entry.name.clone(), parameters.clone()).map_err(|e| at(path, e))?;
            let d = entry.duration.as_ref().ok_or_else(|| missing(path, "duration"))?;
            let d_path = format!("{}.duration", path);
            let lower = tables.required(&d.lower, &parameters, &d_path, "lower")?;
            let upper = tables.required(&d.upper, &parameters, &d_path, "upper")?;
            let duration = Duration::new(lower, upper, d.left_open, d.right_open).map_err(|e| at(&d_path, e))?;
            action.set_duration(duration).map_err(|e| at(&d_path, e))?;
            for (i, c) in entry.conditions.iter().enumerate() {
                let path = format!("{}.conditions[{}]", path, i);
                let interval = c.interval.as_ref().ok_or_else(|| missing(&path, "interval"))?;
                let interval = decode_interval(interval, &format!("{}.interval", path))?;
                for (j, e) in c.expressions.iter().enumerate() {
                    let path = format!("{}.expressions[{}]", path, j);
                    let e = tables.tree(e, &parameters, &path)?;
                    action.add_condition(interval.clone(), e).map_err(|e| at(&path, e))?;
                }
            }
            for (i, e) in entry.effects.iter().enumerate() {
                let path = format!("{}.effects[{}]", path, i);
                match decode_effect(tables, e, &parameters, &path)? {
                    (effect, Some(t)) => action.push(t, effect).map_err(|e| at(&path, e))?,
                    (_, None) => return Err(missing(&path, "timing")),
                }
            }
            Ok(action.into())
        }
        Ok(proto::ActionKind::Unspecified) | Err(_) => {
            Err(DecodeError::UnknownTag { path: path.to_owned(), what: "action kind", tag: entry.kind })
        }
    }
}

/// Rebuilds a problem through the regular builder, so a decoded problem obeys every
/// construction rule a locally built one does.
pub fn decode_problem(msg: &proto::ProblemMessage) -> Result<Problem> {
    let root = "problem";
    let mut tables = Tables { types: decode_types(&msg.types, root)?, ..Default::default() };
    tables.objects = decode_objects(&msg.objects, &tables.types, root)?;

    let mut builder = ProblemBuilder::new(msg.name.clone());
    for (i, o) in tables.objects.iter().enumerate() {
        builder.add_object(o.clone()).map_err(|e| at(&format!("{}.objects[{}]", root, i), e))?;
    }
    for (i, entry) in msg.fluents.iter().enumerate() {
        let path = format!("{}.fluents[{}]", root, i);
        let value_type = lookup(&tables.types, "type", entry.value_type, &path)?.clone();
        let signature = entry
            .signature
            .iter()
            .map(|t| lookup(&tables.types, "type", *t, &path).cloned())
            .collect::<Result<Vec<_>>>()?;
        let fluent = Arc::new(Fluent::new(entry.name.clone(), value_type, signature).map_err(|e| at(&path, e))?);
        let default = match &entry.default_value {
            Some(d) => Some(tables.tree(d, &[], &format!("{}.default_value", path))?),
            None => None,
        };
        builder.add_fluent(&fluent, default).map_err(|e| at(&path, e))?;
        tables.fluents.push(fluent);
    }
    for (i, entry) in msg.actions.iter().enumerate() {
        let path = format!("{}.actions[{}]", root, i);
        let action = decode_action(&tables, entry, &path)?;
        builder.add_action(action).map_err(|e| at(&path, e))?;
    }
    for (i, entry) in msg.initial_values.iter().enumerate() {
        let path = format!("{}.initial_values[{}]", root, i);
        let fluent = tables.required(&entry.fluent, &[], &path, "fluent")?;
        let value = tables.required(&entry.value, &[], &path, "value")?;
        builder.set_initial_value(fluent, value).map_err(|e| at(&path, e))?;
    }
    for (i, goal) in msg.goals.iter().enumerate() {
        let path = format!("{}.goals[{}]", root, i);
        let goal = tables.tree(goal, &[], &path)?;
        builder.add_goal(goal).map_err(|e| at(&path, e))?;
    }
    let problem = builder.build().map_err(|e| at(root, e))?;
    debug!(problem = problem.name(), actions = problem.actions().len(), "decoded problem");
    Ok(problem)
}

fn decode_step(tables: &Tables, step: &proto::PlanStep, path: &str) -> Result<UnresolvedStep> {
    let signature = step
        .signature
        .iter()
        .map(|t| lookup(&tables.types, "type", *t, path).cloned())
        .collect::<Result<Vec<_>>>()?;
    let mut arguments = Vec::with_capacity(step.arguments.len());
    for (i, a) in step.arguments.iter().enumerate() {
        let path = format!("{}.arguments[{}]", path, i);
        let e = tables.tree(a, &[], &path)?;
        match e.as_constant() {
            Some(c) => arguments.push(c.clone()),
            None => return Err(at(&path, ModelError::value_error(format!("plan argument {} is not a constant", e)))),
        }
    }
    Ok(UnresolvedStep { action: step.action.clone(), signature, arguments })
}

/// Structural decode only. Binding to actions needs the problem, see [`UnresolvedPlan::resolve`].
pub fn decode_plan(msg: &proto::PlanMessage) -> Result<UnresolvedPlan> {
    let root = "plan";
    let mut tables = Tables { types: decode_types(&msg.types, root)?, ..Default::default() };
    tables.objects = decode_objects(&msg.objects, &tables.types, root)?;

    let plan = match proto::PlanKind::try_from(msg.kind) {
        Ok(proto::PlanKind::Sequential) => {
            let mut steps = Vec::with_capacity(msg.steps.len());
            for (i, step) in msg.steps.iter().enumerate() {
                let path = format!("{}.steps[{}]", root, i);
                if step.start.is_some() || step.duration.is_some() {
                    let err = ModelError::value_error("sequential plan steps carry no timing");
                    return Err(at(&path, err));
                }
                steps.push(decode_step(&tables, step, &path)?);
            }
            UnresolvedPlan::Sequential(steps)
        }
        Ok(proto::PlanKind::TimeTriggered) => {
            let mut steps = Vec::with_capacity(msg.steps.len());
            for (i, step) in msg.steps.iter().enumerate() {
                let path = format!("{}.steps[{}]", root, i);
                let start = step.start.as_ref().ok_or_else(|| missing(&path, "start"))?;
                let start = decode_rational(start, &format!("{}.start", path))?;
                let duration = match &step.duration {
                    Some(d) => Some(decode_rational(d, &format!("{}.duration", path))?),
                    None => None,
                };
                steps.push((start, decode_step(&tables, step, &path)?, duration));
            }
            UnresolvedPlan::TimeTriggered(steps)
        }
        Ok(proto::PlanKind::Unspecified) | Err(_) => {
            return Err(DecodeError::UnknownTag { path: root.to_owned(), what: "plan kind", tag: msg.kind })
        }
    };
    debug!(steps = plan.len(), "decoded plan");
    Ok(plan)
}
