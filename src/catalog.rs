//! Example problems with a known valid plan for each.
//!
//! Used by the demo binary, by the round-trip tests and by [`ReferencePlanner`], which answers
//! solve requests for these problems without searching.

use std::collections::BTreeMap;
use std::sync::Arc;

use malachite::Rational;
use tracing::debug;

use crate::config::SolverConfig;
use crate::model::expression::{equals, exists, fluent, forall, ge, implies, minus};
use crate::model::{
    Action, ActionInstance, DurativeAction, Expression, Fluent, InstantaneousAction, ModelError, Object, Parameter, Plan,
    Problem, ProblemBuilder, SequentialPlan, TimeInterval, TimeTriggeredPlan, TimedAction, Timing, Type, UserType,
    Variable,
};
use crate::service::{Planner, ServiceError};
use crate::{expAnd, expNot, expOr};

type Result<T> = std::result::Result<T, ModelError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    pub problem: Problem,
    pub plan: Plan,
}

/// All examples, keyed by problem name.
pub fn examples() -> Result<BTreeMap<String, Example>> {
    let builders: [fn() -> Result<Example>; 20] = [
        basic,
        basic_conditional,
        complex_conditional,
        basic_without_negative_preconditions,
        basic_nested_conjunctions,
        basic_exists,
        basic_forall,
        robot,
        robot_modified,
        robot_no_negative_preconditions,
        robot_decrease,
        robot_loader,
        robot_loader_mod,
        robot_loader_adv,
        robot_locations_connected,
        robot_locations_visited,
        charge_discharge,
        matchcellar,
        temporal_conditional,
        timed_connected_locations,
    ];
    builders
        .iter()
        .map(|build| build().map(|e| (e.problem.name().to_string(), e)))
        .collect()
}

fn obj(o: &Object) -> Expression {
    o.into()
}

fn seq(steps: Vec<ActionInstance>) -> Plan {
    SequentialPlan::new(steps).into()
}

fn at(num: i64, den: i64, instance: ActionInstance, duration: i64) -> Result<TimedAction> {
    TimedAction::new(Rational::from_signeds(num, den), instance, Some(Rational::from(duration)))
}

pub fn basic() -> Result<Example> {
    let x = Arc::new(Fluent::boolean("x")?);
    let x_ = fluent(&x, vec![])?;
    let mut a = InstantaneousAction::new("a", vec![])?;
    a.add_precondition(expNot!(x_)?)?;
    a.add_effect(x_.clone(), true)?;

    let mut problem = ProblemBuilder::new("basic");
    problem.add_fluent(&x, None)?;
    let a = problem.add_action(a)?;
    problem.set_initial_value(x_.clone(), false)?;
    problem.add_goal(x_)?;
    let plan = seq(vec![ActionInstance::new(&a, vec![])?]);
    Ok(Example { problem: problem.build()?, plan })
}

pub fn basic_conditional() -> Result<Example> {
    let x = Arc::new(Fluent::boolean("x")?);
    let y = Arc::new(Fluent::boolean("y")?);
    let (x_, y_) = (fluent(&x, vec![])?, fluent(&y, vec![])?);
    let mut a_x = InstantaneousAction::new("a_x", vec![])?;
    a_x.add_precondition(expNot!(x_)?)?;
    a_x.add_conditional_effect(x_.clone(), true, y_.clone())?;
    let mut a_y = InstantaneousAction::new("a_y", vec![])?;
    a_y.add_precondition(expNot!(y_)?)?;
    a_y.add_effect(y_.clone(), true)?;

    let mut problem = ProblemBuilder::new("basic_conditional");
    problem.add_fluent(&x, None)?;
    problem.add_fluent(&y, None)?;
    let a_x = problem.add_action(a_x)?;
    let a_y = problem.add_action(a_y)?;
    problem.set_initial_value(x_.clone(), false)?;
    problem.set_initial_value(y_, false)?;
    problem.add_goal(x_)?;
    let plan = seq(vec![ActionInstance::new(&a_y, vec![])?, ActionInstance::new(&a_x, vec![])?]);
    Ok(Example { problem: problem.build()?, plan })
}

pub fn complex_conditional() -> Result<Example> {
    let names = ["a", "b", "c", "d", "k", "x", "y", "z"];
    let fluents = names.iter().map(|n| Fluent::boolean(*n).map(Arc::new)).collect::<Result<Vec<_>>>()?;
    let f = fluents.iter().map(|f| fluent(f, vec![])).collect::<Result<Vec<_>>>()?;
    let (a, b, c, d, k, x, y, z) = (&f[0], &f[1], &f[2], &f[3], &f[4], &f[5], &f[6], &f[7]);

    let mut act = InstantaneousAction::new("A", vec![])?;
    act.add_precondition(expNot!(a)?)?;
    act.add_effect(a.clone(), true)?;
    act.add_conditional_effect(k.clone(), true, b.clone())?;
    act.add_conditional_effect(x.clone(), true, expNot!(c)?)?;
    act.add_conditional_effect(y.clone(), false, d.clone())?;
    let mut act_0 = InstantaneousAction::new("A_0", vec![])?;
    act_0.add_precondition(expNot!(a)?)?;
    act_0.add_precondition(d.clone())?;
    act_0.add_effect(b.clone(), true)?;
    let mut act_1 = InstantaneousAction::new("A_1", vec![])?;
    act_1.add_precondition(expNot!(a)?)?;
    act_1.add_precondition(d.clone())?;
    act_1.add_precondition(b.clone())?;
    act_1.add_conditional_effect(c.clone(), false, c.clone())?;
    act_1.add_conditional_effect(c.clone(), true, expNot!(c)?)?;
    let mut act_2 = InstantaneousAction::new("A_2", vec![])?;
    act_2.add_effect(a.clone(), false)?;
    act_2.add_effect(d.clone(), true)?;
    act_2.add_conditional_effect(z.clone(), false, z.clone())?;
    act_2.add_conditional_effect(z.clone(), true, expNot!(z)?)?;

    let mut problem = ProblemBuilder::new("complex_conditional");
    for fl in &fluents {
        problem.add_fluent(fl, None)?;
    }
    let act = problem.add_action(act)?;
    let act_0 = problem.add_action(act_0)?;
    let act_1 = problem.add_action(act_1)?;
    let act_2 = problem.add_action(act_2)?;
    let initial = [true, false, true, false, false, false, true, false];
    for (e, v) in f.iter().zip(initial) {
        problem.set_initial_value(e.clone(), v)?;
    }
    for goal in [a.clone(), b.clone(), expNot!(c)?, d.clone(), k.clone(), x.clone(), expNot!(y)?, z.clone()] {
        problem.add_goal(goal)?;
    }
    let plan = seq(vec![
        ActionInstance::new(&act_2, vec![])?,
        ActionInstance::new(&act_0, vec![])?,
        ActionInstance::new(&act_1, vec![])?,
        ActionInstance::new(&act, vec![])?,
    ]);
    Ok(Example { problem: problem.build()?, plan })
}

pub fn basic_without_negative_preconditions() -> Result<Example> {
    let x = Arc::new(Fluent::boolean("x")?);
    let y = Arc::new(Fluent::boolean("y")?);
    let (x_, y_) = (fluent(&x, vec![])?, fluent(&y, vec![])?);
    let mut a = InstantaneousAction::new("a", vec![])?;
    a.add_precondition(y_.clone())?;
    a.add_effect(x_.clone(), true)?;

    let mut problem = ProblemBuilder::new("basic_without_negative_preconditions");
    problem.add_fluent(&x, None)?;
    problem.add_fluent(&y, None)?;
    let a = problem.add_action(a)?;
    problem.set_initial_value(x_.clone(), false)?;
    problem.set_initial_value(y_, true)?;
    problem.add_goal(x_)?;
    let plan = seq(vec![ActionInstance::new(&a, vec![])?]);
    Ok(Example { problem: problem.build()?, plan })
}

pub fn basic_nested_conjunctions() -> Result<Example> {
    let fluents = ["x", "y", "z", "j", "k"]
        .iter()
        .map(|n| Fluent::boolean(*n).map(Arc::new))
        .collect::<Result<Vec<_>>>()?;
    let f = fluents.iter().map(|f| fluent(f, vec![])).collect::<Result<Vec<_>>>()?;
    let (x, y, z, j, k) = (&f[0], &f[1], &f[2], &f[3], &f[4]);
    let mut a = InstantaneousAction::new("a", vec![])?;
    a.add_precondition(expAnd!(y, expAnd!(z, j, k)?)?)?;
    a.add_effect(x.clone(), true)?;

    let mut problem = ProblemBuilder::new("basic_nested_conjunctions");
    for fl in &fluents {
        problem.add_fluent(fl, None)?;
    }
    let a = problem.add_action(a)?;
    for (e, v) in f.iter().zip([false, true, true, true, true]) {
        problem.set_initial_value(e.clone(), v)?;
    }
    problem.add_goal(expAnd!(x, expAnd!(y, z, expAnd!(j, k)?)?)?)?;
    let plan = seq(vec![ActionInstance::new(&a, vec![])?]);
    Ok(Example { problem: problem.build()?, plan })
}

/// `x` and a semaphore fluent `y(Semaphore)` with two semaphores.
fn semaphores(name: &str, precondition: impl Fn(&Arc<Fluent>, &Variable) -> Result<Expression>, y_o1: bool) -> Result<Example> {
    let sem = UserType::new("Semaphore");
    let x = Arc::new(Fluent::boolean("x")?);
    let y = Arc::new(Fluent::new("y", Type::Bool, vec![sem.clone().into()])?);
    let (o1, o2) = (Object::new("o1", sem.clone()), Object::new("o2", sem.clone()));
    let s = Variable::new("s", sem);
    let x_ = fluent(&x, vec![])?;
    let mut a = InstantaneousAction::new("a", vec![])?;
    a.add_precondition(precondition(&y, &s)?)?;
    a.add_effect(x_.clone(), true)?;

    let mut problem = ProblemBuilder::new(name);
    problem.add_fluent(&x, None)?;
    problem.add_fluent(&y, None)?;
    problem.add_objects(vec![o1.clone(), o2.clone()])?;
    let a = problem.add_action(a)?;
    problem.set_initial_value(x_.clone(), false)?;
    problem.set_initial_value(fluent(&y, vec![obj(&o1)])?, y_o1)?;
    problem.set_initial_value(fluent(&y, vec![obj(&o2)])?, false)?;
    problem.add_goal(x_)?;
    let plan = seq(vec![ActionInstance::new(&a, vec![])?]);
    Ok(Example { problem: problem.build()?, plan })
}

pub fn basic_exists() -> Result<Example> {
    semaphores("basic_exists", |y, s| exists(vec![s.clone()], fluent(y, vec![s.into()])?), true)
}

pub fn basic_forall() -> Result<Example> {
    semaphores("basic_forall", |y, s| forall(vec![s.clone()], expNot!(fluent(y, vec![s.into()])?)?), false)
}

/// `robot_at(Location)` and `battery_charge` in [0, 100], the move spends 10 units.
fn battery_robot(name: &str, decrease: bool) -> Result<Example> {
    let location = UserType::new("Location");
    let robot_at = Arc::new(Fluent::new("robot_at", Type::Bool, vec![location.clone().into()])?);
    let battery = Arc::new(Fluent::new(
        "battery_charge",
        Type::real_range(Some(Rational::from(0)), Some(Rational::from(100)))?,
        vec![],
    )?);
    let battery_ = fluent(&battery, vec![])?;
    let params = vec![Parameter::new("l_from", location.clone()), Parameter::new("l_to", location.clone())];
    let mut mv = InstantaneousAction::new("move", params)?;
    let (l_from, l_to) = (mv.parameter("l_from")?, mv.parameter("l_to")?);
    mv.add_precondition(ge(battery_.clone(), 10i64.into())?)?;
    mv.add_precondition(expNot!(equals(l_from.clone(), l_to.clone())?)?)?;
    mv.add_precondition(fluent(&robot_at, vec![l_from.clone()])?)?;
    mv.add_precondition(expNot!(fluent(&robot_at, vec![l_to.clone()])?)?)?;
    mv.add_effect(fluent(&robot_at, vec![l_from])?, false)?;
    mv.add_effect(fluent(&robot_at, vec![l_to])?, true)?;
    if decrease {
        mv.add_decrease_effect(battery_.clone(), 10i64)?;
    } else {
        mv.add_effect(battery_.clone(), minus(battery_.clone(), 10i64.into())?)?;
    }

    let (l1, l2) = (Object::new("l1", location.clone()), Object::new("l2", location));
    let mut problem = ProblemBuilder::new(name);
    problem.add_fluent(&robot_at, None)?;
    problem.add_fluent(&battery, None)?;
    problem.add_objects(vec![l1.clone(), l2.clone()])?;
    let mv = problem.add_action(mv)?;
    problem.set_initial_value(fluent(&robot_at, vec![obj(&l1)])?, true)?;
    problem.set_initial_value(fluent(&robot_at, vec![obj(&l2)])?, false)?;
    problem.set_initial_value(battery_, 100i64)?;
    problem.add_goal(fluent(&robot_at, vec![obj(&l2)])?)?;
    let plan = seq(vec![ActionInstance::new(&mv, vec![obj(&l1), obj(&l2)])?]);
    Ok(Example { problem: problem.build()?, plan })
}

pub fn robot() -> Result<Example> {
    battery_robot("robot", false)
}

pub fn robot_decrease() -> Result<Example> {
    battery_robot("robot_decrease", true)
}

/// Battery-free robot on two locations. Without `guarded` the move only requires the robot at its origin.
fn plain_robot(name: &str, location: UserType, guarded: bool) -> Result<Example> {
    let robot_at = Arc::new(Fluent::new("robot_at", Type::Bool, vec![location.clone().into()])?);
    let params = vec![Parameter::new("l_from", location.clone()), Parameter::new("l_to", location.clone())];
    let mut mv = InstantaneousAction::new("move", params)?;
    let (l_from, l_to) = (mv.parameter("l_from")?, mv.parameter("l_to")?);
    if guarded {
        mv.add_precondition(expNot!(equals(l_from.clone(), l_to.clone())?)?)?;
    }
    mv.add_precondition(fluent(&robot_at, vec![l_from.clone()])?)?;
    if guarded {
        mv.add_precondition(expNot!(fluent(&robot_at, vec![l_to.clone()])?)?)?;
    }
    mv.add_effect(fluent(&robot_at, vec![l_from])?, false)?;
    mv.add_effect(fluent(&robot_at, vec![l_to])?, true)?;

    let (l1, l2) = (Object::new("l1", location.clone()), Object::new("l2", location));
    let mut problem = ProblemBuilder::new(name);
    problem.add_fluent(&robot_at, None)?;
    problem.add_objects(vec![l1.clone(), l2.clone()])?;
    let mv = problem.add_action(mv)?;
    problem.set_initial_value(fluent(&robot_at, vec![obj(&l1)])?, true)?;
    problem.set_initial_value(fluent(&robot_at, vec![obj(&l2)])?, false)?;
    problem.add_goal(fluent(&robot_at, vec![obj(&l2)])?)?;
    let plan = seq(vec![ActionInstance::new(&mv, vec![obj(&l1), obj(&l2)])?]);
    Ok(Example { problem: problem.build()?, plan })
}

pub fn robot_modified() -> Result<Example> {
    plain_robot("robot_modified", UserType::new("Location"), true)
}

pub fn robot_no_negative_preconditions() -> Result<Example> {
    plain_robot("robot_no_negative_preconditions", UserType::new("location"), false)
}

/// `load` and `unload` of the single-cargo loader.
fn cargo_actions(
    location: &UserType,
    robot_at: &Arc<Fluent>,
    cargo_at: &Arc<Fluent>,
    mounted: &Arc<Fluent>,
) -> Result<(InstantaneousAction, InstantaneousAction)> {
    let mounted_ = fluent(mounted, vec![])?;
    let mut load = InstantaneousAction::new("load", vec![Parameter::new("loc", location.clone())])?;
    let loc = load.parameter("loc")?;
    load.add_precondition(fluent(cargo_at, vec![loc.clone()])?)?;
    load.add_precondition(fluent(robot_at, vec![loc.clone()])?)?;
    load.add_precondition(expNot!(mounted_)?)?;
    load.add_effect(fluent(cargo_at, vec![loc])?, false)?;
    load.add_effect(mounted_.clone(), true)?;

    let mut unload = InstantaneousAction::new("unload", vec![Parameter::new("loc", location.clone())])?;
    let loc = unload.parameter("loc")?;
    unload.add_precondition(expNot!(fluent(cargo_at, vec![loc.clone()])?)?)?;
    unload.add_precondition(fluent(robot_at, vec![loc.clone()])?)?;
    unload.add_precondition(mounted_.clone())?;
    unload.add_effect(fluent(cargo_at, vec![loc])?, true)?;
    unload.add_effect(mounted_, false)?;
    Ok((load, unload))
}

/// Fetch the cargo from `l2` and bring it back to `l1`.
fn loader_plan(
    mv: &Arc<Action>,
    load: &Arc<Action>,
    unload: &Arc<Action>,
    l1: &Object,
    l2: &Object,
) -> Result<Plan> {
    Ok(seq(vec![
        ActionInstance::new(mv, vec![obj(l1), obj(l2)])?,
        ActionInstance::new(load, vec![obj(l2)])?,
        ActionInstance::new(mv, vec![obj(l2), obj(l1)])?,
        ActionInstance::new(unload, vec![obj(l1)])?,
    ]))
}

pub fn robot_loader() -> Result<Example> {
    let location = UserType::new("Location");
    let robot_at = Arc::new(Fluent::new("robot_at", Type::Bool, vec![location.clone().into()])?);
    let cargo_at = Arc::new(Fluent::new("cargo_at", Type::Bool, vec![location.clone().into()])?);
    let mounted = Arc::new(Fluent::boolean("cargo_mounted")?);
    let mounted_ = fluent(&mounted, vec![])?;

    let mut mv = InstantaneousAction::new(
        "move",
        vec![Parameter::new("l_from", location.clone()), Parameter::new("l_to", location.clone())],
    )?;
    let (l_from, l_to) = (mv.parameter("l_from")?, mv.parameter("l_to")?);
    mv.add_precondition(expNot!(equals(l_from.clone(), l_to.clone())?)?)?;
    mv.add_precondition(fluent(&robot_at, vec![l_from.clone()])?)?;
    mv.add_precondition(expNot!(fluent(&robot_at, vec![l_to.clone()])?)?)?;
    mv.add_effect(fluent(&robot_at, vec![l_from])?, false)?;
    mv.add_effect(fluent(&robot_at, vec![l_to])?, true)?;

    let (load, unload) = cargo_actions(&location, &robot_at, &cargo_at, &mounted)?;

    let (l1, l2) = (Object::new("l1", location.clone()), Object::new("l2", location));
    let mut problem = ProblemBuilder::new("robot_loader");
    problem.add_fluent(&robot_at, None)?;
    problem.add_fluent(&cargo_at, None)?;
    problem.add_fluent(&mounted, None)?;
    problem.add_objects(vec![l1.clone(), l2.clone()])?;
    let mv = problem.add_action(mv)?;
    let load = problem.add_action(load)?;
    let unload = problem.add_action(unload)?;
    problem.set_initial_value(fluent(&robot_at, vec![obj(&l1)])?, true)?;
    problem.set_initial_value(fluent(&robot_at, vec![obj(&l2)])?, false)?;
    problem.set_initial_value(fluent(&cargo_at, vec![obj(&l1)])?, false)?;
    problem.set_initial_value(fluent(&cargo_at, vec![obj(&l2)])?, true)?;
    problem.set_initial_value(mounted_, false)?;
    problem.add_goal(fluent(&cargo_at, vec![obj(&l1)])?)?;
    let plan = loader_plan(&mv, &load, &unload, &l1, &l2)?;
    Ok(Example { problem: problem.build()?, plan })
}

/// Loader whose move excludes staying in place through a fluent instead of equality, with every fluent defaulted.
pub fn robot_loader_mod() -> Result<Example> {
    let location = UserType::new("Location");
    let robot_at = Arc::new(Fluent::new("robot_at", Type::Bool, vec![location.clone().into()])?);
    let cargo_at = Arc::new(Fluent::new("cargo_at", Type::Bool, vec![location.clone().into()])?);
    let is_same_location =
        Arc::new(Fluent::new("is_same_location", Type::Bool, vec![location.clone().into(), location.clone().into()])?);
    let mounted = Arc::new(Fluent::boolean("cargo_mounted")?);

    let mut mv = InstantaneousAction::new(
        "move",
        vec![Parameter::new("l_from", location.clone()), Parameter::new("l_to", location.clone())],
    )?;
    let (l_from, l_to) = (mv.parameter("l_from")?, mv.parameter("l_to")?);
    mv.add_precondition(fluent(&robot_at, vec![l_from.clone()])?)?;
    mv.add_precondition(expNot!(fluent(&robot_at, vec![l_to.clone()])?)?)?;
    mv.add_precondition(expNot!(fluent(&is_same_location, vec![l_from.clone(), l_to.clone()])?)?)?;
    mv.add_effect(fluent(&robot_at, vec![l_from])?, false)?;
    mv.add_effect(fluent(&robot_at, vec![l_to])?, true)?;
    let (load, unload) = cargo_actions(&location, &robot_at, &cargo_at, &mounted)?;

    let (l1, l2) = (Object::new("l1", location.clone()), Object::new("l2", location.clone()));
    let mut problem = ProblemBuilder::new("robot_loader_mod");
    for f in [&robot_at, &cargo_at, &mounted, &is_same_location] {
        problem.add_fluent(f, Some(false.into()))?;
    }
    let mv = problem.add_action(mv)?;
    let load = problem.add_action(load)?;
    let unload = problem.add_action(unload)?;
    problem.add_objects(vec![l1.clone(), l2.clone()])?;
    problem.set_initial_value(fluent(&robot_at, vec![obj(&l1)])?, true)?;
    problem.set_initial_value(fluent(&cargo_at, vec![obj(&l2)])?, true)?;
    let locations: Vec<Object> = problem.objects_of(&location).cloned().collect();
    for o in &locations {
        problem.set_initial_value(fluent(&is_same_location, vec![obj(o), obj(o)])?, true)?;
    }
    problem.add_goal(fluent(&cargo_at, vec![obj(&l1)])?)?;
    let plan = loader_plan(&mv, &load, &unload, &l1, &l2)?;
    Ok(Example { problem: problem.build()?, plan })
}

pub fn robot_loader_adv() -> Result<Example> {
    let robot_t = UserType::new("Robot");
    let container = UserType::new("Container");
    let location = UserType::new("Location");
    let robot_at = Arc::new(Fluent::new("robot_at", Type::Bool, vec![robot_t.clone().into(), location.clone().into()])?);
    let cargo_at =
        Arc::new(Fluent::new("cargo_at", Type::Bool, vec![container.clone().into(), location.clone().into()])?);
    let mounted =
        Arc::new(Fluent::new("cargo_mounted", Type::Bool, vec![container.clone().into(), robot_t.clone().into()])?);

    let mut mv = InstantaneousAction::new(
        "move",
        vec![
            Parameter::new("l_from", location.clone()),
            Parameter::new("l_to", location.clone()),
            Parameter::new("r", robot_t.clone()),
        ],
    )?;
    let (l_from, l_to, r) = (mv.parameter("l_from")?, mv.parameter("l_to")?, mv.parameter("r")?);
    mv.add_precondition(expNot!(equals(l_from.clone(), l_to.clone())?)?)?;
    mv.add_precondition(fluent(&robot_at, vec![r.clone(), l_from.clone()])?)?;
    mv.add_precondition(expNot!(fluent(&robot_at, vec![r.clone(), l_to.clone()])?)?)?;
    mv.add_effect(fluent(&robot_at, vec![r.clone(), l_from])?, false)?;
    mv.add_effect(fluent(&robot_at, vec![r, l_to])?, true)?;

    let cargo_params = || {
        vec![
            Parameter::new("loc", location.clone()),
            Parameter::new("r", robot_t.clone()),
            Parameter::new("c", container.clone()),
        ]
    };
    let mut load = InstantaneousAction::new("load", cargo_params())?;
    let (loc, r, c) = (load.parameter("loc")?, load.parameter("r")?, load.parameter("c")?);
    load.add_precondition(fluent(&cargo_at, vec![c.clone(), loc.clone()])?)?;
    load.add_precondition(fluent(&robot_at, vec![r.clone(), loc.clone()])?)?;
    load.add_precondition(expNot!(fluent(&mounted, vec![c.clone(), r.clone()])?)?)?;
    load.add_effect(fluent(&cargo_at, vec![c.clone(), loc])?, false)?;
    load.add_effect(fluent(&mounted, vec![c, r])?, true)?;

    let mut unload = InstantaneousAction::new("unload", cargo_params())?;
    let (loc, r, c) = (unload.parameter("loc")?, unload.parameter("r")?, unload.parameter("c")?);
    unload.add_precondition(expNot!(fluent(&cargo_at, vec![c.clone(), loc.clone()])?)?)?;
    unload.add_precondition(fluent(&robot_at, vec![r.clone(), loc.clone()])?)?;
    unload.add_precondition(fluent(&mounted, vec![c.clone(), r.clone()])?)?;
    unload.add_effect(fluent(&cargo_at, vec![c.clone(), loc])?, true)?;
    unload.add_effect(fluent(&mounted, vec![c, r])?, false)?;

    let ls: Vec<_> = ["l1", "l2", "l3"].iter().map(|n| Object::new(*n, location.clone())).collect();
    let r1 = Object::new("r1", robot_t);
    let c1 = Object::new("c1", container);
    let mut problem = ProblemBuilder::new("robot_loader_adv");
    problem.add_fluent(&robot_at, None)?;
    problem.add_fluent(&cargo_at, None)?;
    problem.add_fluent(&mounted, None)?;
    problem.add_objects(ls.iter().cloned())?;
    problem.add_objects(vec![r1.clone(), c1.clone()])?;
    let mv = problem.add_action(mv)?;
    let load = problem.add_action(load)?;
    let unload = problem.add_action(unload)?;
    for (l, (robot_here, cargo_here)) in ls.iter().zip([(true, false), (false, true), (false, false)]) {
        problem.set_initial_value(fluent(&robot_at, vec![obj(&r1), obj(l)])?, robot_here)?;
        problem.set_initial_value(fluent(&cargo_at, vec![obj(&c1), obj(l)])?, cargo_here)?;
    }
    problem.set_initial_value(fluent(&mounted, vec![obj(&c1), obj(&r1)])?, false)?;
    problem.add_goal(fluent(&cargo_at, vec![obj(&c1), obj(&ls[2])])?)?;
    problem.add_goal(fluent(&robot_at, vec![obj(&r1), obj(&ls[0])])?)?;
    let (l1, l2, l3) = (obj(&ls[0]), obj(&ls[1]), obj(&ls[2]));
    let plan = seq(vec![
        ActionInstance::new(&mv, vec![l1.clone(), l2.clone(), obj(&r1)])?,
        ActionInstance::new(&load, vec![l2.clone(), obj(&r1), obj(&c1)])?,
        ActionInstance::new(&mv, vec![l2, l3.clone(), obj(&r1)])?,
        ActionInstance::new(&unload, vec![l3.clone(), obj(&r1), obj(&c1)])?,
        ActionInstance::new(&mv, vec![l3, l1, obj(&r1)])?,
    ]);
    Ok(Example { problem: problem.build()?, plan })
}

/// Some location other than both ends is connected, in either direction, to both of them.
fn via_middle(is_connected: &Arc<Fluent>, mid: &Variable, from: &Expression, to: &Expression) -> Result<Expression> {
    let m: Expression = mid.into();
    let linked = |a: &Expression, b: &Expression| -> Result<Expression> {
        expOr!(fluent(is_connected, vec![a.clone(), b.clone()])?, fluent(is_connected, vec![b.clone(), a.clone()])?)
    };
    let body = expAnd!(
        expNot!(expOr!(equals(m.clone(), from.clone())?, equals(m.clone(), to.clone())?)?)?,
        linked(from, &m)?,
        linked(to, &m)?
    )?;
    exists(vec![mid.clone()], body)
}

/// Robot moving along a line of five locations, one hop (`move`) or two hops (`move_2`) at a time.
fn connected_robot(name: &str, visits: bool) -> Result<Example> {
    let location = UserType::new("Location");
    let robot_t = UserType::new("Robot");
    let is_at = Arc::new(Fluent::new("is_at", Type::Bool, vec![location.clone().into(), robot_t.clone().into()])?);
    let battery = Arc::new(Fluent::new(
        "battery_charge",
        Type::real_range(Some(Rational::from(0)), Some(Rational::from(100)))?,
        vec![robot_t.clone().into()],
    )?);
    let is_connected =
        Arc::new(Fluent::new("is_connected", Type::Bool, vec![location.clone().into(), location.clone().into()])?);
    let visited = Arc::new(Fluent::new("visited", Type::Bool, vec![location.clone().into()])?);
    let mid = Variable::new("mid_loc", location.clone());

    let make_move = |name: &str, cost: i64| -> Result<InstantaneousAction> {
        let mut mv = InstantaneousAction::new(
            name,
            vec![
                Parameter::new("robot", robot_t.clone()),
                Parameter::new("l_from", location.clone()),
                Parameter::new("l_to", location.clone()),
            ],
        )?;
        let (robot, l_from, l_to) = (mv.parameter("robot")?, mv.parameter("l_from")?, mv.parameter("l_to")?);
        let charge = fluent(&battery, vec![robot.clone()])?;
        mv.add_precondition(ge(charge.clone(), cost.into())?)?;
        mv.add_precondition(expNot!(equals(l_from.clone(), l_to.clone())?)?)?;
        mv.add_precondition(fluent(&is_at, vec![l_from.clone(), robot.clone()])?)?;
        mv.add_precondition(expNot!(fluent(&is_at, vec![l_to.clone(), robot.clone()])?)?)?;
        if cost == 10 {
            mv.add_precondition(expOr!(
                fluent(&is_connected, vec![l_from.clone(), l_to.clone()])?,
                fluent(&is_connected, vec![l_to.clone(), l_from.clone()])?
            )?)?;
        } else {
            mv.add_precondition(via_middle(&is_connected, &mid, &l_from, &l_to)?)?;
        }
        mv.add_effect(fluent(&is_at, vec![l_from, robot.clone()])?, false)?;
        mv.add_effect(fluent(&is_at, vec![l_to.clone(), robot])?, true)?;
        if visits {
            mv.add_effect(fluent(&visited, vec![l_to])?, true)?;
        }
        mv.add_decrease_effect(charge, cost)?;
        Ok(mv)
    };
    let mv = make_move("move", 10)?;
    let mv_2 = make_move("move_2", 15)?;

    let ls: Vec<_> = (1..=5).map(|i| Object::new(format!("l{}", i), location.clone())).collect();
    let r1 = Object::new("r1", robot_t);
    let mut problem = ProblemBuilder::new(name);
    problem.add_fluent(&is_at, Some(false.into()))?;
    problem.add_fluent(&battery, None)?;
    problem.add_fluent(&is_connected, Some(false.into()))?;
    if visits {
        problem.add_fluent(&visited, Some(false.into()))?;
    }
    problem.add_object(r1.clone())?;
    problem.add_objects(ls.iter().cloned())?;
    let mv = problem.add_action(mv)?;
    let mv_2 = problem.add_action(mv_2)?;
    problem.set_initial_value(fluent(&is_at, vec![obj(&ls[0]), obj(&r1)])?, true)?;
    for pair in ls.windows(2) {
        problem.set_initial_value(fluent(&is_connected, vec![obj(&pair[0]), obj(&pair[1])])?, true)?;
    }
    problem.add_goal(fluent(&is_at, vec![obj(&ls[4]), obj(&r1)])?)?;

    let plan = if visits {
        problem.set_initial_value(fluent(&visited, vec![obj(&ls[0])])?, true)?;
        problem.set_initial_value(fluent(&battery, vec![obj(&r1)])?, 50i64)?;
        let v = Variable::new("visited_loc", location);
        problem.add_goal(forall(vec![v.clone()], fluent(&visited, vec![(&v).into()])?)?)?;
        let steps = ls
            .windows(2)
            .map(|pair| ActionInstance::new(&mv, vec![obj(&r1), obj(&pair[0]), obj(&pair[1])]))
            .collect::<Result<Vec<_>>>()?;
        seq(steps)
    } else {
        problem.set_initial_value(fluent(&battery, vec![obj(&r1)])?, 100i64)?;
        seq(vec![
            ActionInstance::new(&mv_2, vec![obj(&r1), obj(&ls[0]), obj(&ls[2])])?,
            ActionInstance::new(&mv_2, vec![obj(&r1), obj(&ls[2]), obj(&ls[4])])?,
        ])
    };
    Ok(Example { problem: problem.build()?, plan })
}

pub fn robot_locations_connected() -> Result<Example> {
    connected_robot("robot_locations_connected", false)
}

pub fn robot_locations_visited() -> Result<Example> {
    connected_robot("robot_locations_visited", true)
}

pub fn charge_discharge() -> Result<Example> {
    let charger = Arc::new(Fluent::boolean("charger")?);
    let batteries = ["b_1", "b_2", "b_3"]
        .iter()
        .map(|n| Fluent::boolean(*n).map(Arc::new))
        .collect::<Result<Vec<_>>>()?;
    let charger_ = fluent(&charger, vec![])?;
    let b = batteries.iter().map(|f| fluent(f, vec![])).collect::<Result<Vec<_>>>()?;

    let mut charge = InstantaneousAction::new("charge", vec![])?;
    charge.add_precondition(expNot!(charger_)?)?;
    charge.add_effect(charger_.clone(), true)?;
    // the charger is full and some battery is still empty
    let mut discharge = InstantaneousAction::new("discharge", vec![])?;
    discharge.add_precondition(expNot!(implies(charger_.clone(), expAnd!(b[0], b[1], b[2])?)?)?)?;
    discharge.add_effect(charger_.clone(), false)?;
    discharge.add_conditional_effect(b[0].clone(), true, expNot!(b[0])?)?;
    discharge.add_conditional_effect(b[1].clone(), true, expAnd!(b[0], expNot!(b[1])?)?)?;
    discharge.add_conditional_effect(b[2].clone(), true, expAnd!(b[0], b[1], expNot!(b[2])?)?)?;

    let mut problem = ProblemBuilder::new("charge_discharge");
    problem.add_fluent(&charger, None)?;
    for f in &batteries {
        problem.add_fluent(f, None)?;
    }
    let charge = problem.add_action(charge)?;
    let discharge = problem.add_action(discharge)?;
    problem.set_initial_value(charger_, false)?;
    for e in &b {
        problem.set_initial_value(e.clone(), false)?;
        problem.add_goal(e.clone())?;
    }
    let mut steps = Vec::new();
    for _ in 0..3 {
        steps.push(ActionInstance::new(&charge, vec![])?);
        steps.push(ActionInstance::new(&discharge, vec![])?);
    }
    Ok(Example { problem: problem.build()?, plan: seq(steps) })
}

pub fn matchcellar() -> Result<Example> {
    let match_t = UserType::new("Match");
    let fuse_t = UserType::new("Fuse");
    let handfree = Arc::new(Fluent::boolean("handfree")?);
    let light = Arc::new(Fluent::boolean("light")?);
    let match_used = Arc::new(Fluent::new("match_used", Type::Bool, vec![match_t.clone().into()])?);
    let fuse_mended = Arc::new(Fluent::new("fuse_mended", Type::Bool, vec![fuse_t.clone().into()])?);
    let (handfree_, light_) = (fluent(&handfree, vec![])?, fluent(&light, vec![])?);

    let mut light_match = DurativeAction::new("light_match", vec![Parameter::new("m", match_t.clone())])?;
    let m = light_match.parameter("m")?;
    light_match.set_fixed_duration(6i64)?;
    light_match.add_condition(Timing::start(), expNot!(fluent(&match_used, vec![m.clone()])?)?)?;
    light_match.add_effect(Timing::start(), fluent(&match_used, vec![m])?, true)?;
    light_match.add_effect(Timing::start(), light_.clone(), true)?;
    light_match.add_effect(Timing::end(), light_.clone(), false)?;

    let mut mend_fuse = DurativeAction::new("mend_fuse", vec![Parameter::new("f", fuse_t.clone())])?;
    let f = mend_fuse.parameter("f")?;
    mend_fuse.set_fixed_duration(5i64)?;
    mend_fuse.add_condition(Timing::start(), handfree_.clone())?;
    mend_fuse.add_condition(TimeInterval::closed(Timing::start(), Timing::end()), light_.clone())?;
    mend_fuse.add_effect(Timing::start(), handfree_.clone(), false)?;
    mend_fuse.add_effect(Timing::end(), fluent(&fuse_mended, vec![f])?, true)?;
    mend_fuse.add_effect(Timing::end(), handfree_.clone(), true)?;

    let fuses: Vec<_> = (1..=3).map(|i| Object::new(format!("f{}", i), fuse_t.clone())).collect();
    let matches: Vec<_> = (1..=3).map(|i| Object::new(format!("m{}", i), match_t.clone())).collect();
    let mut problem = ProblemBuilder::new("matchcellar");
    problem.add_fluent(&handfree, None)?;
    problem.add_fluent(&light, None)?;
    problem.add_fluent(&match_used, Some(false.into()))?;
    problem.add_fluent(&fuse_mended, Some(false.into()))?;
    problem.add_objects(fuses.iter().cloned())?;
    problem.add_objects(matches.iter().cloned())?;
    let light_match = problem.add_action(light_match)?;
    let mend_fuse = problem.add_action(mend_fuse)?;
    problem.set_initial_value(light_, false)?;
    problem.set_initial_value(handfree_, true)?;
    for f in &fuses {
        problem.add_goal(fluent(&fuse_mended, vec![obj(f)])?)?;
    }

    // one match per fuse, each fuse started right after its match is lit
    let mut steps = Vec::new();
    for (i, (m, f)) in matches.iter().zip(&fuses).enumerate() {
        let offset = 601 * i as i64;
        steps.push(at(offset, 100, ActionInstance::new(&light_match, vec![obj(m)])?, 6)?);
        steps.push(at(offset + 1, 100, ActionInstance::new(&mend_fuse, vec![obj(f)])?, 5)?);
    }
    Ok(Example { problem: problem.build()?, plan: TimeTriggeredPlan::new(steps).into() })
}

pub fn temporal_conditional() -> Result<Example> {
    let obj_t = UserType::new("Obj");
    let is_same_obj = Arc::new(Fluent::new("is_same_obj", Type::Bool, vec![obj_t.clone().into(), obj_t.clone().into()])?);
    let is_ok = Arc::new(Fluent::new("is_ok", Type::Bool, vec![obj_t.clone().into()])?);
    let is_ok_giver = Arc::new(Fluent::new("is_ok_giver", Type::Bool, vec![obj_t.clone().into()])?);
    let ok_given = Arc::new(Fluent::boolean("ok_given")?);

    let mut set_giver = DurativeAction::new("set_giver", vec![Parameter::new("y", obj_t.clone())])?;
    let y = set_giver.parameter("y")?;
    set_giver.set_fixed_duration(2i64)?;
    set_giver.add_condition(Timing::start(), expNot!(fluent(&is_ok_giver, vec![y.clone()])?)?)?;
    set_giver.add_effect(Timing::start(), fluent(&is_ok_giver, vec![y.clone()])?, true)?;
    set_giver.add_effect(Timing::end(), fluent(&is_ok_giver, vec![y])?, false)?;

    let mut take_ok =
        DurativeAction::new("take_ok", vec![Parameter::new("x", obj_t.clone()), Parameter::new("y", obj_t.clone())])?;
    let (x, y) = (take_ok.parameter("x")?, take_ok.parameter("y")?);
    take_ok.set_fixed_duration(3i64)?;
    take_ok.add_condition(Timing::start(), expNot!(fluent(&is_ok, vec![x.clone()])?)?)?;
    take_ok.add_condition(Timing::start(), expNot!(fluent(&is_ok_giver, vec![y.clone()])?)?)?;
    take_ok.add_condition(Timing::start(), expNot!(fluent(&is_same_obj, vec![x.clone(), y.clone()])?)?)?;
    take_ok.add_conditional_effect(Timing::end(), fluent(&is_ok, vec![x])?, true, fluent(&is_ok_giver, vec![y])?)?;
    take_ok.add_effect(Timing::end(), fluent(&ok_given, vec![])?, true)?;

    let (o1, o2) = (Object::new("o1", obj_t.clone()), Object::new("o2", obj_t));
    let mut problem = ProblemBuilder::new("temporal_conditional");
    for f in [&is_same_obj, &is_ok, &is_ok_giver, &ok_given] {
        problem.add_fluent(f, Some(false.into()))?;
    }
    problem.add_objects(vec![o1.clone(), o2.clone()])?;
    let set_giver = problem.add_action(set_giver)?;
    let take_ok = problem.add_action(take_ok)?;
    problem.add_goal(fluent(&is_ok, vec![obj(&o1)])?)?;
    for o in [&o1, &o2] {
        problem.set_initial_value(fluent(&is_same_obj, vec![obj(o), obj(o)])?, true)?;
    }
    let plan = TimeTriggeredPlan::new(vec![
        at(0, 1, ActionInstance::new(&take_ok, vec![obj(&o1), obj(&o2)])?, 3)?,
        at(1, 1, ActionInstance::new(&set_giver, vec![obj(&o2)])?, 2)?,
    ]);
    Ok(Example { problem: problem.build()?, plan: plan.into() })
}

pub fn timed_connected_locations() -> Result<Example> {
    let location = UserType::new("Location");
    let is_connected =
        Arc::new(Fluent::new("is_connected", Type::Bool, vec![location.clone().into(), location.clone().into()])?);
    let is_at = Arc::new(Fluent::new("is_at", Type::Bool, vec![location.clone().into()])?);
    let mid = Variable::new("mid_loc", location.clone());

    let mut mv = DurativeAction::new(
        "move",
        vec![Parameter::new("l_from", location.clone()), Parameter::new("l_to", location.clone())],
    )?;
    let (l_from, l_to) = (mv.parameter("l_from")?, mv.parameter("l_to")?);
    mv.set_fixed_duration(6i64)?;
    mv.add_condition(Timing::start(), fluent(&is_at, vec![l_from.clone()])?)?;
    mv.add_condition(Timing::start(), expNot!(fluent(&is_at, vec![l_to.clone()])?)?)?;
    let route = via_middle(&is_connected, &mid, &l_from, &l_to)?;
    mv.add_condition(TimeInterval::closed(Timing::start(), Timing::end()), route)?;
    mv.add_effect(Timing::start_plus(1), fluent(&is_at, vec![l_from])?, false)?;
    mv.add_effect(Timing::end_plus(5), fluent(&is_at, vec![l_to])?, true)?;

    let ls: Vec<_> = (1..=5).map(|i| Object::new(format!("l{}", i), location.clone())).collect();
    let mut problem = ProblemBuilder::new("timed_connected_locations");
    problem.add_fluent(&is_at, Some(false.into()))?;
    problem.add_fluent(&is_connected, Some(false.into()))?;
    problem.add_objects(ls.iter().cloned())?;
    let mv = problem.add_action(mv)?;
    problem.set_initial_value(fluent(&is_at, vec![obj(&ls[0])])?, true)?;
    for pair in ls.windows(2) {
        problem.set_initial_value(fluent(&is_connected, vec![obj(&pair[0]), obj(&pair[1])])?, true)?;
    }
    problem.add_goal(fluent(&is_at, vec![obj(&ls[4])])?)?;
    // the arrival lands 5 after the end of the move, so the second hop waits for it
    let plan = TimeTriggeredPlan::new(vec![
        at(0, 1, ActionInstance::new(&mv, vec![obj(&ls[0]), obj(&ls[2])])?, 6)?,
        at(12, 1, ActionInstance::new(&mv, vec![obj(&ls[2]), obj(&ls[4])])?, 6)?,
    ]);
    Ok(Example { problem: problem.build()?, plan: plan.into() })
}

/// Answers with the reference plan of the catalog example of the same name.
pub struct ReferencePlanner {
    examples: BTreeMap<String, Example>,
}

impl ReferencePlanner {
    pub fn new() -> Result<Self> {
        Ok(Self { examples: examples()? })
    }
}

impl Planner for ReferencePlanner {
    fn solve(&self, problem: &Problem, config: &SolverConfig) -> std::result::Result<Option<Plan>, ServiceError> {
        debug!(problem = problem.name(), solvers = config.solvers().count(), "looking up reference plan");
        Ok(self
            .examples
            .get(problem.name())
            .filter(|e| e.problem == *problem)
            .map(|e| e.plan.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::Verdict;
    use crate::sim::Simulator;

    #[test]
    fn test_reference_plans_are_valid() {
        let sim = Simulator::new();
        for (name, example) in examples().unwrap() {
            assert_eq!(sim.check(&example.problem, &example.plan), Verdict::Valid, "{}", name);
        }
    }

    #[test]
    fn test_truncated_plans_fail() {
        let sim = Simulator::new();
        let example = robot_loader().unwrap();
        let mut steps: Vec<_> = example.plan.instances().into_iter().cloned().collect();
        steps.pop();
        let plan: Plan = SequentialPlan::new(steps).into();
        assert!(!sim.check(&example.problem, &plan).is_valid());

        // a fuse started late is still being mended when its match burns out
        let example = matchcellar().unwrap();
        let late = match &example.plan {
            Plan::TimeTriggered(p) => p
                .actions()
                .iter()
                .map(|a| {
                    let start = if a.instance().action().name() == "mend_fuse" { a.start() + Rational::from(2) } else { a.start().clone() };
                    TimedAction::new(start, a.instance().clone(), a.duration().cloned()).unwrap()
                })
                .collect::<Vec<_>>(),
            Plan::Sequential(_) => unreachable!(),
        };
        assert!(!sim.check(&example.problem, &TimeTriggeredPlan::new(late).into()).is_valid());
    }

    #[test]
    fn test_timed_arrival_is_delayed() {
        let sim = Simulator::new();
        let example = timed_connected_locations().unwrap();
        let early = match &example.plan {
            Plan::TimeTriggered(p) => p
                .actions()
                .iter()
                .map(|a| {
                    let start = if *a.start() == 0 { Rational::from(0) } else { Rational::from(6) };
                    TimedAction::new(start, a.instance().clone(), a.duration().cloned()).unwrap()
                })
                .collect::<Vec<_>>(),
            Plan::Sequential(_) => unreachable!(),
        };
        assert!(matches!(sim.check(&example.problem, &TimeTriggeredPlan::new(early).into()), Verdict::Invalid(_)));
    }

    #[test]
    fn test_reference_planner_matches_whole_problem() {
        let planner = ReferencePlanner::new().unwrap();
        let config = SolverConfig::new();
        let example = basic().unwrap();
        assert_eq!(planner.solve(&example.problem, &config).unwrap(), Some(example.plan));
        let other = ProblemBuilder::new("basic").build().unwrap();
        assert_eq!(planner.solve(&other, &config).unwrap(), None);
    }

    #[test]
    fn test_catalog_contents() {
        let all = examples().unwrap();
        assert_eq!(all.len(), 20);
        for name in ["robot_modified", "robot_no_negative_preconditions", "robot_loader_mod", "basic_without_negative_preconditions"] {
            assert_eq!(all[name].problem.name(), name);
        }
        // the type name is case sensitive
        let plain = &all["robot_no_negative_preconditions"].problem;
        assert_eq!(plain.user_types(), vec![UserType::new("location")]);
        match plain.actions()[0].as_ref() {
            Action::Instantaneous(a) => assert_eq!(a.preconditions().len(), 1),
            Action::Durative(_) => panic!("expected an instantaneous move"),
        }

        let loader = &all["robot_loader_mod"].problem;
        assert!(loader.fluents().iter().all(|(_, default)| default.is_some()));
        assert_eq!(loader.initial_values().len(), 4);
    }
}
