pub mod action;
pub mod error;
pub mod expression;
pub mod plan;
pub mod problem;
pub mod timing;
pub mod types;

pub use action::{Action, DurativeAction, Effect, InstantaneousAction};
pub use error::ModelError;
pub use expression::{Constant, Expression, ExpressionKind, Parameter, Variable};
pub use plan::{ActionInstance, Plan, SequentialPlan, TimeTriggeredPlan, TimedAction};
pub use problem::{Groundings, Problem, ProblemBuilder, MAX_GROUNDINGS};
pub use timing::{Duration, TimeInterval, TimepointKind, Timing};
pub use types::{Fluent, Object, Type, UserType};
