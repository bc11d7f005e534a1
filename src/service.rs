use std::fmt;
use std::path::PathBuf;

use prost::Message;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::SolverConfig;
use crate::model::{ModelError, Plan, Problem};
use crate::wire::{self, proto, DecodeError, ResolutionError};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("remote failure: {0}")]
    Remote(String),

    #[error("unknown method {0}")]
    UnknownMethod(String),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Model(#[from] ModelError),
}

impl From<prost::DecodeError> for ServiceError {
    fn from(e: prost::DecodeError) -> Self {
        ServiceError::Decode(DecodeError::Protobuf(e))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Valid,
    Invalid(String),
}

impl Verdict {
    pub fn is_valid(&self) -> bool {
        matches!(self, Verdict::Valid)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveOutcome {
    Plan(Plan),
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Solve,
    Validate,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Solve => "planOneShot",
            Method::Validate => "validatePlan",
        }
    }

    pub fn parse(name: &str) -> Result<Self, ServiceError> {
        match name {
            "planOneShot" => Ok(Method::Solve),
            "validatePlan" => Ok(Method::Validate),
            _ => Err(ServiceError::UnknownMethod(name.to_string())),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Produces a plan for a problem, or `None` when there is none.
pub trait Planner: Send + Sync {
    fn solve(&self, problem: &Problem, config: &SolverConfig) -> Result<Option<Plan>, ServiceError>;
}

pub trait Validator: Send + Sync {
    fn validate(&self, problem: &Problem, plan: &Plan) -> Verdict;
}

/// Request/response transport carrying encoded messages.
pub trait Endpoint: Send + Sync {
    fn call(&self, method: Method, request: &[u8]) -> Result<Vec<u8>, ServiceError>;
}

impl<E: Endpoint + ?Sized> Endpoint for &E {
    fn call(&self, method: Method, request: &[u8]) -> Result<Vec<u8>, ServiceError> {
        (**self).call(method, request)
    }
}

pub struct Client<E> {
    endpoint: E,
    dump_dir: Option<PathBuf>,
}

impl<E: Endpoint> Client<E> {
    pub fn new(endpoint: E) -> Self {
        Self { endpoint, dump_dir: None }
    }

    /// Every request is also written to `dir` before it is sent.
    pub fn with_dump_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dump_dir = Some(dir.into());
        self
    }

    fn send(&self, method: Method, problem: &Problem, request: Vec<u8>) -> Result<Vec<u8>, ServiceError> {
        if let Some(dir) = &self.dump_dir {
            // a failed dump never fails the request
            if let Err(e) = wire::dump(dir, problem.name(), method.as_str(), &request) {
                warn!(error = %e, "cannot dump request");
            }
        }
        debug!(%method, problem = problem.name(), bytes = request.len(), "sending request");
        self.endpoint.call(method, &request)
    }

    /// The returned plan is bound to `problem`'s own actions and objects.
    pub fn solve(&self, problem: &Problem, config: &SolverConfig) -> Result<SolveOutcome, ServiceError> {
        let request = proto::SolveRequest { problem: Some(wire::encode_problem(problem)), config: config.to_wire() };
        let reply = self.send(Method::Solve, problem, request.encode_to_vec())?;
        let answer = proto::Answer::decode(reply.as_slice())?;
        match proto::AnswerStatus::try_from(answer.status) {
            Ok(proto::AnswerStatus::PlanFound) => {
                let plan = answer
                    .plan
                    .as_ref()
                    .ok_or(DecodeError::Missing { path: "answer".to_string(), field: "plan" })?;
                let plan = wire::decode_plan(plan)?.resolve(problem)?;
                info!(problem = problem.name(), steps = plan.len(), "plan found");
                Ok(SolveOutcome::Plan(plan))
            }
            Ok(proto::AnswerStatus::NotFound) => {
                info!(problem = problem.name(), "no plan found");
                Ok(SolveOutcome::NotFound)
            }
            _ => Err(DecodeError::UnknownTag { path: "answer".to_string(), what: "answer status", tag: answer.status }.into()),
        }
    }

    pub fn validate(&self, problem: &Problem, plan: &Plan) -> Result<Verdict, ServiceError> {
        let request =
            proto::ValidateRequest { problem: Some(wire::encode_problem(problem)), plan: Some(wire::encode_plan(plan)) };
        let reply = self.send(Method::Validate, problem, request.encode_to_vec())?;
        let answer = proto::ValidationAnswer::decode(reply.as_slice())?;
        let verdict = if answer.valid { Verdict::Valid } else { Verdict::Invalid(answer.reason) };
        info!(problem = problem.name(), valid = verdict.is_valid(), "plan validated");
        Ok(verdict)
    }
}

/// Serves encoded requests with a local planner and validator. Requests share no state.
pub struct Server<P, V> {
    planner: P,
    validator: V,
}

impl<P: Planner, V: Validator> Server<P, V> {
    pub fn new(planner: P, validator: V) -> Self {
        Self { planner, validator }
    }

    fn solve(&self, request: &[u8]) -> Result<proto::Answer, ServiceError> {
        let request = proto::SolveRequest::decode(request)?;
        let problem = request
            .problem
            .as_ref()
            .ok_or(DecodeError::Missing { path: "request".to_string(), field: "problem" })?;
        let problem = wire::decode_problem(problem)?;
        let config = SolverConfig::from_wire(&request.config);
        let answer = match self.planner.solve(&problem, &config)? {
            Some(plan) => proto::Answer { status: proto::AnswerStatus::PlanFound as i32, plan: Some(wire::encode_plan(&plan)) },
            None => proto::Answer { status: proto::AnswerStatus::NotFound as i32, plan: None },
        };
        Ok(answer)
    }

    fn validate(&self, request: &[u8]) -> Result<proto::ValidationAnswer, ServiceError> {
        let request = proto::ValidateRequest::decode(request)?;
        let problem = request
            .problem
            .as_ref()
            .ok_or(DecodeError::Missing { path: "request".to_string(), field: "problem" })?;
        let plan = request
            .plan
            .as_ref()
            .ok_or(DecodeError::Missing { path: "request".to_string(), field: "plan" })?;
        let problem = wire::decode_problem(problem)?;
        let verdict = match wire::decode_plan(plan)?.resolve(&problem) {
            Ok(plan) => self.validator.validate(&problem, &plan),
            // a plan naming things the problem does not have is simply not a plan for it
            Err(e) => Verdict::Invalid(e.to_string()),
        };
        Ok(match verdict {
            Verdict::Valid => proto::ValidationAnswer { valid: true, reason: String::new() },
            Verdict::Invalid(reason) => proto::ValidationAnswer { valid: false, reason },
        })
    }
}

impl<P: Planner, V: Validator> Endpoint for Server<P, V> {
    fn call(&self, method: Method, request: &[u8]) -> Result<Vec<u8>, ServiceError> {
        debug!(%method, bytes = request.len(), "serving request");
        match method {
            Method::Solve => Ok(self.solve(request)?.encode_to_vec()),
            Method::Validate => Ok(self.validate(request)?.encode_to_vec()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::model::expression::fluent;
    use crate::model::{ActionInstance, Fluent, InstantaneousAction, ProblemBuilder, SequentialPlan};
    use crate::sim::Simulator;

    fn light_problem() -> Problem {
        let on = Arc::new(Fluent::boolean("on").unwrap());
        let mut a = InstantaneousAction::new("switch", vec![]).unwrap();
        a.add_effect(fluent(&on, vec![]).unwrap(), true).unwrap();
        let mut builder = ProblemBuilder::new("light");
        builder.add_fluent(&on, Some(false.into())).unwrap();
        builder.add_action(a).unwrap();
        builder.add_goal(fluent(&on, vec![]).unwrap()).unwrap();
        builder.build().unwrap()
    }

    struct Fixed(Option<Plan>);

    impl Planner for Fixed {
        fn solve(&self, _: &Problem, config: &SolverConfig) -> Result<Option<Plan>, ServiceError> {
            if config.solver("broken").is_some() {
                return Err(ServiceError::Remote("solver crashed".to_string()));
            }
            Ok(self.0.clone())
        }
    }

    fn switch_plan(problem: &Problem) -> Plan {
        let switch = problem.action("switch").unwrap();
        SequentialPlan::new(vec![ActionInstance::new(switch, vec![]).unwrap()]).into()
    }

    #[test]
    fn test_solve_rebinds_plan_to_client_problem() {
        let problem = light_problem();
        let server = Server::new(Fixed(Some(switch_plan(&light_problem()))), Simulator::new());
        let client = Client::new(&server);
        match client.solve(&problem, &SolverConfig::new()).unwrap() {
            SolveOutcome::Plan(plan) => {
                assert_eq!(plan, switch_plan(&problem));
                assert!(Arc::ptr_eq(plan.instances()[0].action(), &problem.actions()[0]));
            }
            SolveOutcome::NotFound => panic!("expected a plan"),
        }
    }

    #[test]
    fn test_not_found_and_remote_failure() {
        let problem = light_problem();
        let server = Server::new(Fixed(None), Simulator::new());
        let client = Client::new(&server);
        assert_eq!(client.solve(&problem, &SolverConfig::new()).unwrap(), SolveOutcome::NotFound);
        let mut config = SolverConfig::new();
        config.set("broken", "x", "1");
        assert!(matches!(client.solve(&problem, &config), Err(ServiceError::Remote(_))));
    }

    #[test]
    fn test_validate() {
        let problem = light_problem();
        let server = Server::new(Fixed(None), Simulator::new());
        let client = Client::new(&server);
        assert_eq!(client.validate(&problem, &switch_plan(&problem)).unwrap(), Verdict::Valid);
        let empty: Plan = SequentialPlan::default().into();
        assert!(matches!(client.validate(&problem, &empty).unwrap(), Verdict::Invalid(_)));
    }

    #[test]
    fn test_garbage_request() {
        let server = Server::new(Fixed(None), Simulator::new());
        assert!(matches!(server.call(Method::Solve, &[0xff, 0xff, 0xff]), Err(ServiceError::Decode(_))));
        let empty = proto::SolveRequest::default().encode_to_vec();
        assert!(matches!(
            server.call(Method::Solve, &empty),
            Err(ServiceError::Decode(DecodeError::Missing { field: "problem", .. }))
        ));
        assert!(matches!(Method::parse("shutdown"), Err(ServiceError::UnknownMethod(_))));
        assert_eq!(Method::parse(Method::Validate.as_str()).unwrap(), Method::Validate);
    }

    #[test]
    fn test_dump_dir_receives_requests() {
        let dir = tempfile::Builder::new().prefix("upf_client").tempdir().unwrap();
        let problem = light_problem();
        let server = Server::new(Fixed(None), Simulator::new());
        let client = Client::new(&server).with_dump_dir(dir.path());
        client.solve(&problem, &SolverConfig::new()).unwrap();
        assert!(dir.path().join("light.planOneShot").exists());
    }
}
