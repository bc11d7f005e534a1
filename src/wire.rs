pub mod decode;
pub mod dump;
pub mod encode;
pub mod error;
pub mod proto;
pub mod resolve;

use prost::Message;

use crate::model::{Plan, Problem};

pub use decode::{decode_plan, decode_problem};
pub use dump::dump;
pub use encode::{encode_plan, encode_problem};
pub use error::{DecodeError, ResolutionError};
pub use resolve::{UnresolvedPlan, UnresolvedStep};

pub fn problem_to_bytes(problem: &Problem) -> Vec<u8> {
    encode_problem(problem).encode_to_vec()
}

pub fn problem_from_bytes(bytes: &[u8]) -> Result<Problem, DecodeError> {
    decode_problem(&proto::ProblemMessage::decode(bytes)?)
}

pub fn plan_to_bytes(plan: &Plan) -> Vec<u8> {
    encode_plan(plan).encode_to_vec()
}

/// The returned plan still has to be resolved against the problem it solves.
pub fn plan_from_bytes(bytes: &[u8]) -> Result<UnresolvedPlan, DecodeError> {
    decode_plan(&proto::PlanMessage::decode(bytes)?)
}
