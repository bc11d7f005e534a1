use thiserror::Error;

use crate::model::ModelError;

/// Bytes that do not describe a valid model value. Decoding stops at the first one, and
/// nothing partially decoded is handed back.
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("malformed message: {0}")]
    Protobuf(#[from] prost::DecodeError),

    #[error("{path}: {table} index {index} is out of range ({len} entries)")]
    IndexOutOfRange { path: String, table: &'static str, index: u32, len: usize },

    #[error("{path}: unknown {what} tag {tag}")]
    UnknownTag { path: String, what: &'static str, tag: i32 },

    #[error("{path}: expected {expected} operands, found {found}")]
    Arity { path: String, expected: usize, found: usize },

    #[error("{path}: malformed rational {value}")]
    Rational { path: String, value: String },

    #[error("{path}: missing {field}")]
    Missing { path: String, field: &'static str },

    #[error("{path}: {source}")]
    Model {
        path: String,
        #[source]
        source: ModelError,
    },
}

impl DecodeError {
    /// Location of the offending node, e.g. `problem.actions[0].preconditions[1].nodes[3]`.
    pub fn path(&self) -> Option<&str> {
        match self {
            DecodeError::Protobuf(_) => None,
            DecodeError::IndexOutOfRange { path, .. }
            | DecodeError::UnknownTag { path, .. }
            | DecodeError::Arity { path, .. }
            | DecodeError::Rational { path, .. }
            | DecodeError::Missing { path, .. }
            | DecodeError::Model { path, .. } => Some(path),
        }
    }
}

/// A structurally valid plan that does not fit the problem it is resolved against.
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("step {step}: problem {problem} has no action {name}({signature})")]
    UnknownAction { step: usize, problem: String, name: String, signature: String },

    #[error("step {step}: problem {problem} has no object {name} of type {tpe}")]
    UnknownObject { step: usize, problem: String, name: String, tpe: String },

    #[error("step {step}: {source}")]
    Instance {
        step: usize,
        #[source]
        source: ModelError,
    },
}
