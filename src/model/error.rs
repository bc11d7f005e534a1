use thiserror::Error;

/// Raised while building a model value. Construction is the only place these come from,
/// nothing is deferred to encode time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("type error: {0}")]
    Type(String),

    #[error("value error: {0}")]
    Value(String),

    #[error("scope error: {0}")]
    Scope(String),
}

impl ModelError {
    pub fn type_error(msg: impl Into<String>) -> Self {
        Self::Type(msg.into())
    }

    pub fn value_error(msg: impl Into<String>) -> Self {
        Self::Value(msg.into())
    }

    pub fn scope_error(msg: impl Into<String>) -> Self {
        Self::Scope(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, ModelError>;
