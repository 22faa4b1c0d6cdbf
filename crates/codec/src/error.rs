#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("empty rule string")]
    Empty,
    #[error("unknown operation tag {0}")]
    UnknownOperation(i32),
    #[error("malformed field at token {index}: {reason}")]
    MalformedField { index: usize, reason: String },
    #[error("expected {expected} tokens, found {found}")]
    WrongArity { expected: usize, found: usize },
    #[error("unknown admin policy keyword {0:?}")]
    UnknownPolicyKeyword(String),
}
