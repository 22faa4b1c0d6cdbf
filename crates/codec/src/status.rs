//! Tri-state protocol status, grounded on `cheferd::PStatus`
//! (`include/cheferd/utils/status.hpp`): a value-type result with no
//! "success payload" of its own, used throughout the control plane instead
//! of a plain `bool` so that "not implemented here" is distinguishable from
//! "failed".

use std::fmt;

/// Behavioral classification of an [`Status::Error`], matching the four
/// kinds the spec's error-handling design distinguishes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ErrorKind {
    #[error("parse error: {0}")]
    Parse(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Mirrors `PStatus`: a rule/request either succeeded, is not supported by
/// the receiving side, or failed with a classified error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Ok,
    NotSupported,
    Error(ErrorKind),
}

impl Status {
    pub fn is_ok(&self) -> bool {
        matches!(self, Status::Ok)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Status::Error(_))
    }

    pub fn is_supported(&self) -> bool {
        !matches!(self, Status::NotSupported)
    }

    pub fn parse_error(msg: impl Into<String>) -> Self {
        Status::Error(ErrorKind::Parse(msg.into()))
    }

    pub fn transport_error(msg: impl Into<String>) -> Self {
        Status::Error(ErrorKind::Transport(msg.into()))
    }

    pub fn protocol_error(msg: impl Into<String>) -> Self {
        Status::Error(ErrorKind::Protocol(msg.into()))
    }

    pub fn configuration_error(msg: impl Into<String>) -> Self {
        Status::Error(ErrorKind::Configuration(msg.into()))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Ok => write!(f, "ok"),
            Status::NotSupported => write!(f, "not supported"),
            Status::Error(kind) => write!(f, "{kind}"),
        }
    }
}
