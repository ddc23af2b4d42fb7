//! Status codes returned at the service boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Request outcome categories, modelled on RPC status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Code {
    /// The request was malformed, e.g. an empty key.
    InvalidArgument,
    /// Unsubscribe for a key the caller does not hold.
    NotFound,
    /// A frame that could not be decoded.
    BadRequest,
    /// The broker failed in a way the caller cannot fix.
    Internal,
}

impl Code {
    pub fn as_str(&self) -> &'static str {
        match self {
            Code::InvalidArgument => "invalid_argument",
            Code::NotFound => "not_found",
            Code::BadRequest => "bad_request",
            Code::Internal => "internal",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}: {message}", .code.as_str())]
pub struct Status {
    pub code: Code,
    pub message: String,
}

impl Status {
    pub fn new(code: Code, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Code::InvalidArgument, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Code::Internal, message)
    }
}
