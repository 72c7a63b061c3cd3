use crate::model::DetailKind;
use disaster_registry::ValidationError;
use std::fmt;
use thiserror::Error;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("push channel {endpoint} unreachable: {reason}")]
    Unreachable { endpoint: String, reason: String },
    #[error("push channel endpoint {0} is invalid")]
    InvalidEndpoint(String),
    #[error("push channel protocol violation: {0}")]
    Protocol(String),
    #[error("push channel is closed")]
    Closed,
    #[error("push channel silent for {0:?}")]
    Silent(std::time::Duration),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiOperation {
    ListDisasters,
    FetchDetail(DetailKind),
    CreateDisaster,
}

impl fmt::Display for ApiOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ListDisasters => f.write_str("list disasters"),
            Self::FetchDetail(kind) => write!(f, "fetch {kind}"),
            Self::CreateDisaster => f.write_str("create disaster"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ApiFailure {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("server answered with status {0}")]
    Status(u16),
    #[error("response body was malformed: {0}")]
    Decode(String),
    #[error("disaster id cannot be used as a path segment")]
    UnaddressableId,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{operation} via {endpoint} failed: {failure}")]
pub struct ApiError {
    pub operation: ApiOperation,
    pub endpoint: String,
    pub disaster_id: Option<String>,
    pub failure: ApiFailure,
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self.failure {
            ApiFailure::Status(code) => Some(code),
            _ => None,
        }
    }

    pub fn detail_kind(&self) -> Option<DetailKind> {
        match self.operation {
            ApiOperation::FetchDetail(kind) => Some(kind),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("dropped malformed `{event}` event: {reason}")]
pub struct MalformedEventError {
    pub event: String,
    pub reason: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}
