//! A small, codeful error type in the style of the teacher's `ActyxOSError`:
//! every error carries a stable code alongside its message, so callers across
//! a process boundary (logs, HTTP responses) can match on the code rather
//! than parsing text.
use derive_more::Display;
use std::fmt;

pub type NodeResult<T> = Result<T, NodeError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[allow(non_camel_case_types)]
pub enum NodeErrorCode {
    ERR_IO,
    ERR_DECODE,
    ERR_INTERNAL,
}

#[derive(Debug, Clone)]
pub struct NodeError {
    code: NodeErrorCode,
    message: String,
}

impl NodeError {
    pub fn new(code: NodeErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn code(&self) -> NodeErrorCode {
        self.code
    }
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for NodeError {}

impl From<std::io::Error> for NodeError {
    fn from(err: std::io::Error) -> Self {
        NodeError::new(NodeErrorCode::ERR_IO, err.to_string())
    }
}

pub trait NodeResultExt<T> {
    fn node_err(self, code: NodeErrorCode) -> NodeResult<T>;
}

impl<T, E: fmt::Display> NodeResultExt<T> for Result<T, E> {
    fn node_err(self, code: NodeErrorCode) -> NodeResult<T> {
        self.map_err(|e| NodeError::new(code, e.to_string()))
    }
}
