use std::fmt;

use crate::graph::NodeId;
use crate::slot::SlotId;

/// Error type for dump and restore.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed input: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("failed to encode dump table: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("reference {0} has no matching slot")]
    DanglingReference(SlotId),
    #[error("malformed input: {0}")]
    Malformed(String),
    #[error("node not found: {0}")]
    UnknownNode(NodeId),
    #[error("transform failed: {0}")]
    Transform(#[from] TransformError),
}

impl Error {
    /// Wraps a failure raised inside a serializer, deserializer or
    /// post-deserializer.
    pub fn transform(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Transform(TransformError::new(err))
    }

    /// True for errors caused by structurally inconsistent input text.
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            Error::Decode(_) | Error::DanglingReference(_) | Error::Malformed(_)
        )
    }
}

/// A failure raised by caller-supplied transform code.
///
/// The core never retries or suppresses these; they reach the caller of
/// `dump` or `restore` unchanged.
#[derive(Debug)]
pub struct TransformError(Box<dyn std::error::Error + Send + Sync>);

impl TransformError {
    pub fn new(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        TransformError(err.into())
    }

    pub fn into_inner(self) -> Box<dyn std::error::Error + Send + Sync> {
        self.0
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for TransformError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.0)
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
