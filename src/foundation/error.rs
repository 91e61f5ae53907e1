/// Result alias used across the filter graph.
pub type FilterResult<T> = Result<T, FilterError>;

/// Error taxonomy for graph construction, rendering and region queries.
///
/// Degenerate geometry is not an error: renders that have nothing to draw return `Ok(None)`.
#[derive(thiserror::Error, Debug)]
pub enum FilterError {
    /// Invalid parameters or source arity, raised at construction or mutation time.
    #[error("validation error: {0}")]
    Validation(String),

    /// A configuration the operator does not implement, raised at render time.
    #[error("unsupported configuration: {0}")]
    Unsupported(String),

    /// A region query or source update addressed a source that does not exist.
    #[error("source index {index} out of range (node has {len} sources)")]
    SourceIndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of sources on the node.
        len: usize,
    },

    /// Internal invariant failure while evaluating an operator.
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// Graph description parsing failure.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Wrapped lower-level failure (IO, image decoding).
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FilterError {
    /// Build a [`FilterError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`FilterError::Unsupported`].
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Build a [`FilterError::Evaluation`].
    pub fn evaluation(msg: impl Into<String>) -> Self {
        Self::Evaluation(msg.into())
    }

    /// Build a [`FilterError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// Build a [`FilterError::SourceIndexOutOfRange`].
    pub fn out_of_range(index: usize, len: usize) -> Self {
        Self::SourceIndexOutOfRange { index, len }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
