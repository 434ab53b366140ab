//! Error types for the scenekit library.

use thiserror::Error;

/// Main error type for scene graph and marshalling operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Node lookup by name or handle failed
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// A short-name lookup matched more than one node
    #[error("Ambiguous node name: {0}")]
    AmbiguousName(String),

    /// Node type is not registered (or its plugin is not loaded)
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// A plugin requirement could not be satisfied
    #[error("Could not load plugin: {0}")]
    PluginLoadFailed(String),

    /// Attribute not found by name
    #[error("Node '{node}' has no attribute '{attr}'")]
    AttributeNotFound { node: String, attr: String },

    /// Attribute already exists on the node
    #[error("Node '{node}' already has attribute '{attr}'")]
    AttributeExists { node: String, attr: String },

    /// Plug path could not be resolved
    #[error("Plug not found: {0}")]
    PlugNotFound(String),

    /// Compound child index out of bounds
    #[error("Child index {index} out of bounds (count: {count})")]
    ChildOutOfBounds { index: usize, count: usize },

    /// Array element does not exist at the given logical index
    #[error("No element at logical index {index} on plug {plug}")]
    ElementNotFound { plug: String, index: u32 },

    /// Value does not match the attribute's declared type
    #[error("Type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Destination plug already has an incoming connection
    #[error("Plug {destination} has incoming connection from {current}")]
    ConnectionConflict {
        destination: String,
        /// The plug currently feeding the destination.
        current: String,
    },

    /// Attribute was declared non-connectable
    #[error("Plug is not connectable: {0}")]
    NotConnectable(String),

    /// Attribute was declared non-writable
    #[error("Plug is not writable: {0}")]
    NotWritable(String),

    /// Mutation attempted on a locked plug
    #[error("Plug is locked: {0}")]
    PlugLocked(String),

    /// Operation requires a DAG node
    #[error("Not a DAG node: {0}")]
    NotADagNode(String),

    /// Serialized record is structurally invalid
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid record error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidRecord(msg.into())
    }

    /// Create a type mismatch error from anything displayable.
    pub fn mismatch(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Self::TypeMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }
}

/// Result type alias for scenekit operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::NodeNotFound("|root|ctrl".into());
        assert!(e.to_string().contains("|root|ctrl"));

        let e = Error::ChildOutOfBounds { index: 5, count: 3 };
        assert!(e.to_string().contains("5"));
        assert!(e.to_string().contains("3"));

        let e = Error::ConnectionConflict {
            destination: "driven.inp".into(),
            current: "driver.out".into(),
        };
        assert!(e.to_string().contains("driven.inp"));
        assert!(e.to_string().contains("driver.out"));
    }

    #[test]
    fn test_mismatch_helper() {
        let e = Error::mismatch("double3", "string");
        assert!(matches!(e, Error::TypeMismatch { .. }));
        assert!(e.to_string().contains("double3"));
    }
}
