//! Error types for the decision engine.
//!
//! Every variant that can occur while evaluating a namespace ends up as a
//! denial with a reason; none of them escape a decision as a fault.

use thiserror::Error;

/// Error type for inventory, policy and decision operations
#[derive(Error, Debug)]
pub enum Error {
    /// Kubernetes API error
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    /// The cluster API surface could not be enumerated
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// Instances of one resource kind could not be listed
    #[error("Failed to list {kind}: {message}")]
    List { kind: String, message: String },

    /// A retrieved object is missing identity fields
    #[error("Unreadable metadata on {object}: {message}")]
    Metadata { object: String, message: String },

    /// The exemption policy document could not be loaded
    #[error("Policy load error: {0}")]
    PolicyLoad(String),
}

impl Error {
    /// Check if this error indicates a not-found condition
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Kube(kube::Error::Api(e)) if e.code == 404)
    }
}

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, Error>;
