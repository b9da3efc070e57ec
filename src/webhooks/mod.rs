//! Admission webhook for namespace deletion.
//!
//! Terminates the AdmissionReview protocol and hands the target namespace to
//! the [`DecisionEngine`](crate::engine::DecisionEngine).

mod server;

pub use server::{
    VALIDATE_PATH, WebhookError, WebhookState, admit, create_webhook_router, run_webhook_server,
};

// Re-export kube-rs admission types for contract testing
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
