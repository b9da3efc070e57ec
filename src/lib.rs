//! namespace-guard library crate
//!
//! Validating admission webhook that refuses to delete a namespace while it
//! still holds resources that are not exempted by policy.
//!
//! - [`inventory`] discovers resource kinds and lists what a namespace holds
//! - [`exemptions`] loads the exemption policy
//! - [`engine`] turns both into an allow/deny [`Verdict`]
//! - [`webhooks`] speaks the AdmissionReview protocol

pub mod config;
pub mod engine;
pub mod exemptions;
pub mod health;
pub mod inventory;
pub mod webhooks;

pub use config::Config;
pub use engine::error::{Error, Result};
pub use engine::{DecisionEngine, EngineSettings, Verdict, VerdictCause};
pub use exemptions::{ExemptionRegistry, ExemptionRule, PolicyDocument};
pub use health::HealthState;
pub use inventory::{ClusterAccess, KubeCluster, ResourceIdentity, ResourceKindDescriptor};
pub use webhooks::{WebhookError, WebhookState, run_webhook_server};
