//! Namespace deletion decision engine.
//!
//! One [`DecisionEngine::decide`] call evaluates one namespace from scratch:
//!
//! 1. Namespace already gone: allow
//! 2. Discover namespaced, listable kinds (failure: deny)
//! 3. Scan the namespace (any unlisted kind or unreadable object: deny)
//! 4. Load the exemption policy for this namespace
//! 5. First object that is neither built-in exempt nor policy exempt: deny
//! 6. Otherwise allow
//!
//! Decisions share no mutable state and never write to the cluster.

pub mod error;

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::exemptions::{BuiltinExemptions, DEFAULT_POLICY_PATH, ExemptionRegistry};
use crate::inventory::{ClusterAccess, Inventory, discover, scan};

/// Default upper bound for one decision
pub const DEFAULT_DECISION_TIMEOUT: Duration = Duration::from_secs(10);
/// Default number of concurrent list calls per scan
pub const DEFAULT_SCAN_CONCURRENCY: usize = 8;

/// Why a verdict came out the way it did
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VerdictCause {
    /// Nothing non-exempt remains
    Clean,
    /// The namespace no longer exists
    NamespaceAbsent,
    /// A non-exempt object remains
    BlockingResource,
    /// At least one kind could not be listed
    UnresolvedKind,
    /// An object's identity could not be read
    UnreadableMetadata,
    /// The API surface could not be enumerated
    DiscoveryFailed,
    /// The namespace lookup itself failed
    ClusterUnavailable,
    /// The decision did not finish in time
    TimedOut,
}

impl fmt::Display for VerdictCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VerdictCause::Clean => "Clean",
            VerdictCause::NamespaceAbsent => "NamespaceAbsent",
            VerdictCause::BlockingResource => "BlockingResource",
            VerdictCause::UnresolvedKind => "UnresolvedKind",
            VerdictCause::UnreadableMetadata => "UnreadableMetadata",
            VerdictCause::DiscoveryFailed => "DiscoveryFailed",
            VerdictCause::ClusterUnavailable => "ClusterUnavailable",
            VerdictCause::TimedOut => "TimedOut",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of one decision
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Verdict {
    pub allowed: bool,
    /// Always set on deny; informational on allow
    pub reason: Option<String>,
    pub cause: VerdictCause,
}

impl Verdict {
    pub fn allow(cause: VerdictCause, reason: Option<String>) -> Self {
        Self {
            allowed: true,
            reason,
            cause,
        }
    }

    pub fn deny(cause: VerdictCause, reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
            cause,
        }
    }
}

/// Tunables for the engine
#[derive(Clone, Debug)]
pub struct EngineSettings {
    /// Exemption document, re-read on every decision
    pub policy_path: PathBuf,
    pub decision_timeout: Duration,
    pub scan_concurrency: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            policy_path: PathBuf::from(DEFAULT_POLICY_PATH),
            decision_timeout: DEFAULT_DECISION_TIMEOUT,
            scan_concurrency: DEFAULT_SCAN_CONCURRENCY,
        }
    }
}

/// Decides whether a namespace may be deleted
pub struct DecisionEngine<C> {
    cluster: C,
    builtins: BuiltinExemptions,
    settings: EngineSettings,
}

impl<C: ClusterAccess> DecisionEngine<C> {
    pub fn new(cluster: C, settings: EngineSettings) -> Self {
        Self {
            cluster,
            builtins: BuiltinExemptions::default(),
            settings,
        }
    }

    pub fn cluster(&self) -> &C {
        &self.cluster
    }

    /// Decide whether `namespace` may be deleted.
    ///
    /// Never fails: every error becomes a denial carrying its reason. A decision
    /// that exceeds the configured timeout is abandoned and denied.
    pub async fn decide(&self, namespace: &str) -> Verdict {
        info!(namespace = %namespace, "Evaluating namespace deletion");
        let verdict =
            match tokio::time::timeout(self.settings.decision_timeout, self.evaluate(namespace))
                .await
            {
                Ok(verdict) => verdict,
                Err(_) => {
                    error!(
                        namespace = %namespace,
                        timeout_secs = self.settings.decision_timeout.as_secs_f64(),
                        "Decision timed out"
                    );
                    Verdict::deny(
                        VerdictCause::TimedOut,
                        format!(
                            "Could not finish checking the namespace {:?} within {:?}; refusing deletion until it can be verified.",
                            namespace, self.settings.decision_timeout
                        ),
                    )
                }
            };

        if verdict.allowed {
            info!(namespace = %namespace, cause = %verdict.cause, "Namespace deletion allowed");
        } else {
            warn!(
                namespace = %namespace,
                cause = %verdict.cause,
                reason = verdict.reason.as_deref().unwrap_or_default(),
                "Namespace deletion denied"
            );
        }
        verdict
    }

    async fn evaluate(&self, namespace: &str) -> Verdict {
        let exists = match self.cluster.namespace_exists(namespace).await {
            Ok(exists) => exists,
            Err(e) if e.is_not_found() => false,
            Err(e) => {
                error!(namespace = %namespace, error = %e, "Failed to look up namespace");
                return Verdict::deny(
                    VerdictCause::ClusterUnavailable,
                    format!(
                        "Failed to confirm the state of the namespace {:?}: {}",
                        namespace, e
                    ),
                );
            }
        };
        if !exists {
            return Verdict::allow(
                VerdictCause::NamespaceAbsent,
                Some(format!("The namespace {:?} is already absent", namespace)),
            );
        }

        let catalog = match discover(&self.cluster).await {
            Ok(catalog) => catalog,
            Err(e) => {
                return Verdict::deny(
                    VerdictCause::DiscoveryFailed,
                    format!(
                        "Failed to discover the resource kinds in the cluster, cannot verify the namespace {:?} is empty: {}",
                        namespace, e
                    ),
                );
            }
        };

        let inventory = scan(
            &self.cluster,
            namespace,
            &catalog,
            self.settings.scan_concurrency,
        )
        .await;
        debug!(
            namespace = %namespace,
            objects = inventory.identities.len(),
            failed_kinds = inventory.failures.len(),
            "Scanned namespace"
        );

        if !inventory.is_complete() {
            return incomplete_scan_verdict(namespace, &inventory);
        }

        let registry = ExemptionRegistry::load(&self.settings.policy_path, namespace).await;
        self.judge(namespace, &inventory, &registry)
    }

    /// Match every scanned object against the exemptions; the first non-exempt one blocks.
    ///
    /// Expects a complete inventory; incomplete scans are denied before this point.
    pub fn judge(
        &self,
        namespace: &str,
        inventory: &Inventory,
        registry: &ExemptionRegistry,
    ) -> Verdict {
        for identity in &inventory.identities {
            if self.builtins.is_exempt(&identity.kind) {
                debug!(resource = %identity, "Resource is exempt (built-in)");
                continue;
            }
            if registry.is_exempt(identity) {
                debug!(resource = %identity, "Resource is exempt (policy)");
                continue;
            }
            return Verdict::deny(
                VerdictCause::BlockingResource,
                format!(
                    "The resource {:?} under the namespace {:?} still exists and is not exempt. Please clean it up or add it to the exemption policy before deleting the namespace.",
                    identity.to_string(),
                    namespace
                ),
            );
        }

        Verdict::allow(VerdictCause::Clean, None)
    }
}

/// Denial for a scan that missed kinds or objects. List failures take precedence.
fn incomplete_scan_verdict(namespace: &str, inventory: &Inventory) -> Verdict {
    if inventory.failures.is_empty() {
        let objects: Vec<String> = inventory.unreadable.iter().map(|e| e.to_string()).collect();
        return Verdict::deny(
            VerdictCause::UnreadableMetadata,
            format!(
                "There is a resource under the namespace {:?} whose metadata could not be parsed: {}",
                namespace,
                objects.join("; ")
            ),
        );
    }

    let kinds: Vec<String> = inventory.failures.iter().map(|e| e.to_string()).collect();
    Verdict::deny(
        VerdictCause::UnresolvedKind,
        format!(
            "Failed to get resources under the namespace {:?}, its contents cannot be verified: {}",
            namespace,
            kinds.join("; ")
        ),
    )
}
