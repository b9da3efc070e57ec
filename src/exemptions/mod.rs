//! Exemption registry.
//!
//! Loads the operator-supplied exemption document and answers whether a
//! discovered object may remain when its namespace is deleted.
//!
//! Document format (JSON):
//!
//! ```json
//! { "whitelists": [
//!     { "group": "apps", "version": "v1", "resource": "Deployment", "name": "web" },
//!     { "resource": "ConfigMap", "name": "kube-root-ca.crt" }
//! ] }
//! ```
//!
//! Matching rules:
//! - every field is compared case-insensitively
//! - no `namespace` means the namespace being evaluated
//! - no `group` means the core API group
//! - no `version` or no `name` matches any version or name

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::engine::error::{Error, Result};
use crate::inventory::ResourceIdentity;

/// Default location of the exemption document
pub const DEFAULT_POLICY_PATH: &str = "/etc/admission-webhook/whitelist/whitelist.json";

/// Kinds that never block a namespace deletion, lower-cased
pub const BUILTIN_EXEMPT_KINDS: &[&str] = &["event"];

/// One exemption rule as written in the policy document
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExemptionRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(rename = "resource", alias = "kind")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// The exemption policy document
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
    #[serde(default, rename = "whitelists", alias = "exemptions")]
    pub rules: Vec<ExemptionRule>,
}

impl PolicyDocument {
    /// Parse a policy document from JSON bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::PolicyLoad(e.to_string()))
    }

    /// Read and parse a policy document from disk
    pub async fn read(path: &Path) -> Result<Self> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Error::PolicyLoad(format!("{}: {}", path.display(), e)))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| Error::PolicyLoad(format!("{}: {}", path.display(), e)))
    }
}

/// Built-in exemptions, matched by kind only
#[derive(Clone, Debug)]
pub struct BuiltinExemptions {
    kinds: HashSet<String>,
}

impl Default for BuiltinExemptions {
    fn default() -> Self {
        Self {
            kinds: BUILTIN_EXEMPT_KINDS.iter().map(|k| k.to_string()).collect(),
        }
    }
}

impl BuiltinExemptions {
    pub fn is_exempt(&self, kind: &str) -> bool {
        self.kinds.contains(&kind.to_lowercase())
    }
}

/// Normalized lookup key; `None` in `version` or `name` is a wildcard.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
struct ExemptionKey {
    namespace: String,
    group: String,
    version: Option<String>,
    kind: String,
    name: Option<String>,
}

impl ExemptionKey {
    fn new(
        namespace: &str,
        group: &str,
        version: Option<&str>,
        kind: &str,
        name: Option<&str>,
    ) -> Self {
        Self {
            namespace: namespace.to_lowercase(),
            group: group.to_lowercase(),
            version: version.map(str::to_lowercase),
            kind: kind.to_lowercase(),
            name: name.map(str::to_lowercase),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Exemptions from the policy document, scoped to one evaluated namespace
#[derive(Clone, Debug, Default)]
pub struct ExemptionRegistry {
    keys: HashSet<ExemptionKey>,
}

impl ExemptionRegistry {
    /// An empty registry: nothing is exempt by policy
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a registry from parsed rules, defaulting rule namespaces to `namespace`.
    pub fn from_rules(rules: &[ExemptionRule], namespace: &str) -> Self {
        let mut keys = HashSet::new();
        for rule in rules {
            let kind = rule.kind.trim();
            if kind.is_empty() {
                warn!(rule = ?rule, "Ignoring exemption rule without a kind");
                continue;
            }
            let key = ExemptionKey::new(
                non_empty(&rule.namespace).unwrap_or(namespace),
                non_empty(&rule.group).unwrap_or(""),
                non_empty(&rule.version),
                kind,
                non_empty(&rule.name),
            );
            debug!(
                namespace = %key.namespace,
                group = %key.group,
                version = ?key.version,
                kind = %key.kind,
                name = ?key.name,
                "Adding exemption"
            );
            keys.insert(key);
        }
        Self { keys }
    }

    /// Load the document at `path` for an evaluation of `namespace`.
    ///
    /// A missing or malformed document is logged and yields an empty registry.
    pub async fn load(path: &Path, namespace: &str) -> Self {
        match PolicyDocument::read(path).await {
            Ok(document) => {
                let registry = Self::from_rules(&document.rules, namespace);
                info!(
                    path = %path.display(),
                    rules = document.rules.len(),
                    "Loaded exemption policy"
                );
                registry
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Exemption policy unavailable, nothing is exempt by policy");
                Self::empty()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Whether a rule exempts this object
    pub fn is_exempt(&self, identity: &ResourceIdentity) -> bool {
        let versions = [Some(identity.version.as_str()), None];
        let names = [Some(identity.name.as_str()), None];
        versions.iter().any(|version| {
            names.iter().any(|name| {
                self.keys.contains(&ExemptionKey::new(
                    &identity.namespace,
                    &identity.group,
                    *version,
                    &identity.kind,
                    *name,
                ))
            })
        })
    }
}
