//! Namespace inventory scanner.
//!
//! Lists every catalogued kind inside one namespace at decision time. Kinds
//! are listed concurrently and independently: a failing kind is recorded and
//! the remaining kinds are still enumerated.

use std::collections::BTreeSet;

use futures::StreamExt;
use futures::stream::FuturesUnordered;
use kube::core::DynamicObject;
use tracing::{debug, warn};

use super::{ClusterAccess, ResourceIdentity, ResourceKindDescriptor, split_api_version};
use crate::engine::error::Error;

/// Completed result of one namespace scan.
#[derive(Debug, Default)]
pub struct Inventory {
    /// Objects whose identity could be read
    pub identities: BTreeSet<ResourceIdentity>,
    /// Objects missing name, kind or apiVersion ([`Error::Metadata`])
    pub unreadable: Vec<Error>,
    /// Kinds that could not be listed ([`Error::List`])
    pub failures: Vec<Error>,
}

impl Inventory {
    /// True when every kind was listed and every object was readable
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty() && self.unreadable.is_empty()
    }
}

/// Scan `namespace` for live objects of every namespaced, listable kind in `catalog`.
///
/// At most `concurrency` list calls are in flight at once.
pub async fn scan<C: ClusterAccess>(
    cluster: &C,
    namespace: &str,
    catalog: &[ResourceKindDescriptor],
    concurrency: usize,
) -> Inventory {
    let mut pending = catalog
        .iter()
        .filter(|descriptor| descriptor.namespaced && descriptor.supports_list)
        .collect::<Vec<_>>()
        .into_iter();
    let mut in_flight = FuturesUnordered::new();
    for descriptor in pending.by_ref().take(concurrency.max(1)) {
        in_flight.push(list_one(cluster, descriptor, namespace));
    }

    let mut results = Vec::new();
    while let Some(result) = in_flight.next().await {
        results.push(result);
        if let Some(descriptor) = pending.next() {
            in_flight.push(list_one(cluster, descriptor, namespace));
        }
    }

    let mut inventory = Inventory::default();
    for (descriptor, listed) in results {
        match listed {
            Ok(objects) => {
                debug!(
                    namespace = %namespace,
                    kind = %descriptor,
                    count = objects.len(),
                    "Listed resources"
                );
                for object in &objects {
                    match extract_identity(object, namespace) {
                        Ok(identity) => {
                            inventory.identities.insert(identity);
                        }
                        Err(e) => {
                            warn!(namespace = %namespace, kind = %descriptor, error = %e, "Unreadable object metadata");
                            inventory.unreadable.push(e);
                        }
                    }
                }
            }
            Err(e) => {
                warn!(namespace = %namespace, kind = %descriptor, error = %e, "Failed to list resources");
                let failure = match e {
                    Error::List { .. } => e,
                    other => Error::List {
                        kind: descriptor.to_string(),
                        message: other.to_string(),
                    },
                };
                inventory.failures.push(failure);
            }
        }
    }

    // Completion order of concurrent lists is arbitrary
    inventory.failures.sort_by_key(|e| e.to_string());
    inventory.unreadable.sort_by_key(|e| e.to_string());
    inventory
}

async fn list_one<'a, C: ClusterAccess>(
    cluster: &C,
    descriptor: &'a ResourceKindDescriptor,
    namespace: &str,
) -> (&'a ResourceKindDescriptor, Result<Vec<DynamicObject>, Error>) {
    (descriptor, cluster.list_objects(descriptor, namespace).await)
}

/// Read the identity of a listed object from its own type metadata.
///
/// The group comes from the object's `apiVersion`, not from the catalog entry it
/// was listed under, since aggregated APIs can serve objects of another group.
pub fn extract_identity(object: &DynamicObject, namespace: &str) -> Result<ResourceIdentity, Error> {
    let api_version = object
        .types
        .as_ref()
        .map(|t| t.api_version.as_str())
        .filter(|v| !v.is_empty());
    let kind = object
        .types
        .as_ref()
        .map(|t| t.kind.as_str())
        .filter(|k| !k.is_empty());
    let name = object.metadata.name.as_deref().filter(|n| !n.is_empty());

    match (api_version, kind, name) {
        (Some(api_version), Some(kind), Some(name)) => {
            let (group, version) = split_api_version(api_version);
            Ok(ResourceIdentity {
                group: group.to_string(),
                version: version.to_string(),
                kind: kind.to_string(),
                name: name.to_string(),
                namespace: object
                    .metadata
                    .namespace
                    .clone()
                    .unwrap_or_else(|| namespace.to_string()),
            })
        }
        _ => {
            let mut missing = Vec::new();
            if api_version.is_none() {
                missing.push("apiVersion");
            }
            if kind.is_none() {
                missing.push("kind");
            }
            if name.is_none() {
                missing.push("name");
            }
            Err(Error::Metadata {
                object: format!(
                    "{}/{}/{}",
                    api_version.unwrap_or("?"),
                    kind.unwrap_or("?"),
                    name.unwrap_or("?")
                ),
                message: format!("missing {}", missing.join(", ")),
            })
        }
    }
}
