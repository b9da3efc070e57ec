//! Resource kind catalog.
//!
//! Turns the cluster's API surface into the list of kinds that can hold
//! objects inside a namespace and can be enumerated with `list`.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::APIResourceList;
use tracing::{debug, error, info};

use super::{ClusterAccess, ResourceKindDescriptor, split_api_version};
use crate::engine::error::{Error, Result};

const LIST_VERB: &str = "list";

/// Discover every namespaced, listable resource kind served by the cluster.
///
/// Any failure to enumerate the API surface is returned as [`Error::Discovery`];
/// a partial catalog is never produced.
pub async fn discover<C: ClusterAccess>(cluster: &C) -> Result<Vec<ResourceKindDescriptor>> {
    let lists = cluster.api_resource_lists().await.map_err(|e| {
        error!(error = %e, "Failed to enumerate API resources");
        match e {
            Error::Discovery(_) => e,
            other => Error::Discovery(other.to_string()),
        }
    })?;

    let catalog = build_catalog(&lists);
    info!(kinds = catalog.len(), "Discovered namespaced resource kinds");
    Ok(catalog)
}

/// Filter raw resource lists down to scannable descriptors, in discovery order.
pub fn build_catalog(lists: &[APIResourceList]) -> Vec<ResourceKindDescriptor> {
    let mut catalog = Vec::new();

    for list in lists {
        if list.resources.is_empty() {
            continue;
        }
        let (group, version) = split_api_version(&list.group_version);

        for resource in &list.resources {
            // Subresources such as pods/log are not listable collections
            if resource.name.contains('/') {
                continue;
            }

            let descriptor = ResourceKindDescriptor {
                group: group.to_string(),
                version: version.to_string(),
                kind: resource.kind.clone(),
                plural: resource.name.clone(),
                namespaced: resource.namespaced,
                supports_list: resource
                    .verbs
                    .iter()
                    .any(|verb| verb.eq_ignore_ascii_case(LIST_VERB)),
            };

            debug!(
                group = %descriptor.group,
                version = %descriptor.version,
                kind = %descriptor.kind,
                namespaced = descriptor.namespaced,
                listable = descriptor.supports_list,
                "Checking API resource"
            );

            if descriptor.namespaced && descriptor.supports_list {
                catalog.push(descriptor);
            }
        }
    }

    catalog
}
