//! Admission review handling against the decision engine.

use std::sync::Arc;

use kube::core::DynamicObject;
use namespace_guard::webhooks::{AdmissionRequest, AdmissionResponse, AdmissionReview, admit};
use namespace_guard::{DecisionEngine, EngineSettings, HealthState, WebhookState};
use serde_json::{Value, json};

use crate::common::{FakeCluster, FakeClusterBuilder, PolicyFile};

fn namespace_delete(name: &str) -> AdmissionRequest<DynamicObject> {
    let review: AdmissionReview<DynamicObject> = serde_json::from_value(json!({
        "apiVersion": "admission.k8s.io/v1",
        "kind": "AdmissionReview",
        "request": {
            "uid": "0df28fbd-5f5f-11e8-bc74-36e6bb280816",
            "kind": {"group": "", "version": "v1", "kind": "Namespace"},
            "resource": {"group": "", "version": "v1", "resource": "namespaces"},
            "name": name,
            "namespace": name,
            "operation": "DELETE",
            "userInfo": {"username": "system:admin", "groups": ["system:masters"]},
            "oldObject": {
                "apiVersion": "v1",
                "kind": "Namespace",
                "metadata": {"name": name}
            },
            "dryRun": false
        }
    }))
    .unwrap();
    review.try_into().unwrap()
}

fn webhook(cluster: FakeCluster, policy: &PolicyFile) -> WebhookState<FakeCluster> {
    let engine = DecisionEngine::new(
        cluster,
        EngineSettings {
            policy_path: policy.path(),
            ..Default::default()
        },
    );
    WebhookState::new(engine, Some(Arc::new(HealthState::new())))
}

fn to_json(response: AdmissionResponse) -> Value {
    serde_json::to_value(response.into_review()).unwrap()
}

#[tokio::test]
async fn test_response_echoes_uid_and_allows() {
    let policy = PolicyFile::new(
        r#"{"whitelists": [{"resource": "ConfigMap", "name": "kube-root-ca.crt"}]}"#,
    );
    let cluster = FakeClusterBuilder::new()
        .kind("v1", "ConfigMap", "configmaps")
        .namespace("team-a")
        .object("team-a", "configmaps", "v1", "ConfigMap", "kube-root-ca.crt")
        .build();
    let state = webhook(cluster, &policy);

    let response = to_json(admit(&state, &namespace_delete("team-a")).await);
    assert_eq!(response["kind"], json!("AdmissionReview"));
    assert_eq!(response["response"]["uid"], json!("0df28fbd-5f5f-11e8-bc74-36e6bb280816"));
    assert_eq!(response["response"]["allowed"], json!(true));
}

#[tokio::test]
async fn test_denial_carries_reason() {
    let policy = PolicyFile::absent();
    let cluster = FakeClusterBuilder::new()
        .kind("apps/v1", "Deployment", "deployments")
        .namespace("team-b")
        .object("team-b", "deployments", "apps/v1", "Deployment", "legacy-job")
        .build();
    let state = webhook(cluster, &policy);

    let response = to_json(admit(&state, &namespace_delete("team-b")).await);
    assert_eq!(response["response"]["allowed"], json!(false));
    let message = response["response"]["status"]["message"].as_str().unwrap();
    assert!(message.contains("apps/v1/Deployment/legacy-job"), "{}", message);
}

#[tokio::test]
async fn test_decisions_recorded_in_metrics() {
    let policy = PolicyFile::absent();
    let cluster = FakeClusterBuilder::new().namespace("team-a").build();
    let state = webhook(cluster, &policy);

    admit(&state, &namespace_delete("team-a")).await;
    admit(&state, &namespace_delete("already-gone")).await;

    let metrics = state.health.as_ref().unwrap().metrics.encode();
    assert!(metrics.contains("cause=\"Clean\""), "{}", metrics);
    assert!(metrics.contains("cause=\"NamespaceAbsent\""), "{}", metrics);
}
