//! Admission webhook server.
//!
//! Serves `POST /validate` for a ValidatingWebhookConfiguration that targets
//! `DELETE` on `namespaces`. When a TLS certificate and key are present the
//! listener uses rustls; otherwise it serves plain HTTP on the same port.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use thiserror::Error;
use tracing::{debug, error, info};

use crate::engine::DecisionEngine;
use crate::health::HealthState;
use crate::inventory::ClusterAccess;

/// Path of the validating endpoint
pub const VALIDATE_PATH: &str = "/validate";

const NAMESPACE_KIND: &str = "Namespace";

/// Shared state for webhook handlers
pub struct WebhookState<C> {
    pub engine: DecisionEngine<C>,
    pub health: Option<Arc<HealthState>>,
}

impl<C: ClusterAccess> WebhookState<C> {
    pub fn new(engine: DecisionEngine<C>, health: Option<Arc<HealthState>>) -> Self {
        Self { engine, health }
    }
}

/// Create the webhook router
pub fn create_webhook_router<C>(state: Arc<WebhookState<C>>) -> Router
where
    C: ClusterAccess + 'static,
{
    Router::new()
        .route(VALIDATE_PATH, post(validate_namespace::<C>))
        .with_state(state)
}

/// Namespace targeted by the request: its namespace, or its name for Namespace objects
fn target_namespace(request: &AdmissionRequest<DynamicObject>) -> Option<&str> {
    request
        .namespace
        .as_deref()
        .filter(|ns| !ns.is_empty())
        .or(Some(request.name.as_str()).filter(|name| !name.is_empty()))
}

/// Evaluate one admission request.
///
/// Only namespace deletions are judged; anything else routed here is allowed.
pub async fn admit<C: ClusterAccess>(
    state: &WebhookState<C>,
    request: &AdmissionRequest<DynamicObject>,
) -> AdmissionResponse {
    let uid = &request.uid;

    if request.operation != Operation::Delete || request.kind.kind != NAMESPACE_KIND {
        debug!(
            uid = %uid,
            operation = ?request.operation,
            kind = %request.kind.kind,
            "Not a namespace deletion, allowing"
        );
        return AdmissionResponse::from(request);
    }

    let Some(namespace) = target_namespace(request) else {
        error!(uid = %uid, "Namespace deletion request names no namespace");
        return AdmissionResponse::from(request)
            .deny("The request does not identify the namespace being deleted");
    };

    let started = Instant::now();
    let verdict = state.engine.decide(namespace).await;
    if let Some(health) = &state.health {
        health
            .metrics
            .record_decision(&verdict, started.elapsed().as_secs_f64());
    }

    if verdict.allowed {
        info!(uid = %uid, namespace = %namespace, "Admission request allowed");
        AdmissionResponse::from(request)
    } else {
        let reason = verdict
            .reason
            .unwrap_or_else(|| format!("Deletion of the namespace {:?} was denied", namespace));
        info!(uid = %uid, namespace = %namespace, "Admission request denied");
        AdmissionResponse::from(request).deny(reason)
    }
}

/// Validate a namespace deletion admission webhook handler
async fn validate_namespace<C: ClusterAccess>(
    State(state): State<Arc<WebhookState<C>>>,
    Json(review): Json<AdmissionReview<DynamicObject>>,
) -> impl IntoResponse {
    let request: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to extract admission request");
            return (
                StatusCode::BAD_REQUEST,
                Json(
                    AdmissionResponse::invalid(format!("Invalid AdmissionReview: {}", e))
                        .into_review(),
                ),
            );
        }
    };

    debug!(
        uid = %request.uid,
        operation = ?request.operation,
        namespace = ?request.namespace,
        name = %request.name,
        "Processing admission request"
    );
    if let Some(health) = &state.health {
        health
            .metrics
            .record_request(&format!("{:?}", request.operation).to_uppercase());
    }

    let response = admit(&state, &request).await;
    (StatusCode::OK, Json(response.into_review()))
}

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum WebhookError {
    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),
    /// Server error
    #[error("Webhook server error: {0}")]
    Server(String),
}

/// Run the webhook server on `0.0.0.0:{port}`.
///
/// Uses TLS when `tls` names a certificate and key (PEM), plain HTTP otherwise.
pub async fn run_webhook_server<C>(
    state: Arc<WebhookState<C>>,
    port: u16,
    tls: Option<(&Path, &Path)>,
) -> Result<(), WebhookError>
where
    C: ClusterAccess + 'static,
{
    use axum_server::tls_rustls::RustlsConfig;

    let app = create_webhook_router(state);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    match tls {
        Some((cert_path, key_path)) => {
            let config = RustlsConfig::from_pem_file(cert_path, key_path)
                .await
                .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

            info!(port = port, "Webhook server listening with TLS");
            axum_server::bind_rustls(addr, config)
                .serve(app.into_make_service())
                .await
                .map_err(|e| WebhookError::Server(e.to_string()))?;
        }
        None => {
            info!(port = port, "Webhook server listening without TLS");
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .map_err(|e| WebhookError::Server(e.to_string()))?;
            axum::serve(listener, app)
                .await
                .map_err(|e| WebhookError::Server(e.to_string()))?;
        }
    }

    Ok(())
}
