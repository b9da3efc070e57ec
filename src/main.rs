//! namespace-guard - admission webhook guarding namespace deletion.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Loads configuration from the environment
//! - Creates the Kubernetes client
//! - Starts the health server and the webhook server

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::{error, info, warn};

use namespace_guard::health::{HealthState, run_health_server};
use namespace_guard::{Config, DecisionEngine, KubeCluster, WebhookState, run_webhook_server};

/// Grace period for in-flight admission requests to complete during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("namespace_guard=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .json()
        .init();

    info!("Starting namespace-guard");

    let config = Config::from_env()?;
    info!(
        policy_path = %config.policy_path.display(),
        webhook_port = config.webhook_port,
        health_port = config.health_port,
        decision_timeout_secs = config.decision_timeout.as_secs(),
        scan_concurrency = config.scan_concurrency,
        "Loaded configuration"
    );

    // Without cluster access no decision can be made
    let cluster = KubeCluster::try_default().await?;
    info!("Connected to Kubernetes cluster");

    // Both aws-lc-rs and ring may be linked; pick one explicitly
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        warn!("A rustls crypto provider was already installed");
    }

    let health_state = Arc::new(HealthState::new());

    // Start health server immediately so liveness probes succeed during startup
    let health_handle = {
        let health_state = health_state.clone();
        let port = config.health_port;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, port).await {
                error!("Health server error: {}", e);
            }
        })
    };

    let engine = DecisionEngine::new(cluster, config.engine_settings());
    let webhook_state = Arc::new(WebhookState::new(engine, Some(health_state.clone())));

    let webhook_handle = {
        let tls_available = config.tls_available();
        if !tls_available {
            warn!(
                cert = %config.tls_cert_path.display(),
                key = %config.tls_key_path.display(),
                "TLS certificates not found, serving plain HTTP"
            );
        }
        let config = config.clone();
        tokio::spawn(async move {
            let tls = tls_available
                .then(|| (config.tls_cert_path.as_path(), config.tls_key_path.as_path()));
            if let Err(e) = run_webhook_server(webhook_state, config.webhook_port, tls).await {
                error!("Webhook server error: {}", e);
            }
        })
    };

    health_state.set_ready(true).await;

    // Wait for any task to complete (or fail), or shutdown signal
    tokio::select! {
        result = webhook_handle => {
            if let Err(e) = result {
                error!("Webhook server task panicked: {}", e);
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        // Handle graceful shutdown on SIGTERM or SIGINT
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            // Mark as not ready to stop receiving new admission requests
            health_state.set_ready(false).await;
            info!("Marked webhook as not ready");

            info!(
                "Waiting {}s for in-flight admission requests to complete...",
                SHUTDOWN_GRACE_PERIOD_SECS
            );
            tokio::time::sleep(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)).await;

            info!("Grace period complete, shutting down");
        }
    }

    info!("namespace-guard stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Note: Signal handler setup failures are fatal - the webhook cannot shut down
/// gracefully without them. Using expect() here is intentional.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
