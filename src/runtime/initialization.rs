//! # Initialization
//!
//! Process setup: rustls crypto provider, tracing, metrics, the HTTP server
//! and the Kubernetes client.

use crate::config::{ControllerConfig, ServerConfig};
use crate::controller::server::{start_server, ServerState};
use crate::observability;
use anyhow::{Context, Result};
use kube::Client;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Everything the watch loop needs
#[derive(Clone)]
pub struct InitializationResult {
    pub client: Client,
    pub controller_config: Arc<ControllerConfig>,
    /// Endpoint written into the generated kubeconfig
    pub api_server_endpoint: String,
    pub server_state: Arc<ServerState>,
}

impl std::fmt::Debug for InitializationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InitializationResult")
            .field("controller_config", &self.controller_config)
            .field("api_server_endpoint", &self.api_server_endpoint)
            .field("server_state", &self.server_state)
            .finish_non_exhaustive()
    }
}

fn init_tracing() {
    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cluster_capi_operator=info".into()),
        )
        .try_init()
    {
        warn!("Tracing subscriber init returned error (may already be initialized): {}", e);
    }
}

/// Initialize the operator runtime
pub async fn initialize(
    controller_config: ControllerConfig,
    server_config: ServerConfig,
) -> Result<InitializationResult> {
    // Must happen before any TLS connection is made
    let provider_installed = rustls::crypto::ring::default_provider()
        .install_default()
        .is_ok();

    init_tracing();
    if !provider_installed {
        warn!("rustls crypto provider was already installed, keeping the existing one");
    }

    info!("Starting Cluster CAPI Operator v{}", env!("CARGO_PKG_VERSION"));
    info!(
        managed_namespace = %controller_config.managed_namespace,
        supported_platforms = ?controller_config.supported_platforms,
        enabled_feature_sets = ?controller_config.enabled_feature_sets,
        release_version = %controller_config.release_version,
        "Controller configuration"
    );

    observability::metrics::register_metrics()?;

    let server_state = Arc::new(ServerState::new());
    let server_state_clone = Arc::clone(&server_state);
    let server_port = server_config.metrics_port;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {:#}", e);
        }
    });
    wait_for_server_ready(&server_state, &server_handle, &server_config).await?;

    let kube_config = kube::Config::infer()
        .await
        .context("Failed to infer Kubernetes client configuration")?;
    let api_server_endpoint = controller_config.api_server_endpoint.clone().unwrap_or_else(|| {
        kube_config
            .cluster_url
            .to_string()
            .trim_end_matches('/')
            .to_string()
    });
    info!(endpoint = %api_server_endpoint, "Using API server endpoint for generated kubeconfig");

    let client = Client::try_from(kube_config).context("Failed to create Kubernetes client")?;

    info!("Controller initialized, starting watch loop...");
    Ok(InitializationResult {
        client,
        controller_config: Arc::new(controller_config),
        api_server_endpoint,
        server_state,
    })
}

/// Wait for the HTTP server to become ready
async fn wait_for_server_ready(
    server_state: &Arc<ServerState>,
    server_handle: &tokio::task::JoinHandle<()>,
    server_config: &ServerConfig,
) -> Result<()> {
    let startup_timeout = Duration::from_secs(server_config.startup_timeout_secs);
    let poll_interval = Duration::from_millis(server_config.poll_interval_ms);
    let start_time = Instant::now();

    loop {
        if server_handle.is_finished() {
            return Err(anyhow::anyhow!("HTTP server failed to start"));
        }

        if server_state.is_ready.load(Ordering::Relaxed) {
            info!("HTTP server is ready and accepting connections");
            return Ok(());
        }

        if start_time.elapsed() > startup_timeout {
            return Err(anyhow::anyhow!(
                "HTTP server failed to become ready within {} seconds",
                startup_timeout.as_secs()
            ));
        }

        tokio::time::sleep(poll_interval).await;
    }
}
