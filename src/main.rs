//! # Cluster CAPI Operator
//!
//! Host process: reads configuration from the environment, applies
//! command-line overrides and runs the reconcile loops until interrupted.

use anyhow::Result;
use clap::Parser;
use cluster_capi_operator::config::{load_config, ControllerConfig};
use cluster_capi_operator::runtime::initialization::initialize;
use cluster_capi_operator::runtime::watch_loop::run_watch_loop;

/// Cluster CAPI Operator
#[derive(Debug, Parser)]
#[command(name = "cluster-capi-operator")]
#[command(about = "Converges Cluster API kubeconfig secrets and ClusterOperator status", long_about = None)]
struct Cli {
    /// Port for the metrics and probe server (env: METRICS_PORT)
    #[arg(long)]
    metrics_port: Option<u16>,

    /// Namespace for the generated kubeconfig (env: MANAGED_NAMESPACE)
    #[arg(long)]
    managed_namespace: Option<String>,

    /// Comma separated platform types to manage kubeconfigs on (env: SUPPORTED_PLATFORMS)
    #[arg(long, value_delimiter = ',')]
    supported_platforms: Option<Vec<String>>,

    /// API server endpoint written into the kubeconfig (env: API_SERVER_ENDPOINT)
    #[arg(long)]
    api_server_endpoint: Option<String>,
}

impl Cli {
    fn apply(self, controller: &mut ControllerConfig, metrics_port: &mut u16) {
        if let Some(port) = self.metrics_port {
            *metrics_port = port;
        }
        if let Some(namespace) = self.managed_namespace {
            controller.managed_namespace = namespace;
        }
        if let Some(platforms) = self.supported_platforms {
            controller.supported_platforms = ControllerConfig::normalize_platforms(platforms);
        }
        if let Some(endpoint) = self.api_server_endpoint {
            controller.api_server_endpoint = Some(endpoint);
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (mut controller_config, mut server_config) = load_config();
    cli.apply(&mut controller_config, &mut server_config.metrics_port);

    let init_result = initialize(controller_config, server_config).await?;
    run_watch_loop(init_result).await
}
