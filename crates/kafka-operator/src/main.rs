use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};

use kafka_operator::config::{self, ConfigSchema};
use kafka_operator::constants::defaults;
use kafka_operator::controllers::cluster_controller;
use kafka_operator::{metrics, telemetry};

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init(defaults::LOG_LEVEL);

    let schema = ConfigSchema::controller();
    let config = match config::resolve(&schema, &config::raw_from_env(&schema)) {
        Ok(config) => Arc::new(config),
        Err(e) => {
            error!(error = %e, "Invalid controller configuration");
            return Err(e).context("refusing to start");
        }
    };

    info!(
        namespace = %config.namespace,
        zookeeper = %config.zookeeper_connect,
        bootstrap = %config.kafka_bootstrap_servers,
        "Starting Kafka operator"
    );

    let client = kube::Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;

    let metrics_addr =
        std::env::var("METRICS_ADDR").unwrap_or_else(|_| defaults::METRICS_ADDR.to_string());
    tokio::spawn(async move {
        if let Err(e) = metrics::serve(metrics_addr).await {
            error!(error = %e, "Metrics server stopped");
        }
    });

    cluster_controller::run(client, config).await?;
    Ok(())
}
