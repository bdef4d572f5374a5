mod signal;
mod telemetry;

use anyhow::Context;
use nats_http_connector::config;
use nats_http_connector::env::SystemEnv;
use nats_http_connector::nats;
use nats_http_connector::{Bridge, RequestForwarder};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init_logger(&SystemEnv);

    let result = run().await;
    if let Err(ref e) = result {
        let message = format!("{e:#}");
        error!(error = %message, "Connector stopped with error");
    }
    result
}

async fn run() -> anyhow::Result<()> {
    let config = config::from_env_with_provider(&SystemEnv).context("invalid configuration")?;
    let connector = config.connector();

    info!(
        topic = connector.topic(),
        response_topic = connector.response_topic_raw(),
        error_topic = connector.error_topic(),
        endpoint = %connector.http_endpoint(),
        source_name = connector.source_name(),
        "NATS connector starting"
    );

    let http_client = reqwest::Client::builder()
        .build()
        .context("failed to build HTTP client")?;
    let forwarder = RequestForwarder::new(http_client, connector, config.http())?;

    let nats_client = nats::connect(config.nats(), config.nats_connect_timeout()).await?;

    let subscription = Bridge::new(
        nats_client,
        connector,
        forwarder,
        config.bridge().clone(),
    )
    .subscribe()
    .await?;

    info!("NATS consumer up and running");

    let mut stopped_by = None;
    let summary = subscription
        .run(async {
            stopped_by = Some(signal::wait_for_stop().await);
        })
        .await;

    match stopped_by {
        Some(signal) => info!(
            %signal,
            received = summary.received,
            aborted = summary.aborted,
            "NATS connector stopped"
        ),
        None => warn!(
            received = summary.received,
            aborted = summary.aborted,
            "NATS connector stopped after the subscription closed"
        ),
    }
    Ok(())
}
