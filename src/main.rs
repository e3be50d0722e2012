//! webhook-relay binary entry point.
//!
//! Usage: webhook-relay [--queue-name <name>] [--region <r>] [--profile <p>] serve|worker

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use webhook_relay::config::{Command, RelayArgs};
use webhook_relay::{
    http_server, telemetry, DeliveryClient, QueueGateway, ServerState, SqsGateway,
    SubscriberDirectory, Worker,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = RelayArgs::parse();
    telemetry::init(&args.log_level, args.log_format);

    info!(queue = %args.queue_name, region = %args.region, "webhook-relay starting...");

    let gateway: Arc<dyn QueueGateway> =
        Arc::new(SqsGateway::connect(&args.region, args.profile.as_deref()).await);

    // Nothing works without the queue, so fail before serving anything.
    let queue = match gateway.resolve(&args.queue_name).await {
        Ok(handle) => handle,
        Err(e) => {
            error!(queue = %args.queue_name, error = %e, "Failed to resolve queue");
            return Err(e).context(format!("resolving queue {}", args.queue_name));
        }
    };
    info!(queue_url = %queue, "Queue resolved");

    match args.command {
        Command::Serve(serve) => {
            let addr = serve.listen_addr();
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding {addr}"))?;
            let state = ServerState::new(gateway, queue);
            http_server::run(listener, state, shutdown_signal()).await?;
        }
        Command::Worker(worker_args) => {
            let directory = SubscriberDirectory::load(&worker_args.subscribers)?;
            let client = DeliveryClient::new(&worker_args.delivery_config())?;
            let worker = Worker::new(
                gateway,
                queue,
                Arc::new(directory),
                client,
                worker_args.worker_config(),
            );

            tokio::select! {
                _ = worker.run() => {}
                _ = shutdown_signal() => {}
            }
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Received shutdown signal, exiting...");
}
