use super::common::load_config;
use camino::Utf8PathBuf;
use clap::Parser;
use core::net::SocketAddr;
use core::time::Duration;
use ohno::IntoAppError;
use share_counts::Result;
use share_counts::counts::Aggregator;
use share_counts::server::{self, CountsService};
use std::sync::Arc;
use tokio::net::TcpListener;

const LOG_TARGET: &str = "     serve";

#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Address to listen on [default: the `listen` configuration value]
    #[arg(long, value_name = "ADDR")]
    pub listen: Option<String>,

    /// Path to configuration file [default: one of share-counts.[toml|yml|yaml|json] ]
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,
}

pub async fn serve(args: &ServeArgs) -> Result<()> {
    let config = load_config(args.config.as_ref())?;

    let listen = args.listen.as_deref().unwrap_or(&config.listen);
    let addr: SocketAddr = listen.parse::<SocketAddr>().into_app_err_with(|| format!("invalid listen address '{listen}'"))?;

    let aggregator = Aggregator::from_config(&config)?;
    aggregator.cache().store().spawn_sweeper(Duration::from_secs(config.sweep_interval));

    let listener = TcpListener::bind(addr).await.into_app_err_with(|| format!("binding to {addr}"))?;
    let service = Arc::new(CountsService::new(aggregator.clone(), config.http_cache_max_age));

    let result = server::serve(listener, service, shutdown_signal()).await;

    aggregator.shutdown();
    result
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!(target: LOG_TARGET, "Could not listen for Ctrl-C, only an external kill will stop the server: {e}");
        futures::future::pending::<()>().await;
    }
}
