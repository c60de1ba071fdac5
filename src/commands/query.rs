use super::common::load_config;
use camino::Utf8PathBuf;
use clap::Parser;
use ohno::IntoAppError;
use share_counts::Result;
use share_counts::counts::{Aggregator, parse_networks};

#[derive(Parser, Debug)]
pub struct QueryArgs {
    /// URL whose share counts to retrieve
    #[arg(long, value_name = "URL")]
    pub url: String,

    /// Comma-separated list of networks, e.g. facebook,twitter,googleplus
    #[arg(long, value_name = "NETWORKS")]
    pub networks: String,

    /// Path to configuration file [default: one of share-counts.[toml|yml|yaml|json] ]
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,
}

pub async fn query_counts(args: &QueryArgs) -> Result<()> {
    let config = load_config(args.config.as_ref())?;
    let aggregator = Aggregator::from_config(&config)?;

    let networks = parse_networks(&args.networks);
    let counts = aggregator
        .retrieve_counts(&args.url, &networks)
        .await
        .into_app_err_with(|| format!("retrieving share counts for '{}'", args.url))?;

    aggregator.shutdown();

    let json = serde_json::to_string_pretty(&counts).into_app_err("serializing share counts")?;
    println!("{json}");
    Ok(())
}
