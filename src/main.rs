//! Share counts of URLs on social networks, served from a coalescing cache.
//!
//! # Quick Start
//!
//! Ask once from the command line:
//!
//! ```bash
//! share-counts query --url https://example.com/ --networks facebook,twitter
//! ```
//!
//! Or run the HTTP server and ask it:
//!
//! ```bash
//! share-counts serve --listen 127.0.0.1:5000
//! curl 'http://127.0.0.1:5000/?networks=facebook,twitter&url=https://example.com/'
//! # {"facebook":1234,"twitter":-1}
//! ```
//!
//! A count of `-1` means the network could not be queried. Failures are remembered for a
//! shorter period than successes, after which the network is asked again.
//!
//! # HTTP Interface
//!
//! - `GET /?networks=<list>&url=<url>` answers with a JSON object keyed by network, in order.
//! - Without `url` the `Referer` header is used.
//! - `callback=<name>` wraps the answer as JSONP.
//! - Invalid input is answered with `422` and `{"error": "..."}`; anything other than `GET /`
//!   with `403`.
//!
//! # Configuration
//!
//! ```bash
//! share-counts init share-counts.yml
//! share-counts validate --config share-counts.yml
//! share-counts convert share-counts.yml share-counts.toml
//! ```
//!
//! **Default search locations:**
//! - `share-counts.toml`
//! - `share-counts.yml`
//! - `share-counts.yaml`
//! - `share-counts.json`
//!
//! All durations are in seconds:
//!
//! ```yaml
//! good_result_ttl: 240     # successful counts
//! bad_result_ttl: 60       # failed lookups
//! pending_result_ttl: 10   # joining a fetch in flight
//! request_timeout: 10
//! sweep_interval: 60       # 0 disables eviction of expired entries
//! ```

use clap::builder::Styles;
use clap::builder::styling::{AnsiColor, Effects};
use clap::{Parser, Subcommand};
use share_counts::Result;

mod commands;

use crate::commands::{
    ConvertArgs, InitArgs, LogLevel, QueryArgs, ServeArgs, ValidateArgs, convert_config, init_config, init_logging, query_counts,
    serve, validate_config,
};

const CLAP_STYLES: Styles = Styles::styled()
    .header(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .usage(AnsiColor::Green.on_default().effects(Effects::BOLD))
    .literal(AnsiColor::Cyan.on_default().effects(Effects::BOLD))
    .placeholder(AnsiColor::Cyan.on_default());

#[derive(Parser, Debug)]
#[command(name = "share-counts", version, about)]
#[command(styles = CLAP_STYLES)]
struct Cli {
    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Retrieve the share counts of a URL once and print them
    Query(QueryArgs),
    /// Serve share counts over HTTP
    Serve(ServeArgs),
    /// Generate a default configuration file
    Init(InitArgs),
    /// Validate a configuration file
    Validate(ValidateArgs),
    /// Convert a configuration file between formats
    Convert(ConvertArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level);

    match &cli.command {
        Command::Query(query_args) => query_counts(query_args).await,
        Command::Serve(serve_args) => serve(serve_args).await,
        Command::Init(init_args) => init_config(init_args),
        Command::Validate(validate_args) => validate_config(validate_args),
        Command::Convert(convert_args) => convert_config(convert_args),
    }
}
