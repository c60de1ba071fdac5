use super::common::print_warnings;
use camino::Utf8PathBuf;
use clap::Parser;
use share_counts::Result;
use share_counts::config::Config;

#[derive(Parser, Debug)]
pub struct ConvertArgs {
    /// Input configuration file path
    #[arg(value_name = "INPUT")]
    pub input: Utf8PathBuf,

    /// Output configuration file path
    #[arg(value_name = "OUTPUT")]
    pub output: Utf8PathBuf,
}

pub fn convert_config(args: &ConvertArgs) -> Result<()> {
    let base_dir = args.input.parent().unwrap_or(&args.input);

    match Config::load(base_dir, Some(&args.input)) {
        Ok((config, warnings)) => {
            print_warnings(&warnings);
            config.save(&args.output)?;
            println!("Converted {} to {}", args.input, args.output);
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Failed to read configuration: {e}");
            std::process::exit(1);
        }
    }
}
