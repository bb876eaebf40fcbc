//! hello-local: run the hello plugin against an in-memory host.
//!
//! Useful for trying the plugin without a WASM runtime: the input, host
//! config and repeated invocations are all driven from the command line.
//!
//! # Usage
//!
//! ```bash
//! hello-local --input Ada --config greeting=Howdy --runs 3
//! ```

use anyhow::{bail, Result};
use clap::Parser;
use env_logger::Env;
use guest_pdk::mock::MockHost;
use guest_pdk::{run_plugin, Host, EXIT_SUCCESS};
use log::{debug, error, info, warn};

/// Run the hello plugin against an in-memory host.
#[derive(Parser, Debug)]
#[command(name = "hello-local")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input handed to the plugin (plain text or JSON)
    #[arg(short, long, default_value = "")]
    input: String,

    /// Host config entry, repeatable
    #[arg(short, long = "config", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    config: Vec<(String, String)>,

    /// Number of invocations against the same host
    #[arg(short = 'n', long, default_value = "1")]
    runs: u32,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_key_value(raw: &str) -> std::result::Result<(String, String), String> {
    raw.split_once('=')
        .map(|(key, value)| (key.trim().to_string(), value.to_string()))
        .filter(|(key, _)| !key.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_millis()
        .init();

    let mock = MockHost::with_input(args.input.as_bytes());
    for (key, value) in &args.config {
        debug!("config {} = {}", key, value);
        mock.set_config(key.as_str(), value.as_str());
    }
    let host = Host::new(&mock);

    let mut forwarded = 0;
    for run in 1..=args.runs {
        let code = run_plugin(&host, hello_plugin::greet);

        let logs = mock.logs();
        for (level, message) in &logs[forwarded..] {
            log::log!(target: "plugin", *level, "{}", message);
        }
        forwarded = logs.len();

        if code != EXIT_SUCCESS {
            error!("Run {} exited with code {}", run, code);
            bail!("plugin failed: {}", mock.error().unwrap_or_default());
        }
        info!("Run {} succeeded", run);
    }

    for violation in mock.violations() {
        warn!("Memory protocol violation: {:?}", violation);
    }

    if let Some(output) = mock.output_string() {
        println!("{}", output);
    }
    Ok(())
}
