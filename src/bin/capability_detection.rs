//! Connect to a broker and print the capabilities it grants this client.
//!
//! Usage:
//!   capability-detection broker.local:1883 alice@default secret
//!   capability-detection -vv --timeout-ms 2000 10.0.0.7 alice@default secret

use std::time::Duration;

use anyhow::{Context, Result};
use broker_capabilities::options::{DEFAULT_CLIENT_ID, DEFAULT_KEEP_ALIVE_SECS};
use broker_capabilities::{ConnectionParameters, blocking, report};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};
use log::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "capability-detection")]
#[command(about = "Report the optional features a broker grants a client")]
struct Cli {
    /// Broker address, host[:port]. The port defaults to 1883.
    endpoint: String,
    /// Client identity, username@domain.
    identity: String,
    /// Password for the username.
    secret: String,
    /// Client identifier sent in the handshake.
    #[arg(long, env = "CAPABILITY_DETECTION_CLIENT_ID", default_value = DEFAULT_CLIENT_ID)]
    client_id: String,
    /// Keep-alive interval announced to the broker, in seconds.
    #[arg(long, env = "CAPABILITY_DETECTION_KEEP_ALIVE", default_value_t = DEFAULT_KEEP_ALIVE_SECS)]
    keep_alive: u16,
    /// Timeout for connecting and for each handshake read or write.
    #[arg(long, env = "CAPABILITY_DETECTION_TIMEOUT_MS", default_value_t = 10_000,
          value_parser = clap::value_parser!(u64).range(1..))]
    timeout_ms: u64,
    /// Raise log verbosity (-v info, -vv debug, -vvv trace). RUST_LOG wins when set.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .init();
}

fn run(cli: &Cli, params: ConnectionParameters<'_>) -> Result<()> {
    println!("CapabilityDetection initializing...");

    let mut session = blocking::connect(params)
        .with_context(|| format!("connecting to {}:{}", params.host(), params.port()))?;

    println!();
    let walked = report::lines(&session).try_for_each(|line| line.map(|line| println!("{line}")));
    blocking::close(&mut session);
    walked.with_context(|| format!("querying capabilities for {}", cli.identity))?;

    println!("\nCompleted capability detection. Exiting.");
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let params = match ConnectionParameters::parse(&cli.endpoint, &cli.identity, &cli.secret) {
        Ok(params) => params
            .with_client_id(&cli.client_id)
            .with_keep_alive(cli.keep_alive)
            .with_timeout(Duration::from_millis(cli.timeout_ms)),
        Err(err) => Cli::command().error(ErrorKind::ValueValidation, err).exit(),
    };

    if let Err(err) = run(&cli, params) {
        eprintln!("capability-detection: {err:#}");
        std::process::exit(1);
    }
}
