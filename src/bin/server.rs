use std::time::Duration;

use anyhow::Context;
use clap::{ArgAction, Parser};
use thief::deal::load_deal_file;
use thief::logger::Logger;
use thief::server::run_server;
use thief::timing::NoPlayTimeout;
use tokio::net::TcpListener;

#[derive(Parser, Debug)]
#[command(
    name = "thief-server",
    version,
    about = "Thief card-game server",
    long_about = "Runs a deterministic four-seat Thief match, driven by a scripted deal file."
)]
struct Args {
    /// TCP port to bind. 0 (the default) lets the OS choose an ephemeral port.
    #[arg(short, long, default_value_t = 0)]
    port: u16,

    /// Deal file describing every round of the match.
    #[arg(short = 'f', long = "deal-file")]
    deal_file: String,

    /// No-play timeout in seconds before a prompt is re-issued.
    #[arg(short, long, default_value_t = 5)]
    timeout: u64,

    /// Increase output verbosity (-v verbose, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let log = Logger::new(args.verbose);

    let deal = load_deal_file(&args.deal_file).with_context(|| format!("loading deal file {}", args.deal_file))?;
    log.info(format!("loaded {} round(s) from {}", deal.rounds.len(), args.deal_file));

    let bind_addr = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&bind_addr).await.with_context(|| format!("binding to {bind_addr}"))?;
    let local_addr = listener.local_addr().context("reading bound local address")?;
    log.info(format!("listening on {local_addr}"));

    let timeout = NoPlayTimeout(Duration::from_secs(args.timeout));
    run_server(listener, deal, timeout, &log).await?;

    log.info("match complete");
    Ok(())
}
