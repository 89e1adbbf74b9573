use clap::{ArgAction, Parser};
use thief::client::{run_client, ClientConfig};
use thief::logger::Logger;
use thief::seat::Seat;
use tokio::net::TcpStream;

#[derive(Parser, Debug)]
#[command(
    name = "thief-client",
    version,
    about = "Thief card-game client",
    long_about = "Connects to a running thief-server and claims one seat, either playing\n\
                  interactively or automatically."
)]
struct Args {
    /// Server hostname or address
    #[arg(short = 'H', long)]
    host: String,

    /// Server port
    #[arg(short, long)]
    port: u16,

    /// Force IPv4
    #[arg(short = '4', long = "ipv4", conflicts_with = "ipv6")]
    ipv4: bool,

    /// Force IPv6
    #[arg(short = '6', long = "ipv6")]
    ipv6: bool,

    /// Claim the North seat
    #[arg(short = 'N', conflicts_with_all = ["east", "south", "west"])]
    north: bool,

    /// Claim the East seat
    #[arg(short = 'E', conflicts_with_all = ["north", "south", "west"])]
    east: bool,

    /// Claim the South seat
    #[arg(short = 'S', conflicts_with_all = ["north", "east", "west"])]
    south: bool,

    /// Claim the West seat
    #[arg(short = 'W', conflicts_with_all = ["north", "east", "south"])]
    west: bool,

    /// Play automatically instead of reading commands from stdin
    #[arg(short, long)]
    auto: bool,

    /// Increase output verbosity (-v verbose, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn seat(&self) -> anyhow::Result<Seat> {
        match (self.north, self.east, self.south, self.west) {
            (true, false, false, false) => Ok(Seat::North),
            (false, true, false, false) => Ok(Seat::East),
            (false, false, true, false) => Ok(Seat::South),
            (false, false, false, true) => Ok(Seat::West),
            _ => anyhow::bail!("exactly one of -N/-E/-S/-W must be given"),
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let log = Logger::new(args.verbose);
    let seat = args.seat()?;

    // Neither -4 nor -6 means "either" — let resolution try every address
    // `ToSocketAddrs` returns, in order, which is exactly what `TcpStream::connect`
    // already does when given a hostname, so the flags only need to filter results
    // when both families are present and one is explicitly excluded.
    let addr = format!("{}:{}", args.host, args.port);
    let stream = connect(&addr, args.ipv4, args.ipv6, &log).await?;

    let config = ClientConfig { seat, auto: args.auto };
    let ok = run_client(stream, config, &log).await?;

    std::process::exit(if ok { 0 } else { 1 });
}

async fn connect(addr: &str, ipv4_only: bool, ipv6_only: bool, log: &Logger) -> anyhow::Result<TcpStream> {
    use std::net::ToSocketAddrs;

    if !ipv4_only && !ipv6_only {
        log.verbose(format!("connecting to {addr}"));
        return Ok(TcpStream::connect(addr).await?);
    }

    let candidates: Vec<_> = addr
        .to_socket_addrs()?
        .filter(|a| if ipv4_only { a.is_ipv4() } else { a.is_ipv6() })
        .collect();
    anyhow::ensure!(!candidates.is_empty(), "no {} addresses resolved for {addr}", if ipv4_only { "IPv4" } else { "IPv6" });

    let mut last_err = None;
    for candidate in candidates {
        log.verbose(format!("connecting to {candidate}"));
        match TcpStream::connect(candidate).await {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }
    Err(last_err.expect("candidates was non-empty").into())
}
