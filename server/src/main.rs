use clap::Parser;
use log::{info, warn};
use server::network::Server;
use server::registry::Registry;
use std::time::Duration;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Seconds a disconnected identity stays reclaimable
    #[clap(short, long, default_value_t = shared::DEFAULT_GRACE_SECS)]
    grace_secs: u64,
    /// Seconds between liveness probes
    #[clap(long, default_value_t = shared::DEFAULT_PING_SECS)]
    ping_secs: u64,
    /// Countdown epoch in milliseconds, echoed in every snapshot
    #[clap(long, default_value_t = shared::DEFAULT_START_TIME)]
    start_time: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();

    // The admin secret is out-of-band configuration; without it every
    // message is treated as a regular client message.
    let secret = std::env::var("AUTH_TOKEN").ok();
    if secret.is_none() {
        warn!("AUTH_TOKEN is not set; admin commands are disabled");
    }

    let registry = Registry::new(
        shared::theme_vocabulary(),
        secret,
        Duration::from_secs(args.grace_secs),
        args.start_time,
    );

    let address = format!("{}:{}", args.host, args.port);
    let mut server = Server::new(&address, registry, Duration::from_secs(args.ping_secs)).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                eprintln!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    Ok(())
}
