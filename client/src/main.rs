use clap::Parser;
use client::network::Client;
use log::info;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// WebSocket URL of the bingo server
    #[arg(short, long, default_value = "ws://127.0.0.1:8080")]
    url: String,

    /// File the identity token is saved to between runs
    #[arg(short, long, default_value = ".bingo-identity")]
    identity_file: PathBuf,

    /// Start fresh instead of reclaiming a saved identity
    #[arg(long)]
    fresh: bool,

    /// Admin secret; switches the client into admin mode
    #[arg(short, long)]
    auth: Option<String>,

    /// Theme item to toggle (admin mode; omit to list valid toggles)
    #[arg(short, long)]
    toggle: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();

    info!("Connecting to: {}", args.url);

    let identity_file = if args.fresh {
        None
    } else {
        Some(args.identity_file)
    };

    let mut client = Client::new(&args.url, identity_file, args.auth, args.toggle);
    client.run().await?;

    Ok(())
}
