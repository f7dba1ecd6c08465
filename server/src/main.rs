use clap::Parser;
use log::info;
use maze_server::network::{Server, ServerConfig};
use maze_shared::RandomMaze;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to bind to
    #[arg(short = 'H', long, default_value = "0.0.0.0")]
    host: String,

    /// Port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Players required before a session starts
    #[arg(short = 'n', long, default_value = "2", value_parser = clap::value_parser!(u16).range(1..))]
    players: u16,

    /// Session length once the lobby is full, in seconds
    #[arg(short, long, default_value = "30")]
    deadline_secs: u64,

    /// Seconds between fogged map updates
    #[arg(short, long, default_value = "10", value_parser = clap::value_parser!(u64).range(1..))]
    fog_interval_secs: u64,

    /// Score ledger file, cleared at the start of every session
    #[arg(short, long, default_value = "score.txt")]
    ledger: PathBuf,

    /// Let the deadline interrupt a player's pending read
    #[arg(long)]
    interrupt_reads: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    let config = ServerConfig {
        addr: format!("{}:{}", args.host, args.port),
        expected_players: usize::from(args.players),
        deadline: Duration::from_secs(args.deadline_secs),
        fog_interval: Duration::from_secs(args.fog_interval_secs),
        ledger_path: args.ledger,
        interrupt_reads: args.interrupt_reads,
    };

    info!("Starting maze server...");
    info!(
        "{} players per session, {}s deadline, fog every {}s",
        config.expected_players,
        config.deadline.as_secs(),
        config.fog_interval.as_secs()
    );
    if config.interrupt_reads {
        info!("Deadline interrupts pending reads");
    }

    let mut server = Server::new(config, Box::new(RandomMaze::new())).await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
