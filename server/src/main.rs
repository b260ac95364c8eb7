use clap::Parser;
use log::{error, info};
use server::config::{ServerConfig, DEFAULT_MAP_RADIUS, DEFAULT_THEATER_DELAY_MS};
use server::network::Server;

/// King vs Bandit game server
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Pause after each resolved round before the next one starts (ms)
    #[clap(short, long, default_value_t = DEFAULT_THEATER_DELAY_MS)]
    theater_delay_ms: u64,
    /// Radius of the generated hex map, at least 2
    #[clap(short, long, default_value_t = DEFAULT_MAP_RADIUS)]
    map_radius: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = ServerConfig::new(args.theater_delay_ms, args.map_radius);
    let address = format!("{}:{}", args.host, args.port);

    let server = Server::bind(&address, config).await?;
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run().await {
            error!("Server error: {}", e);
        }
    });

    tokio::select! {
        result = server_handle => {
            if let Err(e) = result {
                error!("Server task panicked: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
