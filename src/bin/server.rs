//! blockcheck-server: HTTP service answering blocklist membership queries.

use blockcheck::config::{Config, DEFAULT_SOURCE};
use blockcheck::server::{self, AppState};
use blockcheck::RefreshScheduler;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "blockcheck-server")]
#[command(author = "Kaitu.io")]
#[command(version)]
#[command(about = "Serve IP blocklist membership checks over HTTP", long_about = None)]
struct Cli {
    /// Address to listen on, e.g. 127.0.0.1:8080
    #[arg(env = "BLOCKCHECK_LISTEN")]
    listen: SocketAddr,

    /// Directory for the downloaded dataset and its state
    #[arg(env = "BLOCKCHECK_DATA_DIR")]
    data_dir: PathBuf,

    /// Dataset URL or local path
    #[arg(long, env = "BLOCKCHECK_SOURCE", default_value = DEFAULT_SOURCE)]
    source: String,

    /// Download timeout in seconds
    #[arg(long, env = "BLOCKCHECK_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// Seconds to wait between failed startup downloads
    #[arg(long, env = "BLOCKCHECK_RETRY_INTERVAL", default_value_t = 30)]
    retry_interval: u64,

    /// Seconds between dataset refreshes
    #[arg(long, env = "BLOCKCHECK_REFRESH_INTERVAL", default_value_t = 900)]
    refresh_interval: u64,

    /// Serve the last downloaded dataset immediately at startup
    #[arg(long, env = "BLOCKCHECK_WARM_START")]
    warm_start: bool,
}

impl Cli {
    fn into_config(self) -> Config {
        Config::new(self.listen, self.data_dir)
            .with_source(self.source)
            .with_download_timeout(Duration::from_secs(self.timeout))
            .with_retry_interval(Duration::from_secs(self.retry_interval))
            .with_refresh_interval(Duration::from_secs(self.refresh_interval))
            .with_warm_start(self.warm_start)
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Cli::parse().into_config();

    if let Err(e) = run(config) {
        log::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(&config.data_dir)?;
    let listen = config.listen;

    let scheduler = Arc::new(RefreshScheduler::from_config(config)?);
    scheduler.bootstrap()?;
    let refresh = Arc::clone(&scheduler).spawn()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let state = Arc::new(AppState::from_scheduler(Arc::clone(&scheduler)));
    let served = runtime.block_on(async move {
        let listener = tokio::net::TcpListener::bind(listen).await?;
        server::serve(listener, state, shutdown_signal()).await
    });

    log::info!("Shutting down");
    refresh.shutdown();
    served?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
