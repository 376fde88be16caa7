//! Command-line entry point for the queuemock server.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use log::{error, info};

use queuemock::server::DEFAULT_PORT;
use queuemock::{HttpServer, MockGateway, ResponseQueueStore, ServerConfig};

#[derive(Debug, Clone, Parser)]
#[command(name = "queuemock")]
#[command(about = "HTTP mock server that replays scripted responses per session")]
struct Cli {
    /// Port to listen on
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,
    /// Address to listen on
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    host: IpAddr,
    /// Connections served at once; extra ones get a 503
    #[arg(long, default_value_t = 1024)]
    max_connections: usize,
    /// Largest accepted request in bytes, head and body together
    #[arg(long, default_value_t = 1024 * 1024)]
    max_request_size: usize,
}

impl Cli {
    fn server_config(&self) -> ServerConfig {
        ServerConfig {
            addr: SocketAddr::new(self.host, self.port),
            max_connections: self.max_connections,
            max_request_size: self.max_request_size,
            ..ServerConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let server = HttpServer::new(cli.server_config());
    let gateway = MockGateway::new(Arc::new(ResponseQueueStore::new()));
    gateway.register(&server).await;

    info!("Starting server on port {}", cli.port);
    match server.start().await {
        Ok(()) => {
            info!("{} sessions were used", gateway.store().session_count());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}
