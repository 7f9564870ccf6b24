//! Atrium room server.
//!
//! One process hosts one room. The transport accepts connections and
//! forwards decoded frames to the room task; the room task owns the
//! authoritative state and answers through the connection map.
//!
//! Run with: `cargo run -p atrium-server -- --listen 0.0.0.0 --port 2567`

mod room;

use std::net::SocketAddr;
use std::sync::Arc;

use atrium_config::{CliArgs, Config};
use atrium_net::{ServerConfig, ServerTransport};
use clap::Parser;
use tracing::{error, info};

use crate::room::RoomTask;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = CliArgs::parse();
    let config = load_config(&args);
    atrium_log::init_logging(&config.log);

    let bind_addr: SocketAddr = format!(
        "{}:{}",
        config.network.server_address, config.network.server_port
    )
    .parse()
    .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let transport_config = ServerConfig {
        bind_addr,
        max_connections: config.network.max_connections as usize,
        ..ServerConfig::default()
    };
    let (transport, events) = ServerTransport::new(transport_config);
    let transport = Arc::new(transport);

    let room = RoomTask::new(Arc::clone(transport.connections()));
    let room_handle = tokio::spawn(room.run(events));

    let acceptor = Arc::clone(&transport);
    let mut accept_handle = tokio::spawn(async move { acceptor.run().await });

    info!(
        addr = %bind_addr,
        max_connections = config.network.max_connections,
        "room server up"
    );

    tokio::select! {
        result = &mut accept_handle => {
            // The accept loop only ends on its own for bind/accept errors.
            transport.shutdown();
            drop(transport);
            let _ = room_handle.await;
            return match result {
                Ok(Ok(())) => Ok(()),
                Ok(Err(error)) => Err(error),
                Err(join_error) => Err(std::io::Error::other(join_error)),
            };
        }
        _ = shutdown_signal() => {}
    }

    transport.shutdown();
    if let Ok(Err(error)) = accept_handle.await {
        error!(%error, "transport ended with error");
    }
    // Dropping the last transport handle closes the event stream, which
    // lets the room task drain out and stop.
    drop(transport);
    let _ = room_handle.await;
    info!("room server stopped");
    Ok(())
}

/// Load the config file, falling back to defaults when it cannot be
/// read, then apply CLI overrides. Failures print to stderr because
/// logging is not up yet.
fn load_config(args: &CliArgs) -> Config {
    let mut config = match args.resolve_config_dir() {
        Ok(dir) => Config::load_or_create(&dir).unwrap_or_else(|error| {
            eprintln!("failed to load config: {error}, using defaults");
            Config::default()
        }),
        Err(error) => {
            eprintln!("{error}, using defaults");
            Config::default()
        }
    };
    config.apply_cli_overrides(args);
    config
}

/// Resolves when the process is asked to stop (interrupt or terminate).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            error!(%error, "failed to install interrupt handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                error!(%error, "failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("interrupt received, shutting down"),
        _ = terminate => info!("terminate received, shutting down"),
    }
}
