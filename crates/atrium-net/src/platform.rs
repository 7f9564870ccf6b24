//! Cross-platform TCP socket configuration.
//!
//! [`SocketConfig`] collects the socket options every room connection gets
//! (TCP_NODELAY, keepalive, SO_REUSEADDR, dual-stack IPv6) so that server
//! and client apply them the same way on Linux, Windows, and macOS.

use std::time::Duration;

use socket2::{SockRef, TcpKeepalive};
use tokio::net::{TcpListener, TcpStream};

/// Socket options applied to every connection.
///
/// The keepalive timings are deliberately short for a desktop game client:
/// sessions in the reconnect grace window expire after a few seconds, so a
/// half-dead link has to be noticed in tens of seconds, not the minutes the
/// OS defaults take.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// Disable Nagle's algorithm for lower latency. Default: true.
    pub tcp_nodelay: bool,
    /// Enable TCP keepalive. Default: true.
    pub keepalive_enabled: bool,
    /// Idle time before the first keepalive probe. Default: 15s.
    pub keepalive_idle: Duration,
    /// Interval between keepalive probes. Default: 5s.
    pub keepalive_interval: Duration,
    /// Probes sent before the connection is declared dead. Default: 3.
    pub keepalive_retries: u32,
    /// Enable `SO_REUSEADDR` on listening sockets. Default: true on
    /// Linux/macOS, false on Windows.
    pub reuse_addr: bool,
}

impl Default for SocketConfig {
    fn default() -> Self {
        Self {
            tcp_nodelay: true,
            keepalive_enabled: true,
            keepalive_idle: Duration::from_secs(15),
            keepalive_interval: Duration::from_secs(5),
            keepalive_retries: 3,
            reuse_addr: !cfg!(target_os = "windows"),
        }
    }
}

/// Apply socket configuration to a connected [`TcpStream`].
pub fn configure_stream(stream: &TcpStream, config: &SocketConfig) -> std::io::Result<()> {
    stream.set_nodelay(config.tcp_nodelay)?;

    if config.keepalive_enabled {
        let sock_ref = SockRef::from(stream);
        let keepalive = TcpKeepalive::new()
            .with_time(config.keepalive_idle)
            .with_interval(config.keepalive_interval);

        // Retries are supported on Linux and Windows but not macOS.
        #[cfg(any(target_os = "linux", target_os = "windows"))]
        let keepalive = keepalive.with_retries(config.keepalive_retries);

        sock_ref.set_tcp_keepalive(&keepalive)?;
    }

    Ok(())
}

/// Create and configure a listening socket.
///
/// Sets `SO_REUSEADDR` per config, enables dual-stack mode when binding to
/// an IPv6 address, and switches to non-blocking before handing the socket
/// to tokio.
pub async fn create_listener(
    addr: std::net::SocketAddr,
    config: &SocketConfig,
) -> std::io::Result<TcpListener> {
    let domain = if addr.is_ipv6() {
        socket2::Domain::IPV6
    } else {
        socket2::Domain::IPV4
    };
    let socket = socket2::Socket::new(domain, socket2::Type::STREAM, Some(socket2::Protocol::TCP))?;

    if config.reuse_addr {
        socket.set_reuse_address(true)?;
    }

    // Accept IPv4-mapped connections on the same socket.
    if addr.is_ipv6() {
        socket.set_only_v6(false)?;
    }

    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(128)?;

    let std_listener: std::net::TcpListener = socket.into();
    TcpListener::from_std(std_listener)
}

/// Preferred bind address: IPv6 unspecified, which dual-stacks to accept
/// IPv4 as well on platforms that allow it.
pub fn default_bind_address(port: u16) -> std::net::SocketAddr {
    std::net::SocketAddr::new(std::net::IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED), port)
}

/// Fallback bind address: IPv4 only.
pub fn ipv4_bind_address(port: u16) -> std::net::SocketAddr {
    std::net::SocketAddr::new(std::net::IpAddr::V4(std::net::Ipv4Addr::UNSPECIFIED), port)
}
