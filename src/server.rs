//! TCP server that logs whatever its clients send.
//!
//! Each accepted connection gets its own task. The task reads into a
//! fixed-size buffer and hands every chunk to a [`DataSink`] until the peer
//! closes or a read fails. Nothing is ever written back to the client, and
//! chunks are not framed: two messages may arrive in one read, and one long
//! message may be split across several.

use crate::config::EchoServerConfig;
use std::io::{self, Write};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

/// Receives the data read by connection tasks.
///
/// Called concurrently from every connection task.
pub trait DataSink: Send + Sync + 'static {
    /// The accept loop is about to start.
    fn started(&self, _addr: SocketAddr) {}

    /// One read's worth of bytes from `peer`.
    fn received(&self, peer: SocketAddr, data: &[u8]);

    /// The connection task for `peer` ended. `error` is `None` when the
    /// peer closed the stream.
    fn closed(&self, _peer: SocketAddr, _error: Option<&io::Error>) {}
}

/// Line printed when the server starts.
pub const STARTING: &str = "Starting the server ...";

/// Prints server events on stdout.
pub struct StdoutSink;

impl StdoutSink {
    fn print(&self, line: &str) {
        let mut out = io::stdout().lock();
        if let Err(e) = writeln!(out, "{line}").and_then(|_| out.flush()) {
            warn!(error = %e, "Failed to write to stdout");
        }
    }
}

impl DataSink for StdoutSink {
    fn started(&self, _addr: SocketAddr) {
        self.print(STARTING);
    }

    fn received(&self, _peer: SocketAddr, data: &[u8]) {
        self.print(&format_received(data));
    }

    fn closed(&self, _peer: SocketAddr, error: Option<&io::Error>) {
        self.print(&format_closed(error));
    }
}

/// Render one chunk the way the server prints it.
pub fn format_received(data: &[u8]) -> String {
    format!("Received data: {}", String::from_utf8_lossy(data))
}

/// Render the end of a connection; end-of-stream shows as `EOF`.
pub fn format_closed(error: Option<&io::Error>) -> String {
    match error {
        Some(e) => format!("Error reading {e}"),
        None => "Error reading EOF".to_string(),
    }
}

/// Server instance
pub struct Server {
    listener: TcpListener,
    read_buffer_size: usize,
    sink: Arc<dyn DataSink>,
}

impl Server {
    /// Resolve the listen address and bind to it.
    pub async fn bind(
        config: &EchoServerConfig,
        sink: Arc<dyn DataSink>,
    ) -> Result<Self, ServerError> {
        let addrs: Vec<SocketAddr> = tokio::net::lookup_host(&config.listen)
            .await
            .map_err(|e| ServerError::Resolve(config.listen.clone(), e))?
            .collect();
        let addr = pick_listen_addr(&addrs).ok_or_else(|| {
            ServerError::Resolve(
                config.listen.clone(),
                io::Error::new(io::ErrorKind::NotFound, "no addresses found"),
            )
        })?;

        let listener = create_listener(addr, config.backlog)
            .and_then(TcpListener::from_std)
            .map_err(|e| ServerError::Listen(addr, e))?;

        Ok(Server {
            listener,
            read_buffer_size: config.read_buffer_size,
            sink,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until accepting fails.
    ///
    /// Connection tasks are independent; one of them failing never stops
    /// the others or this loop.
    pub async fn run(self) -> Result<(), ServerError> {
        let addr = self.local_addr().map_err(ServerError::Accept)?;
        info!(address = %addr, "Server listening");
        self.sink.started(addr);

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!(error = %e, "Error accepting");
                    return Err(ServerError::Accept(e));
                }
            };
            debug!(peer = %peer, "New connection");

            let sink = Arc::clone(&self.sink);
            let buffer_size = self.read_buffer_size;
            tokio::spawn(async move {
                serve_connection(stream, peer, sink, buffer_size).await;
            });
        }
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    sink: Arc<dyn DataSink>,
    buffer_size: usize,
) {
    match handle_connection(stream, peer, sink.as_ref(), buffer_size).await {
        Ok(()) => {
            debug!(peer = %peer, "Connection closed by client");
            sink.closed(peer, None);
        }
        Err(e) => {
            warn!(peer = %peer, error = %e, "Error reading");
            sink.closed(peer, Some(&e));
        }
    }
}

/// Read from a single client until it closes or a read fails.
///
/// The buffer is reused for every read; each read takes at most
/// `buffer_size` bytes. Returns `Ok(())` on end-of-stream.
pub async fn handle_connection<S>(
    mut stream: S,
    peer: SocketAddr,
    sink: &dyn DataSink,
    buffer_size: usize,
) -> io::Result<()>
where
    S: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; buffer_size];

    loop {
        let n = stream.read(&mut buffer).await?;
        if n == 0 {
            return Ok(());
        }

        debug!(peer = %peer, bytes = n, "Read");
        sink.received(peer, &buffer[..n]);
    }
}

/// Prefer an IPv4 address, so `localhost` binds 127.0.0.1 even where it
/// resolves to `::1` first.
fn pick_listen_addr(addrs: &[SocketAddr]) -> Option<SocketAddr> {
    addrs
        .iter()
        .copied()
        .find(SocketAddr::is_ipv4)
        .or_else(|| addrs.first().copied())
}

fn create_listener(addr: SocketAddr, backlog: i32) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    Ok(socket.into())
}

/// Server errors
#[derive(Debug)]
pub enum ServerError {
    Resolve(String, io::Error),
    Listen(SocketAddr, io::Error),
    Accept(io::Error),
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Resolve(addr, e) => write!(f, "Error resolving {addr}: {e}"),
            ServerError::Listen(addr, e) => write!(f, "Error listening on {addr}: {e}"),
            ServerError::Accept(e) => write!(f, "Error accepting: {e}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Resolve(_, e) | ServerError::Listen(_, e) | ServerError::Accept(e) => {
                Some(e)
            }
        }
    }
}
