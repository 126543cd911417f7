//! TCP server for the secret protocol.
//!
//! The accept loop runs on a single task and hands every connection to
//! its own spawned task, so a client that never sends its password only
//! ever stalls itself. The configuration is shared read-only through an
//! `Arc`.

use crate::config::Config;
use crate::line::{read_line, Line};
use crate::protocol::{response, verify, Verdict, BANNER, PROMPT};
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// Server instance
pub struct Server {
    config: Arc<Config>,
    listener: TcpListener,
    connection_limit: Arc<Semaphore>,
}

impl Server {
    /// Bind the listening socket. Must be called from within a tokio runtime.
    pub fn bind(config: Config) -> Result<Self, ServerError> {
        let listener = create_listener(config.listen, config.backlog)
            .and_then(TcpListener::from_std)
            .map_err(|e| ServerError::Bind(config.listen, e))?;

        Ok(Server {
            connection_limit: Arc::new(Semaphore::new(config.max_connections)),
            config: Arc::new(config),
            listener,
        })
    }

    /// Address the server is actually bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever.
    pub async fn run(self) -> Result<(), ServerError> {
        loop {
            // Wait for a connection slot
            let permit = Arc::clone(&self.connection_limit)
                .acquire_owned()
                .await
                .map_err(|_| ServerError::LimitClosed)?;

            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    debug!(%peer, "New connection");

                    let config = Arc::clone(&self.config);

                    tokio::spawn(
                        async move {
                            if let Err(e) = handle_connection(stream, &config).await {
                                warn!(error = %e, "Connection error");
                            }
                            drop(permit);
                        }
                        .instrument(info_span!("conn", %peer)),
                    );
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }
}

/// Serve a single client: greet, prompt, read one line, answer, close.
///
/// Write failures end this connection only. Read failures and timeouts
/// count as an empty password line.
pub async fn handle_connection<S>(stream: S, config: &Config) -> Result<Verdict, ConnectionError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream = BufReader::new(stream);

    stream.write_all(BANNER).await.map_err(ConnectionError::Write)?;
    stream.write_all(PROMPT).await.map_err(ConnectionError::Write)?;
    stream.flush().await.map_err(ConnectionError::Write)?;

    let line = read_password(&mut stream, config).await;

    let verdict = verify(line.as_bytes(), &config.password);
    match verdict {
        Verdict::Granted => info!("Client entered correct password"),
        Verdict::Denied => info!("Client entered incorrect password"),
    }

    stream
        .write_all(&response(verdict, &config.secret))
        .await
        .map_err(ConnectionError::Write)?;

    // Dropping the stream closes both directions either way
    if let Err(e) = stream.shutdown().await {
        debug!(error = %e, "Shutdown failed");
    }

    Ok(verdict)
}

async fn read_password<R>(reader: &mut R, config: &Config) -> Line
where
    R: AsyncBufRead + Unpin,
{
    let read = read_line(reader, config.max_line_length);

    let result = match config.read_timeout {
        Some(limit) => match tokio::time::timeout(limit, read).await {
            Ok(result) => result,
            Err(_) => {
                warn!(timeout_secs = limit.as_secs(), "Timed out waiting for password");
                return Line::empty();
            }
        },
        None => read.await,
    };

    match result {
        Ok(line) => {
            if line.is_truncated() {
                warn!(
                    max_line_length = config.max_line_length,
                    "Password line too long, truncated"
                );
            }
            line
        }
        Err(e) => {
            debug!(error = %e, "Failed to read password");
            Line::empty()
        }
    }
}

/// Create a non-blocking listener with SO_REUSEADDR set.
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

/// Startup and accept loop errors
#[derive(Debug)]
pub enum ServerError {
    Bind(SocketAddr, io::Error),
    LimitClosed,
}

impl std::fmt::Display for ServerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerError::Bind(addr, e) => write!(f, "could not bind listening socket on {addr}: {e}"),
            ServerError::LimitClosed => write!(f, "connection limiter closed"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Bind(_, e) => Some(e),
            ServerError::LimitClosed => None,
        }
    }
}

/// Errors that end a single connection
#[derive(Debug)]
pub enum ConnectionError {
    Write(io::Error),
}

impl std::fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionError::Write(e) => write!(f, "write failed: {e}"),
        }
    }
}

impl std::error::Error for ConnectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConnectionError::Write(e) => Some(e),
        }
    }
}
