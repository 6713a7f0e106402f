//! TCP client programs.
//!
//! - `http_get`: one GET request, raw response copied to stdout
//! - `chat`: stdin lines sent as `<name> says: <line>`
//!
//! Both are single-connection and stop on the first error.

pub mod chat;
pub mod http_get;

use tokio::net::TcpStream;
use tracing::{debug, info};

/// Open a TCP connection to `addr` (`host:port`).
pub async fn dial(addr: &str) -> Result<TcpStream, ClientError> {
    debug!(remote = %addr, "Dialing");
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|e| ClientError::Dial(addr.to_string(), e))?;

    match stream.peer_addr() {
        Ok(peer) => info!(remote = %addr, peer = %peer, "Connected"),
        Err(_) => info!(remote = %addr, "Connected"),
    }
    Ok(stream)
}

/// Client errors
#[derive(Debug)]
pub enum ClientError {
    Dial(String, std::io::Error),
    Io(std::io::Error),
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::Dial(addr, e) => write!(f, "Error dialing {addr}: {e}"),
            ClientError::Io(e) => write!(f, "Connection error: {e}"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Dial(_, e) | ClientError::Io(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ClientError {
    fn from(e: std::io::Error) -> Self {
        ClientError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_dial_connects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let (stream, accepted) = tokio::join!(dial(&addr), listener.accept());
        let stream = stream.unwrap();
        let (_, peer) = accepted.unwrap();
        assert_eq!(stream.local_addr().unwrap(), peer);
    }

    #[tokio::test]
    async fn test_dial_refused() {
        // Bind then drop to get a port nobody is listening on.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().to_string()
        };

        match dial(&addr).await {
            Err(ClientError::Dial(a, _)) => assert_eq!(a, addr),
            other => panic!("unexpected: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_error_display() {
        let err = ClientError::Dial(
            "localhost:50000".to_string(),
            std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        );
        assert_eq!(err.to_string(), "Error dialing localhost:50000: refused");
    }
}
