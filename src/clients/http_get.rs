//! HTTP GET client.
//!
//! Sends a fixed request and copies the raw response to stdout until the
//! peer closes the stream or a read fails. No HTTP parsing is done; the
//! response bytes are forwarded untouched.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::{dial, ClientError};
use crate::config::HttpGetConfig;

/// Dial the configured remote and print the response to stdout.
///
/// Returns the number of response bytes received.
pub async fn run(config: &HttpGetConfig) -> Result<u64, ClientError> {
    let stream = dial(&config.remote).await?;
    let mut stdout = tokio::io::stdout();

    let total = fetch(
        stream,
        config.request.as_bytes(),
        config.buffer_size,
        &mut stdout,
    )
    .await?;

    info!(remote = %config.remote, bytes = total, "Response complete");
    Ok(total)
}

/// Write `request` to `stream`, then copy everything read from it to `out`.
///
/// The read loop ends on end-of-stream or on the first read error. Either
/// way the stream is shut down exactly once before returning. A read error
/// is returned after the shutdown.
pub async fn fetch<S, W>(
    mut stream: S,
    request: &[u8],
    buffer_size: usize,
    out: &mut W,
) -> std::io::Result<u64>
where
    S: AsyncRead + AsyncWrite + Unpin,
    W: AsyncWrite + Unpin,
{
    let outcome = exchange(&mut stream, request, buffer_size, out).await;

    if let Err(e) = stream.shutdown().await {
        debug!(error = %e, "Shutdown failed");
    }
    drop(stream);

    outcome
}

async fn exchange<S, W>(
    stream: &mut S,
    request: &[u8],
    buffer_size: usize,
    out: &mut W,
) -> std::io::Result<u64>
where
    S: AsyncRead + AsyncWrite + Unpin,
    W: AsyncWrite + Unpin,
{
    stream.write_all(request).await?;
    debug!(bytes = request.len(), "Request sent");

    let mut buffer = BytesMut::with_capacity(buffer_size);
    let mut total = 0u64;

    loop {
        buffer.clear();
        let n = match stream.read_buf(&mut buffer).await {
            Ok(0) => {
                debug!(total, "Connection closed by server");
                break;
            }
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, total, "Error reading");
                out.flush().await?;
                return Err(e);
            }
        };

        total += n as u64;
        out.write_all(&buffer).await?;
    }

    out.flush().await?;
    Ok(total)
}
