//! Line-based chat client.
//!
//! Reads a display name from stdin, then sends each following line to the
//! server as `<name> says: <line>`. Messages are raw bytes with no delimiter
//! or length prefix, so the receiver sees them run together. Typing `Q`
//! ends the session.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{debug, info};

use super::{dial, ClientError};
use crate::config::ChatConfig;

pub const NAME_PROMPT: &str = "First, what is your name?";
pub const MESSAGE_PROMPT: &str = "What to send to the server? Type Q to quit.";

/// Input line that ends the session (exact match after trimming).
pub const QUIT: &str = "Q";

/// Dial the configured server and run an interactive session on stdin/stdout.
pub async fn run(config: &ChatConfig) -> Result<usize, ClientError> {
    let mut stream = dial(&config.server).await?;
    let mut input = BufReader::new(tokio::io::stdin());
    let mut prompts = tokio::io::stdout();

    let sent = session(&mut input, &mut prompts, &mut stream).await?;
    info!(server = %config.server, messages = sent, "Session finished");
    Ok(sent)
}

/// Run the prompt/read/send loop.
///
/// Returns the number of messages written to `conn`. End of input counts
/// as quitting.
pub async fn session<I, P, C>(
    input: &mut I,
    prompts: &mut P,
    conn: &mut C,
) -> std::io::Result<usize>
where
    I: AsyncBufRead + Unpin,
    P: AsyncWrite + Unpin,
    C: AsyncWrite + Unpin,
{
    let sent = send_lines(input, prompts, conn).await?;
    conn.shutdown().await?;
    Ok(sent)
}

async fn send_lines<I, P, C>(
    input: &mut I,
    prompts: &mut P,
    conn: &mut C,
) -> std::io::Result<usize>
where
    I: AsyncBufRead + Unpin,
    P: AsyncWrite + Unpin,
    C: AsyncWrite + Unpin,
{
    let mut line = String::new();

    prompt(prompts, NAME_PROMPT).await?;
    if input.read_line(&mut line).await? == 0 {
        debug!("Input closed before a name was given");
        return Ok(0);
    }
    let name = trim_line(&line).to_string();
    debug!(name = %name, "Name set");

    let mut sent = 0;
    loop {
        prompt(prompts, MESSAGE_PROMPT).await?;

        line.clear();
        if input.read_line(&mut line).await? == 0 {
            debug!("Input closed");
            break;
        }

        let message = trim_line(&line);
        if message == QUIT {
            break;
        }

        conn.write_all(format_message(&name, message).as_bytes()).await?;
        sent += 1;
    }

    Ok(sent)
}

/// Strip trailing `\r` and `\n` characters, nothing else.
pub fn trim_line(line: &str) -> &str {
    line.trim_end_matches(['\r', '\n'])
}

/// Build the wire message for one line of input.
pub fn format_message(name: &str, message: &str) -> String {
    format!("{name} says: {message}")
}

async fn prompt<P: AsyncWrite + Unpin>(out: &mut P, text: &str) -> std::io::Result<()> {
    out.write_all(text.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn run_session(input: &str) -> (Vec<u8>, String, usize) {
        let mut input = input.as_bytes();
        let mut prompts = Vec::new();
        let mut conn = Vec::new();
        let sent = session(&mut input, &mut prompts, &mut conn).await.unwrap();
        (conn, String::from_utf8(prompts).unwrap(), sent)
    }

    #[tokio::test]
    async fn test_single_message() {
        let (conn, prompts, sent) = run_session("Alice\nhi there\nQ\n").await;
        assert_eq!(conn, b"Alice says: hi there");
        assert_eq!(sent, 1);
        assert_eq!(
            prompts,
            format!("{NAME_PROMPT}\n{MESSAGE_PROMPT}\n{MESSAGE_PROMPT}\n")
        );
    }

    #[tokio::test]
    async fn test_messages_are_not_delimited() {
        let (conn, _, sent) = run_session("Bob\r\none\r\ntwo\r\nQ\r\n").await;
        assert_eq!(conn, b"Bob says: oneBob says: two");
        assert_eq!(sent, 2);
    }

    #[tokio::test]
    async fn test_quit_is_case_sensitive() {
        let (conn, _, sent) = run_session("Carol\nq\n Q\nQ\n").await;
        assert_eq!(conn, b"Carol says: qCarol says:  Q");
        assert_eq!(sent, 2);
    }

    #[tokio::test]
    async fn test_end_of_input_quits() {
        let (conn, _, sent) = run_session("Dave\nlast").await;
        assert_eq!(conn, b"Dave says: last");
        assert_eq!(sent, 1);

        let (conn, prompts, sent) = run_session("").await;
        assert!(conn.is_empty());
        assert_eq!(sent, 0);
        assert_eq!(prompts, format!("{NAME_PROMPT}\n"));
    }

    #[tokio::test]
    async fn test_connection_closed_on_every_exit() {
        use tokio::io::AsyncReadExt;
        use tokio::time::{timeout, Duration};

        for input in ["", "Frank\n", "Frank\nhey\nQ\n"] {
            let (mut conn, mut server) = tokio::io::duplex(1024);
            let mut input = input.as_bytes();
            let mut prompts = Vec::new();

            session(&mut input, &mut prompts, &mut conn).await.unwrap();

            // `conn` is still alive, so the server only sees EOF after a shutdown.
            let mut received = Vec::new();
            timeout(Duration::from_secs(5), server.read_to_end(&mut received))
                .await
                .expect("connection was not shut down")
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_write_error_ends_session() {
        let mut input: &[u8] = b"Erin\nhello\nQ\n";
        let mut prompts = Vec::new();
        let mut conn = tokio_test::io::Builder::new()
            .write_error(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "broken pipe",
            ))
            .build();

        let err = session(&mut input, &mut prompts, &mut conn)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_trim_line() {
        assert_eq!(trim_line("hi there\n"), "hi there");
        assert_eq!(trim_line("hi there\r\n"), "hi there");
        assert_eq!(trim_line("hi\n\r\n"), "hi");
        assert_eq!(trim_line("  spaced  \n"), "  spaced  ");
        assert_eq!(trim_line("\nleading"), "\nleading");
    }

    #[test]
    fn test_trim_line_idempotent() {
        for input in ["Q", "Q\n", "a\r\n", "", "\r\n", "x y\r"] {
            let once = trim_line(input);
            assert_eq!(trim_line(once), once);
        }
    }

    #[test]
    fn test_format_message() {
        assert_eq!(format_message("Alice", "hi there"), "Alice says: hi there");
        assert_eq!(format_message("Alice", ""), "Alice says: ");
    }
}
