//! Request framing for the JSON-over-TCP protocol
//!
//! A request is a single JSON value. Bytes are read until the buffer parses
//! as a complete value, the peer half-closes, the size limit is exceeded, or
//! the read deadline passes.

use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const READ_CHUNK: usize = 4096;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("request exceeds {0} bytes")]
    TooLarge(usize),

    #[error("request not received within {0:?}")]
    Timeout(Duration),

    #[error("connection closed before a request arrived")]
    Empty,

    #[error("malformed JSON: {0}")]
    Malformed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FrameError {
    /// Whether the peer should still get an error reply
    pub fn is_answerable(&self) -> bool {
        matches!(self, Self::TooLarge(_) | Self::Timeout(_) | Self::Malformed(_))
    }
}

pub async fn read_request<R>(
    reader: &mut R,
    max_bytes: usize,
    deadline: Duration,
) -> Result<Value, FrameError>
where
    R: AsyncRead + Unpin,
{
    tokio::time::timeout(deadline, read_value(reader, max_bytes))
        .await
        .map_err(|_| FrameError::Timeout(deadline))?
}

async fn read_value<R>(reader: &mut R, max_bytes: usize) -> Result<Value, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut buf = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            if buf.iter().all(u8::is_ascii_whitespace) {
                return Err(FrameError::Empty);
            }
            return serde_json::from_slice(&buf).map_err(|e| FrameError::Malformed(e.to_string()));
        }

        buf.extend_from_slice(&chunk[..n]);
        if buf.len() > max_bytes {
            return Err(FrameError::TooLarge(max_bytes));
        }

        match serde_json::from_slice::<Value>(&buf) {
            Ok(value) => return Ok(value),
            Err(e) if e.is_eof() => continue,
            Err(e) => return Err(FrameError::Malformed(e.to_string())),
        }
    }
}

/// Serialize `reply`, send it and close the write half.
pub async fn write_reply<W, T>(writer: &mut W, reply: &T) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let bytes = serde_json::to_vec(reply)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    writer.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::AsyncWriteExt;

    const LIMIT: usize = 1024;
    const DEADLINE: Duration = Duration::from_secs(2);

    #[tokio::test]
    async fn value_split_across_writes() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let writer = tokio::spawn(async move {
            client.write_all(br#"{"action": "#).await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            client.write_all(br#""get_slots"}"#).await.unwrap();
            client
        });

        let value = read_request(&mut server, LIMIT, DEADLINE).await.unwrap();
        assert_eq!(value, json!({"action": "get_slots"}));
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn value_is_complete_without_half_close() {
        let (mut client, mut server) = tokio::io::duplex(256);
        client.write_all(b"{\"action\":\"get_slots\"}\n").await.unwrap();
        // client stays open; the parse alone completes the frame
        let value = read_request(&mut server, LIMIT, DEADLINE).await.unwrap();
        assert_eq!(value["action"], "get_slots");
    }

    #[tokio::test]
    async fn garbage_is_malformed() {
        let (mut client, mut server) = tokio::io::duplex(256);
        client.write_all(b"book A1 please").await.unwrap();
        let err = read_request(&mut server, LIMIT, DEADLINE).await.unwrap_err();
        assert!(matches!(err, FrameError::Malformed(_)));
        assert!(err.is_answerable());
    }

    #[tokio::test]
    async fn truncated_value_at_close_is_malformed() {
        let (mut client, mut server) = tokio::io::duplex(256);
        client.write_all(br#"{"action": "get_"#).await.unwrap();
        drop(client);
        let err = read_request(&mut server, LIMIT, DEADLINE).await.unwrap_err();
        assert!(matches!(err, FrameError::Malformed(_)));
    }

    #[tokio::test]
    async fn oversized_request_is_rejected() {
        let (mut client, mut server) = tokio::io::duplex(4096);
        let padding = "x".repeat(2 * LIMIT);
        let writer = tokio::spawn(async move {
            let _ = client
                .write_all(format!(r#"{{"user_name": "{}""#, padding).as_bytes())
                .await;
            client
        });
        let err = read_request(&mut server, LIMIT, DEADLINE).await.unwrap_err();
        assert!(matches!(err, FrameError::TooLarge(LIMIT)));
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn silent_peer_times_out() {
        let (_client, mut server) = tokio::io::duplex(64);
        let err = read_request(&mut server, LIMIT, Duration::from_millis(50))
            .await
            .unwrap_err();
        assert!(matches!(err, FrameError::Timeout(_)));
    }

    #[tokio::test]
    async fn empty_connection() {
        let (client, mut server) = tokio::io::duplex(64);
        drop(client);
        let err = read_request(&mut server, LIMIT, DEADLINE).await.unwrap_err();
        assert!(matches!(err, FrameError::Empty));
        assert!(!err.is_answerable());
    }
}
