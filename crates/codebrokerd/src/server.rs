//! Request server - TCP listener speaking line-delimited JSON.

use crate::broker::Broker;
use crate::normalizer;
use anyhow::{Context, Result};
use codebroker_common::ConnectionNotice;
use serde::Serialize;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// One inbound frame
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    Line(String),
    /// Line longer than the limit; its bytes were discarded
    TooLarge(usize),
    Eof,
}

/// Live connection count, decremented when the guard drops
struct ActiveConnection {
    counter: Arc<AtomicUsize>,
}

impl ActiveConnection {
    fn open(counter: &Arc<AtomicUsize>) -> (Self, usize) {
        let active = counter.fetch_add(1, Ordering::SeqCst) + 1;
        (
            Self {
                counter: Arc::clone(counter),
            },
            active,
        )
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Accept connections until the listener fails
pub async fn serve(listener: TcpListener, broker: Arc<Broker>, max_message_bytes: usize) -> Result<()> {
    let active = Arc::new(AtomicUsize::new(0));
    let addr = listener.local_addr().context("Failed to read listener address")?;
    info!("Request server listening on {}", addr);

    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                let broker = Arc::clone(&broker);
                let (guard, count) = ActiveConnection::open(&active);
                let id = Uuid::new_v4();
                info!("Client {} connected from {} ({} active)", id, peer, count);

                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, broker, max_message_bytes).await {
                        error!("Connection {} error: {}", id, e);
                    }
                    drop(guard);
                    info!("Client {} disconnected", id);
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}

/// Serve a single client until it disconnects
async fn handle_connection(stream: TcpStream, broker: Arc<Broker>, limit: usize) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    write_json(&mut writer, &ConnectionNotice::connected()).await?;

    loop {
        let frame = read_frame(&mut reader, limit)
            .await
            .context("Failed to read from socket")?;

        let envelope = match frame {
            Frame::Eof => break,
            Frame::Line(line) if line.trim().is_empty() => continue,
            Frame::Line(line) => Broker::handle_line(&broker, &line).await,
            Frame::TooLarge(size) => {
                warn!("Rejected {} byte message (limit {})", size, limit);
                normalizer::too_large(size, limit)
            }
        };

        write_json(&mut writer, &envelope).await?;
    }

    Ok(())
}

async fn write_json<W, T>(writer: &mut W, value: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let json = serde_json::to_string(value)? + "\n";
    writer
        .write_all(json.as_bytes())
        .await
        .context("Failed to write response")?;
    Ok(())
}

/// Read one newline-terminated frame of at most `limit` bytes.
///
/// Never buffers more than `limit + 1` bytes; the remainder of an oversized
/// line is consumed and dropped so the next frame starts cleanly.
pub async fn read_frame<R>(reader: &mut R, limit: usize) -> io::Result<Frame>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let read = (&mut *reader)
        .take((limit as u64).saturating_add(1))
        .read_until(b'\n', &mut buf)
        .await?;

    if read == 0 {
        return Ok(Frame::Eof);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
        return Ok(Frame::Line(String::from_utf8_lossy(&buf).into_owned()));
    }

    if buf.len() <= limit {
        // Final line without a terminator
        return Ok(Frame::Line(String::from_utf8_lossy(&buf).into_owned()));
    }

    let mut size = buf.len();
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            break;
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(i) => {
                size += i;
                reader.consume(i + 1);
                break;
            }
            None => {
                let len = available.len();
                size += len;
                reader.consume(len);
            }
        }
    }
    debug!("Discarded oversized frame of {} bytes", size);
    Ok(Frame::TooLarge(size))
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn frames(input: &[u8], limit: usize) -> Vec<Frame> {
        let mut reader = BufReader::with_capacity(4, input);
        let mut out = Vec::new();
        loop {
            let frame = read_frame(&mut reader, limit).await.unwrap();
            let done = frame == Frame::Eof;
            out.push(frame);
            if done {
                return out;
            }
        }
    }

    #[tokio::test]
    async fn test_read_frame_lines() {
        let out = frames(b"{\"a\":1}\r\nsecond\nlast", 64).await;
        assert_eq!(
            out,
            vec![
                Frame::Line("{\"a\":1}".to_string()),
                Frame::Line("second".to_string()),
                Frame::Line("last".to_string()),
                Frame::Eof,
            ]
        );
    }

    #[tokio::test]
    async fn test_read_frame_oversized_then_recovers() {
        let mut input = vec![b'x'; 40];
        input.extend_from_slice(b"\nok\n");
        let out = frames(&input, 10).await;
        assert_eq!(
            out,
            vec![
                Frame::TooLarge(40),
                Frame::Line("ok".to_string()),
                Frame::Eof
            ]
        );
    }

    #[tokio::test]
    async fn test_read_frame_exact_limit_is_accepted() {
        let out = frames(b"0123456789\n", 10).await;
        assert_eq!(out[0], Frame::Line("0123456789".to_string()));
    }

    #[tokio::test]
    async fn test_read_frame_unbounded_limit() {
        let out = frames(b"abc\n", usize::MAX).await;
        assert_eq!(out, vec![Frame::Line("abc".to_string()), Frame::Eof]);
    }

    #[test]
    fn test_active_connection_guard() {
        let counter = Arc::new(AtomicUsize::new(0));
        let (a, n) = ActiveConnection::open(&counter);
        assert_eq!(n, 1);
        let (b, n) = ActiveConnection::open(&counter);
        assert_eq!(n, 2);
        drop(a);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        drop(b);
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
