//! Newline-delimited JSON framing for the worker's stdout channel.

use log::{debug, warn};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader};
use tokio::sync::mpsc::UnboundedSender;

use super::messages::Message;
use crate::error::Result;

/// Maximum accepted line length (16 MB)
pub const MAX_LINE_LENGTH: usize = 16 * 1024 * 1024;

/// Serialize a message as one line, newline included
pub fn encode_line(message: &Message) -> Result<String> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

/// Parse one line (with or without its trailing newline)
pub fn decode_line(line: &str) -> Result<Message> {
    Ok(serde_json::from_str(line.trim_end_matches(['\r', '\n']))?)
}

/// Forward every message read from `reader` into `tx`, in order.
///
/// Undecodable lines are logged and skipped. Returns at end of stream, which
/// drops `tx`; receivers see the channel close.
pub async fn pump_messages<R>(reader: R, tx: UnboundedSender<Message>) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    pump_bounded(reader, tx, MAX_LINE_LENGTH).await
}

async fn pump_bounded<R>(reader: R, tx: UnboundedSender<Message>, max_len: usize) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        buf.clear();
        let n = (&mut reader).take(max_len as u64 + 1).read_until(b'\n', &mut buf).await?;
        if n == 0 {
            break;
        }
        if buf.last() != Some(&b'\n') && buf.len() > max_len {
            warn!("Dropping worker line longer than {} bytes", max_len);
            discard_line(&mut reader).await?;
            continue;
        }

        let line = String::from_utf8_lossy(&buf);
        if line.trim().is_empty() {
            continue;
        }
        match decode_line(&line) {
            Ok(message) => {
                debug!("Received {} message", message.kind());
                if tx.send(message).is_err() {
                    return Ok(());
                }
            }
            Err(e) => warn!("Ignoring malformed worker line ({}): {}", e, line.trim_end()),
        }
    }

    debug!("Worker channel closed");
    Ok(())
}

/// Skip the rest of the current line without buffering it
async fn discard_line<R>(reader: &mut R) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(());
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(pos) => {
                reader.consume(pos + 1);
                return Ok(());
            }
            None => {
                let len = available.len();
                reader.consume(len);
            }
        }
    }
}
