use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::DispatcherError;
use crate::wire::WireRequest;

/// Framing configuration.
#[derive(Debug, Clone, Copy)]
pub struct FramingConfig {
    pub max_message_size: usize,
    pub buffer_size: usize,
    pub backpressure_threshold_ratio: f64,
}

impl Default for FramingConfig {
    fn default() -> Self {
        FramingConfig {
            max_message_size: 512 * 1024,
            buffer_size: 2 * 1024 * 1024,
            backpressure_threshold_ratio: 0.90,
        }
    }
}

/// Reads newline-delimited JSON-RPC messages off an `AsyncRead` into a
/// bounded, single-producer/single-consumer byte buffer. One frame is
/// exactly one JSON object followed by `\n`; frames larger than
/// `max_message_size` are rejected rather than silently truncated.
pub struct FrameReader<R> {
    inner: R,
    buf: Vec<u8>,
    config: FramingConfig,
}

/// The result of attempting to pull the next frame: a parsed request, a
/// signal that the peer closed the stream cleanly, or that the buffer has
/// crossed the backpressure threshold and the caller should pause reading
/// until the consumer drains it.
pub enum FrameEvent {
    Message(WireRequest),
    Eof,
    Backpressure,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R, config: FramingConfig) -> Self {
        FrameReader {
            inner,
            buf: Vec::new(),
            config,
        }
    }

    fn occupancy_ratio(&self) -> f64 {
        self.buf.len() as f64 / self.config.buffer_size as f64
    }

    /// Pulls the next complete frame from the buffer, reading more bytes
    /// from the underlying stream as needed. A line whose *bytes before the
    /// newline* exceed `max_message_size` is a parse error: exactly
    /// `max_message_size` bytes succeeds, one byte larger is rejected.
    pub async fn next_frame(&mut self) -> Result<FrameEvent, DispatcherError> {
        loop {
            // A fully buffered frame is always worth returning, even over
            // the backpressure threshold: parsing it is what shrinks the
            // buffer back down.
            if let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = self.buf.drain(..=pos).collect();
                let line = &line[..line.len() - 1]; // strip trailing \n
                if line.is_empty() {
                    continue;
                }
                if line.len() > self.config.max_message_size {
                    return Err(DispatcherError::Parse(format!(
                        "message of {} bytes exceeds max_message_size {}",
                        line.len(),
                        self.config.max_message_size
                    )));
                }
                let request: WireRequest = serde_json::from_slice(line)
                    .map_err(|e| DispatcherError::Parse(e.to_string()))?;
                return Ok(FrameEvent::Message(request));
            }

            if self.occupancy_ratio() >= self.config.backpressure_threshold_ratio {
                return Ok(FrameEvent::Backpressure);
            }

            let mut chunk = [0u8; 8192];
            let n = self
                .inner
                .read(&mut chunk)
                .await
                .map_err(|e| DispatcherError::Internal(e.to_string()))?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Ok(FrameEvent::Eof);
                }
                return Err(DispatcherError::Parse(
                    "stream closed mid-message".to_string(),
                ));
            }
            self.buf.extend_from_slice(&chunk[..n]);
            if self.buf.len() > self.config.buffer_size {
                return Err(DispatcherError::Internal(
                    "inbound buffer exceeded configured capacity".to_string(),
                ));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn reader(data: &str, config: FramingConfig) -> FrameReader<Cursor<Vec<u8>>> {
        FrameReader::new(Cursor::new(data.as_bytes().to_vec()), config)
    }

    #[tokio::test]
    async fn parses_one_frame_per_line() {
        let data = "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"ledger/getAgent\",\"params\":{}}\n";
        let mut r = reader(data, FramingConfig::default());
        match r.next_frame().await.unwrap() {
            FrameEvent::Message(req) => assert_eq!(req.method, "ledger/getAgent"),
            _ => panic!("expected a message"),
        }
    }

    #[tokio::test]
    async fn reports_eof_on_empty_stream() {
        let mut r = reader("", FramingConfig::default());
        assert!(matches!(r.next_frame().await.unwrap(), FrameEvent::Eof));
    }

    #[tokio::test]
    async fn rejects_oversized_message() {
        let config = FramingConfig {
            max_message_size: 10,
            ..FramingConfig::default()
        };
        let data = "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"x\",\"params\":{}}\n";
        let mut r = reader(data, config);
        assert!(r.next_frame().await.is_err());
    }

    #[tokio::test]
    async fn accepts_message_at_exactly_max_size() {
        let method = "m";
        let data = format!("{{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"{method}\",\"params\":{{}}}}\n");
        let line_len = data.len() - 1; // exclude trailing newline
        let config = FramingConfig {
            max_message_size: line_len,
            ..FramingConfig::default()
        };
        let mut r = reader(&data, config);
        assert!(matches!(r.next_frame().await.unwrap(), FrameEvent::Message(_)));
    }

    #[tokio::test]
    async fn signals_backpressure_when_buffer_nearly_full() {
        let config = FramingConfig {
            max_message_size: 100,
            buffer_size: 100,
            backpressure_threshold_ratio: 0.5,
        };
        // 60 bytes of un-terminated data, no newline yet: occupancy 0.6 > 0.5
        let data = "x".repeat(60);
        let mut r = reader(&data, config);
        assert!(matches!(r.next_frame().await.unwrap(), FrameEvent::Backpressure));
    }

    #[tokio::test]
    async fn a_complete_frame_is_returned_even_over_the_backpressure_ratio() {
        let config = FramingConfig {
            max_message_size: 200,
            buffer_size: 100,
            backpressure_threshold_ratio: 0.1,
        };
        let data = "{\"jsonrpc\":\"2.0\",\"id\":1,\"method\":\"x\",\"params\":{}}\n";
        let mut r = reader(data, config);
        assert!(matches!(r.next_frame().await.unwrap(), FrameEvent::Message(_)));
    }
}
