//! `Content-Length` framing for JSON-RPC over the server's stdio.
//!
//! Each message is `Content-Length: N\r\n\r\n` followed by `N` bytes of JSON.

use anyhow::{Context, Result, bail};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Upper bound on a single frame body (4 MiB).
const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

const CONTENT_LENGTH: &str = "Content-Length";

pub struct FrameReader<R> {
    reader: BufReader<R>,
    line: String,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader: BufReader::new(reader),
            line: String::new(),
        }
    }

    /// Read the next frame.
    ///
    /// `Ok(None)` means the stream ended cleanly between frames.
    pub async fn read_frame(&mut self) -> Result<Option<serde_json::Value>> {
        let Some(length) = self.read_header_block().await? else {
            return Ok(None);
        };
        if length > MAX_FRAME_BYTES {
            bail!("{CONTENT_LENGTH} {length} exceeds maximum {MAX_FRAME_BYTES}");
        }

        let mut body = vec![0u8; length];
        self.reader
            .read_exact(&mut body)
            .await
            .context("reading frame body")?;
        let value = serde_json::from_slice(&body).context("parsing JSON-RPC frame")?;
        Ok(Some(value))
    }

    /// Consume header lines up to the blank separator and return the body length.
    async fn read_header_block(&mut self) -> Result<Option<usize>> {
        let mut length = None;
        let mut started = false;

        loop {
            self.line.clear();
            let read = self
                .reader
                .read_line(&mut self.line)
                .await
                .context("reading header line")?;
            if read == 0 {
                // EOF is clean only before the first header byte.
                if started {
                    bail!("unexpected EOF while reading headers");
                }
                return Ok(None);
            }
            started = true;

            let header = self.line.trim();
            if header.is_empty() {
                break;
            }
            let Some((name, value)) = header.split_once(':') else {
                continue;
            };
            if name.trim().eq_ignore_ascii_case(CONTENT_LENGTH) {
                let parsed = value
                    .trim()
                    .parse::<usize>()
                    .with_context(|| format!("invalid {CONTENT_LENGTH} value: {value:?}"))?;
                length = Some(parsed);
            }
        }

        match length {
            Some(length) => Ok(Some(length)),
            None => bail!("missing {CONTENT_LENGTH} header"),
        }
    }
}

pub struct FrameWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Serialize `msg` and write it with its header, then flush.
    pub async fn write_frame(&mut self, msg: &serde_json::Value) -> Result<()> {
        let body = serde_json::to_vec(msg).context("serializing JSON-RPC frame")?;
        let mut frame = format!("{CONTENT_LENGTH}: {}\r\n\r\n", body.len()).into_bytes();
        frame.extend_from_slice(&body);

        self.writer
            .write_all(&frame)
            .await
            .context("writing frame")?;
        self.writer.flush().await.context("flushing frame")?;
        Ok(())
    }
}
