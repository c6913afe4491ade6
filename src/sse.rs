//! Server-Sent Events (SSE) line framing.
//!
//! SSE format:
//! ```text
//! data: {"key": "value"}
//!
//! : keep-alive
//!
//! data: [DONE]
//! ```

use bytes::{Bytes, BytesMut};
use futures::stream::{self, Stream, StreamExt};

use crate::client::ClientError;

/// A classified SSE line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frame<'a> {
    /// Event payload, prefix and surrounding whitespace removed.
    Data(&'a str),
    /// The `[DONE]` sentinel.
    Done,
    /// Blank lines, comments and non-data fields.
    Skip,
}

/// Extension trait for `reqwest::Response` to read the body as SSE lines.
///
/// # Example
/// ```ignore
/// use deepseek::sse::SSEResponseExt;
///
/// let response = client.post(url).send().await?;
///
/// let mut lines = response.sse_lines();
/// while let Some(line) = lines.next().await {
///     println!("SSE line: {}", line?);
/// }
/// ```
pub trait SSEResponseExt {
    /// Convert the response body into a stream of raw lines.
    ///
    /// Ends when the body ends; termination on `[DONE]` is up to the caller.
    fn sse_lines(self) -> impl Stream<Item = Result<String, ClientError>> + Send + 'static;
}

impl SSEResponseExt for reqwest::Response {
    fn sse_lines(self) -> impl Stream<Item = Result<String, ClientError>> + Send + 'static {
        lines(self.bytes_stream())
    }
}

/// Split a byte stream into newline-delimited lines.
///
/// Bytes are buffered across chunks, so a line (or a multi-byte character)
/// may straddle chunk boundaries. `\r\n` endings are accepted. A final line
/// without a terminating newline is still returned. The stream ends after
/// the first error.
pub fn lines<S, E>(byte_stream: S) -> impl Stream<Item = Result<String, ClientError>> + Send + 'static
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<ClientError> + Send + 'static,
{
    stream::unfold(
        (Box::pin(byte_stream), BytesMut::new(), false),
        |(mut byte_stream, mut buffer, mut stream_ended)| async move {
            loop {
                if let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                    let line = buffer.split_to(pos + 1);
                    let item = decode_line(&line[..pos]);
                    return Some((item, (byte_stream, buffer, stream_ended)));
                }

                if stream_ended {
                    if buffer.is_empty() {
                        return None;
                    }
                    let line = buffer.split();
                    return Some((decode_line(&line), (byte_stream, buffer, stream_ended)));
                }

                match byte_stream.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        // A broken body leaves nothing worth decoding.
                        buffer.clear();
                        return Some((Err(e.into()), (byte_stream, buffer, true)));
                    }
                    None => stream_ended = true,
                }
            }
        },
    )
}

fn decode_line(raw: &[u8]) -> Result<String, ClientError> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    std::str::from_utf8(raw)
        .map(str::to_owned)
        .map_err(|e| ClientError::InvalidFrame(format!("line is not valid UTF-8: {e}")))
}

/// Classify one line of an SSE body.
///
/// Lines without a `data:` prefix are treated as payload, matching servers
/// that send bare JSON lines.
///
/// # Example
/// ```
/// use deepseek::sse::{parse_frame, Frame};
///
/// assert_eq!(parse_frame("data: {\"id\":\"1\"}"), Frame::Data("{\"id\":\"1\"}"));
/// assert_eq!(parse_frame("data: [DONE]"), Frame::Done);
/// assert_eq!(parse_frame(": keep-alive"), Frame::Skip);
/// assert_eq!(parse_frame("   "), Frame::Skip);
/// ```
pub fn parse_frame(line: &str) -> Frame<'_> {
    let line = line.trim();
    // A field name alone is a field with an empty value.
    if line.is_empty()
        || line.starts_with(':')
        || matches!(line, "data" | "event" | "id" | "retry")
    {
        return Frame::Skip;
    }
    if let Some((field, _)) = line.split_once(':') {
        if matches!(field, "event" | "id" | "retry") {
            return Frame::Skip;
        }
    }

    let data = parse_sse_line(line).unwrap_or(line);
    if data.is_empty() {
        Frame::Skip
    } else if is_done_marker(data) {
        Frame::Done
    } else {
        Frame::Data(data)
    }
}

/// Parse an SSE line to extract the data portion.
///
/// # Example
/// ```
/// use deepseek::sse::parse_sse_line;
///
/// assert_eq!(parse_sse_line("data: {\"key\": \"value\"}"), Some("{\"key\": \"value\"}"));
/// assert_eq!(parse_sse_line("data:[DONE]"), Some("[DONE]"));
/// assert_eq!(parse_sse_line("invalid"), None);
/// ```
pub fn parse_sse_line(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(|s| s.trim())
}

/// Check if an SSE data payload is the end-of-stream sentinel.
///
/// # Example
/// ```
/// use deepseek::sse::is_done_marker;
///
/// assert!(is_done_marker("[DONE]"));
/// assert!(!is_done_marker(""));
/// ```
pub fn is_done_marker(data: &str) -> bool {
    data == "[DONE]"
}
