//! Wire format: one JSON document each way, then close.

use serde::de::IgnoredAny;
use serde_json::{json, Map, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader};

use crate::classifier::ClassifierError;
use super::config::ResponseFormat;

/// A request as read off the socket.
#[derive(Debug, PartialEq)]
pub enum Frame {
    /// Payload without its trailing delimiter
    Complete(Vec<u8>),
    /// The client sent more than the configured limit before the delimiter
    TooLarge,
}

/// Reads one request.
///
/// A request ends at the first `\n`, when the client closes its side, or as soon as
/// the buffered bytes hold one whole JSON document (or a definite syntax error), so
/// clients that send a bare payload and wait for the answer are served too.
pub async fn read_request<R: AsyncRead + Unpin>(reader: R, limit: usize) -> std::io::Result<Frame> {
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();

    loop {
        let available = reader.fill_buf().await?;
        if available.is_empty() {
            return Ok(Frame::Complete(buf));
        }

        if let Some(pos) = available.iter().position(|&b| b == b'\n') {
            let fits = buf.len().saturating_add(pos) <= limit;
            if fits {
                buf.extend_from_slice(&available[..pos]);
            }
            reader.consume(pos + 1);
            if !fits {
                return Ok(Frame::TooLarge);
            }
            if buf.last() == Some(&b'\r') {
                buf.pop();
            }
            return Ok(Frame::Complete(buf));
        }

        let len = available.len();
        buf.extend_from_slice(available);
        reader.consume(len);

        if buf.len() > limit {
            discard_line(&mut reader).await?;
            return Ok(Frame::TooLarge);
        }
        if holds_document(&buf) {
            return Ok(Frame::Complete(buf));
        }
    }
}

fn holds_document(buf: &[u8]) -> bool {
    match serde_json::Deserializer::from_slice(buf).into_iter::<IgnoredAny>().next() {
        Some(Ok(_)) => true,
        Some(Err(e)) => !e.is_eof(),
        None => false,
    }
}

// Closing a socket with unread input resets the connection and can drop the response.
async fn discard_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> std::io::Result<()> {
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

/// What happened to a single request.
#[derive(Debug)]
pub enum Outcome {
    Scored(Vec<(String, f32)>),
    TooLarge { limit: usize },
    Failed(ClassifierError),
}

impl Outcome {
    pub fn status(&self) -> &'static str {
        match self {
            Self::Scored(_) => "ok",
            Self::TooLarge { .. } => "too_large",
            Self::Failed(ClassifierError::MalformedJson(_)) => "malformed_json",
            Self::Failed(e) if e.is_request_error() => "invalid_shape",
            Self::Failed(_) => "inference_failed",
        }
    }

    /// Serializes the response body, delimiter included.
    pub fn encode(&self, format: ResponseFormat) -> serde_json::Result<Vec<u8>> {
        let body = match (self, format) {
            (Self::Scored(scores), ResponseFormat::Plain) => Value::Object(scores_map(scores)),
            (_, ResponseFormat::Plain) => Value::Object(Map::new()),
            (Self::Scored(scores), ResponseFormat::Envelope) => json!({
                "status": self.status(),
                "scores": scores_map(scores),
            }),
            (Self::TooLarge { limit }, ResponseFormat::Envelope) => json!({
                "status": self.status(),
                "error": format!("Request exceeds {} bytes", limit),
            }),
            (Self::Failed(e), ResponseFormat::Envelope) => json!({
                "status": self.status(),
                "error": e.to_string(),
            }),
        };

        let mut bytes = serde_json::to_vec(&body)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

fn scores_map(scores: &[(String, f32)]) -> Map<String, Value> {
    scores
        .iter()
        .map(|(key, score)| (key.clone(), Value::from(f64::from(*score))))
        .collect()
}

/// First characters of a payload, for logs.
pub fn preview(bytes: &[u8], max_chars: usize) -> String {
    let text = String::from_utf8_lossy(bytes);
    let mut out: String = text.chars().take(max_chars).collect();
    if text.chars().nth(max_chars).is_some() {
        out.push_str("...");
    }
    out
}
