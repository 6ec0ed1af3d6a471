use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use super::protocol::{preview, read_request, Frame, Outcome};
use super::{ClassifierState, ServerError};

const PREVIEW_CHARS: usize = 40;

/// Serves one connection: read a request, classify it, write the response, close.
///
/// Request-level problems (bad JSON, bad shape, oversized payload, inference failure)
/// are answered like any other request; only transport errors surface as `Err`.
pub async fn handle_connection<S>(mut stream: S, peer: SocketAddr, state: Arc<ClassifierState>) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let limit = state.config().max_request_bytes;
    let frame = read_request(&mut stream, limit).await?;
    let started = Instant::now();

    let outcome = match frame {
        Frame::Complete(payload) => {
            info!("Received {} bytes from {}: {}", payload.len(), peer, preview(&payload, PREVIEW_CHARS));
            state.process(&payload).await
        }
        Frame::TooLarge => Outcome::TooLarge { limit },
    };

    match &outcome {
        Outcome::Scored(scores) => debug!("Scored {} entries for {}", scores.len(), peer),
        Outcome::TooLarge { limit } => warn!("Request from {} exceeds {} bytes", peer, limit),
        Outcome::Failed(e) => warn!("Request from {} failed: {}", peer, e),
    }

    let body = outcome.encode(state.config().response_format)?;
    info!("Sending response ({}): {}", outcome.status(), preview(&body, PREVIEW_CHARS).trim_end());
    stream.write_all(&body).await?;
    stream.shutdown().await?;

    info!("Handled {} in {:.2?}", peer, started.elapsed());
    Ok(())
}
