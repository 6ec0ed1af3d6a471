//! Minimal client for the classification server.

use log::debug;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::server::ServerError;

/// Sends raw bytes as one request and returns the raw response (delimiter included).
pub async fn send_raw<A: ToSocketAddrs>(addr: A, payload: &[u8]) -> Result<Vec<u8>, ServerError> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.write_all(payload).await?;
    stream.shutdown().await?;

    let mut response = Vec::new();
    stream.read_to_end(&mut response).await?;
    debug!("Received {} response bytes", response.len());
    Ok(response)
}

/// Sends a request object and decodes the JSON response.
pub async fn send_request<A: ToSocketAddrs>(addr: A, request: &Value) -> Result<Value, ServerError> {
    let mut payload = serde_json::to_vec(request)?;
    payload.push(b'\n');
    let response = send_raw(addr, &payload).await?;
    Ok(serde_json::from_slice(&response)?)
}
