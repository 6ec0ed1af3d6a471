use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Port the server listens on when none is given.
pub const DEFAULT_PORT: u16 = 9999;

/// Largest accepted request, in bytes, before the newline delimiter.
pub const DEFAULT_MAX_REQUEST_BYTES: usize = 64 * 1024;

/// Shape of the JSON written back to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ResponseFormat {
    /// `{"id": score, ...}` on success and `{}` on any failure
    #[default]
    Plain,
    /// `{"status": ..., "scores": {...}}` or `{"status": ..., "error": ...}`
    Envelope,
}

/// How callers share the inference engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InferencePolicy {
    /// One inference at a time across all connections
    #[default]
    Serialized,
    /// Inference calls may overlap
    Concurrent,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: IpAddr,
    pub port: u16,
    pub max_request_bytes: usize,
    pub response_format: ResponseFormat,
    pub inference_policy: InferencePolicy,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            max_request_bytes: DEFAULT_MAX_REQUEST_BYTES,
            response_format: ResponseFormat::default(),
            inference_policy: InferencePolicy::default(),
        }
    }
}

impl ServerConfig {
    pub fn with_bind_addr(mut self, addr: IpAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    /// Port 0 asks the OS for a free port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_max_request_bytes(mut self, limit: usize) -> Self {
        self.max_request_bytes = limit;
        self
    }

    pub fn with_response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = format;
        self
    }

    pub fn with_inference_policy(mut self, policy: InferencePolicy) -> Self {
        self.inference_policy = policy;
        self
    }

    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}
