//! Line-oriented TCP classification server.
//!
//! Each accepted connection runs on its own task. All of them share one
//! [`ClassifierState`], whose engine is only reachable through a
//! [`GuardedEngine`] handle held for the length of a single inference call.

pub mod config;
pub mod handler;
pub mod protocol;

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use log::{error, info, warn};
use tokio::net::TcpListener;
use tokio::sync::RwLock;

use crate::classifier::{normalize_request, parse_request, ClassifierError, InferenceEngine};
pub use config::{InferencePolicy, ResponseFormat, ServerConfig, DEFAULT_MAX_REQUEST_BYTES, DEFAULT_PORT};
pub use protocol::Outcome;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

/// Shared access to the inference engine.
///
/// Under [`InferencePolicy::Serialized`] each call takes the exclusive guard, so
/// requests reach the model one at a time in lock acquisition order (tokio's lock
/// is fair). Under [`InferencePolicy::Concurrent`] calls share the guard.
#[derive(Debug, Clone)]
pub struct GuardedEngine {
    inner: Arc<RwLock<InferenceEngine>>,
    policy: InferencePolicy,
}

impl GuardedEngine {
    pub fn new(engine: InferenceEngine, policy: InferencePolicy) -> Self {
        Self {
            inner: Arc::new(RwLock::new(engine)),
            policy,
        }
    }

    pub fn policy(&self) -> InferencePolicy {
        self.policy
    }

    /// Runs one inference on the blocking pool while holding the guard.
    pub async fn classify(&self, texts: Vec<String>) -> Result<Vec<f32>, ClassifierError> {
        let task = match self.policy {
            InferencePolicy::Serialized => {
                let guard = Arc::clone(&self.inner).write_owned().await;
                tokio::task::spawn_blocking(move || guard.classify(&texts))
            }
            InferencePolicy::Concurrent => {
                let guard = Arc::clone(&self.inner).read_owned().await;
                tokio::task::spawn_blocking(move || guard.classify(&texts))
            }
        };

        task.await
            .map_err(|e| ClassifierError::PredictionError(format!("Inference task failed: {}", e)))?
    }
}

/// Everything a connection needs, built once at startup and never modified.
#[derive(Debug)]
pub struct ClassifierState {
    config: ServerConfig,
    engine: GuardedEngine,
}

impl ClassifierState {
    pub fn new(config: ServerConfig, engine: InferenceEngine) -> Self {
        let engine = GuardedEngine::new(engine, config.inference_policy);
        Self { config, engine }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn engine(&self) -> &GuardedEngine {
        &self.engine
    }

    /// Parses, normalizes and scores one raw request.
    pub async fn process(&self, payload: &[u8]) -> Outcome {
        match self.try_process(payload).await {
            Ok(scores) => Outcome::Scored(scores),
            Err(e) => Outcome::Failed(e),
        }
    }

    async fn try_process(&self, payload: &[u8]) -> Result<Vec<(String, f32)>, ClassifierError> {
        let request = parse_request(payload)?;
        let (keys, texts): (Vec<String>, Vec<String>) = normalize_request(&request)?.into_iter().unzip();
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let scores = self.engine.classify(texts).await?;
        Ok(keys.into_iter().zip(scores).collect())
    }
}

/// Accepts connections and hands each one to [`handler::handle_connection`] on its own task.
pub struct Server {
    listener: TcpListener,
    state: Arc<ClassifierState>,
}

impl Server {
    /// Binds the configured address. Failing to bind is fatal for the caller.
    pub async fn bind(state: ClassifierState) -> Result<Self, ServerError> {
        let addr = state.config().socket_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        Ok(Self {
            listener,
            state: Arc::new(state),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves until Ctrl-C.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_until(shutdown_signal()).await
    }

    /// Serves until `shutdown` resolves. In-flight connections are not awaited.
    pub async fn run_until<F>(self, shutdown: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        info!("Server listening on {}", self.local_addr()?);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutting down server");
                    return Ok(());
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            if let Err(e) = handler::handle_connection(stream, peer, state).await {
                                error!("Connection {} aborted: {}", peer, e);
                            }
                        });
                    }
                    Err(e) => warn!("Failed to accept connection: {}", e),
                },
            }
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl-C, serving until killed: {}", e);
        std::future::pending::<()>().await;
    }
}
