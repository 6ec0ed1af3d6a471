#![allow(dead_code)]

pub mod onnx;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use nima_predict::classifier::model::{Activation, DenseLayerSpec, DenseNetworkSpec};
use nima_predict::classifier::AccentStripping;
use nima_predict::{ClassifierState, CountVectorizer, DenseNetwork, InferenceEngine, Server, ServerConfig, ServerError, VectorizerSpec};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

pub const VOCABULARY: [&str; 6] = ["ecology", "sustainability", "environmental", "policy", "finance", "market"];

pub fn vectorizer_spec() -> VectorizerSpec {
    VectorizerSpec {
        vocabulary: VOCABULARY.iter().enumerate().map(|(i, t)| (t.to_string(), i)).collect(),
        stop_words: vec!["and".into(), "the".into(), "de".into()],
        lowercase: true,
        strip_accents: Some(AccentStripping::Unicode),
        token_pattern: nima_predict::classifier::vectorizer::DEFAULT_TOKEN_PATTERN.to_string(),
        ngram_range: (1, 1),
    }
}

/// Logistic model: +2 per environment term, -2 per finance term, bias -1.
pub fn network_spec() -> DenseNetworkSpec {
    DenseNetworkSpec {
        layers: vec![DenseLayerSpec {
            weights: vec![vec![2.0], vec![2.0], vec![2.0], vec![0.0], vec![-2.0], vec![-2.0]],
            bias: vec![-1.0],
            activation: Activation::Sigmoid,
        }],
    }
}

pub fn sigmoid(z: f32) -> f32 {
    1.0 / (1.0 + (-z).exp())
}

pub fn test_engine() -> InferenceEngine {
    let vectorizer = CountVectorizer::from_spec(vectorizer_spec()).expect("valid vectorizer");
    let model = DenseNetwork::from_spec(network_spec()).expect("valid network");
    InferenceEngine::new(vectorizer, Arc::new(model)).expect("matching widths")
}

pub struct TestServer {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    pub async fn start(config: ServerConfig) -> Self {
        let config = config
            .with_bind_addr(IpAddr::V4(Ipv4Addr::LOCALHOST))
            .with_port(0);
        let server = Server::bind(ClassifierState::new(config, test_engine()))
            .await
            .expect("bind test server");
        let addr = server.local_addr().expect("local address");

        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run_until(async {
            let _ = rx.await;
        }));

        Self {
            addr,
            shutdown: Some(tx),
            handle,
        }
    }

    pub async fn stop(mut self) -> Result<(), ServerError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.handle.await.expect("server task panicked")
    }
}
