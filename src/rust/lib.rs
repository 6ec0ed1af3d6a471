//! Scores academic productions (theses, articles, course descriptions) for how
//! related they are to environmental topics, and serves those scores over TCP.
//!
//! A persisted bag-of-words vectorizer turns text into term counts; a trained
//! network (ONNX export or dense-layer JSON export) turns counts into a
//! probability in `[0, 1]`.
//!
//! # Basic Usage
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use nima_predict::{ArtifactPaths, ModelLoader};
//! use serde_json::json;
//!
//! let engine = ModelLoader::default().load(&ArtifactPaths::new("model.onnx", "vectorizer.json"))?;
//!
//! let request = json!({
//!     "a": "environmental policy text",
//!     "b": {"name": "Course X", "content": "ecology and sustainability"}
//! });
//! for (id, score) in engine.classify_request(request.as_object().unwrap())? {
//!     println!("{}: {:.2}", id, score);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Serving
//!
//! ```no_run
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use nima_predict::{ArtifactPaths, ClassifierState, ModelLoader, Server, ServerConfig};
//!
//! let engine = ModelLoader::default().load(&ArtifactPaths::new("model.onnx", "vectorizer.json"))?;
//! let state = ClassifierState::new(ServerConfig::default(), engine);
//! Server::bind(state).await?.run().await?;
//! # Ok(())
//! # }
//! ```

pub mod classifier;
pub mod client;
pub mod model_loader;
mod runtime;
pub mod server;

pub use classifier::{ClassifierError, CountVectorizer, DenseNetwork, InferenceEngine, OnnxModel, ScoringModel, VectorizerSpec};
pub use model_loader::{ArtifactPaths, LoadError, ModelLoader};
pub use runtime::{create_session_builder, RuntimeConfig};
pub use server::{ClassifierState, GuardedEngine, InferencePolicy, ResponseFormat, Server, ServerConfig, ServerError};

/// Initializes `env_logger`, honouring `RUST_LOG` and defaulting to `info`.
pub fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
}
