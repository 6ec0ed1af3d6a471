//! Text → feature vector → probability pipeline.

pub mod classifier;
pub mod error;
pub mod model;
pub mod normalizer;
pub mod vectorizer;

pub use classifier::InferenceEngine;
pub use error::ClassifierError;
pub use model::{DenseNetwork, OnnxModel, ScoringModel};
pub use normalizer::{normalize_request, parse_request};
pub use vectorizer::{AccentStripping, CountVectorizer, VectorizerSpec};
