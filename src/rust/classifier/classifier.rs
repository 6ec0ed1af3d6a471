use std::sync::Arc;

use log::debug;
use serde_json::{Map, Value};

use super::error::ClassifierError;
use super::model::ScoringModel;
use super::normalizer::normalize_request;
use super::vectorizer::CountVectorizer;

/// Scores texts by vectorizing them and feeding the feature matrix to a trained model.
///
/// The engine holds no mutable state: `classify` is a pure function of
/// (model, vectorizer, texts), so it can be called repeatedly and from several
/// threads. Whether the underlying model tolerates *concurrent* calls is decided
/// by the caller (see `server::GuardedEngine`).
///
/// ```rust
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use std::sync::Arc;
/// use nima_predict::{InferenceEngine, CountVectorizer, VectorizerSpec, DenseNetwork};
/// use nima_predict::classifier::model::{Activation, DenseLayerSpec, DenseNetworkSpec};
///
/// let vectorizer = CountVectorizer::from_spec(VectorizerSpec {
///     vocabulary: [("ecology".to_string(), 0)].into_iter().collect(),
///     stop_words: vec![],
///     lowercase: true,
///     strip_accents: None,
///     token_pattern: nima_predict::classifier::vectorizer::DEFAULT_TOKEN_PATTERN.into(),
///     ngram_range: (1, 1),
/// })?;
/// let model = DenseNetwork::from_spec(DenseNetworkSpec {
///     layers: vec![DenseLayerSpec {
///         weights: vec![vec![1.0]],
///         bias: vec![0.0],
///         activation: Activation::Sigmoid,
///     }],
/// })?;
///
/// let engine = InferenceEngine::new(vectorizer, Arc::new(model))?;
/// let scores = engine.classify(&["Ecology course".to_string()])?;
/// assert!(scores[0] > 0.5);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct InferenceEngine {
    vectorizer: Arc<CountVectorizer>,
    model: Arc<dyn ScoringModel>,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<InferenceEngine>();
    }
};

impl InferenceEngine {
    /// Pairs a vectorizer with a model, rejecting combinations whose widths disagree.
    pub fn new(vectorizer: CountVectorizer, model: Arc<dyn ScoringModel>) -> Result<Self, ClassifierError> {
        if let Some(width) = model.input_width() {
            if width != vectorizer.width() {
                return Err(ClassifierError::ValidationError(format!(
                    "Model expects {} features but the vectorizer produces {}",
                    width,
                    vectorizer.width()
                )));
            }
        }

        Ok(Self {
            vectorizer: Arc::new(vectorizer),
            model,
        })
    }

    pub fn vectorizer(&self) -> &CountVectorizer {
        &self.vectorizer
    }

    /// Returns one score in `[0, 1]` per text, in input order.
    pub fn classify(&self, texts: &[String]) -> Result<Vec<f32>, ClassifierError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let features = self.vectorizer.transform(texts)?;
        debug!("Vectorized {} texts into {:?} features", texts.len(), features.shape());

        let scores = self.model.predict(features.view())?;
        if scores.len() != texts.len() {
            return Err(ClassifierError::PredictionError(format!(
                "Expected {} scores, model returned {}",
                texts.len(),
                scores.len()
            )));
        }

        if let Some(position) = scores.iter().position(|score| !score.is_finite()) {
            return Err(ClassifierError::PredictionError(format!(
                "Model returned non-finite score {} for input {}",
                scores[position], position
            )));
        }

        Ok(scores.into_iter().map(|score| score.clamp(0.0, 1.0)).collect())
    }

    /// Normalizes a request object and scores each identifier.
    ///
    /// The returned pairs follow the request's key order.
    pub fn classify_request(&self, request: &Map<String, Value>) -> Result<Vec<(String, f32)>, ClassifierError> {
        let (keys, texts): (Vec<String>, Vec<String>) = normalize_request(request)?.into_iter().unzip();
        let scores = self.classify(&texts)?;
        Ok(keys.into_iter().zip(scores).collect())
    }
}
