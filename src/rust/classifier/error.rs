use ort::Error as OrtError;
use std::fmt;

/// Represents the different types of errors that can occur while turning a request into scores.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierError {
    /// The request payload is not valid JSON
    MalformedJson(String),
    /// A request value (or the request itself) has a shape other than string, list or object
    TypeMismatch { key: String, found: &'static str },
    /// A structured entry lacks one of its required text fields
    MissingField { key: String, field: &'static str },
    /// Error occurred while loading or applying the vectorizer
    VectorizerError(String),
    /// Error occurred while loading or running the scoring model
    ModelError(String),
    /// Error occurred while making predictions
    PredictionError(String),
    /// Error occurred due to invalid input parameters
    ValidationError(String),
}

impl ClassifierError {
    /// True when the error comes from the caller's payload rather than from the engine.
    pub fn is_request_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedJson(_) | Self::TypeMismatch { .. } | Self::MissingField { .. }
        )
    }
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedJson(msg) => write!(f, "Malformed JSON: {}", msg),
            Self::TypeMismatch { key, found } => write!(
                f,
                "Type mismatch for '{}': expected string, list of strings or object, found {}",
                key, found
            ),
            Self::MissingField { key, field } => {
                write!(f, "Entry '{}' is missing the '{}' text field", key, field)
            }
            Self::VectorizerError(msg) => write!(f, "Vectorizer error: {}", msg),
            Self::ModelError(msg) => write!(f, "Model error: {}", msg),
            Self::PredictionError(msg) => write!(f, "Prediction error: {}", msg),
            Self::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ClassifierError {}

impl From<OrtError> for ClassifierError {
    fn from(err: OrtError) -> Self {
        ClassifierError::ModelError(err.to_string())
    }
}
