use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log;
use sha2::{Digest, Sha256};

use crate::classifier::{ClassifierError, CountVectorizer, DenseNetwork, InferenceEngine, OnnxModel, ScoringModel};
use crate::runtime::RuntimeConfig;

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("File not found: {0:?}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Unsupported model format {0:?} (expected .onnx or .json)")]
    UnsupportedFormat(PathBuf),
    #[error("Hash mismatch: expected {expected}, got {actual} for {file_type} file")]
    HashMismatch {
        file_type: String,
        expected: String,
        actual: String,
    },
    #[error(transparent)]
    Classifier(#[from] ClassifierError),
}

/// Locations (and optional digests) of the persisted model and vectorizer.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub model: PathBuf,
    pub vectorizer: PathBuf,
    pub model_sha256: Option<String>,
    pub vectorizer_sha256: Option<String>,
}

impl ArtifactPaths {
    pub fn new(model: impl Into<PathBuf>, vectorizer: impl Into<PathBuf>) -> Self {
        Self {
            model: model.into(),
            vectorizer: vectorizer.into(),
            model_sha256: None,
            vectorizer_sha256: None,
        }
    }

    pub fn with_model_sha256(mut self, hash: impl Into<String>) -> Self {
        self.model_sha256 = Some(hash.into());
        self
    }

    pub fn with_vectorizer_sha256(mut self, hash: impl Into<String>) -> Self {
        self.vectorizer_sha256 = Some(hash.into());
        self
    }
}

/// Loads trained artifacts from disk into an `InferenceEngine`.
///
/// Loading happens once at startup; every failure is meant to be fatal for the caller.
#[derive(Debug, Clone, Default)]
pub struct ModelLoader {
    runtime_config: RuntimeConfig,
}

impl ModelLoader {
    pub fn new(runtime_config: RuntimeConfig) -> Self {
        Self { runtime_config }
    }

    pub fn load(&self, paths: &ArtifactPaths) -> Result<InferenceEngine, LoadError> {
        log::info!("Loading artifacts:");
        log::info!("  Model path: {:?} (exists: {})", paths.model, paths.model.exists());
        log::info!("  Vectorizer path: {:?} (exists: {})", paths.vectorizer, paths.vectorizer.exists());

        for path in [&paths.model, &paths.vectorizer] {
            if !path.is_file() {
                log::error!("Missing artifact: {:?}", path);
                return Err(LoadError::NotFound(path.clone()));
            }
        }

        if let Some(expected) = &paths.model_sha256 {
            Self::verify_file(&paths.model, expected, "model")?;
        }
        if let Some(expected) = &paths.vectorizer_sha256 {
            Self::verify_file(&paths.vectorizer, expected, "vectorizer")?;
        }

        let vectorizer = CountVectorizer::from_file(&paths.vectorizer)?;
        log::info!("Vectorizer loaded ({} features)", vectorizer.width());

        let model = self.load_model(&paths.model)?;
        log::info!("Model loaded (input width: {:?})", model.input_width());

        Ok(InferenceEngine::new(vectorizer, model)?)
    }

    fn load_model(&self, path: &Path) -> Result<Arc<dyn ScoringModel>, LoadError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("onnx") => Ok(Arc::new(OnnxModel::from_file(path, &self.runtime_config)?)),
            Some("json") => Ok(Arc::new(DenseNetwork::from_file(path)?)),
            _ => Err(LoadError::UnsupportedFormat(path.to_path_buf())),
        }
    }

    /// Computes the lowercase hex SHA-256 digest of a file.
    pub fn file_sha256(path: &Path) -> Result<String, LoadError> {
        let bytes = fs::read(path)?;
        log::debug!("Read {} bytes from {:?}", bytes.len(), path);
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }

    fn verify_file(path: &Path, expected_hash: &str, file_type: &str) -> Result<(), LoadError> {
        log::info!("Verifying {} file: {:?}", file_type, path);
        let hash = Self::file_sha256(path)?;
        if !hash.eq_ignore_ascii_case(expected_hash.trim()) {
            log::error!("{} hash mismatch: expected {}, got {}", file_type, expected_hash, hash);
            return Err(LoadError::HashMismatch {
                file_type: file_type.to_string(),
                expected: expected_hash.to_string(),
                actual: hash,
            });
        }
        log::info!("{} file verified successfully", file_type);
        Ok(())
    }
}
