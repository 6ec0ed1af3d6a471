use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use ndarray::Array2;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tokenizers::normalizers::{Lowercase, StripAccents, NFKD};
use tokenizers::{NormalizedString, Normalizer};

use super::error::ClassifierError;

/// Token pattern used when the exported vectorizer does not carry one:
/// words of two or more word characters.
pub const DEFAULT_TOKEN_PATTERN: &str = r"(?u)\b\w\w+\b";

/// How accents are removed before tokenization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccentStripping {
    /// Decompose (NFKD) and drop combining marks: "poluição" -> "poluicao"
    Unicode,
    /// Decompose (NFKD) and drop every non-ASCII character
    Ascii,
}

/// Persisted form of a fitted bag-of-words vectorizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorizerSpec {
    /// Term to feature column; columns must be exactly `0..vocabulary.len()`
    pub vocabulary: HashMap<String, usize>,
    #[serde(default)]
    pub stop_words: Vec<String>,
    #[serde(default = "default_lowercase")]
    pub lowercase: bool,
    #[serde(default)]
    pub strip_accents: Option<AccentStripping>,
    #[serde(default = "default_token_pattern")]
    pub token_pattern: String,
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),
}

fn default_lowercase() -> bool {
    true
}

fn default_token_pattern() -> String {
    DEFAULT_TOKEN_PATTERN.to_string()
}

fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

/// A fitted term-count vectorizer with a vocabulary fixed at training time.
///
/// Text goes through accent stripping, lowercasing, regex tokenization, stop word
/// removal and n-gram construction; every known term increments its column.
/// Unknown terms are dropped without error.
#[derive(Debug, Clone)]
pub struct CountVectorizer {
    vocabulary: HashMap<String, usize>,
    stop_words: HashSet<String>,
    lowercase: bool,
    strip_accents: Option<AccentStripping>,
    token_pattern: Regex,
    ngram_range: (usize, usize),
}

impl CountVectorizer {
    /// Builds a vectorizer from its persisted form, validating the vocabulary layout.
    pub fn from_spec(spec: VectorizerSpec) -> Result<Self, ClassifierError> {
        if spec.vocabulary.is_empty() {
            return Err(ClassifierError::VectorizerError("Vocabulary cannot be empty".into()));
        }

        let width = spec.vocabulary.len();
        let mut seen = vec![false; width];
        for (term, &column) in &spec.vocabulary {
            if column >= width || seen[column] {
                return Err(ClassifierError::VectorizerError(format!(
                    "Term '{}' maps to invalid or duplicated column {} (vocabulary size {})",
                    term, column, width
                )));
            }
            seen[column] = true;
        }

        let (min_n, max_n) = spec.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(ClassifierError::VectorizerError(format!(
                "Invalid n-gram range ({}, {})",
                min_n, max_n
            )));
        }

        let token_pattern = Regex::new(&spec.token_pattern).map_err(|e| {
            ClassifierError::VectorizerError(format!("Invalid token pattern: {}", e))
        })?;

        Ok(Self {
            vocabulary: spec.vocabulary,
            stop_words: spec.stop_words.into_iter().collect(),
            lowercase: spec.lowercase,
            strip_accents: spec.strip_accents,
            token_pattern,
            ngram_range: spec.ngram_range,
        })
    }

    /// Reads a JSON-exported vectorizer from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            ClassifierError::VectorizerError(format!("Failed to open {:?}: {}", path, e))
        })?;
        let spec: VectorizerSpec = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            ClassifierError::VectorizerError(format!("Failed to parse {:?}: {}", path, e))
        })?;
        Self::from_spec(spec)
    }

    /// Number of feature columns produced for every text.
    pub fn width(&self) -> usize {
        self.vocabulary.len()
    }

    /// Applies accent stripping and lowercasing as configured.
    pub fn preprocess(&self, text: &str) -> Result<String, ClassifierError> {
        let mut normalized = NormalizedString::from(text);
        let wrap = |e: Box<dyn std::error::Error + Send + Sync>| {
            ClassifierError::VectorizerError(format!("Failed to normalize text: {}", e))
        };

        if let Some(mode) = self.strip_accents {
            NFKD.normalize(&mut normalized).map_err(wrap)?;
            StripAccents.normalize(&mut normalized).map_err(wrap)?;
            if mode == AccentStripping::Ascii {
                normalized.filter(|c| c.is_ascii());
            }
        }
        if self.lowercase {
            Lowercase.normalize(&mut normalized).map_err(wrap)?;
        }

        Ok(normalized.get().to_string())
    }

    /// Splits text into the terms the vocabulary is indexed by (before the vocabulary lookup).
    pub fn analyze(&self, text: &str) -> Result<Vec<String>, ClassifierError> {
        let preprocessed = self.preprocess(text)?;
        let tokens: Vec<&str> = self
            .token_pattern
            .find_iter(&preprocessed)
            .map(|m| m.as_str())
            .filter(|token| !self.stop_words.contains(*token))
            .collect();

        let (min_n, max_n) = self.ngram_range;
        let mut terms = Vec::new();
        for n in min_n..=max_n.min(tokens.len()) {
            terms.extend(tokens.windows(n).map(|gram| gram.join(" ")));
        }
        Ok(terms)
    }

    /// Turns N texts into an `N x width` matrix of term counts.
    pub fn transform(&self, texts: &[String]) -> Result<Array2<f32>, ClassifierError> {
        let mut features = Array2::<f32>::zeros((texts.len(), self.width()));
        for (row, text) in texts.iter().enumerate() {
            for term in self.analyze(text)? {
                if let Some(&column) = self.vocabulary.get(&term) {
                    features[[row, column]] += 1.0;
                }
            }
        }
        Ok(features)
    }
}
