use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::models::Sentiment;

/// Maps review text to a sentiment label
///
/// Implementations must be deterministic: the same text against the same
/// model yields the same label.
pub trait SentimentClassifier: Send + Sync {
    fn classify(&self, text: &str) -> Result<Sentiment>;
}

/// Linear sentiment model: term weights plus a bias
///
/// The artifact is JSON of the form
/// `{"weights": {"loved": 1.8, "not good": -1.2}, "bias": -0.1}` where keys
/// are lowercase unigrams or space-joined bigrams.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SentimentModel {
    pub weights: HashMap<String, f64>,
    #[serde(default)]
    pub bias: f64,
}

impl SentimentModel {
    /// Load a model artifact from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read model artifact: {}", path.display()))?;

        let model: SentimentModel = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse model artifact: {}", path.display()))?;

        info!(path = %path.display(), terms = model.weights.len(), "Loaded sentiment model");

        Ok(model)
    }

    /// Score text: the bias plus the weight of every known unigram and bigram
    pub fn score(&self, text: &str) -> f64 {
        let tokens = tokenize(text);

        let mut score = self.bias;
        for token in &tokens {
            if let Some(weight) = self.weights.get(token.as_str()) {
                score += weight;
            }
        }
        for pair in tokens.windows(2) {
            if let Some(weight) = self.weights.get(format!("{} {}", pair[0], pair[1]).as_str()) {
                score += weight;
            }
        }

        score
    }

    /// Label for a text: strictly positive evidence reads as positive
    pub fn label(&self, text: &str) -> Sentiment {
        if self.score(text) > 0.0 {
            Sentiment::Positive
        } else {
            Sentiment::Negative
        }
    }
}

/// Lowercase alphanumeric tokens in order of appearance
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| token.to_lowercase())
        .collect()
}

/// Classifier backed by a model artifact on disk, loaded on first use
///
/// A missing or unreadable artifact surfaces as an error from `classify`
/// rather than failing process startup, so review operations that do not
/// score text stay usable; loading is retried until it succeeds.
pub struct LinearClassifier {
    path: PathBuf,
    model: RwLock<Option<Arc<SentimentModel>>>,
}

impl LinearClassifier {
    /// Classifier that loads the artifact at `path` on first classification
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            model: RwLock::new(None),
        }
    }

    /// Classifier over an already-built model, never touching disk
    pub fn from_model(model: SentimentModel) -> Self {
        Self {
            path: PathBuf::new(),
            model: RwLock::new(Some(Arc::new(model))),
        }
    }

    fn model(&self) -> Result<Arc<SentimentModel>> {
        {
            let slot = self.model.read();
            if let Some(model) = slot.as_ref() {
                return Ok(model.clone());
            }
        }

        let mut slot = self.model.write();
        if let Some(model) = slot.as_ref() {
            return Ok(model.clone());
        }

        let model = Arc::new(SentimentModel::load(&self.path)?);
        *slot = Some(model.clone());

        Ok(model)
    }
}

impl SentimentClassifier for LinearClassifier {
    fn classify(&self, text: &str) -> Result<Sentiment> {
        let model = self.model()?;
        let label = model.label(text);

        debug!(sentiment = %label, "Classified review text");

        Ok(label)
    }
}
