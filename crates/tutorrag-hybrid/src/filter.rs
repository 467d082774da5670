use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use tutorrag_core::error::{Error, Result};
use tutorrag_core::types::{Document, Meta, RetrievalResult};

/// Conjunction of predicates; `None`/empty fields are not checked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalFilters {
    pub source: Option<String>,
    pub min_score: Option<f32>,
    #[serde(default)]
    pub metadata: Meta,
}

impl RetrievalFilters {
    pub fn by_source(source: impl Into<String>) -> Self {
        Self { source: Some(source.into()), ..Self::default() }
    }

    pub fn with_min_score(mut self, min_score: f32) -> Self {
        self.min_score = Some(min_score);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// `"source"` and `"min_score"` are recognised; every other key is a metadata predicate.
    pub fn from_map(map: Map<String, Value>) -> Result<Self> {
        let mut filters = Self::default();
        for (key, value) in map {
            match key.as_str() {
                "source" => {
                    let source = value.as_str().ok_or_else(|| Error::InvalidArgument(format!("filter 'source' must be a string, got {value}")))?;
                    filters.source = Some(source.to_string());
                }
                "min_score" => {
                    let min = value.as_f64().ok_or_else(|| Error::InvalidArgument(format!("filter 'min_score' must be a number, got {value}")))?;
                    filters.min_score = Some(min as f32);
                }
                _ => { filters.metadata.insert(key, value); }
            }
        }
        Ok(filters)
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_none() && self.min_score.is_none() && self.metadata.is_empty()
    }

    /// A document missing a requested metadata key does not match.
    pub fn matches(&self, document: &Document, score: f32) -> bool {
        if let Some(source) = &self.source {
            if &document.source != source { return false; }
        }
        if let Some(min_score) = self.min_score {
            if score < min_score { return false; }
        }
        self.metadata.iter().all(|(key, expected)| document.metadata.get(key) == Some(expected))
    }

    pub fn apply(&self, results: Vec<RetrievalResult>) -> Vec<RetrievalResult> {
        if self.is_empty() { return results; }
        let before = results.len();
        let kept: Vec<RetrievalResult> = results.into_iter().filter(|r| self.matches(&r.document, r.score)).collect();
        tracing::debug!(before, after = kept.len(), "applied retrieval filters");
        kept
    }
}
