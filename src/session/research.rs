// src/session/research.rs — Typed view over the final research result

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Web,
    Pdf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
    #[serde(rename = "type")]
    pub source_type: SourceType,
    #[serde(default)]
    pub key_points: Vec<String>,
    /// 0.0-1.0
    pub confidence_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub search_queries_used: Vec<String>,
    #[serde(default)]
    pub total_sources_analyzed: u32,
    pub generation_timestamp: Option<DateTime<Utc>>,
}

/// The summarized result the workflow emits as `final_research_output`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearchOutput {
    pub topic: String,
    pub summary: String,
    #[serde(default)]
    pub sources: Vec<Source>,
    pub metadata: Option<Metadata>,
}

impl ResearchOutput {
    /// Best-effort parse. The wire payload is an arbitrary object, so a shape
    /// mismatch yields `None` rather than an error.
    pub fn from_payload(body: &Map<String, Value>) -> Option<Self> {
        match serde_json::from_value(Value::Object(body.clone())) {
            Ok(output) => Some(output),
            Err(e) => {
                tracing::debug!("final_research_output does not fit the typed view: {}", e);
                None
            }
        }
    }

    /// Sources ordered by descending confidence; out-of-range scores are clamped.
    pub fn ranked_sources(&self) -> Vec<&Source> {
        let mut ranked: Vec<&Source> = self.sources.iter().collect();
        ranked.sort_by(|a, b| {
            b.confidence()
                .partial_cmp(&a.confidence())
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    }
}

impl Source {
    pub fn confidence(&self) -> f64 {
        if self.confidence_score.is_nan() {
            0.0
        } else {
            self.confidence_score.clamp(0.0, 1.0)
        }
    }
}
