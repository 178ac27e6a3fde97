use crate::types::classification::{Category, Classification};
use crate::types::scoring::{Percentage, ScoreEntry};
use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct MatchReport {
    pub version: String,
    pub generated_at: String,
    pub reference: Option<String>,
    pub ranking: Vec<RankedCandidate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedCandidate {
    pub rank: usize,
    pub candidate_index: usize,
    pub label: String,
    pub percentage: Percentage,
    pub category: Category,
    pub confidence: f64,
    pub degraded: bool,
}

impl MatchReport {
    /// Joins a settled ranking with the classifications and candidate labels it
    /// was computed from. Entries keep the ranking order.
    pub fn new(
        reference: Option<String>,
        labels: &[String],
        classifications: &[Classification],
        ranking: &[ScoreEntry],
    ) -> Self {
        let ranking = ranking
            .iter()
            .enumerate()
            .map(|(position, entry)| {
                let classification = classifications
                    .get(entry.candidate_index)
                    .copied()
                    .unwrap_or_else(Classification::fallback);
                let label = labels
                    .get(entry.candidate_index)
                    .cloned()
                    .unwrap_or_else(|| format!("candidate {}", entry.candidate_index + 1));
                RankedCandidate {
                    rank: position + 1,
                    candidate_index: entry.candidate_index,
                    label,
                    percentage: entry.percentage,
                    category: classification.category,
                    confidence: classification.confidence,
                    degraded: classification.degraded,
                }
            })
            .collect();

        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: Utc::now().to_rfc3339(),
            reference,
            ranking,
        }
    }

    pub fn has_degraded(&self) -> bool {
        self.ranking.iter().any(|candidate| candidate.degraded)
    }
}
