use serde::Serialize;

pub type Percentage = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreEntry {
    pub candidate_index: usize,
    pub percentage: Percentage,
}

impl ScoreEntry {
    pub fn new(candidate_index: usize, percentage: Percentage) -> Self {
        Self {
            candidate_index,
            percentage,
        }
    }
}

pub fn total(entries: &[ScoreEntry]) -> u32 {
    entries.iter().map(|entry| entry.percentage).sum()
}
