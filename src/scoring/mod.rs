pub mod correction;

use crate::types::classification::Classification;
use crate::types::config::ScoringPolicy;
use crate::types::scoring::ScoreEntry;
use rand::Rng;

/// Turns one classification per candidate (in slot order) into a ranking
/// whose percentages sum to exactly 100.
pub fn score<R: Rng>(
    classifications: &[Classification],
    policy: &ScoringPolicy,
    rng: &mut R,
) -> Vec<ScoreEntry> {
    if classifications.is_empty() {
        return Vec::new();
    }

    let all_neutral = classifications
        .iter()
        .all(|classification| classification.category.is_neutral());
    let with_asset = classifications
        .iter()
        .filter(|classification| classification.category.is_asset())
        .count();

    let raw = if all_neutral {
        neutral_split(classifications.len(), policy)
    } else if with_asset == 0 {
        uniform_split(classifications.len())
    } else {
        jittered(classifications, with_asset, policy, rng)
    };
    tracing::debug!(?raw, all_neutral, with_asset, "raw percentages");

    rank(correction::restore_total(raw))
}

fn neutral_split(count: usize, policy: &ScoringPolicy) -> Vec<i64> {
    let primary = i64::from(policy.neutral_primary);
    let mut values = vec![primary];
    if count > 1 {
        let others = (count - 1) as i64;
        let remainder = correction::TOTAL - primary;
        values.extend(std::iter::repeat(remainder / others).take(count - 1));
        if let Some(last) = values.last_mut() {
            *last += remainder % others;
        }
    }
    values
}

fn uniform_split(count: usize) -> Vec<i64> {
    let share = (correction::TOTAL as f64 / count as f64).round() as i64;
    vec![share; count]
}

fn jittered<R: Rng>(
    classifications: &[Classification],
    with_asset: usize,
    policy: &ScoringPolicy,
    rng: &mut R,
) -> Vec<i64> {
    let count = classifications.len();
    let base_asset = f64::from(policy.base_asset);
    let base_portrait = if with_asset < count {
        let spread = (correction::TOTAL as f64 - base_asset * with_asset as f64)
            / (count - with_asset) as f64;
        spread.max(f64::from(policy.min_portrait))
    } else {
        0.0
    };

    classifications
        .iter()
        .map(|classification| {
            let base = if classification.category.is_asset() {
                base_asset
            } else {
                base_portrait
            };
            let jitter = if policy.jitter > 0.0 {
                rng.random_range(0.0..policy.jitter)
            } else {
                0.0
            };
            (base + jitter).round() as i64
        })
        .collect()
}

/// Highest percentage first; equal percentages keep ascending candidate order.
pub fn rank(percentages: Vec<u32>) -> Vec<ScoreEntry> {
    let mut entries = percentages
        .into_iter()
        .enumerate()
        .map(|(index, percentage)| ScoreEntry::new(index, percentage))
        .collect::<Vec<_>>();
    entries.sort_by(|a, b| {
        b.percentage
            .cmp(&a.percentage)
            .then(a.candidate_index.cmp(&b.candidate_index))
    });
    entries
}
