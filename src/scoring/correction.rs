use crate::types::scoring::Percentage;

pub const TOTAL: i64 = 100;

/// Forces `values` to sum to [`TOTAL`] by subtracting the surplus (or adding
/// the deficit) starting at candidate 0. A candidate is never moved outside
/// `0..=TOTAL`; whatever it cannot absorb carries to the next index.
pub fn restore_total(mut values: Vec<i64>) -> Vec<Percentage> {
    let mut difference = values.iter().sum::<i64>() - TOTAL;
    if difference != 0 {
        tracing::debug!(difference, "correcting percentage total");
    }

    for value in values.iter_mut() {
        if difference == 0 {
            break;
        }
        let adjusted = (*value - difference).clamp(0, TOTAL);
        difference -= *value - adjusted;
        *value = adjusted;
    }

    values
        .into_iter()
        .map(|value| value.clamp(0, TOTAL) as Percentage)
        .collect()
}
