pub mod ballot;
pub mod ranked;

use crate::models::{RankedResult, Tally};

// How many rows the results view shows; the tally itself keeps everything
pub const DISPLAY_LIMIT: usize = 6;

/// Sorted, percentage-annotated projection of the whole tally.
///
/// Ties keep the order in which flavors were first seen (the sort is stable).
/// Percentages are rounded independently, so they may not add up to exactly 100.
pub fn rank(tally: &Tally) -> Vec<RankedResult> {
    let total = tally.total();

    let mut results: Vec<RankedResult> = tally
        .entries()
        .iter()
        .map(|entry| RankedResult {
            flavor: entry.flavor.clone(),
            points: entry.points,
            percentage: percentage(entry.points, total),
        })
        .collect();

    results.sort_by(|a, b| b.points.cmp(&a.points));
    results
}

/// The top `DISPLAY_LIMIT` rows of `rank`.
pub fn leaderboard(tally: &Tally) -> Vec<RankedResult> {
    let mut results = rank(tally);
    results.truncate(DISPLAY_LIMIT);
    results
}

fn percentage(points: u64, total: u128) -> u32 {
    if total == 0 {
        return 0;
    }
    (100.0 * points as f64 / total as f64).round() as u32
}
