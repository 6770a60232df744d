// src/dirs/placement.rs

//! Free-space weighted choice among local directory candidates.

/// Map a draw in `[0, sum(available))` onto a candidate index.
///
/// Candidates are laid end to end, each occupying a span as wide as its free
/// space; the index whose span contains `draw` wins. Zero-space candidates
/// occupy no span and can never be chosen. Returns `None` when `draw` falls
/// outside the total (including the all-zero case).
pub fn pick_weighted(available: &[u64], draw: u64) -> Option<usize> {
    let mut remaining = draw;
    for (idx, &space) in available.iter().enumerate() {
        if space == 0 {
            continue;
        }
        if remaining < space {
            return Some(idx);
        }
        remaining -= space;
    }
    None
}

/// Sum of the candidates' free space, saturating instead of overflowing.
pub fn total_available(available: &[u64]) -> u64 {
    available.iter().fold(0u64, |acc, &s| acc.saturating_add(s))
}
