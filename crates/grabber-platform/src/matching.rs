//! Fuzzy window-title matching shared by backends.

/// Default score a title must exceed to count as a match
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.9;

/// How much of `query` appears, in order, inside `candidate`.
///
/// Longest common subsequence of the two lowercased strings divided by the
/// query length, so `1.0` means every query character was found in order.
/// Empty inputs score `0.0`.
pub fn title_similarity(query: &str, candidate: &str) -> f32 {
    let query: Vec<char> = query.to_lowercase().chars().collect();
    let candidate: Vec<char> = candidate.to_lowercase().chars().collect();

    if query.is_empty() || candidate.is_empty() {
        return 0.0;
    }

    let mut previous = vec![0u32; query.len() + 1];
    let mut next = vec![0u32; query.len() + 1];

    for &c in &candidate {
        for k in 1..=query.len() {
            next[k] = if query[k - 1] == c {
                previous[k - 1] + 1
            } else {
                previous[k].max(next[k - 1])
            };
        }
        std::mem::swap(&mut previous, &mut next);
    }

    previous[query.len()] as f32 / query.len() as f32
}

/// Index of the best-scoring title above `threshold`.
/// Ties keep the earliest candidate.
pub fn best_match<'a, I>(query: &str, titles: I, threshold: f32) -> Option<usize>
where
    I: IntoIterator<Item = Option<&'a str>>,
{
    let mut best: Option<(usize, f32)> = None;
    for (i, title) in titles.into_iter().enumerate() {
        let score = title.map_or(0.0, |t| title_similarity(query, t));
        if score > best.map_or(0.0, |(_, s)| s) {
            best = Some((i, score));
        }
    }
    best.filter(|&(_, score)| score > threshold).map(|(i, _)| i)
}
