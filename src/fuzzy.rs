//! Approximate substring matching.
//!
//! [`distance`] finds the fewest single-character edits (insertion, deletion,
//! substitution, or transposition of two adjacent characters) that turn a
//! pattern into *some* substring of a text. Matching anywhere in the text is
//! free, so `"docker"` is at distance 0 from `"docker basics"` and `"dokcer"`
//! is at distance 1.

/// Returns the edit distance between `pattern` and the closest substring of
/// `text`. An empty pattern is at distance 0 from everything.
pub fn distance(pattern: &[char], text: &[char]) -> usize {
    let m = pattern.len();
    if m == 0 {
        return 0;
    }

    // Rolling rows of the dynamic-programming table, indexed by text
    // position. Row `i` holds the cost of matching `pattern[..i]` against a
    // substring ending at each position. Row 0 is all zeros because a match
    // may start anywhere.
    let n = text.len();
    let mut before_prev = vec![0usize; n + 1];
    let mut prev = vec![0usize; n + 1];
    let mut cur = vec![0usize; n + 1];

    for i in 1..=m {
        cur[0] = i;
        for j in 1..=n {
            let substitution = if pattern[i - 1] == text[j - 1] { 0 } else { 1 };
            let mut best = (prev[j - 1] + substitution)
                .min(prev[j] + 1)
                .min(cur[j - 1] + 1);
            if i > 1
                && j > 1
                && pattern[i - 1] == text[j - 2]
                && pattern[i - 2] == text[j - 1]
            {
                best = best.min(before_prev[j - 2] + 1);
            }
            cur[j] = best;
        }
        std::mem::swap(&mut before_prev, &mut prev);
        std::mem::swap(&mut prev, &mut cur);
    }

    // After the final swap the last computed row lives in `prev`.
    prev.iter().copied().min().unwrap_or(m)
}

/// Returns [`distance`] normalized by the pattern length: 0.0 for an exact
/// substring match, 1.0 when nothing of the pattern survives.
pub fn score(pattern: &[char], text: &[char]) -> f64 {
    if pattern.is_empty() {
        return 0.0;
    }
    (distance(pattern, text) as f64 / pattern.len() as f64).min(1.0)
}
