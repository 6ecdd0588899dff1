//! Edit distance and the similarity score derived from it

/// Levenshtein distance between two strings, counted in `char`s
pub use strsim::levenshtein;

/// `1 - distance / max(len(a), len(b))`, clamped to [0, 1].
///
/// Not a true normalized edit similarity; risk thresholds are tuned against
/// this exact formula.
pub fn similarity(a: &str, b: &str, distance: usize) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    (1.0 - distance as f64 / max_len as f64).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("Saturday", "Sunday"), 3);
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("test", "test"), 0);
    }

    #[test]
    fn test_counts_chars_not_bytes() {
        assert_eq!(levenshtein("MÜLLER", "MULLER"), 1);
        assert_eq!(levenshtein("ÉÉ", ""), 2);
    }

    #[test]
    fn test_similarity() {
        let d = levenshtein("BLOCKED ENTITI INC", "BLOCKED ENTITY INC");
        assert_eq!(d, 1);
        let score = similarity("BLOCKED ENTITI INC", "BLOCKED ENTITY INC", d);
        assert!((score - (1.0 - 1.0 / 18.0)).abs() < 1e-9);

        assert_eq!(similarity("", "", 0), 1.0);
        assert_eq!(similarity("AB", "CDEF", 4), 0.0);
    }
}
