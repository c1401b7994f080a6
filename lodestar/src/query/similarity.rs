//! Name similarity used by entity resolution and the heuristic identity tier

/// Lowercase, strip punctuation and collapse whitespace
///
/// `"Jane  O'Neil"`, `"jane.oneil"` and `"jane-o-neil"` normalise to comparable forms:
/// separators become single spaces and everything else non-alphanumeric is dropped.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_space = false;
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.extend(c.to_lowercase());
        } else if c.is_whitespace() || matches!(c, '.' | '_' | '-') {
            pending_space = true;
        }
    }
    out
}

/// Similarity in [0, 1] from normalised edit distance
pub fn string_similarity(a: &str, b: &str) -> f32 {
    let distance = levenshtein_distance(a, b);
    let max_len = a.chars().count().max(b.chars().count());

    if max_len == 0 {
        1.0
    } else {
        1.0 - (distance as f32 / max_len as f32)
    }
}

/// Similarity of two names after normalisation
pub fn name_similarity(a: &str, b: &str) -> f32 {
    let (a, b) = (normalize_name(a), normalize_name(b));
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    string_similarity(&a, &b)
}

/// Levenshtein distance between two strings, by characters
pub fn levenshtein_distance(a: &str, b: &str) -> usize {
    let chars1: Vec<char> = a.chars().collect();
    let chars2: Vec<char> = b.chars().collect();
    let len2 = chars2.len();

    // Two rolling rows of the edit matrix
    let mut previous: Vec<usize> = (0..=len2).collect();
    let mut current = vec![0; len2 + 1];

    for (i, c1) in chars1.iter().enumerate() {
        current[0] = i + 1;
        for (j, c2) in chars2.iter().enumerate() {
            let cost = if c1 == c2 { 0 } else { 1 };
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[len2]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("", ""), 0);
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("auth", ""), 4);
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  Jane   Doe "), "jane doe");
        assert_eq!(normalize_name("jane.doe"), "jane doe");
        assert_eq!(normalize_name("O'Neil"), "oneil");
    }

    #[test]
    fn test_name_similarity() {
        assert_eq!(name_similarity("Jane Doe", "jane-doe"), 1.0);
        assert!(name_similarity("Jane Doe", "Jane Doh") >= 0.8);
        assert!(name_similarity("Jane Doe", "Bob Smith") < 0.5);
        assert_eq!(name_similarity("", "Jane"), 0.0);
    }
}
