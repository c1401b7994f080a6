//! Tokenization shared by lexical indexing and query processing

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashSet;

lazy_static! {
    static ref WORD_REGEX: Regex = Regex::new(r"[A-Za-z0-9][A-Za-z0-9_'\-]*").unwrap();
    static ref STOPWORDS: HashSet<&'static str> = [
        "a", "an", "and", "are", "as", "at", "be", "by", "can", "did", "do", "does", "for",
        "from", "had", "has", "have", "how", "i", "in", "into", "is", "it", "its", "me", "my",
        "of", "on", "or", "our", "so", "that", "the", "their", "them", "there", "this", "to",
        "us", "was", "we", "were", "what", "when", "where", "which", "who", "why", "will",
        "with", "you", "your",
    ]
    .into_iter()
    .collect();
}

/// Lowercased words, stopwords included
pub fn words(text: &str) -> Vec<String> {
    WORD_REGEX
        .find_iter(text)
        .map(|m| m.as_str().trim_matches('\'').to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Lowercased index terms with stopwords removed
pub fn tokenize(text: &str) -> Vec<String> {
    words(text)
        .into_iter()
        .filter(|w| !is_stopword(w))
        .collect()
}

pub fn is_stopword(word: &str) -> bool {
    STOPWORDS.contains(word)
}

/// Up to `max_chars` characters of `text`, cut at a word boundary
pub fn truncate_on_word(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    match cut.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => format!("{}...", cut[..idx].trim_end()),
        _ => format!("{}...", cut),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_drops_stopwords() {
        assert_eq!(
            tokenize("Why did we move the Auth service?"),
            vec!["move", "auth", "service"]
        );
    }

    #[test]
    fn test_words_keep_hyphenated_terms() {
        assert_eq!(words("ENG-142 isn't done"), vec!["eng-142", "isn't", "done"]);
    }

    #[test]
    fn test_truncate_on_word() {
        assert_eq!(truncate_on_word("short", 10), "short");
        assert_eq!(truncate_on_word("the quick brown fox", 12), "the quick...");
    }
}
