//! Pure lexical relevance scoring: `score(content, query, vectorScore?)`.

use std::collections::HashSet;

pub(crate) const STOP_WORDS: &[&str] = &[
  // English
  "the", "and", "for", "are", "but", "not", "you", "all", "can", "her", "was", "one", "our",
  "out", "day", "get", "has", "him", "his", "how", "man", "new", "now", "old", "see", "two",
  "way", "who", "boy", "did", "its", "let", "put", "say", "she", "too", "use", "with", "this",
  "that", "from", "have", "what", "when", "where", "which", "there", "their", "about",
  // German
  "der", "die", "das", "und", "für", "mit", "ist", "ein", "eine", "einer", "eines", "auf",
  "von", "zum", "zur", "den", "dem", "des", "im", "bei", "nicht", "auch", "als", "sich", "wie",
  "was", "wenn", "oder", "aber", "nur", "noch", "schon", "sein", "ihre",
];

/// Bilingual synonym groups; any two terms in the same group are treated as
/// equivalent, weighted 1.5 in the combined score.
const SYNONYM_GROUPS: &[&[&str]] = &[
  &["database", "datenbank", "sqlite", "storage"],
  &["configure", "konfigurieren", "setup"],
  &["cloud", "azure"],
  &["storage", "files", "datei"],
];

/// Lowercases, splits on whitespace/punctuation, and drops terms of length
/// <= 2 and stop-words.
fn meaningful_terms(text: &str) -> HashSet<String> {
  text
    .to_lowercase()
    .split(|c: char| !c.is_alphanumeric())
    .filter(|t| t.chars().count() > 2)
    .filter(|t| !STOP_WORDS.contains(t))
    .map(|t| t.to_string())
    .collect()
}

fn synonym_match(query_term: &str, content_terms: &HashSet<String>) -> bool {
  SYNONYM_GROUPS
    .iter()
    .filter(|group| group.contains(&query_term))
    .any(|group| group.iter().any(|syn| content_terms.contains(*syn)))
}

/// Lexical relevance in `[0, 1]`. If `vector_score` is given, returns
/// `0.7*vector_score + 0.3*text_relevance`; otherwise returns `text_relevance`
/// alone. Pure: identical inputs always produce identical output.
pub fn score(content: &str, query: &str, vector_score: Option<f32>) -> f32 {
  let query_terms = meaningful_terms(query);
  let content_terms = meaningful_terms(content);
  let content_lower = content.to_lowercase();

  if query_terms.is_empty() {
    return vector_score.unwrap_or(0.0);
  }

  let exact = query_terms.intersection(&content_terms).count();

  let partial = query_terms
    .iter()
    .filter(|q| !content_terms.contains(*q) && content_lower.contains(q.as_str()))
    .count();

  let synonym = query_terms
    .iter()
    .filter(|q| !content_terms.contains(*q) && synonym_match(q, &content_terms))
    .count();

  let text_relevance = ((2.0 * exact as f32) + (partial as f32) + (1.5 * synonym as f32))
    / (2.0 * query_terms.len() as f32);
  let text_relevance = text_relevance.min(1.0);

  match vector_score {
    Some(v) => 0.7 * v + 0.3 * text_relevance,
    None => text_relevance,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn exact_match_scores_highly() {
    let s = score("The database stores configuration.", "database configuration", None);
    assert!(s > 0.9);
  }

  #[test]
  fn unrelated_query_scores_near_zero() {
    let s = score("Azure Blob stores files.", "unrelated xyzzy", None);
    assert_eq!(s, 0.0);
  }

  #[test]
  fn synonym_match_contributes_partial_credit() {
    let s = score("Our sqlite backend is fast.", "database", None);
    assert!(s > 0.0);
  }

  #[test]
  fn is_pure() {
    let a = score("content here", "query there", Some(0.5));
    let b = score("content here", "query there", Some(0.5));
    assert_eq!(a, b);
  }

  #[test]
  fn blends_with_vector_score_when_present() {
    let text_only = score("database storage", "database", None);
    let blended = score("database storage", "database", Some(1.0));
    assert!(blended >= text_only);
  }
}
