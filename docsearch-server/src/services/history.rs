//! Extracts keywords, prior document references, and follow-up intent from
//! chat history.

use crate::services::scoring::STOP_WORDS;
use docsearch_core::{ChatHistoryEntry, ChatRole};
use std::collections::HashSet;

const FOLLOW_UP_PHRASES: &[&str] = &[
  "beispiel", "beispiele", "mehr über", "mehr dazu", "mehr infos", "mehr details",
  "weitere informationen", "nachteile davon", "vorteile davon", "probleme dabei",
  "schwierigkeiten", "andere aspekte", "zusätzlich", "außerdem", "darüber hinaus", "kannst du",
  "könntest du", "erklär mir", "sag mir mehr", "gib mir", "zeig mir", "was meinst du",
  "erkläre das", "genauer", "spezifischer", "details", "example", "examples", "can you",
  "could you", "tell me more", "give me", "show me", "what do you mean", "explain that",
  "more about", "more details", "more info", "disadvantages", "advantages", "problems with",
  "issues with", "other aspects", "additionally", "furthermore", "more specific",
  "more precise", "elaborate",
];

const QUESTION_WORDS: &[&str] = &[
  "was", "wie", "warum", "weshalb", "wo", "wann", "wer", "welche", "welcher", "welches", "what",
  "how", "why", "where", "when", "who", "which",
];

const SOURCES_MARKER: &str = "sources";
const DOCUMENT_EXTENSIONS: &[&str] = &["pdf", "docx", "doc", "txt", "md"];

/// `true` if `query` should be treated as a follow-up to the prior turn.
pub fn is_follow_up(query: &str) -> bool {
  let trimmed = query.trim();
  let word_count = trimmed.split_whitespace().count();

  if trimmed.chars().count() < 10 || word_count <= 2 {
    return true;
  }

  let lower = trimmed.to_lowercase();
  let starts_with_question_word = QUESTION_WORDS
    .iter()
    .any(|w| lower.starts_with(w) || lower.starts_with(&format!("{w} ")));
  if starts_with_question_word && trimmed.chars().count() > 20 {
    return false;
  }

  FOLLOW_UP_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

/// Weighted keyword extraction from the last `<= 3` messages: the i-th most
/// recent message (0-indexed from the end) is weighted `0.7^i`. Returns the
/// top 8 terms by weight.
pub fn extract_history_keywords(history: &[ChatHistoryEntry]) -> Vec<String> {
  let recent: Vec<&ChatHistoryEntry> = history.iter().rev().take(3).collect();
  let mut weights: Vec<(String, f32)> = Vec::new();

  for (i, entry) in recent.iter().enumerate() {
    let weight = 0.7f32.powi(i as i32);
    for token in tokenize_for_keywords(&entry.content) {
      if let Some(existing) = weights.iter_mut().find(|(t, _)| *t == token) {
        existing.1 += weight;
      } else {
        weights.push((token, weight));
      }
    }
  }

  weights.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
  weights.into_iter().take(8).map(|(t, _)| t).collect()
}

fn tokenize_for_keywords(text: &str) -> Vec<String> {
  let lower = text.to_lowercase();
  lower
    .split(|c: char| !c.is_alphanumeric())
    .filter(|t| t.chars().count() > 3)
    .filter(|t| !STOP_WORDS.contains(t))
    .filter(|t| !FOLLOW_UP_PHRASES.contains(t))
    .map(|t| t.to_string())
    .collect()
}

/// Scans the last `<= 3` assistant messages for a "Sources" section and
/// extracts up to 5 filenames with a known document extension, each
/// `<= 100` characters.
pub fn extract_document_references(history: &[ChatHistoryEntry]) -> Vec<String> {
  let assistant_messages: Vec<&ChatHistoryEntry> = history
    .iter()
    .rev()
    .filter(|e| e.role == ChatRole::Assistant)
    .take(3)
    .collect();

  let mut found: Vec<String> = Vec::new();
  let mut seen = HashSet::new();

  for entry in assistant_messages {
    let mut in_sources_section = false;
    for line in entry.content.lines() {
      if line.trim().to_lowercase().starts_with(SOURCES_MARKER) {
        in_sources_section = true;
        continue;
      }
      if !in_sources_section {
        continue;
      }
      for word in line.split(|c: char| c.is_whitespace() || c == ',' || c == ';') {
        let word = word.trim_matches(|c: char| !c.is_alphanumeric() && c != '.' && c != '_' && c != '-');
        if word.is_empty() || word.len() > 100 {
          continue;
        }
        if let Some(ext) = word.rsplit('.').next() {
          if DOCUMENT_EXTENSIONS.contains(&ext.to_lowercase().as_str()) && seen.insert(word.to_string()) {
            found.push(word.to_string());
          }
        }
      }
    }
    if found.len() >= 5 {
      break;
    }
  }

  found.truncate(5);
  found
}

/// Cosine similarity over equal-length vectors; `0.0` if either magnitude
/// is `0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
  let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
  let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
  let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
  if norm_a == 0.0 || norm_b == 0.0 {
    0.0
  } else {
    dot / (norm_a * norm_b)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn entry(role: ChatRole, content: &str) -> ChatHistoryEntry {
    ChatHistoryEntry {
      role,
      content: content.to_string(),
    }
  }

  #[test]
  fn short_queries_are_always_follow_up() {
    assert!(is_follow_up("more details"));
    assert!(is_follow_up("ok"));
  }

  #[test]
  fn long_question_word_queries_are_not_follow_up() {
    let query = "What is the difference between a container and a blob in this system exactly";
    assert!(!is_follow_up(query));
  }

  #[test]
  fn phrase_list_triggers_follow_up() {
    assert!(is_follow_up("could you give me more details about that topic please"));
  }

  #[test]
  fn extracts_weighted_keywords_most_recent_first() {
    let history = vec![
      entry(ChatRole::User, "tell me about containers"),
      entry(ChatRole::Assistant, "containers group blobs together"),
      entry(ChatRole::User, "what about encryption settings"),
    ];
    let keywords = extract_history_keywords(&history);
    assert!(keywords.contains(&"encryption".to_string()) || keywords.contains(&"settings".to_string()));
  }

  #[test]
  fn extracts_document_references_from_sources_section() {
    let history = vec![entry(
      ChatRole::Assistant,
      "Here is the answer.\nSources:\nnote.txt, report.pdf",
    )];
    let refs = extract_document_references(&history);
    assert!(refs.contains(&"note.txt".to_string()));
    assert!(refs.contains(&"report.pdf".to_string()));
  }

  #[test]
  fn cosine_similarity_of_zero_vector_is_zero() {
    assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
  }
}
