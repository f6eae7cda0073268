//! Splits extracted document text into overlapping, sentence-aware chunks.

/// Splits `text` into chunks of at most `chunk_size` characters, each
/// overlapping the previous by `chunk_overlap` characters. Splits are
/// preferred at sentence boundaries (`.`, `!`, `?`) inside the window;
/// falls back to a hard cut when no boundary is found.
pub fn chunk_text(text: &str, chunk_size: usize, chunk_overlap: usize) -> Vec<String> {
  let chars: Vec<char> = text.chars().collect();
  if chars.is_empty() {
    return Vec::new();
  }
  let chunk_size = chunk_size.max(1);
  let chunk_overlap = chunk_overlap.min(chunk_size.saturating_sub(1));

  let mut chunks = Vec::new();
  let mut start = 0usize;

  while start < chars.len() {
    let mut end = (start + chunk_size).min(chars.len());

    if end < chars.len() {
      if let Some(boundary) = find_sentence_boundary(&chars[start..end]) {
        end = start + boundary;
      }
    }

    let chunk: String = chars[start..end].iter().collect();
    let trimmed = chunk.trim();
    if !trimmed.is_empty() {
      chunks.push(trimmed.to_string());
    }

    if end >= chars.len() {
      break;
    }
    start = end.saturating_sub(chunk_overlap).max(start + 1);
  }

  chunks
}

/// Finds the last sentence-ending punctuation within `window`, searching
/// from the end, and returns the index just past it. `None` if no sentence
/// boundary is found past the midpoint (to avoid pathologically tiny chunks).
fn find_sentence_boundary(window: &[char]) -> Option<usize> {
  let min_acceptable = window.len() / 2;
  for i in (min_acceptable..window.len()).rev() {
    if matches!(window[i], '.' | '!' | '?') {
      return Some(i + 1);
    }
  }
  None
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn single_sentence_under_chunk_size_is_one_chunk() {
    let text = "Azure Blob stores files. Containers group blobs. Keys are unique.";
    let chunks = chunk_text(text, 1000, 0);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0], text);
  }

  #[test]
  fn long_text_is_split_with_overlap() {
    let text = "a".repeat(50) + ". " + &"b".repeat(50) + ". " + &"c".repeat(50) + ".";
    let chunks = chunk_text(&text, 60, 10);
    assert!(chunks.len() > 1);
    for w in chunks.windows(2) {
      assert!(!w[0].is_empty() && !w[1].is_empty());
    }
  }

  #[test]
  fn empty_text_yields_no_chunks() {
    assert!(chunk_text("", 300, 20).is_empty());
  }
}
