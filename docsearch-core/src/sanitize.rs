//! Filename sanitization for blob object keys: fold known ligatures to
//! their ASCII expansion, then strip anything hostile to a filesystem path.

/// Replaces German ligatures with their ASCII expansion before the
/// character-class strip below, so `"Übersicht.pdf"` becomes
/// `"Uebersicht.pdf"` rather than `"bersicht.pdf"`.
fn fold_ligatures(input: &str) -> String {
  input
    .replace('ä', "ae")
    .replace('ö', "oe")
    .replace('ü', "ue")
    .replace('ß', "ss")
    .replace('Ä', "Ae")
    .replace('Ö', "Oe")
    .replace('Ü', "Ue")
}

/// Produces a filesystem- and URL-safe filename: ASCII letters, digits,
/// `.`, `_` and `-` are kept verbatim; anything else becomes `_`. The
/// original, unsanitized name is always preserved separately in blob
/// metadata (base64-encoded) so it round-trips for the end user.
pub fn sanitize_filename(original: &str) -> String {
  let folded = fold_ligatures(original);
  let sanitized: String = folded
    .chars()
    .map(|c| {
      if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
        c
      } else {
        '_'
      }
    })
    .collect();

  if sanitized.trim_matches('_').is_empty() {
    "file".to_string()
  } else {
    sanitized
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn folds_german_ligatures() {
    assert_eq!(sanitize_filename("Übersicht.pdf"), "Uebersicht.pdf");
    assert_eq!(sanitize_filename("straße.txt"), "strasse.txt");
  }

  #[test]
  fn strips_hostile_characters() {
    assert_eq!(sanitize_filename("a/b\\c:d.txt"), "a_b_c_d.txt");
  }

  #[test]
  fn never_returns_empty() {
    assert_eq!(sanitize_filename("???"), "file");
  }
}
