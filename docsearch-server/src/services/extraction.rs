//! Text extraction from an uploaded file. Native text formats are decoded
//! directly; everything else gets a best-effort lossy decode and is flagged
//! as non-native so the ingest pipeline persists its extracted text
//! separately from the original bytes.

const NATIVE_TEXT_EXTENSIONS: &[&str] = &["txt", "md", "csv", "json", "xml", "log"];

pub struct ExtractedText {
  pub text: String,
  pub is_native_text: bool,
}

pub fn extract(bytes: &[u8], content_type: &str, file_name: &str) -> ExtractedText {
  let is_native_text = content_type.starts_with("text/")
    || content_type == "application/json"
    || content_type == "application/xml"
    || file_name
      .rsplit('.')
      .next()
      .map(|ext| NATIVE_TEXT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
      .unwrap_or(false);

  ExtractedText {
    text: String::from_utf8_lossy(bytes).into_owned(),
    is_native_text,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn plain_text_is_native() {
    let result = extract(b"hello", "text/plain", "notes.txt");
    assert!(result.is_native_text);
    assert_eq!(result.text, "hello");
  }

  #[test]
  fn pdf_is_non_native() {
    let result = extract(b"%PDF-1.4 ...", "application/pdf", "report.pdf");
    assert!(!result.is_native_text);
  }
}
