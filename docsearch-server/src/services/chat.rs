//! Chat Gateway: composes grounded prompts and calls the chat LLM.

use async_trait::async_trait;
use docsearch_ai::{AiAdapter, AiService, Message};
use docsearch_core::{BlobGateway, ChatGateway, ChatHistoryEntry, ChatRole, CoreError, SearchResult};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

const BLOB_FETCH_TIMEOUT: Duration = Duration::from_secs(12);
const MAX_HISTORY_MESSAGES: usize = 10;

const GROUNDED_SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions using ONLY the \
provided sources below. Cite the source you used (e.g. \"Source 1\"). If the sources do not contain the \
answer, say so plainly instead of guessing. Respond in the same language the user is using.";

const HISTORY_ONLY_SYSTEM_PROMPT: &str = "You are a helpful assistant. No document sources were retrieved \
for this question. Answer using ONLY the conversation history below; do not draw on general knowledge. If \
the history does not contain the answer, say so plainly.";

fn is_text_like(content_type: Option<&str>, blob_path: Option<&str>) -> bool {
  let text_extensions = ["txt", "md", "json", "xml", "csv", "log"];
  if let Some(ct) = content_type {
    if ct.starts_with("text/") || ct == "application/json" || ct == "application/xml" {
      return true;
    }
  }
  if let Some(path) = blob_path {
    if let Some(ext) = path.rsplit('.').next() {
      return text_extensions.contains(&ext.to_lowercase().as_str());
    }
  }
  false
}

pub struct LlmChatGateway {
  ai: Arc<AiAdapter>,
  blob: Arc<dyn BlobGateway>,
}

impl LlmChatGateway {
  pub fn new(ai: Arc<AiAdapter>, blob: Arc<dyn BlobGateway>) -> Self {
    Self { ai, blob }
  }

  /// Builds the context block: each result's content, plus the full text of
  /// any distinct blob worth expanding, fetched at most once per request.
  async fn build_context_block(&self, results: &[SearchResult]) -> String {
    let mut fetched: HashSet<String> = HashSet::new();
    let mut sections = Vec::new();

    for (i, result) in results.iter().enumerate() {
      let mut section = format!("Source {}: {}", i + 1, result.content);

      let expand_key = result
        .text_content_blob_path
        .clone()
        .or_else(|| {
          if is_text_like(result.content_type.as_deref(), result.blob_path.as_deref()) {
            result.blob_path.clone()
          } else {
            None
          }
        });

      if let Some(key) = expand_key {
        if fetched.insert(key.clone()) {
          match tokio::time::timeout(BLOB_FETCH_TIMEOUT, self.blob.download(&key)).await {
            Ok(Ok(bytes)) => {
              if let Ok(text) = String::from_utf8(bytes) {
                section.push_str(&format!("\nFull document text:\n{text}"));
              }
            }
            Ok(Err(err)) => {
              tracing::warn!(blob_key = %key, error = %err, "failed to fetch full document text for chat context");
            }
            Err(_) => {
              tracing::warn!(blob_key = %key, "timed out fetching full document text for chat context");
            }
          }
        }
      }

      sections.push(section);
    }

    sections.join("\n\n")
  }
}

#[async_trait]
impl ChatGateway for LlmChatGateway {
  async fn answer(&self, query: &str, results: &[SearchResult]) -> Result<String, CoreError> {
    let context = self.build_context_block(results).await;
    let messages = vec![
      Message::system(GROUNDED_SYSTEM_PROMPT),
      Message::user(format!("Sources:\n{context}\n\nQuestion: {query}")),
    ];
    self.ai.complete(&messages).await.map_err(CoreError::from)
  }

  async fn answer_with_history(
    &self,
    query: &str,
    results: &[SearchResult],
    history: &[ChatHistoryEntry],
  ) -> Result<String, CoreError> {
    let use_history_only_prompt = results.is_empty() && !history.is_empty();
    let system_prompt = if use_history_only_prompt {
      HISTORY_ONLY_SYSTEM_PROMPT
    } else {
      GROUNDED_SYSTEM_PROMPT
    };

    let mut messages = vec![Message::system(system_prompt)];

    for entry in history.iter().rev().take(MAX_HISTORY_MESSAGES).collect::<Vec<_>>().into_iter().rev() {
      messages.push(match entry.role {
        ChatRole::User => Message::user(entry.content.clone()),
        ChatRole::Assistant => Message::assistant(entry.content.clone()),
      });
    }

    if use_history_only_prompt {
      messages.push(Message::user(query.to_string()));
    } else {
      let context = self.build_context_block(results).await;
      messages.push(Message::user(format!("Sources:\n{context}\n\nQuestion: {query}")));
    }

    self.ai.complete(&messages).await.map_err(CoreError::from)
  }

  async fn expand_query(&self, query: &str, history: &[ChatHistoryEntry]) -> Result<String, CoreError> {
    if history.is_empty() {
      return Ok(query.to_string());
    }

    let mut messages = vec![Message::system(
      "Reformulate the user's latest question into a standalone search query, using the conversation \
      history for context. Reply with ONLY the reformulated query, nothing else.",
    )];
    for entry in history.iter().rev().take(MAX_HISTORY_MESSAGES).collect::<Vec<_>>().into_iter().rev() {
      messages.push(match entry.role {
        ChatRole::User => Message::user(entry.content.clone()),
        ChatRole::Assistant => Message::assistant(entry.content.clone()),
      });
    }
    messages.push(Message::user(query.to_string()));

    let expanded = self.ai.complete(&messages).await.map_err(CoreError::from)?;
    let expanded = expanded.trim().to_string();
    if expanded.is_empty() {
      Ok(query.to_string())
    } else {
      Ok(expanded)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn recognizes_text_like_content() {
    assert!(is_text_like(Some("text/plain"), None));
    assert!(is_text_like(None, Some("notes.md")));
    assert!(!is_text_like(Some("application/pdf"), Some("report.pdf")));
  }
}
