//! Mint/verify short-lived, document-scoped download tokens.

use crate::error::CoreError;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

const TOKEN_ISSUER: &str = "docsearch-download";
const TOKEN_AUDIENCE: &str = "docsearch-client";
const LEEWAY_SECS: u64 = 5;

#[derive(Debug, Serialize, Deserialize)]
struct Claims {
  sub: String, // document id
  exp: usize,
  iat: usize,
  aud: String,
  iss: String,
}

/// Mints and verifies tokens bound to a single `documentId`.
#[derive(Clone)]
pub struct DownloadTokenManager {
  encoding_key: EncodingKey,
  decoding_key: DecodingKey,
  validation: Validation,
}

impl std::fmt::Debug for DownloadTokenManager {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("DownloadTokenManager").finish_non_exhaustive()
  }
}

impl DownloadTokenManager {
  pub fn from_secret(secret: &str) -> Self {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = LEEWAY_SECS;
    validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
    validation.validate_aud = true;
    validation.set_audience(&[TOKEN_AUDIENCE]);
    validation.set_issuer(&[TOKEN_ISSUER]);

    Self {
      encoding_key: EncodingKey::from_secret(secret.as_bytes()),
      decoding_key: DecodingKey::from_secret(secret.as_bytes()),
      validation,
    }
  }

  /// Mints a token for `document_id`, valid for `expiration_minutes` (the
  /// caller is responsible for enforcing the `[1, 60]` range).
  pub fn mint(&self, document_id: &str, expiration_minutes: u32) -> Result<(String, DateTime<Utc>), CoreError> {
    let now = Utc::now();
    let expires_at = now + Duration::minutes(expiration_minutes as i64);
    let claims = Claims {
      sub: document_id.to_string(),
      exp: expires_at.timestamp() as usize,
      iat: now.timestamp() as usize,
      aud: TOKEN_AUDIENCE.to_string(),
      iss: TOKEN_ISSUER.to_string(),
    };
    let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
      .map_err(|e| CoreError::Internal(format!("failed to mint download token: {e}")))?;
    Ok((token, expires_at))
  }

  /// Verifies `token` and returns the bound `documentId`.
  ///
  /// `CoreError::NotFound` signals an expired token (the HTTP layer maps it
  /// to 410); any other validation failure maps to 401.
  pub fn verify(&self, token: &str) -> Result<String, CoreError> {
    let data = decode::<Claims>(token, &self.decoding_key, &self.validation)?;
    Ok(data.claims.sub)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn mints_and_verifies_round_trip() {
    let mgr = DownloadTokenManager::from_secret("test-secret");
    let (token, _expires_at) = mgr.mint("doc-a", 5).unwrap();
    let document_id = mgr.verify(&token).unwrap();
    assert_eq!(document_id, "doc-a");
  }

  #[test]
  fn rejects_token_signed_with_a_different_secret() {
    let mgr_a = DownloadTokenManager::from_secret("secret-a");
    let mgr_b = DownloadTokenManager::from_secret("secret-b");
    let (token, _) = mgr_a.mint("doc-a", 5).unwrap();
    assert!(mgr_b.verify(&token).is_err());
  }
}
