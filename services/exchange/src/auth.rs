//! API-key authentication
//!
//! Trader endpoints authenticate with `X-API-Key`. Keys are opaque
//! `sk_`-prefixed random strings; only their SHA-256 hex digest is stored.
//! A warm cache maps digest → account id so steady-state auth never scans
//! the account table. Admin endpoints check `X-Admin-Token` against the
//! configured token.

use crate::error::ApiError;
use crate::state::AppState;
use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use dashmap::DashMap;
use rand::RngCore;
use sha2::{Digest, Sha256};
use types::ids::AccountId;

/// Generate a fresh API key: `sk_` + 64 hex chars (32 random bytes)
pub fn generate_api_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("sk_{}", hex(&bytes))
}

/// SHA-256 hex digest of an API key, as stored at rest
pub fn hash_api_key(api_key: &str) -> String {
    let digest = Sha256::digest(api_key.as_bytes());
    hex(&digest)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Warm cache: key digest → account id
#[derive(Default)]
pub struct AuthCache {
    by_hash: DashMap<String, AccountId>,
}

impl AuthCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key_hash: &str) -> Option<AccountId> {
        self.by_hash.get(key_hash).map(|e| e.value().clone())
    }

    pub fn put(&self, key_hash: String, account_id: AccountId) {
        self.by_hash.insert(key_hash, account_id);
    }
}

/// Extractor for authenticated trader requests
pub struct AuthenticatedAccount {
    pub account_id: AccountId,
}

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedAccount {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let api_key = parts
            .headers
            .get("X-API-Key")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing API key".into()))?;

        let key_hash = hash_api_key(api_key);

        if let Some(account_id) = state.auth.get(&key_hash) {
            return Ok(AuthenticatedAccount { account_id });
        }

        let account_id = state
            .store
            .read(|tables| {
                tables
                    .accounts
                    .values()
                    .find(|a| !a.api_key_hash.is_empty() && a.api_key_hash == key_hash)
                    .map(|a| a.id.clone())
            })
            .ok_or_else(|| ApiError::Unauthorized("Invalid API key".into()))?;

        state.auth.put(key_hash, account_id.clone());
        Ok(AuthenticatedAccount { account_id })
    }
}

/// Extractor for admin requests
pub struct AdminAccess;

#[async_trait]
impl FromRequestParts<AppState> for AdminAccess {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("X-Admin-Token")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing admin token".into()))?;

        if token != state.config.admin_token {
            return Err(ApiError::Unauthorized("Invalid admin token".into()));
        }
        Ok(AdminAccess)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_keys_are_unique_and_prefixed() {
        let k1 = generate_api_key();
        let k2 = generate_api_key();
        assert_ne!(k1, k2);
        assert!(k1.starts_with("sk_"));
        assert_eq!(k1.len(), 3 + 64);
    }

    #[test]
    fn test_hash_is_deterministic() {
        let key = "sk_test";
        assert_eq!(hash_api_key(key), hash_api_key(key));
        assert_ne!(hash_api_key(key), hash_api_key("sk_other"));
        assert_eq!(hash_api_key(key).len(), 64);
    }

    #[test]
    fn test_cache_roundtrip() {
        let cache = AuthCache::new();
        let hash = hash_api_key("sk_test");
        assert!(cache.get(&hash).is_none());

        cache.put(hash.clone(), AccountId::new("alice"));
        assert_eq!(cache.get(&hash), Some(AccountId::new("alice")));
    }
}
