//! Typed access to the persisted session.

use crate::{SessionStorage, StorageError, StorageKeys, StorageResult};
use serde::{Deserialize, Serialize};

/// A session is treated as expired when fewer than this many seconds remain.
pub const EXPIRY_MARGIN_SECS: i64 = 60;

/// Session metadata stored next to the tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMeta {
    /// User ID from Supabase Auth
    pub user_id: String,
    /// User email from Supabase Auth
    #[serde(default)]
    pub email: Option<String>,
    /// When the access token expires (RFC 3339)
    pub expires_at: String,
    /// Serialized identity record, so a restored session has a full user
    #[serde(default)]
    pub user_json: Option<String>,
}

/// High-level API over a [`SessionStorage`] backend.
pub struct SessionVault {
    storage: Box<dyn SessionStorage>,
}

impl SessionVault {
    pub fn new(storage: Box<dyn SessionStorage>) -> Self {
        Self { storage }
    }

    pub fn access_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::ACCESS_TOKEN)
    }

    pub fn refresh_token(&self) -> StorageResult<Option<String>> {
        self.storage.get(StorageKeys::REFRESH_TOKEN)
    }

    pub fn meta(&self) -> StorageResult<Option<SessionMeta>> {
        match self.storage.get(StorageKeys::SESSION_META)? {
            Some(json) => {
                let meta = serde_json::from_str(&json)
                    .map_err(|e| StorageError::Encoding(e.to_string()))?;
                Ok(Some(meta))
            }
            None => Ok(None),
        }
    }

    /// Store a complete session (tokens + metadata).
    pub fn store(
        &self,
        access_token: &str,
        refresh_token: &str,
        meta: &SessionMeta,
    ) -> StorageResult<()> {
        let json =
            serde_json::to_string(meta).map_err(|e| StorageError::Encoding(e.to_string()))?;
        self.storage.set(StorageKeys::ACCESS_TOKEN, access_token)?;
        self.storage.set(StorageKeys::REFRESH_TOKEN, refresh_token)?;
        self.storage.set(StorageKeys::SESSION_META, &json)?;
        Ok(())
    }

    /// Access token and metadata are both present.
    pub fn has_session(&self) -> StorageResult<bool> {
        let has_token = self.storage.has(StorageKeys::ACCESS_TOKEN)?;
        let has_meta = self.storage.has(StorageKeys::SESSION_META)?;
        Ok(has_token && has_meta)
    }

    /// Expired, about to expire, or absent.
    pub fn is_expired(&self) -> StorageResult<bool> {
        match self.meta()? {
            Some(meta) => {
                let expires_at = chrono::DateTime::parse_from_rfc3339(&meta.expires_at)
                    .map_err(|e| StorageError::Encoding(e.to_string()))?;
                let remaining = expires_at.signed_duration_since(chrono::Utc::now());
                Ok(remaining.num_seconds() < EXPIRY_MARGIN_SECS)
            }
            None => Ok(true),
        }
    }

    /// Remove every session key. Individual delete failures are ignored.
    pub fn clear(&self) {
        let _ = self.storage.delete(StorageKeys::ACCESS_TOKEN);
        let _ = self.storage.delete(StorageKeys::REFRESH_TOKEN);
        let _ = self.storage.delete(StorageKeys::SESSION_META);
    }
}
