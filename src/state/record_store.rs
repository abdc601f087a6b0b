use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::discord::DiscordIdentity;
use crate::error::{Result, VerifyError};

/// A single successful verification, keyed by Discord user id. Re-verifying
/// replaces the whole record (last write wins); records are never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationRecord {
    /// Discord user ID (snowflake as string)
    pub user_id: String,

    pub username: String,

    pub discriminator: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    /// Whether Discord reports the account email as verified
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,

    pub recorded_at: DateTime<Utc>,
}

impl VerificationRecord {
    pub fn from_identity(identity: &DiscordIdentity, recorded_at: DateTime<Utc>) -> Self {
        Self {
            user_id: identity.id.clone(),
            username: identity.username.clone(),
            discriminator: identity.discriminator.clone(),
            avatar: identity.avatar.clone(),
            email: identity.email.clone(),
            locale: identity.locale.clone(),
            email_verified: identity.verified,
            recorded_at,
        }
    }
}

/// All verification records, persisted as one JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordStore {
    /// Schema version for migrations
    pub version: u32,

    /// Last update timestamp
    pub last_updated: DateTime<Utc>,

    /// Map of Discord ID (as string) to verification record
    pub records: HashMap<String, VerificationRecord>,
}

impl Default for RecordStore {
    fn default() -> Self {
        Self {
            version: 1,
            last_updated: Utc::now(),
            records: HashMap::new(),
        }
    }
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file, or start empty if the file does not exist yet.
    pub async fn load(path: &str) -> Result<Self> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                serde_json::from_str(&content).map_err(|e| VerifyError::StateParse {
                    path: path.to_string(),
                    source: e,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(e) => Err(VerifyError::StateLoad {
                path: path.to_string(),
                source: e,
            }),
        }
    }

    /// Save to a JSON file atomically (temp file, then rename).
    pub async fn save(&self, path: &str) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).map_err(|e| VerifyError::PersistenceFailed {
                detail: e.to_string(),
            })?;

        let temp_path = format!("{}.tmp", path);
        tokio::fs::write(&temp_path, &content)
            .await
            .map_err(|e| VerifyError::StateSave {
                path: path.to_string(),
                source: e,
            })?;

        tokio::fs::rename(&temp_path, path)
            .await
            .map_err(|e| VerifyError::StateSave {
                path: path.to_string(),
                source: e,
            })?;

        Ok(())
    }

    /// Insert or replace the record for its user id.
    pub fn put(&mut self, record: VerificationRecord) {
        self.records.insert(record.user_id.clone(), record);
        self.last_updated = Utc::now();
    }

    pub fn get(&self, user_id: &str) -> Option<&VerificationRecord> {
        self.records.get(user_id)
    }

    pub fn is_verified(&self, user_id: &str) -> bool {
        self.records.contains_key(user_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Shared record store type
pub type SharedRecordStore = Arc<tokio::sync::RwLock<RecordStore>>;

pub fn create_shared_record_store(store: RecordStore) -> SharedRecordStore {
    Arc::new(tokio::sync::RwLock::new(store))
}
