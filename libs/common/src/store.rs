//! Per-user conversation and mood history storage
//!
//! The store is an append/read-all key-value abstraction keyed by username.
//! `JsonFileStore` keeps one pretty-printed JSON array per user and per log,
//! rewriting the whole file on every append. There is no locking: concurrent
//! writers for the same user may lose entries.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::StoreResult;

/// One chat exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub user: String,
    pub bot: String,
    pub timestamp: DateTime<Utc>,
}

/// One processed video frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodEntry {
    pub mood: String,
    pub timestamp: DateTime<Utc>,
}

/// Append-only per-user logs
///
/// Every operation takes an optional identity. Writes without an identity are
/// silently dropped and reads without one return nothing.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Append one exchange to the user's conversation log
    async fn append(&self, identity: Option<&str>, user_text: &str, bot_text: &str)
    -> StoreResult<()>;

    /// Append one mood reading to the user's mood log
    async fn append_mood(&self, identity: Option<&str>, mood: &str) -> StoreResult<()>;

    /// Full conversation log in append order
    async fn read_all(&self, identity: Option<&str>) -> Vec<ConversationEntry>;

    /// Full mood log in append order
    async fn read_moods(&self, identity: Option<&str>) -> Vec<MoodEntry>;
}

/// Reduce a username to a safe file name component
///
/// Keeps ASCII letters, digits, `_`, `.` and `-`; runs of whitespace and path
/// separators become a single `_`; leading and trailing `.`/`_` are dropped.
/// The result may be empty.
pub fn sanitize_file_name(name: &str) -> String {
    static UNSAFE_CHARS: OnceLock<Regex> = OnceLock::new();
    let unsafe_chars = UNSAFE_CHARS
        .get_or_init(|| Regex::new(r"[^A-Za-z0-9_.-]").expect("Failed to compile file name regex"));

    let joined = name
        .replace(['/', '\\'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_");

    unsafe_chars
        .replace_all(&joined, "")
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// Flat-file store rooted at a data directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    conversations_dir: PathBuf,
    mood_history_dir: PathBuf,
}

impl JsonFileStore {
    /// Create the store and its directory layout under `data_dir`
    pub async fn open(data_dir: impl AsRef<Path>) -> StoreResult<Self> {
        let data_dir = data_dir.as_ref();
        let conversations_dir = data_dir.join("conversations");
        let mood_history_dir = data_dir.join("mood_history");

        tokio::fs::create_dir_all(&conversations_dir).await?;
        tokio::fs::create_dir_all(&mood_history_dir).await?;

        Ok(Self {
            conversations_dir,
            mood_history_dir,
        })
    }

    /// Conversation log location for a user
    pub fn conversation_file(&self, username: &str) -> PathBuf {
        self.conversations_dir
            .join(format!("{}_conversation.json", sanitize_file_name(username)))
    }

    /// Mood log location for a user
    pub fn mood_history_file(&self, username: &str) -> PathBuf {
        self.mood_history_dir
            .join(format!("{}_mood_history.json", sanitize_file_name(username)))
    }
}

/// Read a JSON array, treating a missing, unreadable or corrupt file as empty
async fn read_records<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let raw = match tokio::fs::read(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!("Unreadable history file {}: {}", path.display(), e);
            return Vec::new();
        }
    };

    match serde_json::from_slice(&raw) {
        Ok(records) => records,
        Err(e) => {
            warn!("Corrupt history file {}, treating as empty: {}", path.display(), e);
            Vec::new()
        }
    }
}

async fn append_record<T: Serialize + DeserializeOwned>(path: &Path, record: T) -> StoreResult<()> {
    let mut records: Vec<T> = read_records(path).await;
    records.push(record);

    let body = serde_json::to_vec_pretty(&records)?;
    tokio::fs::write(path, body).await?;

    debug!("Wrote {} records to {}", records.len(), path.display());
    Ok(())
}

#[async_trait]
impl ConversationStore for JsonFileStore {
    async fn append(
        &self,
        identity: Option<&str>,
        user_text: &str,
        bot_text: &str,
    ) -> StoreResult<()> {
        let Some(username) = identity else {
            return Ok(());
        };

        let entry = ConversationEntry {
            user: user_text.to_string(),
            bot: bot_text.to_string(),
            timestamp: Utc::now(),
        };
        append_record(&self.conversation_file(username), entry).await
    }

    async fn append_mood(&self, identity: Option<&str>, mood: &str) -> StoreResult<()> {
        let Some(username) = identity else {
            return Ok(());
        };

        let entry = MoodEntry {
            mood: mood.to_string(),
            timestamp: Utc::now(),
        };
        append_record(&self.mood_history_file(username), entry).await
    }

    async fn read_all(&self, identity: Option<&str>) -> Vec<ConversationEntry> {
        match identity {
            Some(username) => read_records(&self.conversation_file(username)).await,
            None => Vec::new(),
        }
    }

    async fn read_moods(&self, identity: Option<&str>) -> Vec<MoodEntry> {
        match identity {
            Some(username) => read_records(&self.mood_history_file(username)).await,
            None => Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct UserLogs {
    conversation: Vec<ConversationEntry>,
    moods: Vec<MoodEntry>,
}

/// In-process store, keyed by the same sanitized names as `JsonFileStore`
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    logs: Arc<Mutex<HashMap<String, UserLogs>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn append(
        &self,
        identity: Option<&str>,
        user_text: &str,
        bot_text: &str,
    ) -> StoreResult<()> {
        if let Some(username) = identity {
            let mut logs = self.logs.lock().await;
            logs.entry(sanitize_file_name(username))
                .or_default()
                .conversation
                .push(ConversationEntry {
                    user: user_text.to_string(),
                    bot: bot_text.to_string(),
                    timestamp: Utc::now(),
                });
        }
        Ok(())
    }

    async fn append_mood(&self, identity: Option<&str>, mood: &str) -> StoreResult<()> {
        if let Some(username) = identity {
            let mut logs = self.logs.lock().await;
            logs.entry(sanitize_file_name(username))
                .or_default()
                .moods
                .push(MoodEntry {
                    mood: mood.to_string(),
                    timestamp: Utc::now(),
                });
        }
        Ok(())
    }

    async fn read_all(&self, identity: Option<&str>) -> Vec<ConversationEntry> {
        let Some(username) = identity else {
            return Vec::new();
        };
        let logs = self.logs.lock().await;
        logs.get(&sanitize_file_name(username))
            .map(|user| user.conversation.clone())
            .unwrap_or_default()
    }

    async fn read_moods(&self, identity: Option<&str>) -> Vec<MoodEntry> {
        let Some(username) = identity else {
            return Vec::new();
        };
        let logs = self.logs.lock().await;
        logs.get(&sanitize_file_name(username))
            .map(|user| user.moods.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("alice"), "alice");
        assert_eq!(sanitize_file_name("john doe"), "john_doe");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "etc_passwd");
        assert_eq!(sanitize_file_name("  .hidden_ "), "hidden");
        assert_eq!(sanitize_file_name("émile"), "mile");
        assert_eq!(sanitize_file_name("///"), "");
    }

    #[tokio::test]
    async fn test_append_then_read_all_preserves_order() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let store = JsonFileStore::open(dir.path()).await?;

        for i in 0..5 {
            store
                .append(Some("alice"), &format!("hello {i}"), &format!("reply {i}"))
                .await?;
        }

        let entries = store.read_all(Some("alice")).await;
        assert_eq!(entries.len(), 5);
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.user, format!("hello {i}"));
            assert_eq!(entry.bot, format!("reply {i}"));
        }
        assert!(entries.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
        assert!(store.conversation_file("alice").exists());
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_identity_is_a_no_op() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let store = JsonFileStore::open(dir.path()).await?;

        store.append(None, "hi", "hello").await?;
        store.append_mood(None, "happy").await?;

        assert!(store.read_all(None).await.is_empty());
        assert!(store.read_moods(None).await.is_empty());
        assert_eq!(std::fs::read_dir(dir.path().join("conversations"))?.count(), 0);
        assert_eq!(std::fs::read_dir(dir.path().join("mood_history"))?.count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_corrupt_file_reads_as_empty_and_is_replaced() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let store = JsonFileStore::open(dir.path()).await?;
        std::fs::write(store.mood_history_file("bob"), b"{not json")?;

        assert!(store.read_moods(Some("bob")).await.is_empty());

        store.append_mood(Some("bob"), "sad").await?;
        let moods = store.read_moods(Some("bob")).await;
        assert_eq!(moods.len(), 1);
        assert_eq!(moods[0].mood, "sad");
        Ok(())
    }

    #[tokio::test]
    async fn test_users_have_separate_logs() -> anyhow::Result<()> {
        let dir = TempDir::new()?;
        let store = JsonFileStore::open(dir.path()).await?;

        store.append_mood(Some("alice"), "happy").await?;
        store.append_mood(Some("bob"), "angry").await?;
        store.append_mood(Some("bob"), "neutral").await?;

        assert_eq!(store.read_moods(Some("alice")).await.len(), 1);
        let bob: Vec<_> = store
            .read_moods(Some("bob"))
            .await
            .into_iter()
            .map(|entry| entry.mood)
            .collect();
        assert_eq!(bob, vec!["angry", "neutral"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_memory_store_round_trip() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        store.append(Some("carol"), "one", "uno").await?;
        store.append(Some("carol"), "two", "dos").await?;
        store.append(None, "lost", "lost").await?;

        let entries = store.read_all(Some("carol")).await;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].bot, "dos");
        assert!(store.read_moods(Some("carol")).await.is_empty());
        Ok(())
    }
}
