use std::collections::HashSet;

use tokio::sync::Mutex;

/// Errors from store mutations and input parsing.
///
/// Validation errors (`EmptyKeyword`, `InvalidChatId`) and not-found errors
/// are distinct so callers can map them to different replies (400 vs 404 on
/// the API, different usage messages in chat commands).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Keyword cannot be empty")]
    EmptyKeyword,

    #[error("Keyword not found")]
    KeywordNotFound,

    #[error("Invalid Chat ID format: '{0}'")]
    InvalidChatId(String),

    #[error("Chat not found")]
    ChatNotFound,
}

/// Trim and lowercase a raw keyword. Returns `None` if nothing is left.
pub fn normalize_keyword(raw: &str) -> Option<String> {
    let keyword = raw.trim().to_lowercase();
    if keyword.is_empty() {
        None
    } else {
        Some(keyword)
    }
}

/// Parse a chat id from user-supplied text (command argument or API string).
pub fn parse_chat_id(raw: &str) -> Result<i64, StoreError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| StoreError::InvalidChatId(raw.trim().to_string()))
}

/// The set of keywords that trigger a match.
///
/// Every stored keyword is non-empty and already lowercased, so the match
/// scan never has to normalize twice and an empty keyword can never match
/// every message.
pub struct KeywordStore {
    inner: Mutex<HashSet<String>>,
}

impl KeywordStore {
    /// Create a store seeded with the given keywords. Seeds go through the
    /// same normalization as runtime adds; empty ones are dropped.
    pub fn new<I, S>(seed: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let inner = seed
            .into_iter()
            .filter_map(|raw| normalize_keyword(raw.as_ref()))
            .collect();
        Self {
            inner: Mutex::new(inner),
        }
    }

    /// Add a keyword. Re-adding an existing keyword is a no-op success.
    /// Returns the normalized form that was stored.
    pub async fn add(&self, raw: &str) -> Result<String, StoreError> {
        let keyword = normalize_keyword(raw).ok_or(StoreError::EmptyKeyword)?;
        self.inner.lock().await.insert(keyword.clone());
        Ok(keyword)
    }

    /// Remove a keyword. Removing an absent keyword reports not-found.
    pub async fn remove(&self, raw: &str) -> Result<String, StoreError> {
        let keyword = normalize_keyword(raw).ok_or(StoreError::EmptyKeyword)?;
        if self.inner.lock().await.remove(&keyword) {
            Ok(keyword)
        } else {
            Err(StoreError::KeywordNotFound)
        }
    }

    /// Copy of the current keyword set. No ordering guarantee.
    pub async fn snapshot(&self) -> HashSet<String> {
        self.inner.lock().await.clone()
    }
}

/// The set of chat ids being monitored. Membership is the sole predicate
/// for "is this chat scanned".
pub struct ChatRegistry {
    inner: Mutex<HashSet<i64>>,
}

impl ChatRegistry {
    pub fn new<I>(seed: I) -> Self
    where
        I: IntoIterator<Item = i64>,
    {
        Self {
            inner: Mutex::new(seed.into_iter().collect()),
        }
    }

    /// Add a chat id. Re-adding is a no-op success.
    pub async fn add(&self, chat_id: i64) -> i64 {
        self.inner.lock().await.insert(chat_id);
        chat_id
    }

    /// Remove a chat id. Removing an absent chat reports not-found.
    pub async fn remove(&self, chat_id: i64) -> Result<i64, StoreError> {
        if self.inner.lock().await.remove(&chat_id) {
            Ok(chat_id)
        } else {
            Err(StoreError::ChatNotFound)
        }
    }

    pub async fn contains(&self, chat_id: i64) -> bool {
        self.inner.lock().await.contains(&chat_id)
    }

    /// Copy of the current chat set. No ordering guarantee.
    pub async fn snapshot(&self) -> HashSet<i64> {
        self.inner.lock().await.clone()
    }
}
