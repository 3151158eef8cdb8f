use crate::broadcast::{Broadcaster, Event};
use crate::config::Config;
use crate::matcher::{self, IncomingMessage, MatchEvent};
use crate::store::{ChatRegistry, KeywordStore, StoreError};

/// Shared application state: the two stores, the subscriber broadcaster,
/// and the loaded configuration. One instance lives behind an `Arc` and is
/// handed to the bot dispatcher and the control API.
///
/// All mutations go through the wrappers below so that every successful
/// store change is followed by exactly one snapshot broadcast, as its last
/// step. Nothing else mutates the stores.
pub struct AppState {
    pub config: Config,
    keywords: KeywordStore,
    chats: ChatRegistry,
    pub events: Broadcaster,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let keywords = KeywordStore::new(&config.monitor.keywords);
        let chats = ChatRegistry::new(config.monitor.chats.iter().copied());
        Self {
            config,
            keywords,
            chats,
            events: Broadcaster::new(),
        }
    }

    /// Current keyword set, for list endpoints and commands.
    pub async fn keywords(&self) -> Vec<String> {
        self.keywords.snapshot().await.into_iter().collect()
    }

    /// Current chat set, for list endpoints and commands.
    pub async fn chats(&self) -> Vec<i64> {
        self.chats.snapshot().await.into_iter().collect()
    }

    pub async fn add_keyword(&self, raw: &str) -> Result<String, StoreError> {
        let keyword = self.keywords.add(raw).await?;
        self.broadcast_keywords().await;
        Ok(keyword)
    }

    pub async fn remove_keyword(&self, raw: &str) -> Result<String, StoreError> {
        let keyword = self.keywords.remove(raw).await?;
        self.broadcast_keywords().await;
        Ok(keyword)
    }

    pub async fn add_chat(&self, chat_id: i64) -> i64 {
        let chat_id = self.chats.add(chat_id).await;
        self.broadcast_chats().await;
        chat_id
    }

    pub async fn remove_chat(&self, chat_id: i64) -> Result<i64, StoreError> {
        let chat_id = self.chats.remove(chat_id).await?;
        self.broadcast_chats().await;
        Ok(chat_id)
    }

    /// Run the match pipeline's read side: messages from unmonitored chats
    /// are discarded before any text work, everything else goes through the
    /// keyword scan against the current snapshot.
    pub async fn scan(&self, msg: &IncomingMessage) -> Option<MatchEvent> {
        if !self.chats.contains(msg.chat_id).await {
            return None;
        }
        let keywords = self.keywords.snapshot().await;
        matcher::find_match(msg, &keywords)
    }

    async fn broadcast_keywords(&self) {
        let snapshot = self.keywords.snapshot().await;
        self.events.broadcast(&Event::keywords(snapshot)).await;
    }

    async fn broadcast_chats(&self) {
        let snapshot = self.chats.snapshot().await;
        self.events.broadcast(&Event::chats(snapshot)).await;
    }
}
