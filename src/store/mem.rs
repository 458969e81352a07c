//! In-memory storage (for use in testing)
use super::{Result, Store, StoreErr};
use crate::message::{timestamp_now, ChatMessage, DEFAULT_COLOR};

use hashbrown::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
pub struct MemStore {
    inner: Mutex<Tables>,
    failing: AtomicBool,
}

#[derive(Debug, Default)]
struct Tables {
    messages: Vec<StoredMessage>,
    users: HashMap<String, String>,
}

#[derive(Debug)]
struct StoredMessage {
    id: i64,
    content: String,
    pod: String,
    nickname: String,
    time: String,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following call fail, as if the database went away
    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn message_count(&self) -> usize {
        self.tables().messages.len()
    }

    fn tables(&self) -> MutexGuard<Tables> {
        self.inner
            .lock()
            .unwrap_or_else(|poisoned: PoisonError<_>| poisoned.into_inner())
    }

    fn check(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(StoreErr::Unavailable("MemStore set to fail".to_string()))
        } else {
            Ok(())
        }
    }
}

impl Store for MemStore {
    fn append_message(&self, content: &str, pod: &str, nickname: &str) -> Result<i64> {
        self.check()?;
        let mut tables = self.tables();
        let id = tables.messages.last().map_or(1, |msg| msg.id + 1);
        tables.messages.push(StoredMessage {
            id,
            content: content.to_string(),
            pod: pod.to_string(),
            nickname: nickname.to_string(),
            time: timestamp_now(),
        });
        Ok(id)
    }

    fn upsert_user_color(&self, nickname: &str, color: &str) -> Result<()> {
        self.check()?;
        self.tables()
            .users
            .insert(nickname.to_string(), color.to_string());
        Ok(())
    }

    fn select_user_color(&self, nickname: &str) -> Result<Option<String>> {
        self.check()?;
        Ok(self.tables().users.get(nickname).cloned())
    }

    fn select_history(&self, before_id: Option<i64>, limit: i64) -> Result<Vec<ChatMessage>> {
        self.check()?;
        let tables = self.tables();
        Ok(tables
            .messages
            .iter()
            .rev()
            .filter(|msg| before_id.map_or(true, |before| msg.id < before))
            .take(usize::try_from(limit).unwrap_or(0))
            .map(|msg| ChatMessage {
                id: msg.id,
                content: msg.content.clone(),
                sender_pod: msg.pod.clone(),
                sender_nickname: msg.nickname.clone(),
                sender_color: tables
                    .users
                    .get(&msg.nickname)
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_COLOR.to_string()),
                timestamp: msg.time.clone(),
            })
            .collect())
    }
}
