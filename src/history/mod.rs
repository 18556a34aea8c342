mod file;
mod memory;

pub use file::FileBlob;
pub use memory::MemoryBlob;

use crate::cli::Args;
use crate::models::chat::{ ChatHistory, ChatSession, ChatTurn, Role };
use chrono::{ DateTime, Days, Duration, Utc };
use log::{ info, warn };
use serde::{ Serialize, Deserialize };
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error as ThisError;
use uuid::Uuid;

pub const DEFAULT_TITLE: &str = "New chat";

const TITLE_WORD_LIMIT: usize = 6;

#[derive(Debug, ThisError)]
pub enum StoreError {
    /// The persistence medium rejected the write for size. `save_history`
    /// handles this with one eviction pass before giving up.
    #[error("chat history exceeds the storage quota")]
    QuotaExceeded,

    /// The eviction retry also failed; the caller must be told, data was
    /// not persisted.
    #[error("failed to persist chat history after eviction retry: {0}")]
    WriteFailed(String),

    #[error("chat history blob IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("chat history encoding error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Persistence medium for the history blob. The whole history is stored as
/// one opaque string; every store operation is a complete load-mutate-store
/// transaction over it.
pub trait HistoryBlob: Send + Sync {
    fn load(&self) -> Result<Option<String>, StoreError>;

    /// Persist the payload atomically. Must fail with
    /// `StoreError::QuotaExceeded` when a configured byte cap is hit.
    fn store(&self, payload: &str) -> Result<(), StoreError>;

    fn clear(&self) -> Result<(), StoreError>;
}

pub fn create_history_blob(
    args: &Args
) -> Result<Arc<dyn HistoryBlob>, Box<dyn Error + Send + Sync>> {
    match args.history_type.to_lowercase().as_str() {
        "file" => {
            let blob = FileBlob::new(PathBuf::from(&args.history_path), args.history_max_bytes);
            Ok(Arc::new(blob))
        }
        "memory" => Ok(Arc::new(MemoryBlob::new(args.history_max_bytes))),
        _ =>
            Err(
                Box::new(
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("Unsupported history store type: {}", args.history_type)
                    )
                )
            ),
    }
}

pub fn initialize_history_store(args: &Args) -> Result<ChatStore, Box<dyn Error + Send + Sync>> {
    info!("Chat history will be stored in: {} at {}", args.history_type, args.history_path);
    Ok(ChatStore::new(create_history_blob(args)?))
}

/// Partial update for `ChatStore::update_chat`. Absent fields are left
/// untouched; `id` and `created_at` are never updatable.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "messages")]
    pub turns: Option<Vec<ChatTurn>>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub total_tokens: Option<u64>,
    #[serde(default)]
    pub folder: Option<String>,
}

/// Sole owner of the persisted `ChatHistory`. Reads materialize a fresh
/// copy from the blob; callers never receive live references into store
/// state.
#[derive(Clone)]
pub struct ChatStore {
    blob: Arc<dyn HistoryBlob>,
}

impl ChatStore {
    pub fn new(blob: Arc<dyn HistoryBlob>) -> Self {
        Self { blob }
    }

    /// Load and decode the persisted history. Missing or malformed data
    /// falls back to the default history; the anomaly is reported through
    /// the log hook, never thrown past the store boundary.
    pub fn get_history(&self) -> ChatHistory {
        match self.blob.load() {
            Ok(Some(raw)) =>
                match serde_json::from_str::<ChatHistory>(&raw) {
                    Ok(history) => history,
                    Err(e) => {
                        warn!("Malformed chat history blob, falling back to defaults: {}", e);
                        ChatHistory::default()
                    }
                }
            Ok(None) => ChatHistory::default(),
            Err(e) => {
                warn!("Failed to load chat history, falling back to defaults: {}", e);
                ChatHistory::default()
            }
        }
    }

    /// Persist the entire history as a single write. A quota failure gets
    /// one remediation pass (evict sessions past `auto_delete_after_days`)
    /// and exactly one retry; a second failure surfaces as `WriteFailed`.
    pub fn save_history(&self, history: &ChatHistory) -> Result<(), StoreError> {
        let payload = serde_json::to_string(history)?;
        match self.blob.store(&payload) {
            Ok(()) => Ok(()),
            Err(StoreError::QuotaExceeded) => {
                warn!("Chat history hit the storage quota, evicting expired sessions");
                let mut evicted = history.clone();
                evict_expired(&mut evicted, Utc::now());
                let payload = serde_json::to_string(&evicted)?;
                self.blob.store(&payload).map_err(|e| StoreError::WriteFailed(e.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    /// Build a new session, insert it at the head of the list, make it
    /// current, enforce the capacity cap and persist.
    pub fn create_chat(
        &self,
        turns: Vec<ChatTurn>,
        model: String
    ) -> Result<ChatSession, StoreError> {
        let now = Utc::now();
        let session = ChatSession {
            id: Uuid::new_v4().to_string(),
            title: generate_title(&turns),
            turns,
            model,
            total_tokens: 0,
            created_at: now,
            updated_at: now,
            folder: None,
        };

        let mut history = self.get_history();
        history.chats.insert(0, session.clone());
        history.current_chat_id = Some(session.id.clone());

        let cap = history.settings.max_chats_in_history;
        if history.chats.len() > cap {
            history.chats.truncate(cap);
        }

        self.save_history(&history)?;
        Ok(session)
    }

    pub fn get_chat(&self, id: &str) -> Option<ChatSession> {
        self.get_history().chats.into_iter().find(|chat| chat.id == id)
    }

    /// Apply a partial update to the addressed session, always refreshing
    /// `updated_at`. The title is regenerated from the new turns when the
    /// update carries non-empty turns, does not itself rename the chat and
    /// the stored title is still the default; an explicit rename suppresses
    /// auto-titling for good.
    pub fn update_chat(
        &self,
        id: &str,
        update: ChatUpdate
    ) -> Result<Option<ChatSession>, StoreError> {
        let mut history = self.get_history();
        let Some(session) = history.chats.iter_mut().find(|chat| chat.id == id) else {
            return Ok(None);
        };

        let auto_title =
            update.title.is_none() &&
            update.turns.as_ref().is_some_and(|turns| !turns.is_empty()) &&
            session.title == DEFAULT_TITLE;

        if let Some(title) = update.title {
            session.title = title;
        }
        if let Some(turns) = update.turns {
            session.turns = turns;
        }
        if let Some(model) = update.model {
            session.model = model;
        }
        if let Some(total_tokens) = update.total_tokens {
            session.total_tokens = total_tokens;
        }
        if let Some(folder) = update.folder {
            session.folder = Some(folder);
        }
        if auto_title {
            session.title = generate_title(&session.turns);
        }

        // updated_at is monotonically non-decreasing even across clock skew
        session.updated_at = Utc::now().max(session.updated_at);

        let updated = session.clone();
        self.save_history(&history)?;
        Ok(Some(updated))
    }

    /// Remove a session. When it was current, the selection pointer is
    /// repointed to the new head of the list, or cleared if none remain.
    pub fn delete_chat(&self, id: &str) -> Result<bool, StoreError> {
        let mut history = self.get_history();
        let before = history.chats.len();
        history.chats.retain(|chat| chat.id != id);
        let removed = history.chats.len() < before;

        if history.current_chat_id.as_deref() == Some(id) {
            history.current_chat_id = history.chats.first().map(|chat| chat.id.clone());
        }

        self.save_history(&history)?;
        Ok(removed)
    }

    /// Repoint the selection. The id is not validated against `chats`; an
    /// unknown id simply will not resolve on the next `get_chat`.
    pub fn set_current_chat(&self, id: Option<String>) -> Result<(), StoreError> {
        let mut history = self.get_history();
        history.current_chat_id = id;
        self.save_history(&history)
    }

    pub fn current_chat_id(&self) -> Option<String> {
        self.get_history().current_chat_id
    }

    /// Case-insensitive substring match against the title or any turn's
    /// content, preserving store order. The query is never a pattern.
    pub fn search_chats(&self, query: &str) -> Vec<ChatSession> {
        let needle = query.to_lowercase();
        self.get_history()
            .chats.into_iter()
            .filter(|chat| {
                chat.title.to_lowercase().contains(&needle) ||
                    chat.turns.iter().any(|turn| turn.content.to_lowercase().contains(&needle))
            })
            .collect()
    }

    /// Evict sessions whose `updated_at` is past `auto_delete_after_days`.
    pub fn clean_old_chats(&self) -> Result<(), StoreError> {
        let mut history = self.get_history();
        evict_expired(&mut history, Utc::now());
        self.save_history(&history)
    }

    /// Full, human-readable serialization suitable for round-trip import.
    pub fn export_history(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string_pretty(&self.get_history())?)
    }

    /// Parse the text as a whole `ChatHistory` and overwrite the store with
    /// it. Rejected (store untouched) when `version` is absent or `chats`
    /// is not a sequence.
    pub fn import_history(&self, raw: &str) -> bool {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(raw) else {
            warn!("Rejected history import: payload is not valid JSON");
            return false;
        };
        if value.get("version").map_or(true, |v| !v.is_string()) {
            warn!("Rejected history import: missing version tag");
            return false;
        }
        if value.get("chats").map_or(true, |v| !v.is_array()) {
            warn!("Rejected history import: chats is not a sequence");
            return false;
        }
        let Ok(history) = serde_json::from_value::<ChatHistory>(value) else {
            warn!("Rejected history import: chats do not match the session schema");
            return false;
        };
        self.save_history(&history).is_ok()
    }

    /// Unconditionally erase the persisted blob.
    pub fn clear_history(&self) -> Result<(), StoreError> {
        self.blob.clear()
    }

    /// Byte size of the persisted blob as stored.
    pub fn storage_size(&self) -> u64 {
        match self.blob.load() {
            Ok(Some(raw)) => raw.len() as u64,
            _ => 0,
        }
    }

    pub fn storage_size_formatted(&self) -> String {
        format_storage_size(self.storage_size())
    }
}

fn evict_expired(history: &mut ChatHistory, now: DateTime<Utc>) {
    let days = history.settings.auto_delete_after_days;
    if days == 0 {
        return;
    }
    let cutoff = now - Duration::days(days as i64);
    history.chats.retain(|chat| chat.updated_at >= cutoff);
    if let Some(current) = history.current_chat_id.as_deref() {
        if !history.chats.iter().any(|chat| chat.id == current) {
            history.current_chat_id = history.chats.first().map(|chat| chat.id.clone());
        }
    }
}

/// Title rule: the first user turn's leading words. An ellipsis marks that
/// the joined text is strictly shorter than the trimmed original.
pub fn generate_title(turns: &[ChatTurn]) -> String {
    let Some(first_user) = turns.iter().find(|turn| turn.role == Role::User) else {
        return DEFAULT_TITLE.to_string();
    };

    let trimmed = first_user.content.trim();
    let title = trimmed
        .split_whitespace()
        .take(TITLE_WORD_LIMIT)
        .collect::<Vec<_>>()
        .join(" ");

    if title.len() < trimmed.len() {
        format!("{}...", title)
    } else {
        title
    }
}

#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupedChats {
    pub today: Vec<ChatSession>,
    pub yesterday: Vec<ChatSession>,
    pub this_week: Vec<ChatSession>,
    pub older: Vec<ChatSession>,
}

/// Partition sessions by the calendar day of `updated_at` relative to
/// `now`: today, yesterday, the preceding 7 days, everything else. Relative
/// order is preserved within each bucket.
pub fn group_chats_by_date(chats: &[ChatSession], now: DateTime<Utc>) -> GroupedChats {
    let today = now.date_naive();
    let yesterday = today - Days::new(1);
    let week_start = today - Days::new(7);

    let mut grouped = GroupedChats::default();
    for chat in chats {
        let day = chat.updated_at.date_naive();
        if day >= today {
            grouped.today.push(chat.clone());
        } else if day >= yesterday {
            grouped.yesterday.push(chat.clone());
        } else if day >= week_start {
            grouped.this_week.push(chat.clone());
        } else {
            grouped.older.push(chat.clone());
        }
    }
    grouped
}

pub fn format_storage_size(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = 1024.0 * 1024.0;

    if (bytes as f64) < KB {
        format!("{} bytes", bytes)
    } else if (bytes as f64) < MB {
        format!("{:.2} KB", (bytes as f64) / KB)
    } else {
        format!("{:.2} MB", (bytes as f64) / MB)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::chat::HistorySettings;
    use std::thread::sleep;
    use std::time::Duration as StdDuration;

    fn memory_store() -> ChatStore {
        ChatStore::new(Arc::new(MemoryBlob::new(0)))
    }

    fn store_with_settings(settings: HistorySettings) -> ChatStore {
        let store = memory_store();
        let history = ChatHistory { settings, ..ChatHistory::default() };
        store.save_history(&history).unwrap();
        store
    }

    fn session_updated_at(store: &ChatStore, id: &str, updated_at: DateTime<Utc>) {
        let mut history = store.get_history();
        history.chats
            .iter_mut()
            .find(|chat| chat.id == id)
            .unwrap().updated_at = updated_at;
        store.save_history(&history).unwrap();
    }

    #[test]
    fn missing_blob_yields_default_history() {
        let history = memory_store().get_history();
        assert_eq!(history.version, "1.0");
        assert!(history.chats.is_empty());
        assert!(history.current_chat_id.is_none());
        assert_eq!(history.settings.max_chats_in_history, 100);
    }

    #[test]
    fn malformed_blob_yields_default_history() {
        let blob = Arc::new(MemoryBlob::new(0));
        blob.store("{not json").unwrap();
        let history = ChatStore::new(blob).get_history();
        assert!(history.chats.is_empty());
    }

    #[test]
    fn old_blob_merges_settings_field_by_field() {
        let blob = Arc::new(MemoryBlob::new(0));
        blob
            .store(
                r#"{"version":"1.0","currentChatId":null,"chats":[],"settings":{"maxChatsInHistory":7}}"#
            )
            .unwrap();
        let history = ChatStore::new(blob).get_history();
        assert_eq!(history.settings.max_chats_in_history, 7);
        assert!(history.settings.auto_save_enabled);
        assert_eq!(history.settings.auto_delete_after_days, 30);
    }

    #[test]
    fn create_chat_becomes_current_head() {
        let store = memory_store();
        let first = store.create_chat(Vec::new(), "gpt-4o-mini".into()).unwrap();
        let second = store.create_chat(Vec::new(), "gpt-4o-mini".into()).unwrap();

        let history = store.get_history();
        assert_eq!(history.chats.len(), 2);
        assert_eq!(history.chats[0].id, second.id);
        assert_eq!(history.chats[1].id, first.id);
        assert_eq!(history.current_chat_id.as_deref(), Some(second.id.as_str()));
    }

    #[test]
    fn capacity_cap_trims_oldest_entries() {
        let store = store_with_settings(HistorySettings {
            max_chats_in_history: 3,
            ..HistorySettings::default()
        });

        let mut ids = Vec::new();
        for n in 0..5 {
            let turns = vec![ChatTurn::user(format!("chat number {}", n))];
            ids.push(store.create_chat(turns, "gpt-4o-mini".into()).unwrap().id);
        }

        let history = store.get_history();
        assert_eq!(history.chats.len(), 3);
        let kept: Vec<&str> = history.chats
            .iter()
            .map(|chat| chat.id.as_str())
            .collect();
        assert_eq!(kept, vec![ids[4].as_str(), ids[3].as_str(), ids[2].as_str()]);
    }

    #[test]
    fn delete_repoints_current_to_new_head() {
        let store = memory_store();
        let first = store.create_chat(Vec::new(), "gpt-4o-mini".into()).unwrap();
        let second = store.create_chat(Vec::new(), "gpt-4o-mini".into()).unwrap();

        assert!(store.delete_chat(&second.id).unwrap());
        assert_eq!(store.current_chat_id().as_deref(), Some(first.id.as_str()));

        assert!(store.delete_chat(&first.id).unwrap());
        assert!(store.current_chat_id().is_none());
    }

    #[test]
    fn delete_unknown_id_reports_no_removal() {
        let store = memory_store();
        let kept = store.create_chat(Vec::new(), "gpt-4o-mini".into()).unwrap();
        assert!(!store.delete_chat("no-such-id").unwrap());
        assert_eq!(store.current_chat_id().as_deref(), Some(kept.id.as_str()));
    }

    #[test]
    fn delete_of_non_current_leaves_pointer_alone() {
        let store = memory_store();
        let first = store.create_chat(Vec::new(), "gpt-4o-mini".into()).unwrap();
        let second = store.create_chat(Vec::new(), "gpt-4o-mini".into()).unwrap();

        assert!(store.delete_chat(&first.id).unwrap());
        assert_eq!(store.current_chat_id().as_deref(), Some(second.id.as_str()));
    }

    #[test]
    fn empty_chat_gets_default_title() {
        let store = memory_store();
        let chat = store.create_chat(Vec::new(), "gpt-4o-mini".into()).unwrap();
        assert_eq!(chat.title, DEFAULT_TITLE);
    }

    #[test]
    fn title_truncates_to_six_words_with_ellipsis() {
        let turns = vec![ChatTurn::user("Explain quicksort in simple terms for beginners please")];
        assert_eq!(generate_title(&turns), "Explain quicksort in simple terms for...");
    }

    #[test]
    fn short_title_keeps_full_content_without_ellipsis() {
        let turns = vec![ChatTurn::user("Hi")];
        assert_eq!(generate_title(&turns), "Hi");
    }

    #[test]
    fn six_word_content_is_not_truncated() {
        let turns = vec![ChatTurn::user("Explain quicksort in simple terms please")];
        assert_eq!(generate_title(&turns), "Explain quicksort in simple terms please");
    }

    #[test]
    fn title_falls_back_when_no_user_turn_exists() {
        let turns = vec![ChatTurn::assistant("Hello there")];
        assert_eq!(generate_title(&turns), DEFAULT_TITLE);
    }

    #[test]
    fn update_applies_auto_title_on_first_content() {
        let store = memory_store();
        let chat = store.create_chat(Vec::new(), "gpt-4o-mini".into()).unwrap();
        assert_eq!(chat.title, DEFAULT_TITLE);

        sleep(StdDuration::from_millis(2));
        let update = ChatUpdate {
            turns: Some(vec![ChatTurn::user("Hi")]),
            ..ChatUpdate::default()
        };
        let updated = store.update_chat(&chat.id, update).unwrap().unwrap();
        assert_eq!(updated.title, "Hi");
        assert!(updated.updated_at > chat.updated_at);
        assert_eq!(updated.created_at, chat.created_at);
    }

    #[test]
    fn explicit_rename_suppresses_auto_title() {
        let store = memory_store();
        let chat = store.create_chat(Vec::new(), "gpt-4o-mini".into()).unwrap();

        let rename = ChatUpdate { title: Some("My notes".into()), ..ChatUpdate::default() };
        store.update_chat(&chat.id, rename).unwrap().unwrap();

        let update = ChatUpdate {
            turns: Some(vec![ChatTurn::user("First message")]),
            ..ChatUpdate::default()
        };
        let updated = store.update_chat(&chat.id, update).unwrap().unwrap();
        assert_eq!(updated.title, "My notes");
    }

    #[test]
    fn generated_title_is_sticky_on_later_updates() {
        let store = memory_store();
        let chat = store
            .create_chat(vec![ChatTurn::user("Hi")], "gpt-4o-mini".into())
            .unwrap();
        assert_eq!(chat.title, "Hi");

        let update = ChatUpdate {
            turns: Some(
                vec![ChatTurn::user("Hi"), ChatTurn::assistant("Hello!"), ChatTurn::user("More")]
            ),
            ..ChatUpdate::default()
        };
        let updated = store.update_chat(&chat.id, update).unwrap().unwrap();
        assert_eq!(updated.title, "Hi");
    }

    #[test]
    fn update_unknown_id_reports_not_found() {
        let store = memory_store();
        let result = store.update_chat("missing", ChatUpdate::default()).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn update_refreshes_token_total_and_model() {
        let store = memory_store();
        let chat = store.create_chat(Vec::new(), "gpt-4o-mini".into()).unwrap();
        let update = ChatUpdate {
            model: Some("gpt-4o".into()),
            total_tokens: Some(1234),
            ..ChatUpdate::default()
        };
        let updated = store.update_chat(&chat.id, update).unwrap().unwrap();
        assert_eq!(updated.model, "gpt-4o");
        assert_eq!(updated.total_tokens, 1234);
    }

    #[test]
    fn search_matches_title_and_content_case_insensitively() {
        let store = memory_store();
        store
            .create_chat(vec![ChatTurn::user("Tell me about Rust lifetimes")], "gpt-4o-mini".into())
            .unwrap();
        store
            .create_chat(vec![ChatTurn::user("weekend plans")], "gpt-4o-mini".into())
            .unwrap();

        let by_title = store.search_chats("RUST");
        assert_eq!(by_title.len(), 1);
        assert!(by_title[0].title.contains("Rust"));

        let by_content = store.search_chats("LIFETIMES");
        assert_eq!(by_content.len(), 1);

        assert!(store.search_chats("holiday").is_empty());
    }

    #[test]
    fn empty_query_returns_all_chats_in_store_order() {
        let store = memory_store();
        let first = store.create_chat(Vec::new(), "gpt-4o-mini".into()).unwrap();
        let second = store.create_chat(Vec::new(), "gpt-4o-mini".into()).unwrap();

        let all = store.search_chats("");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, second.id);
        assert_eq!(all[1].id, first.id);
    }

    #[test]
    fn export_import_round_trips() {
        let store = memory_store();
        let chat = store
            .create_chat(vec![ChatTurn::user("Keep this one")], "gpt-4o".into())
            .unwrap();
        let exported = store.export_history().unwrap();

        store.clear_history().unwrap();
        assert!(store.get_history().chats.is_empty());

        assert!(store.import_history(&exported));
        let restored = store.get_history();
        assert_eq!(restored.chats.len(), 1);
        assert_eq!(restored.chats[0].id, chat.id);
        assert_eq!(restored.chats[0].title, chat.title);
        assert_eq!(restored.current_chat_id.as_deref(), Some(chat.id.as_str()));
    }

    #[test]
    fn import_rejects_bad_payloads_and_leaves_store_untouched() {
        let store = memory_store();
        let kept = store.create_chat(Vec::new(), "gpt-4o-mini".into()).unwrap();

        assert!(!store.import_history("not json at all"));
        assert!(!store.import_history(r#"{"chats": []}"#));
        assert!(!store.import_history(r#"{"version": "1.0", "chats": "nope"}"#));

        let history = store.get_history();
        assert_eq!(history.chats.len(), 1);
        assert_eq!(history.chats[0].id, kept.id);
    }

    #[test]
    fn clear_history_erases_the_blob() {
        let store = memory_store();
        store.create_chat(Vec::new(), "gpt-4o-mini".into()).unwrap();
        store.clear_history().unwrap();
        assert_eq!(store.storage_size(), 0);
        assert!(store.get_history().chats.is_empty());
    }

    #[test]
    fn set_current_chat_accepts_unvalidated_ids() {
        let store = memory_store();
        store.set_current_chat(Some("does-not-exist".into())).unwrap();
        assert_eq!(store.current_chat_id().as_deref(), Some("does-not-exist"));
        assert!(store.get_chat("does-not-exist").is_none());

        store.set_current_chat(None).unwrap();
        assert!(store.current_chat_id().is_none());
    }

    #[test]
    fn storage_size_formats_across_thresholds() {
        assert_eq!(format_storage_size(0), "0 bytes");
        assert_eq!(format_storage_size(512), "512 bytes");
        assert_eq!(format_storage_size(1536), "1.50 KB");
        assert_eq!(format_storage_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn empty_store_reports_zero_bytes() {
        assert_eq!(memory_store().storage_size_formatted(), "0 bytes");
    }

    #[test]
    fn quota_failure_evicts_expired_sessions_and_retries_once() {
        // Cap sized so one padded session fits but two sessions do not.
        let store = ChatStore::new(Arc::new(MemoryBlob::new(5000)));
        let padding = "pad ".repeat(1024);
        let old = store
            .create_chat(vec![ChatTurn::user(padding)], "gpt-4o-mini".into())
            .unwrap();
        session_updated_at(&store, &old.id, Utc::now() - Duration::days(45));

        // The next insert pushes the payload over the cap; the expired
        // session must be evicted by the single remediation pass.
        let second = "word ".repeat(200);
        let fresh = store.create_chat(vec![ChatTurn::user(second)], "gpt-4o-mini".into()).unwrap();

        let history = store.get_history();
        assert_eq!(history.chats.len(), 1);
        assert_eq!(history.chats[0].id, fresh.id);
    }

    #[test]
    fn quota_failure_with_nothing_to_evict_surfaces_write_failed() {
        let store = ChatStore::new(Arc::new(MemoryBlob::new(5000)));
        let padding = "pad ".repeat(1024);
        store.create_chat(vec![ChatTurn::user(padding)], "gpt-4o-mini".into()).unwrap();

        // Both sessions are fresh, so the remediation pass evicts nothing
        // and the one retry must fail.
        let second = "word ".repeat(200);
        let result = store.create_chat(vec![ChatTurn::user(second)], "gpt-4o-mini".into());
        assert!(matches!(result, Err(StoreError::WriteFailed(_))));

        let history = store.get_history();
        assert_eq!(history.chats.len(), 1);
    }

    #[test]
    fn expiry_disabled_means_no_eviction() {
        let store = store_with_settings(HistorySettings {
            auto_delete_after_days: 0,
            ..HistorySettings::default()
        });
        let chat = store.create_chat(Vec::new(), "gpt-4o-mini".into()).unwrap();
        session_updated_at(&store, &chat.id, Utc::now() - Duration::days(365));

        store.clean_old_chats().unwrap();
        assert_eq!(store.get_history().chats.len(), 1);
    }

    #[test]
    fn clean_old_chats_drops_expired_sessions() {
        let store = memory_store();
        let stale = store.create_chat(Vec::new(), "gpt-4o-mini".into()).unwrap();
        let fresh = store.create_chat(Vec::new(), "gpt-4o-mini".into()).unwrap();
        session_updated_at(&store, &stale.id, Utc::now() - Duration::days(31));

        store.clean_old_chats().unwrap();
        let history = store.get_history();
        assert_eq!(history.chats.len(), 1);
        assert_eq!(history.chats[0].id, fresh.id);
    }

    fn grouped_fixture(now: DateTime<Utc>, offsets_days: &[i64]) -> Vec<ChatSession> {
        offsets_days
            .iter()
            .enumerate()
            .map(|(n, days)| {
                let stamp = now - Duration::days(*days);
                ChatSession {
                    id: format!("chat-{}", n),
                    title: DEFAULT_TITLE.to_string(),
                    turns: Vec::new(),
                    model: "gpt-4o-mini".into(),
                    total_tokens: 0,
                    created_at: stamp,
                    updated_at: stamp,
                    folder: None,
                }
            })
            .collect()
    }

    #[test]
    fn date_grouping_buckets_by_calendar_day() {
        use chrono::TimeZone;
        let now = Utc.with_ymd_and_hms(2024, 5, 15, 12, 0, 0).unwrap();
        let chats = grouped_fixture(now, &[0, 1, 2, 7, 8, 30]);

        let grouped = group_chats_by_date(&chats, now);
        assert_eq!(grouped.today.len(), 1);
        assert_eq!(grouped.yesterday.len(), 1);
        assert_eq!(grouped.this_week.len(), 2);
        assert_eq!(grouped.older.len(), 2);
        // two days ago is this week, not yesterday
        assert_eq!(grouped.this_week[0].id, "chat-2");
        assert_eq!(grouped.this_week[1].id, "chat-3");
    }

    #[test]
    fn date_grouping_preserves_relative_order() {
        use chrono::TimeZone;
        let now = Utc.with_ymd_and_hms(2024, 5, 15, 12, 0, 0).unwrap();
        let chats = grouped_fixture(now, &[10, 20, 30]);

        let grouped = group_chats_by_date(&chats, now);
        let ids: Vec<&str> = grouped.older
            .iter()
            .map(|chat| chat.id.as_str())
            .collect();
        assert_eq!(ids, vec!["chat-0", "chat-1", "chat-2"]);
    }
}
