//! Persistent sighting history backing the dedup window.
//!
//! One JSON document maps namespaced keys (`url:<canonical>`,
//! `title:<fingerprint>`) to `{first_seen, last_seen, count}`. The file is
//! read once at run start and written once at run end; a corrupt or missing
//! file resets to empty rather than failing the run; the worst outcome of
//! lost history is one rundown of already-told stories. Saves go through a
//! temp file and rename so a crash mid-write cannot truncate the store.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// One sighting record. `last_seen` only ever moves forward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub count: u32,
}

#[derive(Debug)]
pub struct HistoryStore {
    path: Option<PathBuf>,
    entries: HashMap<String, HistoryEntry>,
}

impl HistoryStore {
    /// Load the store from disk. Never fails: an unreadable file, malformed
    /// JSON, or individually unparsable entries all degrade to "treat the
    /// affected stories as new".
    pub fn load(path: &Path) -> Self {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no history file yet, starting empty");
                return Self {
                    path: Some(path.to_path_buf()),
                    entries: HashMap::new(),
                };
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "history unreadable, starting empty");
                return Self {
                    path: Some(path.to_path_buf()),
                    entries: HashMap::new(),
                };
            }
        };

        // Lenient two-stage parse: a single corrupt entry is dropped instead
        // of poisoning the whole store.
        let values: HashMap<String, serde_json::Value> = match serde_json::from_str(&raw) {
            Ok(v) => v,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "history corrupt, resetting to empty");
                HashMap::new()
            }
        };
        let mut entries = HashMap::with_capacity(values.len());
        let mut dropped = 0usize;
        for (key, value) in values {
            match serde_json::from_value::<HistoryEntry>(value) {
                Ok(entry) => {
                    entries.insert(key, entry);
                }
                Err(_) => dropped += 1,
            }
        }
        if dropped > 0 {
            warn!(dropped, "dropped unparsable history entries");
        }
        info!(entries = entries.len(), path = %path.display(), "history loaded");

        Self {
            path: Some(path.to_path_buf()),
            entries,
        }
    }

    /// A store that never touches disk; used in tests and dry runs.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget entries whose last sighting is older than the retention window.
    pub fn prune(&mut self, keep_days: i64) {
        let cutoff = Utc::now() - Duration::days(keep_days);
        let before = self.entries.len();
        self.entries.retain(|_, entry| entry.last_seen >= cutoff);
        let pruned = before - self.entries.len();
        if pruned > 0 {
            info!(pruned, kept = self.entries.len(), keep_days, "pruned history");
        }
    }

    /// Whether `key` was sighted within the last `days` days.
    /// Unknown keys are never "seen".
    pub fn seen_within_days(&self, key: &str, days: i64) -> bool {
        let Some(entry) = self.entries.get(key) else {
            return false;
        };
        entry.last_seen >= Utc::now() - Duration::days(days)
    }

    /// Upsert sightings for all `keys` at the current instant.
    pub fn mark_seen(&mut self, keys: &[String]) {
        let now = Utc::now();
        for key in keys {
            self.entries
                .entry(key.clone())
                .and_modify(|entry| {
                    if now > entry.last_seen {
                        entry.last_seen = now;
                    }
                    entry.count += 1;
                })
                .or_insert(HistoryEntry {
                    first_seen: now,
                    last_seen: now,
                    count: 1,
                });
        }
    }

    /// Write the store atomically: serialize to `<path>.tmp`, then rename
    /// over the real file so a crash cannot leave a truncated document.
    pub fn save(&self) -> io::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| io::Error::other(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        debug!(entries = self.entries.len(), path = %path.display(), "history saved");
        Ok(())
    }

    #[cfg(test)]
    pub fn insert_raw(&mut self, key: &str, entry: HistoryEntry) {
        self.entries.insert(key.to_string(), entry);
    }

    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&HistoryEntry> {
        self.entries.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store_path(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "nyhetssvep-history-{}-{}.json",
            tag,
            std::process::id()
        ))
    }

    fn entry_days_ago(days: i64) -> HistoryEntry {
        let then = Utc::now() - Duration::days(days);
        HistoryEntry {
            first_seen: then,
            last_seen: then,
            count: 1,
        }
    }

    #[test]
    fn unknown_keys_are_unseen() {
        let store = HistoryStore::in_memory();
        assert!(!store.seen_within_days("url:https://ex.se/a", 21));
    }

    #[test]
    fn mark_seen_then_seen_within_window() {
        let mut store = HistoryStore::in_memory();
        store.mark_seen(&["title:brand hamnen".to_string()]);
        assert!(store.seen_within_days("title:brand hamnen", 1));
    }

    #[test]
    fn resighting_bumps_count_and_last_seen() {
        let mut store = HistoryStore::in_memory();
        store.insert_raw("url:https://ex.se/a", entry_days_ago(10));
        store.mark_seen(&["url:https://ex.se/a".to_string()]);

        let entry = store.get("url:https://ex.se/a").unwrap();
        assert_eq!(entry.count, 2);
        assert!(entry.last_seen > entry.first_seen);
    }

    #[test]
    fn outside_window_is_unseen_but_retained() {
        // dedup window 21 days, retention 60: a 30-day-old sighting is
        // not a repeat but must survive pruning
        let mut store = HistoryStore::in_memory();
        store.insert_raw("title:gammal nyhet", entry_days_ago(30));

        assert!(!store.seen_within_days("title:gammal nyhet", 21));
        store.prune(60);
        assert!(store.get("title:gammal nyhet").is_some());
    }

    #[test]
    fn prune_removes_only_expired() {
        let mut store = HistoryStore::in_memory();
        store.insert_raw("title:mycket gammal", entry_days_ago(90));
        store.insert_raw("title:ganska ny", entry_days_ago(5));

        store.prune(60);
        assert!(store.get("title:mycket gammal").is_none());
        assert!(store.get("title:ganska ny").is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn save_load_roundtrip() {
        let path = temp_store_path("roundtrip");
        let _ = std::fs::remove_file(&path);

        let mut store = HistoryStore::load(&path);
        store.mark_seen(&[
            "url:https://ex.se/artikel".to_string(),
            "title:stor nyhet landet".to_string(),
        ]);
        store.save().unwrap();

        let reloaded = HistoryStore::load(&path);
        assert_eq!(reloaded.len(), 2);
        assert_eq!(
            reloaded.get("url:https://ex.se/artikel"),
            store.get("url:https://ex.se/artikel")
        );

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn corrupt_file_resets_to_empty() {
        let path = temp_store_path("corrupt");
        std::fs::write(&path, "detta är inte json {{{").unwrap();

        let store = HistoryStore::load(&path);
        assert!(store.is_empty());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn unparsable_entries_are_dropped_individually() {
        let path = temp_store_path("partial");
        std::fs::write(
            &path,
            r#"{
                "url:https://ex.se/ok": {
                    "first_seen": "2025-08-01T10:00:00Z",
                    "last_seen": "2025-08-01T10:00:00Z",
                    "count": 1
                },
                "url:https://ex.se/trasig": {"first_seen": "inte en tid"}
            }"#,
        )
        .unwrap();

        let store = HistoryStore::load(&path);
        assert_eq!(store.len(), 1);
        assert!(store.get("url:https://ex.se/ok").is_some());

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_empty_store() {
        let path = temp_store_path("missing-never-created");
        let _ = std::fs::remove_file(&path);
        let store = HistoryStore::load(&path);
        assert!(store.is_empty());
    }
}
