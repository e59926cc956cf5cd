use std::collections::VecDeque;

use serde_json::Value;

use crate::request::{MalformedRecordError, Request};
use crate::storage::{KeyValueStore, StorageError};

pub const MAX_HISTORY: usize = 30;
pub const HISTORY_KEY: &str = "kopf_request_history";

#[derive(Debug, thiserror::Error)]
enum LoadError {
    #[error("history blob is not valid JSON: {0}")]
    Syntax(#[from] serde_json::Error),
    #[error("history blob is not a list")]
    NotAList,
    #[error(transparent)]
    Record(#[from] MalformedRecordError),
}

/// Previously sent requests, most recent first, without duplicates.
///
/// Every mutation is written through to `HISTORY_KEY` before returning.
pub struct RequestHistory<S> {
    store: S,
    entries: VecDeque<Request>,
    max_size: usize,
}

impl<S: KeyValueStore> RequestHistory<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            entries: VecDeque::new(),
            max_size: MAX_HISTORY,
        }
    }

    /// Replaces the in-memory history with the persisted one.
    ///
    /// A corrupt blob is discarded as a whole: the slot is reset to `null` and
    /// the history starts empty.
    pub fn load(&mut self) -> &VecDeque<Request> {
        self.entries = match self.store.get(HISTORY_KEY) {
            Ok(Some(raw)) => match parse_history(&raw) {
                Ok(mut entries) => {
                    entries.truncate(self.max_size);
                    entries.into()
                }
                Err(err) => {
                    tracing::warn!("discarding stored request history: {err}");
                    if let Err(err) = self.store.set(HISTORY_KEY, None) {
                        tracing::error!("failed to reset request history: {err}");
                    }
                    VecDeque::new()
                }
            },
            Ok(None) => VecDeque::new(),
            Err(err) => {
                tracing::error!("failed to read request history: {err}");
                VecDeque::new()
            }
        };

        tracing::debug!("loaded {} history entries", self.entries.len());
        &self.entries
    }

    /// Records `request` at the front unless an equal request is already kept.
    ///
    /// An existing entry keeps its position.
    pub fn add(&mut self, request: Request) -> Result<(), StorageError> {
        if self.entries.contains(&request) {
            return Ok(());
        }

        self.entries.push_front(request);
        self.entries.truncate(self.max_size);
        self.persist()
    }

    /// Empties the history and resets the stored slot.
    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.entries.clear();
        self.store.set(HISTORY_KEY, None)
    }

    /// Installs `entries` as-is, without touching storage.
    #[cfg(test)]
    pub fn replace_entries(&mut self, entries: impl IntoIterator<Item = Request>) {
        self.entries = entries.into_iter().collect();
    }

    pub fn list(&self) -> &VecDeque<Request> {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&Request> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    fn persist(&mut self) -> Result<(), StorageError> {
        let raw = serialize_history(self.entries.iter())?;
        self.store.set(HISTORY_KEY, Some(&raw))
    }
}

fn parse_history(raw: &str) -> Result<Vec<Request>, LoadError> {
    let Value::Array(records) = serde_json::from_str::<Value>(raw)? else {
        return Err(LoadError::NotAList);
    };
    records
        .iter()
        .map(|record| Request::from_record(record).map_err(LoadError::from))
        .collect()
}

fn serialize_history<'a>(
    entries: impl Iterator<Item = &'a Request>,
) -> Result<String, StorageError> {
    let records: Vec<_> = entries.map(Request::to_record).collect();
    Ok(serde_json::to_string(&records)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use pretty_assertions::assert_eq;

    fn sample() -> Request {
        Request::new("/test_rest/_search", "POST", "{'uno': 'dos'}")
    }

    #[test]
    fn fresh_history_is_empty() {
        let history = RequestHistory::new(MemoryStore::new());
        assert!(history.list().is_empty());
    }

    #[test]
    fn load_with_absent_slot_is_empty_and_writes_nothing() {
        let mut history = RequestHistory::new(MemoryStore::new());
        assert!(history.load().is_empty());
        assert!(history.store().writes().is_empty());
    }

    #[test]
    fn load_valid_history() {
        let store = MemoryStore::with_value(
            HISTORY_KEY,
            r#"[{ "path": "/_search", "method": "POST", "body": "{}"}]"#,
        );
        let mut history = RequestHistory::new(store);
        let loaded = history.load();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0], Request::new("/_search", "POST", "{}"));
    }

    #[test]
    fn load_legacy_history() {
        let store = MemoryStore::with_value(
            HISTORY_KEY,
            r#"[{ "url": "http://oldhost:9200/_search", "method": "POST", "body": "{}"}]"#,
        );
        let mut history = RequestHistory::new(store);
        assert_eq!(
            history.load().iter().cloned().collect::<Vec<_>>(),
            vec![Request::new("/_search", "POST", "{}")]
        );
    }

    #[test]
    fn load_invalid_json_clears_slot() {
        let store = MemoryStore::with_value(
            HISTORY_KEY,
            r#"[ "url": "http://oldhost:9200/_search", "method": "POST", "body": "{}"}]"#,
        );
        let mut history = RequestHistory::new(store);
        assert_eq!(history.load().len(), 0);
        assert_eq!(
            history.store().writes(),
            &[(HISTORY_KEY.to_string(), None)]
        );
    }

    #[test]
    fn load_discards_whole_blob_on_one_bad_record() {
        let store = MemoryStore::with_value(
            HISTORY_KEY,
            r#"[{"path": "/ok", "method": "GET", "body": ""}, {"method": "GET", "body": ""}]"#,
        );
        let mut history = RequestHistory::new(store);
        assert!(history.load().is_empty());
        assert_eq!(
            history.store().writes(),
            &[(HISTORY_KEY.to_string(), None)]
        );
    }

    #[test]
    fn load_discards_blob_with_non_string_path() {
        let store = MemoryStore::with_value(
            HISTORY_KEY,
            r#"[{"path": 5, "url": "http://h/b", "method": "GET", "body": ""}]"#,
        );
        let mut history = RequestHistory::new(store);
        assert!(history.load().is_empty());
        assert_eq!(
            history.store().writes(),
            &[(HISTORY_KEY.to_string(), None)]
        );
    }

    #[test]
    fn load_with_unreadable_store_is_empty_and_writes_nothing() {
        let store = MemoryStore::with_value(
            HISTORY_KEY,
            r#"[{"path": "/_search", "method": "GET", "body": "{}"}]"#,
        )
        .failing_reads();
        let mut history = RequestHistory::new(store);
        assert!(history.load().is_empty());
        assert!(history.store().writes().is_empty());
    }

    #[test]
    fn add_keeps_entry_when_write_fails() {
        let mut history = RequestHistory::new(MemoryStore::new().failing_writes());
        assert!(history.add(sample()).is_err());
        assert_eq!(history.list()[0], sample());
        assert!(history.store().writes().is_empty());
    }

    #[test]
    fn load_rejects_non_list_blob() {
        let store = MemoryStore::with_value(HISTORY_KEY, r#"{"path": "/_search"}"#);
        let mut history = RequestHistory::new(store);
        assert!(history.load().is_empty());
        assert_eq!(history.store().writes().len(), 1);
    }

    #[test]
    fn load_caps_oversized_blob() {
        let records: Vec<_> = (0..MAX_HISTORY + 5)
            .map(|i| Request::new(format!("/{i}"), "GET", "").to_record())
            .collect();
        let raw = serde_json::to_string(&records).expect("encode");
        let mut history = RequestHistory::new(MemoryStore::with_value(HISTORY_KEY, &raw));
        assert_eq!(history.load().len(), MAX_HISTORY);
        assert_eq!(history.list()[0].path(), "/0");
    }

    #[test]
    fn add_persists_current_shape() {
        let mut history = RequestHistory::new(MemoryStore::new());
        history.add(sample()).expect("add");

        assert_eq!(history.len(), 1);
        let expected = serde_json::to_string(&[sample().to_record()]).expect("encode");
        assert_eq!(
            history.store().writes(),
            &[(HISTORY_KEY.to_string(), Some(expected))]
        );
    }

    #[test]
    fn add_skips_duplicates_without_writing() {
        let mut history = RequestHistory::new(MemoryStore::new());
        history.add(sample()).expect("add");
        history.add(sample()).expect("add again");

        assert_eq!(history.len(), 1);
        assert_eq!(history.store().writes().len(), 1);
    }

    #[test]
    fn re_adding_does_not_promote() {
        let first = Request::new("/a", "GET", "");
        let second = Request::new("/b", "GET", "");
        let mut history = RequestHistory::new(MemoryStore::new());
        history.add(first.clone()).expect("add");
        history.add(second.clone()).expect("add");
        history.add(first.clone()).expect("add");

        assert_eq!(
            history.list().iter().cloned().collect::<Vec<_>>(),
            vec![second, first]
        );
    }

    #[test]
    fn add_at_capacity_evicts_oldest() {
        let mut history = RequestHistory::new(MemoryStore::new());
        history.replace_entries((0..MAX_HISTORY).map(|i| {
            Request::new("/test_rest/_search", "POST", format!("{{'uno': '{i} '}}"))
        }));
        let oldest = history.list()[MAX_HISTORY - 1].clone();
        assert_eq!(history.len(), MAX_HISTORY);

        history.add(sample()).expect("add");

        assert_eq!(history.len(), MAX_HISTORY);
        assert_eq!(history.list()[0], sample());
        assert!(!history.list().contains(&oldest));
    }

    #[test]
    fn persisted_form_reloads_identically() {
        let mut history = RequestHistory::new(MemoryStore::new());
        history.add(Request::new("/a", "GET", "")).expect("add");
        history.add(Request::new("/b", "PUT", "{\"x\":1}")).expect("add");

        let raw = history
            .store()
            .get(HISTORY_KEY)
            .expect("get")
            .expect("present");
        let mut reloaded = RequestHistory::new(MemoryStore::with_value(HISTORY_KEY, &raw));
        reloaded.load();
        assert_eq!(reloaded.list(), history.list());
    }

    #[test]
    fn clear_resets_slot() {
        let mut history = RequestHistory::new(MemoryStore::new());
        history.add(sample()).expect("add");
        history.clear().expect("clear");

        assert!(history.is_empty());
        assert_eq!(
            history.store().writes().last(),
            Some(&(HISTORY_KEY.to_string(), None))
        );
    }
}
