// SPDX-License-Identifier: MPL-2.0

//! In-process document store.
//!
//! Behaves like the managed store as far as the app can tell: set-add and
//! set-remove on arrays, store-side timestamps, live subscriptions that push the
//! whole collection on every change. Every call is recorded so callers can check
//! exactly what reached the store.

use crate::backend::record::{FieldOp, FieldWrite, Fields, Record, format_timestamp};
use crate::backend::store::{RemoteStore, StoreError, Subscription};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{mpsc, watch};

/// A call as it reached the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreCall {
    Subscribe {
        collection: String,
    },
    Create {
        collection: String,
        writes: Vec<FieldWrite>,
    },
    Set {
        collection: String,
        id: String,
        writes: Vec<FieldWrite>,
    },
    Update {
        collection: String,
        id: String,
        writes: Vec<FieldWrite>,
    },
    Get {
        collection: String,
        id: String,
    },
    Query {
        collection: String,
        field: String,
        value: Value,
    },
}

#[derive(Default)]
struct Collections {
    /// Insertion order is the store's own result order
    records: HashMap<String, Vec<Record>>,
    next_id: u64,
}

impl Collections {
    fn collection(&self, name: &str) -> Vec<Record> {
        self.records.get(name).cloned().unwrap_or_default()
    }

    fn find_mut(&mut self, collection: &str, id: &str) -> Option<&mut Record> {
        self.records
            .get_mut(collection)?
            .iter_mut()
            .find(|record| record.id == id)
    }
}

#[derive(Clone)]
pub struct MemoryStore {
    collections: Arc<Mutex<Collections>>,
    changes: Arc<watch::Sender<u64>>,
    calls: Arc<Mutex<Vec<StoreCall>>>,
    offline: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            collections: Arc::new(Mutex::new(Collections::default())),
            changes: Arc::new(changes),
            calls: Arc::new(Mutex::new(Vec::new())),
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    /// While offline every call fails with a network error.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Insert a raw record as-is, bypassing validation. Counts as a change.
    pub fn insert_raw(&self, collection: &str, record: Record) {
        self.lock().records.entry(collection.to_string()).or_default().push(record);
        self.notify();
    }

    pub fn records(&self, collection: &str) -> Vec<Record> {
        self.lock().collection(collection)
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().expect("call log poisoned").clone()
    }

    fn lock(&self) -> MutexGuard<'_, Collections> {
        self.collections.lock().expect("memory store poisoned")
    }

    fn record_call(&self, call: StoreCall) -> Result<(), StoreError> {
        self.calls.lock().expect("call log poisoned").push(call);
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Network("store unreachable".into()));
        }
        Ok(())
    }

    fn notify(&self) {
        self.changes.send_modify(|version| *version += 1);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply field operations the way the managed store does.
pub fn apply_writes(fields: &mut Fields, writes: &[FieldWrite]) {
    for write in writes {
        match &write.op {
            FieldOp::Set(value) => {
                fields.insert(write.field.clone(), value.clone());
            }
            FieldOp::SetAdd(values) => {
                let entry = fields
                    .entry(write.field.clone())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if !entry.is_array() {
                    *entry = Value::Array(Vec::new());
                }
                if let Value::Array(items) = entry {
                    for value in values {
                        if !items.contains(value) {
                            items.push(value.clone());
                        }
                    }
                }
            }
            FieldOp::SetRemove(values) => match fields.get_mut(&write.field) {
                Some(Value::Array(items)) => items.retain(|item| !values.contains(item)),
                _ => {
                    fields.insert(write.field.clone(), Value::Array(Vec::new()));
                }
            },
            FieldOp::ServerTime => {
                fields.insert(
                    write.field.clone(),
                    Value::String(format_timestamp(Utc::now())),
                );
            }
        }
    }
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn subscribe(&self, collection: &str) -> Result<Subscription, StoreError> {
        self.record_call(StoreCall::Subscribe {
            collection: collection.to_string(),
        })?;

        let (tx, rx) = mpsc::channel(16);
        let mut changes = self.changes.subscribe();
        let collections = Arc::clone(&self.collections);
        let collection = collection.to_string();

        let worker = tokio::spawn(async move {
            loop {
                changes.borrow_and_update();
                let snapshot = collections
                    .lock()
                    .expect("memory store poisoned")
                    .collection(&collection);
                if tx.send(snapshot).await.is_err() {
                    break;
                }
                if changes.changed().await.is_err() {
                    break;
                }
            }
        });

        Ok(Subscription::new(rx, worker))
    }

    async fn create_record(
        &self,
        collection: &str,
        writes: Vec<FieldWrite>,
    ) -> Result<String, StoreError> {
        self.record_call(StoreCall::Create {
            collection: collection.to_string(),
            writes: writes.clone(),
        })?;

        let id = {
            let mut collections = self.lock();
            collections.next_id += 1;
            let id = format!("rec{:04}", collections.next_id);
            let mut fields = Fields::new();
            apply_writes(&mut fields, &writes);
            collections
                .records
                .entry(collection.to_string())
                .or_default()
                .push(Record::new(id.clone(), fields));
            id
        };
        self.notify();
        Ok(id)
    }

    async fn set_record(
        &self,
        collection: &str,
        id: &str,
        writes: Vec<FieldWrite>,
    ) -> Result<(), StoreError> {
        self.record_call(StoreCall::Set {
            collection: collection.to_string(),
            id: id.to_string(),
            writes: writes.clone(),
        })?;

        {
            let mut collections = self.lock();
            let mut fields = Fields::new();
            apply_writes(&mut fields, &writes);
            match collections.find_mut(collection, id) {
                Some(record) => record.fields = fields,
                None => collections
                    .records
                    .entry(collection.to_string())
                    .or_default()
                    .push(Record::new(id, fields)),
            }
        }
        self.notify();
        Ok(())
    }

    async fn update_record(
        &self,
        collection: &str,
        id: &str,
        writes: Vec<FieldWrite>,
    ) -> Result<(), StoreError> {
        self.record_call(StoreCall::Update {
            collection: collection.to_string(),
            id: id.to_string(),
            writes: writes.clone(),
        })?;

        {
            let mut collections = self.lock();
            let record = collections
                .find_mut(collection, id)
                .ok_or_else(|| StoreError::NotFound(format!("{collection}/{id}")))?;
            apply_writes(&mut record.fields, &writes);
        }
        self.notify();
        Ok(())
    }

    async fn get_record(&self, collection: &str, id: &str) -> Result<Option<Record>, StoreError> {
        self.record_call(StoreCall::Get {
            collection: collection.to_string(),
            id: id.to_string(),
        })?;

        Ok(self
            .lock()
            .collection(collection)
            .into_iter()
            .find(|record| record.id == id))
    }

    async fn query(
        &self,
        collection: &str,
        field: &str,
        value: Value,
    ) -> Result<Vec<Record>, StoreError> {
        self.record_call(StoreCall::Query {
            collection: collection.to_string(),
            field: field.to_string(),
            value: value.clone(),
        })?;

        Ok(self
            .lock()
            .collection(collection)
            .into_iter()
            .filter(|record| record.fields.get(field) == Some(&value))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_set_add_is_idempotent() {
        let mut fields = Fields::new();
        let add = [FieldWrite::set_add("likedBy", "u1")];
        apply_writes(&mut fields, &add);
        apply_writes(&mut fields, &add);
        assert_eq!(fields["likedBy"], json!(["u1"]));
    }

    #[test]
    fn test_set_remove_on_missing_field_leaves_empty_array() {
        let mut fields = Fields::new();
        apply_writes(&mut fields, &[FieldWrite::set_remove("likedBy", "u1")]);
        assert_eq!(fields["likedBy"], json!([]));
    }

    #[test]
    fn test_set_remove_removes_every_copy() {
        let mut fields = Fields::new();
        fields.insert("likedBy".into(), json!(["u1", "u2", "u1"]));
        apply_writes(&mut fields, &[FieldWrite::set_remove("likedBy", "u1")]);
        assert_eq!(fields["likedBy"], json!(["u2"]));
    }

    #[test]
    fn test_server_time_is_a_timestamp() {
        let mut fields = Fields::new();
        apply_writes(&mut fields, &[FieldWrite::server_time("createdAt")]);
        assert!(crate::backend::record::parse_timestamp(fields.get("createdAt")).is_some());
    }

    #[tokio::test]
    async fn test_subscription_pushes_current_then_changes() {
        let store = MemoryStore::new();
        let mut sub = store.subscribe("posts").await.unwrap();
        assert_eq!(sub.next().await.unwrap().len(), 0);

        let id = store
            .create_record("posts", vec![FieldWrite::set("caption", "a")])
            .await
            .unwrap();
        let snapshot = sub.next().await.unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, id);
    }

    #[tokio::test]
    async fn test_update_missing_record_fails() {
        let store = MemoryStore::new();
        let result = store
            .update_record("posts", "nope", vec![FieldWrite::set("a", 1)])
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_offline_calls_are_logged_and_fail() {
        let store = MemoryStore::new();
        store.set_offline(true);
        assert!(store.get_record("users", "u1").await.is_err());
        assert_eq!(
            store.calls(),
            vec![StoreCall::Get {
                collection: "users".into(),
                id: "u1".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_query_matches_on_equality() {
        let store = MemoryStore::new();
        store
            .create_record("posts", vec![FieldWrite::set("userId", "u1")])
            .await
            .unwrap();
        store
            .create_record("posts", vec![FieldWrite::set("userId", "u2")])
            .await
            .unwrap();
        let found = store.query("posts", "userId", json!("u1")).await.unwrap();
        assert_eq!(found.len(), 1);
    }
}
