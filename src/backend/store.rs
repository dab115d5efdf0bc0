// SPDX-License-Identifier: MPL-2.0

use crate::backend::record::{FieldWrite, Record};
use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("network error: {0}")]
    Network(String),
    #[error("store rejected request: {0}")]
    Rejected(String),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
    #[error("record not found: {0}")]
    NotFound(String),
    #[error("not authenticated")]
    NotAuthenticated,
}

/// Managed document database, reduced to what the app calls.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Standing query over a whole collection. Every push is the full result set.
    async fn subscribe(&self, collection: &str) -> Result<Subscription, StoreError>;

    /// Create a record under a fresh id and return that id.
    async fn create_record(
        &self,
        collection: &str,
        writes: Vec<FieldWrite>,
    ) -> Result<String, StoreError>;

    /// Create or overwrite the record with the given id.
    async fn set_record(
        &self,
        collection: &str,
        id: &str,
        writes: Vec<FieldWrite>,
    ) -> Result<(), StoreError>;

    /// Apply field operations to an existing record.
    async fn update_record(
        &self,
        collection: &str,
        id: &str,
        writes: Vec<FieldWrite>,
    ) -> Result<(), StoreError>;

    async fn get_record(&self, collection: &str, id: &str) -> Result<Option<Record>, StoreError>;

    /// Equality-filtered point query.
    async fn query(
        &self,
        collection: &str,
        field: &str,
        value: Value,
    ) -> Result<Vec<Record>, StoreError>;
}

/// Handle on a live collection query.
///
/// Releasing or dropping the handle stops the worker feeding it.
pub struct Subscription {
    snapshots: mpsc::Receiver<Vec<Record>>,
    worker: Option<JoinHandle<()>>,
}

impl Subscription {
    pub fn new(snapshots: mpsc::Receiver<Vec<Record>>, worker: JoinHandle<()>) -> Self {
        Self {
            snapshots,
            worker: Some(worker),
        }
    }

    /// Wait for the next full snapshot. `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<Vec<Record>> {
        self.snapshots.recv().await
    }

    pub fn release(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
        self.snapshots.close();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.stop();
    }
}
