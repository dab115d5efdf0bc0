// SPDX-License-Identifier: MPL-2.0

//! Firestore over its REST API.
//!
//! Records cross this boundary as plain JSON field maps; Firestore's typed value
//! envelopes (`stringValue`, `arrayValue`, ...) never leave this module. The REST
//! API has no streaming listener, so a live subscription polls the collection and
//! pushes the full result set whenever it differs from the last push.

use crate::backend::identity::TokenSource;
use crate::backend::record::{FieldOp, FieldWrite, Fields, Record, as_timestamp};
use crate::backend::store::{RemoteStore, StoreError, Subscription};
use crate::config::FIRESTORE_URL;
use async_trait::async_trait;
use chrono::SecondsFormat;
use rand::Rng;
use rand::distributions::Alphanumeric;
use reqwest::{RequestBuilder, StatusCode};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

const PAGE_SIZE: &str = "300";
const GENERATED_ID_LEN: usize = 20;

/// Existence precondition attached to a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Precondition {
    None,
    MustExist,
    MustNotExist,
}

struct Inner {
    http: reqwest::Client,
    endpoint: String,
    project_id: String,
    tokens: Arc<dyn TokenSource>,
    poll_interval: Duration,
}

#[derive(Clone)]
pub struct FirestoreStore {
    inner: Arc<Inner>,
}

impl FirestoreStore {
    pub fn new(project_id: &str, tokens: Arc<dyn TokenSource>, poll_interval: Duration) -> Self {
        Self::with_endpoint(FIRESTORE_URL, project_id, tokens, poll_interval)
    }

    /// Talk to another Firestore endpoint, such as a local emulator
    /// (`http://localhost:8080/v1`).
    pub fn with_endpoint(
        endpoint: &str,
        project_id: &str,
        tokens: Arc<dyn TokenSource>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                http: reqwest::Client::new(),
                endpoint: endpoint.trim_end_matches('/').to_string(),
                project_id: project_id.to_string(),
                tokens,
                poll_interval,
            }),
        }
    }

    fn database_path(&self) -> String {
        format!(
            "projects/{}/databases/(default)/documents",
            self.inner.project_id
        )
    }

    fn documents_url(&self) -> String {
        format!("{}/{}", self.inner.endpoint, self.database_path())
    }

    fn document_name(&self, collection: &str, id: &str) -> String {
        format!("{}/{collection}/{id}", self.database_path())
    }

    async fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.inner.tokens.id_token().await {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Send and decode JSON, turning HTTP failures into store errors.
    /// `Ok(None)` means 404.
    async fn send(&self, request: RequestBuilder) -> Result<Option<Value>, StoreError> {
        let response = self
            .authorized(request)
            .await
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;
        let parsed = serde_json::from_str::<Value>(&text);

        if status.is_success() {
            return parsed
                .map(Some)
                .map_err(|e| StoreError::InvalidResponse(e.to_string()));
        }

        let body = parsed.unwrap_or(Value::Null);
        match status {
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::UNAUTHORIZED => Err(StoreError::NotAuthenticated),
            _ => Err(StoreError::Rejected(error_message(&body, status))),
        }
    }

    async fn commit(&self, write: Value, missing: impl FnOnce() -> String) -> Result<(), StoreError> {
        let request = self
            .inner
            .http
            .post(format!("{}:commit", self.documents_url()))
            .json(&json!({ "writes": [write] }));

        match self.send(request).await? {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(missing())),
        }
    }

    /// Read a whole collection, following page tokens.
    pub async fn list_collection(&self, collection: &str) -> Result<Vec<Record>, StoreError> {
        let url = format!("{}/{collection}", self.documents_url());
        let mut records = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.inner.http.get(&url).query(&[("pageSize", PAGE_SIZE)]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            // Missing collection reads as empty
            let Some(body) = self.send(request).await? else {
                break;
            };

            if let Some(documents) = body.get("documents").and_then(Value::as_array) {
                for document in documents {
                    records.push(decode_document(document)?);
                }
            }

            page_token = body
                .get("nextPageToken")
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            if page_token.is_none() {
                break;
            }
        }

        Ok(records)
    }
}

#[async_trait]
impl RemoteStore for FirestoreStore {
    async fn subscribe(&self, collection: &str) -> Result<Subscription, StoreError> {
        let (tx, rx) = mpsc::channel(4);
        let store = self.clone();
        let collection = collection.to_string();

        let worker = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(store.inner.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last: Option<Vec<Record>> = None;

            loop {
                ticker.tick().await;
                match store.list_collection(&collection).await {
                    Ok(records) => {
                        if last.as_ref() == Some(&records) {
                            continue;
                        }
                        if tx.send(records.clone()).await.is_err() {
                            break;
                        }
                        last = Some(records);
                    }
                    Err(e) => tracing::warn!("polling {collection} failed: {e}"),
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
        let id = generate_id();
        let write = build_write(
            self.document_name(collection, &id),
            &writes,
            Precondition::MustNotExist,
        );
        self.commit(write, || format!("{collection}/{id}")).await?;
        Ok(id)
    }

    async fn set_record(
        &self,
        collection: &str,
        id: &str,
        writes: Vec<FieldWrite>,
    ) -> Result<(), StoreError> {
        let write = build_write(
            self.document_name(collection, id),
            &writes,
            Precondition::None,
        );
        self.commit(write, || format!("{collection}/{id}")).await
    }

    async fn update_record(
        &self,
        collection: &str,
        id: &str,
        writes: Vec<FieldWrite>,
    ) -> Result<(), StoreError> {
        let write = build_write(
            self.document_name(collection, id),
            &writes,
            Precondition::MustExist,
        );
        self.commit(write, || format!("{collection}/{id}")).await
    }

    async fn get_record(&self, collection: &str, id: &str) -> Result<Option<Record>, StoreError> {
        let request = self
            .inner
            .http
            .get(format!("{}/{collection}/{id}", self.documents_url()));

        self.send(request)
            .await?
            .map(|document| decode_document(&document))
            .transpose()
    }

    async fn query(
        &self,
        collection: &str,
        field: &str,
        value: Value,
    ) -> Result<Vec<Record>, StoreError> {
        let body = json!({
            "structuredQuery": {
                "from": [{ "collectionId": collection }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": field_path(field) },
                        "op": "EQUAL",
                        "value": encode_value(&value),
                    }
                }
            }
        });
        let request = self
            .inner
            .http
            .post(format!("{}:runQuery", self.documents_url()))
            .json(&body);

        let Some(results) = self.send(request).await? else {
            return Ok(Vec::new());
        };

        // One element per match; elements without `document` only carry readTime
        results
            .as_array()
            .ok_or_else(|| StoreError::InvalidResponse("runQuery: expected array".into()))?
            .iter()
            .filter_map(|item| item.get("document"))
            .map(decode_document)
            .collect()
    }
}

fn generate_id() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_ID_LEN)
        .map(char::from)
        .collect()
}

fn error_message(body: &Value, status: StatusCode) -> String {
    body.get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| status.to_string())
}

/// Backtick-quote field names that are not plain identifiers.
fn field_path(name: &str) -> String {
    let plain = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain {
        name.to_string()
    } else {
        format!("`{}`", name.replace('\\', "\\\\").replace('`', "\\`"))
    }
}

/// Build one `Write` for `:commit`: plain sets go in `update`, array and
/// clock operations in `updateTransforms`.
fn build_write(name: String, writes: &[FieldWrite], precondition: Precondition) -> Value {
    let mut fields = Map::new();
    let mut mask = Vec::new();
    let mut transforms = Vec::new();

    for write in writes {
        let path = field_path(&write.field);
        match &write.op {
            FieldOp::Set(value) => {
                fields.insert(write.field.clone(), encode_value(value));
                mask.push(Value::String(path));
            }
            FieldOp::SetAdd(values) => transforms.push(json!({
                "fieldPath": path,
                "appendMissingElements": { "values": values.iter().map(encode_value).collect::<Vec<_>>() },
            })),
            FieldOp::SetRemove(values) => transforms.push(json!({
                "fieldPath": path,
                "removeAllFromArray": { "values": values.iter().map(encode_value).collect::<Vec<_>>() },
            })),
            FieldOp::ServerTime => transforms.push(json!({
                "fieldPath": path,
                "setToServerValue": "REQUEST_TIME",
            })),
        }
    }

    let mut write = Map::new();
    write.insert("update".into(), json!({ "name": name, "fields": fields }));
    if !transforms.is_empty() {
        write.insert("updateTransforms".into(), Value::Array(transforms));
    }
    match precondition {
        // Partial update: only the named fields are touched
        Precondition::MustExist => {
            write.insert("updateMask".into(), json!({ "fieldPaths": mask }));
            write.insert("currentDocument".into(), json!({ "exists": true }));
        }
        Precondition::MustNotExist => {
            write.insert("currentDocument".into(), json!({ "exists": false }));
        }
        Precondition::None => {}
    }
    Value::Object(write)
}

/// Plain JSON into a Firestore `Value` envelope.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(b) => json!({ "booleanValue": b }),
        Value::Number(n) => match n.as_i64() {
            Some(i) => json!({ "integerValue": i.to_string() }),
            None => json!({ "doubleValue": n.as_f64() }),
        },
        Value::String(s) => json!({ "stringValue": s }),
        Value::Array(items) => json!({
            "arrayValue": { "values": items.iter().map(encode_value).collect::<Vec<_>>() }
        }),
        Value::Object(map) => match as_timestamp(map) {
            Some(at) => json!({ "timestampValue": at.to_rfc3339_opts(SecondsFormat::AutoSi, true) }),
            None => json!({ "mapValue": { "fields": encode_fields(map) } }),
        },
    }
}

fn encode_fields(fields: &Fields) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(k, v)| (k.clone(), encode_value(v)))
            .collect(),
    )
}

/// Firestore `Value` envelope into plain JSON. Timestamps, bytes and
/// references become strings; unknown envelopes become null.
pub fn decode_value(value: &Value) -> Value {
    let Some(envelope) = value.as_object() else {
        return Value::Null;
    };
    let Some((kind, inner)) = envelope.iter().next() else {
        return Value::Null;
    };

    match kind.as_str() {
        "booleanValue" => inner.as_bool().map(Value::Bool).unwrap_or(Value::Null),
        "integerValue" => inner
            .as_str()
            .and_then(|s| s.parse::<i64>().ok())
            .or_else(|| inner.as_i64())
            .map(Value::from)
            .unwrap_or(Value::Null),
        "doubleValue" => inner.as_f64().map(Value::from).unwrap_or(Value::Null),
        "stringValue" | "timestampValue" | "bytesValue" | "referenceValue" => inner.clone(),
        "geoPointValue" => inner.clone(),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|items| items.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => Value::Object(decode_fields(inner.get("fields"))),
        _ => Value::Null,
    }
}

fn decode_fields(fields: Option<&Value>) -> Fields {
    fields
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .map(|(k, v)| (k.clone(), decode_value(v)))
                .collect()
        })
        .unwrap_or_default()
}

/// Firestore `Document` into a record keyed by the last path segment.
pub fn decode_document(document: &Value) -> Result<Record, StoreError> {
    let name = document
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| StoreError::InvalidResponse("document without name".into()))?;
    let id = name
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| StoreError::InvalidResponse(format!("bad document name: {name}")))?;

    Ok(Record::new(id, decode_fields(document.get("fields"))))
}
