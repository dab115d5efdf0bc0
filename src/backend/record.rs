// SPDX-License-Identifier: MPL-2.0

//! Raw store records and their validated mapping into our own types.
//!
//! Stores hand back loosely shaped JSON field maps. Everything above this module
//! sees `Post` and `Comment` only; missing or malformed fields are decided here.

use crate::backend::types::{Author, Comment, Post};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value, json};
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

pub type Fields = Map<String, Value>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RecordError {
    #[error("record {id}: missing field `{field}`")]
    MissingField { id: String, field: &'static str },
}

/// One document as returned by a store.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub id: String,
    pub fields: Fields,
}

impl Record {
    pub fn new(id: impl Into<String>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    pub fn str_field(&self, name: &str) -> Option<&str> {
        non_empty_str(self.fields.get(name))
    }
}

/// Field-level write operation.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOp {
    Set(Value),
    /// Append each value not already present (array as a set)
    SetAdd(Vec<Value>),
    /// Remove every element equal to one of the values
    SetRemove(Vec<Value>),
    /// Store's own clock at commit time
    ServerTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldWrite {
    pub field: String,
    pub op: FieldOp,
}

impl FieldWrite {
    pub fn set(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FieldOp::Set(value.into()),
        }
    }

    pub fn set_add(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FieldOp::SetAdd(vec![value.into()]),
        }
    }

    pub fn set_remove(field: &str, value: impl Into<Value>) -> Self {
        Self {
            field: field.to_string(),
            op: FieldOp::SetRemove(vec![value.into()]),
        }
    }

    pub fn server_time(field: &str) -> Self {
        Self {
            field: field.to_string(),
            op: FieldOp::ServerTime,
        }
    }
}

/// Wire names of post and comment fields.
pub mod keys {
    pub const USER_ID: &str = "userId";
    pub const USER_EMAIL: &str = "userEmail";
    pub const USER_NAME: &str = "userName";
    pub const IMAGE_URL: &str = "imageUrl";
    pub const CAPTION: &str = "caption";
    pub const CREATED_AT: &str = "createdAt";
    pub const LIKED_BY: &str = "likedBy";
    pub const COMMENTS: &str = "comments";
    pub const TEXT: &str = "text";
    pub const NAME: &str = "name";
    pub const EMAIL: &str = "email";
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn owned_str(value: Option<&Value>) -> Option<String> {
    non_empty_str(value).map(str::to_string)
}

/// Accepts RFC 3339 strings, epoch milliseconds, or `{seconds, nanoseconds}`.
pub fn parse_timestamp(value: Option<&Value>) -> Option<DateTime<Utc>> {
    match value? {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        Value::Object(map) => {
            let seconds = map.get("seconds").and_then(Value::as_i64)?;
            let nanos = map
                .get("nanoseconds")
                .and_then(Value::as_u64)
                .unwrap_or(0);
            DateTime::from_timestamp(seconds, u32::try_from(nanos).ok()?)
        }
        _ => None,
    }
}

pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Timestamp nested inside a field value, as `{seconds, nanoseconds}`.
///
/// Stores that have a native timestamp type recognise this shape with
/// [`as_timestamp`] and write it typed.
pub fn timestamp_value(at: DateTime<Utc>) -> Value {
    json!({
        "seconds": at.timestamp(),
        "nanoseconds": at.timestamp_subsec_nanos(),
    })
}

/// The instant a `{seconds, nanoseconds}` map stands for. Maps with any other
/// keys are plain maps.
pub fn as_timestamp(map: &Fields) -> Option<DateTime<Utc>> {
    if map.len() != 2 {
        return None;
    }
    let seconds = map.get("seconds")?.as_i64()?;
    let nanos = u32::try_from(map.get("nanoseconds")?.as_u64()?).ok()?;
    DateTime::from_timestamp(seconds, nanos)
}

impl Post {
    /// Map a `posts` record, rejecting records without an author or image.
    pub fn from_record(record: &Record) -> Result<Post, RecordError> {
        let fields = &record.fields;
        let author_id =
            owned_str(fields.get(keys::USER_ID)).ok_or_else(|| RecordError::MissingField {
                id: record.id.clone(),
                field: keys::USER_ID,
            })?;
        let image_url =
            owned_str(fields.get(keys::IMAGE_URL)).ok_or_else(|| RecordError::MissingField {
                id: record.id.clone(),
                field: keys::IMAGE_URL,
            })?;

        let liked_by: BTreeSet<String> = fields
            .get(keys::LIKED_BY)
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let comments = fields
            .get(keys::COMMENTS)
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| {
                        let comment = Comment::from_value(entry);
                        if comment.is_none() {
                            tracing::debug!(post = %record.id, "dropping malformed comment");
                        }
                        comment
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(Post {
            id: record.id.clone(),
            author: Author {
                id: author_id,
                email: owned_str(fields.get(keys::USER_EMAIL)),
                name: owned_str(fields.get(keys::USER_NAME)),
            },
            image_url,
            caption: owned_str(fields.get(keys::CAPTION)),
            created_at: parse_timestamp(fields.get(keys::CREATED_AT)),
            liked_by,
            comments,
        })
    }
}

impl Comment {
    /// Map one element of a post's `comments` array.
    pub fn from_value(value: &Value) -> Option<Comment> {
        let map = value.as_object()?;
        let text = non_empty_str(map.get(keys::TEXT))?.to_string();
        Some(Comment {
            author: Author {
                id: owned_str(map.get(keys::USER_ID))?,
                email: owned_str(map.get(keys::USER_EMAIL)),
                name: owned_str(map.get(keys::USER_NAME)),
            },
            text,
            created_at: parse_timestamp(map.get(keys::CREATED_AT)),
        })
    }

    pub fn to_value(&self) -> Value {
        json!({
            "userId": self.author.id,
            "userEmail": self.author.email,
            "userName": self.author.name,
            "text": self.text,
            "createdAt": self.created_at.map(timestamp_value),
        })
    }
}

/// Map every record of a snapshot, skipping invalid ones and repeated ids.
pub fn posts_from_records(records: &[Record]) -> Vec<Post> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter_map(|record| match Post::from_record(record) {
            Ok(post) => Some(post),
            Err(e) => {
                tracing::warn!("skipping post: {e}");
                None
            }
        })
        .filter(|post| seen.insert(post.id.clone()))
        .collect()
}

/// Newest first. Stable, so equal timestamps keep store order; undated posts go last.
pub fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| match (a.created_at, b.created_at) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
}
