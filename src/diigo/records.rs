//! Records returned by the Diigo endpoints.
//!
//! Both transports deliver bookmarks with nested annotations, and each
//! annotation may carry sticky notes (the API calls them `comments`, the
//! outliner feed `stickyNotes`). The two endpoints disagree on field names and
//! on whether ids and timestamps are strings or numbers, so the lenient
//! deserializers below normalize them.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as Json;

use crate::types::ObjectId;

/// A field value handed to the field mapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Text(String),
    Resource(ObjectId),
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(text) => text.trim().is_empty(),
            FieldValue::Resource(_) => false,
        }
    }
}

/// Flat (field name, value) view of a record.
pub type Fields = Vec<(&'static str, FieldValue)>;

fn push_text(fields: &mut Fields, name: &'static str, value: Option<&str>) {
    if let Some(value) = value {
        fields.push((name, FieldValue::Text(value.to_string())));
    }
}

/// A remote timestamp, kept verbatim next to its parsed epoch seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTime {
    pub raw: String,
    pub epoch: Option<i64>,
}

impl RemoteTime {
    pub fn parse(raw: &str) -> Self {
        Self {
            raw: raw.to_string(),
            epoch: parse_epoch(raw),
        }
    }

    pub fn from_epoch(seconds: i64) -> Self {
        let raw = Utc
            .timestamp_opt(seconds, 0)
            .single()
            .map(|dt| dt.format("%Y/%m/%d %H:%M:%S %z").to_string())
            .unwrap_or_else(|| seconds.to_string());
        Self {
            raw,
            epoch: Some(seconds),
        }
    }
}

/// Parse the formats seen in the wild: `2019/01/14 10:26:52 +0000` (API),
/// RFC 3339, naive `YYYY-MM-DD HH:MM:SS` (UTC), and epoch seconds or
/// milliseconds.
pub fn parse_epoch(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Some(if n > 100_000_000_000 { n / 1000 } else { n });
    }
    if let Ok(dt) = DateTime::parse_from_str(raw, "%Y/%m/%d %H:%M:%S %z") {
        return Some(dt.timestamp());
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc().timestamp());
        }
    }
    None
}

impl<'de> Deserialize<'de> for RemoteTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Json::deserialize(deserializer)? {
            Json::String(s) => Ok(RemoteTime::parse(&s)),
            Json::Number(n) => match n.as_i64() {
                Some(n) if n > 100_000_000_000 => Ok(RemoteTime::from_epoch(n / 1000)),
                Some(n) => Ok(RemoteTime::from_epoch(n)),
                None => Ok(RemoteTime::parse(&n.to_string())),
            },
            other => Err(serde::de::Error::custom(format!(
                "expected timestamp string or number, got {}",
                other
            ))),
        }
    }
}

impl Serialize for RemoteTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

/// Accept a string or a number, yield its text form.
fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Json>::deserialize(deserializer)? {
        Some(Json::String(s)) if !s.is_empty() => Some(s),
        Some(Json::Number(n)) => Some(n.to_string()),
        Some(Json::Bool(b)) => Some(if b { "yes" } else { "no" }.to_string()),
        _ => None,
    })
}

/// Accept `"a,b"` or `["a", "b"]`, yield the comma-joined form.
fn tag_list<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Json>::deserialize(deserializer)? {
        Some(Json::String(s)) => Some(s),
        Some(Json::Array(items)) => Some(
            items
                .iter()
                .filter_map(|item| match item {
                    Json::String(s) => Some(s.clone()),
                    Json::Object(map) => map
                        .get("name")
                        .or_else(|| map.get("tag"))
                        .and_then(Json::as_str)
                        .map(str::to_string),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(","),
        ),
        _ => None,
    })
}

/// A sticky note attached to an annotation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Note {
    #[serde(default, deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, alias = "user_name")]
    pub user: Option<String>,
    #[serde(default)]
    pub created_at: Option<RemoteTime>,
}

impl Note {
    pub fn fields(&self) -> Fields {
        let mut fields = Fields::new();
        push_text(&mut fields, "content", self.content.as_deref());
        push_text(&mut fields, "user", self.user.as_deref());
        push_text(
            &mut fields,
            "created_at",
            self.created_at.as_ref().map(|t| t.raw.as_str()),
        );
        fields
    }
}

/// A highlight, image or other annotation on a bookmark.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(default, alias = "annotation_id", deserialize_with = "string_or_number")]
    pub id: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, alias = "image", alias = "src")]
    pub image_url: Option<String>,
    #[serde(default, alias = "user_name")]
    pub user: Option<String>,
    #[serde(default)]
    pub created_at: Option<RemoteTime>,
    #[serde(default, alias = "stickyNotes", alias = "comments")]
    pub notes: Vec<Note>,
}

impl Annotation {
    /// Image annotations are downloaded and attached instead of being
    /// turned into citations.
    pub fn is_image(&self) -> bool {
        match self.kind.as_deref() {
            Some(kind) => kind.eq_ignore_ascii_case("image"),
            None => self.image_url.is_some() && self.content.is_none(),
        }
    }

    pub fn fields(&self) -> Fields {
        let mut fields = Fields::new();
        push_text(&mut fields, "content", self.content.as_deref());
        push_text(&mut fields, "user", self.user.as_deref());
        push_text(
            &mut fields,
            "created_at",
            self.created_at.as_ref().map(|t| t.raw.as_str()),
        );
        fields
    }
}

/// A saved URL with its metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bookmark {
    pub url: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, alias = "description")]
    pub desc: Option<String>,
    #[serde(default, deserialize_with = "tag_list")]
    pub tags: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub shared: Option<String>,
    #[serde(default)]
    pub created_at: Option<RemoteTime>,
    #[serde(default)]
    pub updated_at: Option<RemoteTime>,
    #[serde(default, alias = "user_name")]
    pub user: Option<String>,
    #[serde(default)]
    pub real_name: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    pub link_id: Option<String>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl Bookmark {
    /// Timestamp compared against the cutoff: `updated_at`, else `created_at`.
    pub fn timestamp(&self) -> Option<i64> {
        self.updated_at
            .as_ref()
            .and_then(|t| t.epoch)
            .or_else(|| self.created_at.as_ref().and_then(|t| t.epoch))
    }

    /// Whether the record falls before the cutoff. Records without a
    /// parseable timestamp are never filtered out.
    pub fn is_before(&self, cutoff: i64) -> bool {
        self.timestamp().is_some_and(|ts| ts < cutoff)
    }

    /// Tags split on commas, trimmed, empties dropped.
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn fields(&self) -> Fields {
        let mut fields = Fields::new();
        push_text(&mut fields, "url", Some(self.url.as_str()));
        push_text(&mut fields, "title", self.title.as_deref());
        push_text(&mut fields, "desc", self.desc.as_deref());
        push_text(&mut fields, "content", self.content.as_deref());
        push_text(&mut fields, "shared", self.shared.as_deref());
        push_text(
            &mut fields,
            "created_at",
            self.created_at.as_ref().map(|t| t.raw.as_str()),
        );
        push_text(
            &mut fields,
            "updated_at",
            self.updated_at.as_ref().map(|t| t.raw.as_str()),
        );
        push_text(&mut fields, "user", self.user.as_deref());
        fields
    }
}

/// Body of one outliner feed page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FeedPage {
    #[serde(default)]
    pub items: Vec<Bookmark>,
}
