//! The activity event model.
//!
//! An [`ActivityEvent`] is an immutable record of something an actor did:
//! who ([`Actor`]), what (`action_type` + `summary`), when (`timestamp`),
//! plus an open bag of scalar detail fields. Events are serialized as JSON
//! both in the on-disk log (one object per line) and in SSE frame payloads,
//! with camelCase field names on the wire.
//!
//! [`EventDraft`] is the pre-acceptance shape: what a producer submits before
//! the store assigns an id and the gateway stamps the verification result.

use crate::event_id::EventId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The identity that produced an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Actor name, e.g. `"claude"` or `"deploy-bot"`. Ingestion restricts
    /// this to a configured allow-list.
    pub name: String,

    /// Actor kind, e.g. `"ai"`, `"human"`, `"system"`. Free-form.
    #[serde(rename = "type")]
    pub kind: String,
}

impl Actor {
    /// Create an actor from name and kind.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
        }
    }
}

/// A scalar value in an event's `details` map.
///
/// The details bag is deliberately open: consumers must treat unknown keys
/// opaquely rather than assuming a fixed schema. Values are restricted to
/// scalars so the bag stays flat and line-oriented logging stays cheap.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetailValue {
    /// Boolean flag.
    Bool(bool),
    /// Numeric value (integers and floats share this representation).
    Number(f64),
    /// Text value.
    String(String),
}

impl DetailValue {
    /// The value as a string slice, if it is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for DetailValue {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for DetailValue {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<f64> for DetailValue {
    fn from(n: f64) -> Self {
        Self::Number(n)
    }
}

impl From<bool> for DetailValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

/// An accepted activity event, as stored, persisted, and fanned out.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    /// Monotonic composite id assigned by the store at acceptance.
    pub id: EventId,

    /// Who produced the event.
    pub author: Actor,

    /// What kind of action this records, e.g. `"file_edit"`, `"deploy"`.
    pub action_type: String,

    /// One-line human-readable description.
    pub summary: String,

    /// Open string-keyed scalar map of extra context.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, DetailValue>,

    /// Producer-supplied wall-clock time (ISO-8601 on the wire).
    pub timestamp: DateTime<Utc>,

    /// Signature-check result stamped by the ingestion gateway, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
}

/// A submitted event before the store has accepted it.
///
/// Drafts carry everything an [`ActivityEvent`] does except the id (assigned
/// by the store) and the verification stamp (assigned by the gateway).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    /// Who produced the event.
    pub author: Actor,

    /// What kind of action this records.
    pub action_type: String,

    /// One-line human-readable description.
    pub summary: String,

    /// Open string-keyed scalar map of extra context.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub details: BTreeMap<String, DetailValue>,

    /// Producer-supplied wall-clock time.
    pub timestamp: DateTime<Utc>,

    /// Verification result, stamped by the gateway before append.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
}

impl EventDraft {
    /// Promote this draft into a stored event with the given id.
    #[must_use]
    pub fn into_event(self, id: EventId) -> ActivityEvent {
        ActivityEvent {
            id,
            author: self.author,
            action_type: self.action_type,
            summary: self.summary,
            details: self.details,
            timestamp: self.timestamp,
            verified: self.verified,
        }
    }
}
