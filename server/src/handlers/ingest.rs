//! Signed event ingestion and the diagnostic injector.
//!
//! Every producer-submitted event is authenticated (HMAC-SHA256 over the
//! payload with the signature stripped) and field-validated before it
//! reaches the store or the bus. Rejections happen synchronously: a bad
//! event is never persisted and never fanned out.

use crate::auth::{self, SIGNATURE_FIELD, SIGNATURE_HEADER};
use crate::bus::Broadcast;
use crate::error::AppError;
use crate::state::AppState;
use axum::{Json, extract::State, http::HeaderMap};
use chrono::Utc;
use metrics::counter;
use pulsefeed_core::{Actor, EventDraft};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::info;

/// Response body for accepted ingest requests.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    /// Whether the request was accepted.
    pub ok: bool,
    /// Assigned event id; absent when the event coalesced into the
    /// previous entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Signature verification result stamped on the stored event.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
}

/// `POST /api/activity`: authenticated event ingestion.
///
/// # Errors
///
/// `403` on a missing or invalid signature, `400` on missing or invalid
/// fields (unknown actor, empty action type or summary, bad timestamp).
pub async fn ingest(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Json<IngestResponse>, AppError> {
    let provided = extract_signature(&headers, &body)
        .ok_or_else(|| AppError::forbidden("missing signature"))?;
    if !auth::verify_signature(&state.config.signing_secret, &body, &provided) {
        counter!("pulsefeed_ingest_rejected", "reason" => "signature").increment(1);
        return Err(AppError::forbidden("invalid signature"));
    }

    let mut draft = parse_draft(body)?;
    validate_draft(&draft, &state.config.allowed_actors)?;
    draft.verified = Some(true);

    Ok(Json(accept(&state, draft)))
}

/// `POST /api/activity/test`: synthetic event injector.
///
/// Intended for smoke-testing stream consumers in development. Refuses
/// unless explicitly enabled in the server configuration; the production
/// binary never enables it.
///
/// # Errors
///
/// `403` while the injector is disabled.
pub async fn inject_test_event(
    State(state): State<AppState>,
    body: Option<Json<InjectRequest>>,
) -> Result<Json<IngestResponse>, AppError> {
    if !state.config.enable_test_injector {
        return Err(AppError::forbidden("test injector is disabled"));
    }

    let request = body.map(|Json(r)| r).unwrap_or_default();
    let draft = EventDraft {
        author: Actor::new("test-harness", "system"),
        action_type: request.action_type.unwrap_or_else(|| "test_event".to_string()),
        summary: request
            .summary
            .unwrap_or_else(|| "Synthetic test event".to_string()),
        details: BTreeMap::new(),
        timestamp: Utc::now(),
        verified: Some(false),
    };
    info!(action = %draft.action_type, "injecting synthetic test event");
    Ok(Json(accept(&state, draft)))
}

/// Optional overrides for injected test events.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InjectRequest {
    /// Action type of the synthetic event.
    pub action_type: Option<String>,
    /// Summary of the synthetic event.
    pub summary: Option<String>,
}

/// Store the draft and fan it out; coalesced duplicates are acknowledged
/// without an id.
fn accept(state: &AppState, draft: EventDraft) -> IngestResponse {
    match state.store.append(draft) {
        Some(event) => {
            state.bus.publish(&Broadcast::Activity(event.clone()));
            IngestResponse {
                ok: true,
                id: Some(event.id.to_string()),
                verified: event.verified,
            }
        }
        None => IngestResponse {
            ok: true,
            id: None,
            verified: None,
        },
    }
}

/// Signature from the `X-Activity-Signature` header, falling back to the
/// `sig` body field.
fn extract_signature(headers: &HeaderMap, body: &Value) -> Option<String> {
    headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
        .or_else(|| {
            body.get(SIGNATURE_FIELD)
                .and_then(Value::as_str)
                .map(ToString::to_string)
        })
}

fn parse_draft(mut body: Value) -> Result<EventDraft, AppError> {
    if let Some(map) = body.as_object_mut() {
        map.remove(SIGNATURE_FIELD);
    }
    serde_json::from_value(body)
        .map_err(|e| AppError::bad_request(format!("invalid event payload: {e}")))
}

fn validate_draft(draft: &EventDraft, allowed_actors: &[String]) -> Result<(), AppError> {
    if draft.author.name.trim().is_empty() {
        return Err(AppError::bad_request("author.name is required"));
    }
    if !allowed_actors.iter().any(|a| a == &draft.author.name) {
        counter!("pulsefeed_ingest_rejected", "reason" => "actor").increment(1);
        return Err(AppError::bad_request(format!(
            "unknown actor: {}",
            draft.author.name
        )));
    }
    if draft.action_type.trim().is_empty() {
        return Err(AppError::bad_request("actionType is required"));
    }
    if draft.summary.trim().is_empty() {
        return Err(AppError::bad_request("summary is required"));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn allowed() -> Vec<String> {
        vec!["claude".to_string()]
    }

    fn valid_draft() -> EventDraft {
        serde_json::from_value(json!({
            "author": {"name": "claude", "type": "ai"},
            "actionType": "file_edit",
            "summary": "Edited a file",
            "timestamp": "2025-11-01T12:00:00Z",
        }))
        .unwrap()
    }

    #[test]
    fn valid_draft_passes_validation() {
        assert!(validate_draft(&valid_draft(), &allowed()).is_ok());
    }

    #[test]
    fn unknown_actor_is_rejected() {
        let mut draft = valid_draft();
        draft.author.name = "intruder".to_string();
        assert!(validate_draft(&draft, &allowed()).is_err());
    }

    #[test]
    fn blank_fields_are_rejected() {
        let mut draft = valid_draft();
        draft.summary = "   ".to_string();
        assert!(validate_draft(&draft, &allowed()).is_err());

        let mut draft = valid_draft();
        draft.action_type = String::new();
        assert!(validate_draft(&draft, &allowed()).is_err());
    }

    #[test]
    fn parse_draft_strips_signature_field() {
        let body = json!({
            "author": {"name": "claude", "type": "ai"},
            "actionType": "file_edit",
            "summary": "Edited a file",
            "timestamp": "2025-11-01T12:00:00Z",
            "sig": "deadbeef",
        });
        let draft = parse_draft(body).unwrap();
        assert_eq!(draft.action_type, "file_edit");
    }

    #[test]
    fn parse_draft_rejects_missing_timestamp() {
        let body = json!({
            "author": {"name": "claude", "type": "ai"},
            "actionType": "file_edit",
            "summary": "Edited a file",
        });
        assert!(parse_draft(body).is_err());
    }
}
