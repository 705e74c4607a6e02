//! Board admission: the `PUT /<key>` write path.
//!
//! Checks run in a fixed order, cheapest first, with the Ed25519
//! verification last. The body's `<time>` timestamp is authoritative for
//! staleness; the `If-Unmodified-Since` header only lets stale writes fail
//! before the body is examined.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use spring83_protocol::difficulty::{difficulty_factor, key_under_threshold};
use spring83_protocol::httpdate::parse_http_date;
use spring83_protocol::timetag::parse_modified;
use spring83_protocol::{Board, BoardKey, BoardSignature, SignatureError, MAX_BOARD_BYTES};
use spring83_relay::via_token;
use spring83_store::BoardStore;

use crate::ServerContext;

pub async fn publish_board(
    State(context): State<Arc<ServerContext>>,
    Path(key): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle_put(&context, &key, &headers, &body, Utc::now())
}

/// Run the admission checks against an explicit clock. Split from the
/// handler so the calendar-dependent rules are testable on fixed dates.
pub(crate) fn handle_put(
    context: &ServerContext,
    key_path: &str,
    headers: &HeaderMap,
    body: &[u8],
    now: DateTime<Utc>,
) -> Response {
    let key = match BoardKey::parse(key_path) {
        Ok(key) => key,
        Err(_) => return respond(StatusCode::BAD_REQUEST, "Invalid key", None),
    };
    tracing::info!("receiving board for {}", key.as_hex());

    let if_unmodified_since = match headers
        .get("if-unmodified-since")
        .map(|value| value.to_str().map(parse_http_date))
    {
        None => None,
        Some(Ok(Ok(when))) => Some(when),
        Some(_) => {
            return respond(
                StatusCode::BAD_REQUEST,
                "Invalid format for If-Unmodified-Since header",
                None,
            )
        }
    };

    let current = match context.store.get(key.as_hex()) {
        Ok(current) => current,
        Err(err) => {
            tracing::error!("board lookup failed: {err}");
            return respond(StatusCode::INTERNAL_SERVER_ERROR, "internal error", None);
        }
    };

    if let (Some(current), Some(header_time)) = (current.as_ref(), if_unmodified_since) {
        if current.modified >= header_time {
            return respond(StatusCode::CONFLICT, "Old content", None);
        }
    }

    // New keys must clear the difficulty threshold before anything else is
    // spent on them.
    let mut difficulty = None;
    if current.is_none() {
        let count = match context.store.count() {
            Ok(count) => count,
            Err(err) => {
                tracing::error!("board count failed: {err}");
                return respond(StatusCode::INTERNAL_SERVER_ERROR, "internal error", None);
            }
        };
        let factor = difficulty_factor(count);
        difficulty = Some(factor);
        if !key_under_threshold(&key, factor) {
            return respond(
                StatusCode::FORBIDDEN,
                "Key greater than threshold",
                difficulty,
            );
        }
    }

    let signature = match headers.get("spring-signature") {
        None => {
            return respond(
                StatusCode::BAD_REQUEST,
                &SignatureError::Missing.to_string(),
                difficulty,
            )
        }
        Some(value) => {
            let raw = match value.to_str() {
                Ok(raw) => raw,
                Err(_) => {
                    return respond(
                        StatusCode::BAD_REQUEST,
                        &SignatureError::BadHex.to_string(),
                        difficulty,
                    )
                }
            };
            match BoardSignature::parse(raw) {
                Ok(signature) => signature,
                Err(err) => {
                    return respond(StatusCode::BAD_REQUEST, &err.to_string(), difficulty)
                }
            }
        }
    };

    if key.is_denied() {
        return respond(StatusCode::UNAUTHORIZED, "Denied", difficulty);
    }

    if let Err(err) = key.check_expiry(now) {
        return respond(StatusCode::BAD_REQUEST, &err.to_string(), difficulty);
    }

    if body.len() > MAX_BOARD_BYTES {
        return respond(
            StatusCode::PAYLOAD_TOO_LARGE,
            "Payload too large",
            difficulty,
        );
    }

    let body_time = match parse_modified(body) {
        Ok(when) => when,
        Err(err) => return respond(StatusCode::BAD_REQUEST, &err.to_string(), difficulty),
    };

    if let Some(current) = current.as_ref() {
        if current.modified >= body_time {
            return respond(StatusCode::CONFLICT, "Old content", difficulty);
        }
    }

    if !signature.verifies(&key, body) {
        return respond(StatusCode::BAD_REQUEST, "Invalid signature", difficulty);
    }

    let board = Board {
        key: key.as_hex().to_string(),
        body: body.to_vec(),
        modified: body_time,
        signature: signature.as_hex().to_string(),
    };
    if let Err(err) = context.store.put(&board) {
        tracing::error!("board save failed: {err}");
        return respond(StatusCode::INTERNAL_SERVER_ERROR, "Server error", difficulty);
    }

    let via_host = headers
        .get("via")
        .and_then(|value| value.to_str().ok())
        .and_then(via_token);
    context.tracker.fan_out(&board, &context.federates, via_host);

    respond(StatusCode::OK, "", difficulty)
}

/// Plain-text response, with `Spring-Difficulty` attached once the write
/// path has computed it.
fn respond(status: StatusCode, message: &str, difficulty: Option<f64>) -> Response {
    let mut headers = HeaderMap::new();
    if let Some(factor) = difficulty {
        if let Ok(value) = HeaderValue::from_str(&format!("{factor:.6}")) {
            headers.insert(HeaderName::from_static("spring-difficulty"), value);
        }
    }
    (status, headers, message.to_string()).into_response()
}
