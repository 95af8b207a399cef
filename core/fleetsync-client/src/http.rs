//! Response helpers shared by both HTTP clients.

use crate::error::{ClientError, ClientResult};
use fleetsync_types::Payload;
use reqwest::Response;
use serde_json::Value;

/// Turns a non-2xx response into [`ClientError::Status`].
pub(crate) async fn ensure_success(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        status: status.as_u16(),
        body,
    })
}

/// Reads a JSON body; an empty body reads as `Null`.
pub(crate) async fn read_json(response: Response) -> ClientResult<Value> {
    let bytes = response.bytes().await?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
}

/// Extracts a list from either a bare array or an object envelope under `key`.
pub(crate) fn extract_list(body: Value, key: &str) -> ClientResult<Vec<Value>> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => match map.remove(key) {
            Some(Value::Array(items)) => Ok(items),
            Some(Value::Null) | None => Ok(Vec::new()),
            Some(other) => Err(ClientError::Decode(format!(
                "expected `{key}` to be an array, got {other}"
            ))),
        },
        Value::Null => Ok(Vec::new()),
        other => Err(ClientError::Decode(format!("expected a list, got {other}"))),
    }
}

/// The body when it already carries data, otherwise the request payload
/// echoed back with `id` set.
pub(crate) fn echo_with_id(body: Value, id: Option<&str>, payload: &Payload) -> Value {
    if body.get("id").is_some() {
        return body;
    }
    match id {
        Some(id) => {
            let mut echoed = payload.clone();
            echoed.insert("id".into(), Value::String(id.to_string()));
            Value::Object(echoed)
        }
        None if body.is_null() => Value::Object(payload.clone()),
        None => body,
    }
}

/// Last non-empty path segment of a `Location` header value.
pub(crate) fn id_from_location(location: &str) -> Option<&str> {
    location.rsplit('/').find(|segment| !segment.is_empty())
}
