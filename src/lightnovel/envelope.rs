//! Request/response envelope codec for the lightnovel API.
//!
//! Every request body carries fixed platform/client/version metadata, a
//! nested `d` object with the security key plus endpoint-specific fields,
//! and `gz: 1`. Responses arrive either as `base64(zlib(JSON))` of the
//! whole body, or as plain JSON whose `data` field may itself be a packed
//! string. The remote toggles the mode per endpoint, so [`decode`] tries
//! both rather than assuming one.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use flate2::read::ZlibDecoder;
use serde_json::Value;
use std::io::Read;

use crate::error::{CheckinError, Result};

/// Client platform identifier sent with every request.
pub const PLATFORM: &str = "android";
/// Client type identifier.
pub const CLIENT: &str = "app";
/// App version name the API expects.
pub const VER_NAME: &str = "0.11.53";
/// App version code the API expects.
pub const VER_CODE: i64 = 193;

/// Build an authenticated request body.
///
/// `extra` must be a JSON object; its fields are merged into `d` next to
/// the security key.
pub fn request_body(security_key: &str, extra: Value) -> Value {
    let mut d = serde_json::json!({ "security_key": security_key });
    if let (Some(target), Value::Object(fields)) = (d.as_object_mut(), extra) {
        for (key, value) in fields {
            target.insert(key, value);
        }
    }
    serde_json::json!({
        "platform": PLATFORM,
        "client": CLIENT,
        "sign": "",
        "ver_name": VER_NAME,
        "ver_code": VER_CODE,
        "d": d,
        "gz": 1,
    })
}

/// Build the login request body (no security key yet, credentials in `d`).
pub fn login_body(username: &str, password: &str) -> Value {
    serde_json::json!({
        "platform": PLATFORM,
        "client": CLIENT,
        "sign": "",
        "ver_name": VER_NAME,
        "ver_code": VER_CODE,
        "is_encrypted": 0,
        "d": {
            "username": username,
            "password": password,
        },
        "gz": 1,
    })
}

/// Decode a response body in whichever envelope mode the remote chose.
///
/// Tries `base64 → zlib inflate → JSON` on the whole body first, then falls
/// back to parsing the body as plain JSON; in the plain case a string-typed
/// `data` field gets the packed treatment on its own.
///
/// # Errors
///
/// Returns [`CheckinError::Decode`] with a preview of the raw bytes when
/// neither mode applies.
pub fn decode(raw: &[u8]) -> Result<Value> {
    if let Some(value) = unpack(raw) {
        return Ok(value);
    }

    let mut value: Value = serde_json::from_slice(raw)
        .map_err(|e| CheckinError::decode(format!("neither packed nor plain JSON: {e}"), raw))?;

    // Mixed mode: plain envelope with a packed `data` string inside.
    let inner = value
        .get("data")
        .and_then(|d| d.as_str())
        .and_then(|s| unpack(s.trim().as_bytes()));
    if let Some(inner) = inner {
        value["data"] = inner;
    }

    Ok(value)
}

/// Attempt the packed decode chain; `None` means "not packed".
fn unpack(raw: &[u8]) -> Option<Value> {
    let text = std::str::from_utf8(raw).ok()?;
    let compressed = STANDARD.decode(text.trim()).ok()?;
    let mut inflated = Vec::new();
    ZlibDecoder::new(compressed.as_slice())
        .read_to_end(&mut inflated)
        .ok()?;
    serde_json::from_slice(&inflated).ok()
}
