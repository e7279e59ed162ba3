//! Admin token helpers

use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// What the console can tell about a token without verifying it.
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct TokenClaims {
    pub subject: Option<String>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub expired: bool,
}

/// Pull the token out of a `/admin/verify` answer. Older deployments put it at the top level,
/// newer ones inside the envelope's `data`.
pub fn token_from_login_response(body: &Value) -> Option<String> {
    body.get("token")
        .or_else(|| body.get("data").and_then(|d| d.get("token")))
        .and_then(|t| t.as_str())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
}

/// Decode the claims of a bearer token. Opaque (non-JWT) tokens yield `None`.
pub fn describe_token(token: &str, now: DateTime<Utc>) -> Option<TokenClaims> {
    let token = token.strip_prefix("Bearer ").unwrap_or(token);
    let claims = parse_jwt_payload(token)?;

    let text = |key: &str| claims.get(key).and_then(|v| v.as_str()).map(|s| s.to_string());
    let subject = claims.get("sub").and_then(|v| match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });
    let expires_at = claims
        .get("exp")
        .and_then(|v| v.as_i64())
        .and_then(|secs| DateTime::from_timestamp(secs, 0));

    Some(TokenClaims {
        subject,
        email: text("email"),
        name: text("name").or_else(|| text("given_name")),
        expired: expires_at.is_some_and(|exp| exp <= now),
        expires_at,
    })
}

/// Helper to decode and parse JWT payload (without validation)
fn parse_jwt_payload(token: &str) -> Option<Value> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }

    // JWT payload is the second part
    let payload_part = parts[1];

    let padding = match payload_part.len() % 4 {
        2 => "==",
        3 => "=",
        _ => "",
    };
    let padded_payload = format!("{}{}", payload_part, padding);

    match general_purpose::URL_SAFE_NO_PAD
        .decode(payload_part)
        .or_else(|_| general_purpose::URL_SAFE.decode(&padded_payload))
        .or_else(|_| general_purpose::STANDARD.decode(&padded_payload))
    {
        Ok(decoded) => serde_json::from_slice(&decoded).ok(),
        Err(_) => None,
    }
}
