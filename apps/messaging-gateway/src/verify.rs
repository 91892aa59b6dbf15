use axum::http::HeaderMap;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use crate::error::GatewayError;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";
pub const TELEGRAM_SECRET_HEADER: &str = "x-telegram-bot-api-secret-token";

/// Query of the Graph API subscription handshake.
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

/// Echoes `hub.challenge` when the mode is `subscribe` and the token matches.
pub fn verify_subscription(
    expected: Option<&str>,
    query: &VerifyQuery,
) -> Result<String, GatewayError> {
    let Some(expected) = expected else {
        tracing::warn!("subscription handshake received but no verify token is configured");
        return Err(GatewayError::Forbidden);
    };
    let token_ok = query
        .token
        .as_deref()
        .is_some_and(|t| bool::from(t.as_bytes().ct_eq(expected.as_bytes())));
    if query.mode.as_deref() == Some("subscribe") && token_ok {
        Ok(query.challenge.clone().unwrap_or_default())
    } else {
        Err(GatewayError::Forbidden)
    }
}

/// Checks `X-Hub-Signature-256: sha256=<hex>` over the raw body. No secret, no check.
pub fn verify_hub_signature(
    secret: Option<&str>,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), GatewayError> {
    let Some(secret) = secret else {
        return Ok(());
    };
    let header = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(GatewayError::Unauthorized("missing signature"))?;
    let provided = header
        .strip_prefix("sha256=")
        .and_then(|hex_sig| hex::decode(hex_sig).ok())
        .ok_or(GatewayError::Unauthorized("malformed signature"))?;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| GatewayError::Unauthorized("unusable app secret"))?;
    mac.update(body);
    mac.verify_slice(&provided)
        .map_err(|_| GatewayError::Unauthorized("signature mismatch"))
}

pub fn verify_telegram_secret(
    expected: Option<&str>,
    headers: &HeaderMap,
) -> Result<(), GatewayError> {
    let Some(expected) = expected else {
        return Ok(());
    };
    let provided = headers
        .get(TELEGRAM_SECRET_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if bool::from(provided.as_bytes().ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        Err(GatewayError::Unauthorized("secret token mismatch"))
    }
}

#[cfg(test)]
pub(crate) fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("hmac accepts any key");
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}
