//! Webhook signature verification
//!
//! The provider signs every delivery with `HMAC-SHA256(key, timestamp || token)`
//! and sends the lowercase hex digest alongside the timestamp and token.

use super::WebhookError;
use hmac::{Hmac, Mac};
use mailer_log_common::config::WebhookConfig;
use serde_json::Value;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Signature triple carried by a webhook delivery
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureBlock {
    pub timestamp: Option<String>,
    pub token: Option<String>,
    pub signature: Option<String>,
}

impl SignatureBlock {
    /// Read the `signature` object of a webhook document.
    ///
    /// Fields may be strings or numbers; blank strings count as absent.
    pub fn from_document(document: &Value) -> Option<Self> {
        let block = document.get("signature")?.as_object()?;
        Some(Self {
            timestamp: block.get("timestamp").and_then(scalar_string),
            token: block.get("token").and_then(scalar_string),
            signature: block.get("signature").and_then(scalar_string),
        })
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Verifies webhook signatures against the configured signing key
#[derive(Clone)]
pub struct SignatureVerifier {
    signing_key: Option<String>,
}

impl SignatureVerifier {
    pub fn new(signing_key: Option<String>) -> Self {
        Self {
            signing_key: signing_key.filter(|key| !key.is_empty()),
        }
    }

    pub fn from_config(config: &WebhookConfig) -> Self {
        Self::new(config.signing_key.clone())
    }

    pub fn is_configured(&self) -> bool {
        self.signing_key.is_some()
    }

    /// Accept the block only if its signature matches the expected digest.
    ///
    /// Without a configured key every block is rejected.
    pub fn verify(&self, block: Option<&SignatureBlock>) -> Result<(), WebhookError> {
        let key = self
            .signing_key
            .as_deref()
            .ok_or_else(|| WebhookError::Unauthorized("signing key not configured".to_string()))?;
        let block =
            block.ok_or_else(|| WebhookError::Unauthorized("missing signature".to_string()))?;

        let (Some(timestamp), Some(token), Some(signature)) =
            (&block.timestamp, &block.token, &block.signature)
        else {
            return Err(WebhookError::Unauthorized(
                "incomplete signature".to_string(),
            ));
        };

        if !is_lowercase_hex(signature) {
            return Err(WebhookError::Unauthorized(
                "malformed signature".to_string(),
            ));
        }
        let expected = hex::decode(signature)
            .map_err(|_| WebhookError::Unauthorized("malformed signature".to_string()))?;

        // verify_slice compares in constant time
        signed_mac(key, timestamp, token)?
            .verify_slice(&expected)
            .map_err(|_| WebhookError::Unauthorized("signature mismatch".to_string()))
    }
}

fn is_lowercase_hex(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

fn signed_mac(signing_key: &str, timestamp: &str, token: &str) -> Result<HmacSha256, WebhookError> {
    let mut mac = HmacSha256::new_from_slice(signing_key.as_bytes())
        .map_err(|e| WebhookError::Unauthorized(format!("invalid signing key: {}", e)))?;
    mac.update(timestamp.as_bytes());
    mac.update(token.as_bytes());
    Ok(mac)
}

/// Compute the hex signature the provider would send for `timestamp` and `token`
pub fn compute_signature(
    signing_key: &str,
    timestamp: &str,
    token: &str,
) -> Result<String, WebhookError> {
    let mac = signed_mac(signing_key, timestamp, token)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}
