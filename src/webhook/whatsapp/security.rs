//! Signature verification for inbound WhatsApp webhook requests.
//!
//! Meta signs every webhook body with HMAC-SHA256 keyed by the app secret and
//! sends it in `X-Hub-Signature-256` as `sha256=<hex_signature>`. The signature
//! is computed over the raw body bytes, never over re-serialized JSON.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Verifies the X-Hub-Signature-256 header against the request payload
///
/// Returns `false` when the header has no `sha256=` prefix, is not valid hex
/// or doesn't match. The comparison runs in constant time.
pub fn verify_signature(signature_header: &str, payload: &[u8], app_secret: &str) -> bool {
    let signature_hex = match signature_header.strip_prefix("sha256=") {
        Some(sig) => sig,
        None => {
            logfire::warn!("Invalid signature header format: expected 'sha256=' prefix");
            return false;
        }
    };

    let expected_signature = match hex::decode(signature_hex) {
        Ok(sig) => sig,
        Err(e) => {
            logfire::warn!(
                "Failed to decode signature hex: {error}",
                error = e.to_string()
            );
            return false;
        }
    };

    let mut mac = match HmacSha256::new_from_slice(app_secret.as_bytes()) {
        Ok(m) => m,
        Err(e) => {
            logfire::error!(
                "Failed to create HMAC instance: {error}",
                error = e.to_string()
            );
            return false;
        }
    };

    mac.update(payload);
    let computed_signature = mac.finalize().into_bytes();

    let is_valid: bool = computed_signature.ct_eq(&expected_signature[..]).into();

    if !is_valid {
        logfire::warn!("Webhook signature verification failed: signatures do not match");
    }

    is_valid
}

/// Same as [`verify_signature`] for a header that may be absent
pub fn verify_request(signature_header: Option<&str>, payload: &[u8], app_secret: &str) -> bool {
    match signature_header {
        Some(header) => verify_signature(header, payload, app_secret),
        None => {
            logfire::warn!("Missing X-Hub-Signature-256 header");
            false
        }
    }
}

/// `sha256=<hex>` header value for `payload`
#[cfg(test)]
pub(crate) fn sign(payload: &[u8], app_secret: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(app_secret.as_bytes()).unwrap();
    mac.update(payload);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}
