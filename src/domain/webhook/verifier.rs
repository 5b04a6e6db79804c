//! Webhook signature verification.
//!
//! HMAC-SHA256 over the exact raw body, hex encoded, compared in constant
//! time. With no secret configured verification is skipped loudly.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::errors::WebhookError;

/// Accepted prefix on signature header values.
const SIGNATURE_PREFIX: &str = "sha256=";

/// Verifies that a raw body was signed with `secret`.
///
/// Returns true without checking when `secret` is absent or blank (insecure
/// mode). Returns false when a secret is set and no signature was provided.
pub fn verify(raw_body: &[u8], provided_signature: Option<&str>, secret: Option<&str>) -> bool {
    let secret = match secret.filter(|s| !s.is_empty()) {
        Some(secret) => secret,
        None => {
            tracing::warn!("Webhook secret not configured, accepting unsigned webhook");
            return true;
        }
    };

    let provided = match provided_signature.map(str::trim).filter(|s| !s.is_empty()) {
        Some(sig) => sig,
        None => return false,
    };

    let provided = provided.strip_prefix(SIGNATURE_PREFIX).unwrap_or(provided);
    let provided = match hex::decode(provided) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };

    match compute_signature(secret.as_bytes(), raw_body) {
        Some(expected) => constant_time_compare(&expected, &provided),
        None => false,
    }
}

/// Verifier holding the configured webhook secret.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Option<SecretString>,
}

impl SignatureVerifier {
    /// Creates a verifier. A blank secret is treated as no secret.
    pub fn new(secret: Option<SecretString>) -> Self {
        let secret = secret.filter(|s| !s.expose_secret().trim().is_empty());
        if secret.is_none() {
            tracing::warn!(
                "Webhook signature verification DISABLED: no secret configured, running in insecure mode"
            );
        }
        Self { secret }
    }

    /// Verifier that accepts everything.
    pub fn insecure() -> Self {
        Self::new(None)
    }

    pub fn is_insecure(&self) -> bool {
        self.secret.is_none()
    }

    /// Checks a request's signature.
    ///
    /// # Errors
    ///
    /// - `SignatureMissing` - a secret is configured and no signature was sent
    /// - `SignatureInvalid` - the signature does not match the body
    pub fn check(&self, raw_body: &[u8], provided_signature: Option<&str>) -> Result<(), WebhookError> {
        let secret = self.secret.as_ref().map(|s| s.expose_secret().as_str());

        if secret.is_some() && provided_signature.map_or(true, |s| s.trim().is_empty()) {
            return Err(WebhookError::SignatureMissing);
        }

        if verify(raw_body, provided_signature, secret) {
            Ok(())
        } else {
            Err(WebhookError::SignatureInvalid)
        }
    }
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier")
            .field("insecure", &self.is_insecure())
            .finish()
    }
}

fn compute_signature(secret: &[u8], payload: &[u8]) -> Option<Vec<u8>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret).ok()?;
    mac.update(payload);
    Some(mac.finalize().into_bytes().to_vec())
}

/// Performs constant-time comparison of two byte slices.
fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

/// Hex HMAC-SHA256 of `payload`, as a provider would send it.
pub fn signature_hex(secret: &str, payload: &[u8]) -> String {
    compute_signature(secret.as_bytes(), payload)
        .map(hex::encode)
        .unwrap_or_default()
}
