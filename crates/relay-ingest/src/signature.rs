//! # Webhook Signature Verification
//!
//! Verifies an HMAC-SHA256 signature over the raw request body against a
//! shared secret.
//!
//! ## Security Design
//!
//! - Comparison goes through `Mac::verify_slice`, which is constant-time;
//!   a wrong secret and a wrong signature are indistinguishable by timing.
//! - Malformed signature material (bad hex, bad prefix) is a rejection,
//!   never a panic or a propagated error.
//! - When no signature is presented, or no secret is configured, the
//!   default policy is permissive-with-warning. Deployments that have
//!   finished onboarding the upstream integrator should turn on
//!   `require_signature` to close this window.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

type HmacSha256 = Hmac<Sha256>;

/// Algorithm prefix conventionally carried in front of the hex signature.
const SIGNATURE_PREFIX: &str = "sha256=";

/// Outcome of a signature check.
///
/// The two `Skipped*` variants are accepted requests; they exist so the
/// gateway can count how much unverified traffic it is letting through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureCheck {
    /// Signature present and valid for the configured secret.
    Verified,
    /// No signature presented; accepted under the permissive default.
    SkippedUnsigned,
    /// Signature presented but no secret configured; accepted with warning.
    SkippedNoSecret,
    /// Signature invalid, malformed, or missing while required.
    Rejected,
}

impl SignatureCheck {
    /// Whether the request should proceed to normalization.
    #[must_use]
    pub const fn is_accepted(self) -> bool {
        !matches!(self, Self::Rejected)
    }

    /// Short label for metrics and structured logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Verified => "verified",
            Self::SkippedUnsigned => "skipped_unsigned",
            Self::SkippedNoSecret => "skipped_no_secret",
            Self::Rejected => "rejected",
        }
    }
}

/// Verifies webhook signatures against a configured shared secret.
pub struct WebhookVerifier {
    secret: Option<Vec<u8>>,
    require_signature: bool,
}

impl WebhookVerifier {
    /// Create a verifier with the default permissive policy.
    #[must_use]
    pub fn new(secret: Option<Vec<u8>>) -> Self {
        Self {
            secret,
            require_signature: false,
        }
    }

    /// Create a verifier that rejects unsigned requests.
    #[must_use]
    pub fn with_required_signature(secret: Vec<u8>) -> Self {
        Self {
            secret: Some(secret),
            require_signature: true,
        }
    }

    /// Whether a shared secret is configured.
    #[must_use]
    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    /// Check `provided` against the HMAC-SHA256 of `raw_body`.
    ///
    /// The signature is expected as hex, optionally prefixed with
    /// `sha256=`. Never panics; all failure modes map to
    /// [`SignatureCheck::Rejected`].
    #[must_use]
    pub fn verify(&self, raw_body: &[u8], provided: Option<&str>) -> SignatureCheck {
        let Some(provided) = provided else {
            if self.require_signature {
                return SignatureCheck::Rejected;
            }
            warn!("Accepting unsigned webhook delivery (no signature presented)");
            return SignatureCheck::SkippedUnsigned;
        };

        let Some(secret) = self.secret.as_deref() else {
            warn!("Webhook signature presented but no shared secret is configured; skipping verification");
            return SignatureCheck::SkippedNoSecret;
        };

        let hex_part = provided.strip_prefix(SIGNATURE_PREFIX).unwrap_or(provided);
        let Ok(signature_bytes) = hex::decode(hex_part) else {
            return SignatureCheck::Rejected;
        };

        let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
            return SignatureCheck::Rejected;
        };
        mac.update(raw_body);

        // Constant-time comparison
        if mac.verify_slice(&signature_bytes).is_ok() {
            SignatureCheck::Verified
        } else {
            SignatureCheck::Rejected
        }
    }
}
