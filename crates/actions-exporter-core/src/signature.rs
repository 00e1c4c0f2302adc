//! Webhook signature verification.
//!
//! GitHub signs each delivery with an HMAC-SHA1 of the raw body keyed by
//! the shared webhook secret, sent as `X-Hub-Signature: sha1=<hex>`.
//! Verification fails closed: an unknown scheme prefix is rejected before
//! any digest is computed, and the digest comparison is constant-time.

use hmac::{Hmac, Mac};
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

/// Scheme prefix of the signature header this exporter accepts.
const SCHEME: &str = "sha1";

/// Error produced when an inbound delivery fails signature verification.
///
/// Every variant is terminal for the request: the caller responds with an
/// authorization failure and performs no further event processing.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("unknown signature scheme: {scheme}")]
    UnknownScheme { scheme: String },

    #[error("malformed signature header")]
    MalformedHeader,

    #[error("signature is not valid hex")]
    InvalidHex,

    #[error("webhook secret cannot be used as an HMAC key")]
    InvalidKey,

    #[error("HMAC-SHA1 digest does not match")]
    Mismatch,
}

/// Verify a `sha1=<hex>` signature header against the raw request body.
///
/// # Errors
///
/// Returns [`SignatureError::UnknownScheme`] for any scheme other than
/// `sha1`, [`SignatureError::MalformedHeader`] when the header has no
/// `scheme=value` shape, and [`SignatureError::Mismatch`] when the digest
/// does not match. The mismatch comparison runs in constant time via
/// [`Mac::verify_slice`].
pub fn verify_signature(secret: &str, header: &str, body: &[u8]) -> Result<(), SignatureError> {
    let (scheme, hex_digest) = header
        .split_once('=')
        .ok_or(SignatureError::MalformedHeader)?;

    if scheme != SCHEME {
        return Err(SignatureError::UnknownScheme {
            scheme: scheme.to_string(),
        });
    }

    let received = hex::decode(hex_digest).map_err(|_| SignatureError::InvalidHex)?;

    let mut mac =
        HmacSha1::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::InvalidKey)?;
    mac.update(body);

    mac.verify_slice(&received)
        .map_err(|_| SignatureError::Mismatch)
}

#[cfg(test)]
#[path = "signature_tests.rs"]
mod tests;
