// Stripe webhook signature verification
//
// Header format: `t=<unix seconds>,v1=<hex hmac>[,v1=<hex hmac>...]`.
// The signed payload is `"{t}.{raw body}"`, HMAC-SHA256 keyed with the
// endpoint secret. Any matching `v1` entry is accepted.

use ring::hmac;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, PartialEq)]
pub enum SignatureError {
    #[error("No signatures found matching the expected signature for payload")]
    NoMatchingSignature,

    #[error("Unable to extract timestamp and signatures from header")]
    MalformedHeader,

    #[error("Missing Stripe-Signature header")]
    MissingHeader,

    #[error("Timestamp outside the tolerance zone ({age}s, max {tolerance}s)")]
    TimestampOutsideTolerance { age: i64, tolerance: i64 },
}

struct ParsedHeader {
    timestamp: i64,
    signatures: Vec<Vec<u8>>,
}

fn parse_header(header: &str) -> Result<ParsedHeader, SignatureError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        let Some((key, value)) = part.trim().split_once('=') else {
            continue;
        };
        match key {
            "t" => timestamp = value.parse::<i64>().ok(),
            // Undecodable entries simply never match
            "v1" => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            },
            _ => {},
        }
    }

    match timestamp {
        Some(timestamp) if !signatures.is_empty() => Ok(ParsedHeader {
            timestamp,
            signatures,
        }),
        Some(_) => Err(SignatureError::NoMatchingSignature),
        None => Err(SignatureError::MalformedHeader),
    }
}

/// Compute the `v1` signature for a payload. Used by tests and tooling.
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let mut ctx = hmac::Context::with_key(&key);
    ctx.update(timestamp.to_string().as_bytes());
    ctx.update(b".");
    ctx.update(payload);
    hex::encode(ctx.sign().as_ref())
}

/// Verify `header` against `payload` at time `now` (unix seconds)
pub fn verify_signature(
    payload: &[u8],
    header: Option<&str>,
    secret: &str,
    tolerance_seconds: i64,
    now: i64,
) -> Result<(), SignatureError> {
    let header = header
        .filter(|h| !h.trim().is_empty())
        .ok_or(SignatureError::MissingHeader)?;
    let parsed = parse_header(header)?;

    let mut signed = Vec::with_capacity(payload.len() + 16);
    signed.extend_from_slice(parsed.timestamp.to_string().as_bytes());
    signed.push(b'.');
    signed.extend_from_slice(payload);

    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let matched = parsed
        .signatures
        .iter()
        .any(|candidate| hmac::verify(&key, &signed, candidate).is_ok());

    if !matched {
        debug!("Stripe signature mismatch ({} candidates)", parsed.signatures.len());
        return Err(SignatureError::NoMatchingSignature);
    }

    let age = now - parsed.timestamp;
    if tolerance_seconds > 0 && age.abs() > tolerance_seconds {
        return Err(SignatureError::TimestampOutsideTolerance {
            age,
            tolerance: tolerance_seconds,
        });
    }

    Ok(())
}
