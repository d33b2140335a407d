//! # Payment Link Codec
//!
//! Self-contained expiring payment tokens. A token is a base64-encoded JSON
//! descriptor carrying its own creation time and expiry; there is no server
//! side list to revoke against, so the clock checks here are the whole
//! security story.
//!
//! ## Token Properties
//!
//! - **Self-describing** -- recipient, amount, and optional message travel
//!   inside the token. Nothing is persisted anywhere.
//! - **Expiring** -- a TTL chosen at encode time, 10 to 300 seconds.
//! - **Age-capped** -- decode applies an absolute one-minute ceiling on
//!   `now - createdAt` regardless of the embedded expiry, so a forged
//!   long-lived token still dies after a minute.
//! - **Structurally validated, not signed** -- tampering is detected only
//!   insofar as it breaks the JSON shape. Treat tokens as requests, never
//!   as authorization.
//!
//! Decode reports `Expired` and `TooOld` as statuses on an otherwise
//! successful decode, not as errors. Only an undecodable token is an error.

use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{LINK_MAX_AGE_MS, LINK_TTL_MAX_SECS, LINK_TTL_MIN_SECS};
use crate::provider::Address;
use crate::units::AmountError;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures producing or consuming payment links.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// The token is not decodable base64 JSON in the expected shape.
    #[error("Invalid payment link format")]
    MalformedToken,

    /// The requested TTL is outside the accepted window.
    #[error("link ttl out of range: {got}s (allowed {min}..={max}s)")]
    TtlOutOfRange {
        /// Requested TTL in seconds.
        got: u64,
        /// Smallest accepted TTL.
        min: u64,
        /// Largest accepted TTL.
        max: u64,
    },

    /// The amount failed validation at encode time.
    #[error(transparent)]
    Amount(#[from] AmountError),
}

// ---------------------------------------------------------------------------
// PaymentDescriptor
// ---------------------------------------------------------------------------

/// The payload carried inside a payment link.
///
/// Serialized with the camelCase field names consuming front-ends expect.
/// `amount` stays a decimal string end to end; it is only converted to base
/// units at send time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDescriptor {
    /// Receiving account.
    pub recipient: Address,
    /// Requested amount in whole SHM, decimal string.
    #[serde(deserialize_with = "amount_as_string")]
    pub amount: String,
    /// Optional free-text annotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Creation timestamp, epoch milliseconds.
    pub created_at: i64,
    /// Absolute expiry timestamp, epoch milliseconds.
    pub expiry: i64,
}

/// Accepts both the string form this crate emits and the bare JSON number
/// older link generators produced.
fn amount_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Number(f64),
        String(String),
    }

    match NumberOrString::deserialize(deserializer)? {
        NumberOrString::String(s) => Ok(s),
        NumberOrString::Number(n) => Ok(n.to_string()),
    }
}

// ---------------------------------------------------------------------------
// Decode Outcome
// ---------------------------------------------------------------------------

/// Time-check verdict attached to a successfully decoded token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    /// Inside both the embedded expiry and the absolute age ceiling.
    Valid,
    /// Past the expiry the encoder baked in.
    Expired,
    /// Created more than a minute ago, whatever the embedded expiry says.
    TooOld,
}

impl LinkStatus {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// User-facing reason for a non-valid status.
    pub fn reason(&self) -> Option<&'static str> {
        match self {
            Self::Valid => None,
            Self::Expired => Some("Payment link has expired"),
            Self::TooOld => Some("Payment link is too old"),
        }
    }
}

/// A decoded token: the descriptor it carried plus the verdict on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecodedLink {
    /// The embedded payment descriptor.
    pub descriptor: PaymentDescriptor,
    /// Verdict computed against the decoding clock.
    pub status: LinkStatus,
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

/// Encodes a payment request into an expiring token using the current time.
///
/// See [`encode_at`] for the full contract.
pub fn encode(
    recipient: Address,
    amount: &str,
    message: Option<String>,
    ttl_seconds: u64,
) -> Result<String, LinkError> {
    encode_at(recipient, amount, message, ttl_seconds, Utc::now())
}

/// Encodes a payment request into an expiring token, stamping `createdAt`
/// and `expiry` from the supplied clock.
///
/// The output uses the URL-safe base64 alphabet without padding, so it can
/// sit in a URL path segment or a QR payload untouched.
///
/// # Errors
///
/// Rejects TTLs outside 10..=300 seconds and amounts that are empty,
/// non-numeric, non-positive, or above the single-payment ceiling.
pub fn encode_at(
    recipient: Address,
    amount: &str,
    message: Option<String>,
    ttl_seconds: u64,
    now: DateTime<Utc>,
) -> Result<String, LinkError> {
    if !(LINK_TTL_MIN_SECS..=LINK_TTL_MAX_SECS).contains(&ttl_seconds) {
        return Err(LinkError::TtlOutOfRange {
            got: ttl_seconds,
            min: LINK_TTL_MIN_SECS,
            max: LINK_TTL_MAX_SECS,
        });
    }
    crate::units::validate_amount(amount)?;

    let now_ms = now.timestamp_millis();
    let descriptor = PaymentDescriptor {
        recipient,
        amount: amount.trim().to_string(),
        message,
        created_at: now_ms,
        expiry: now_ms + (ttl_seconds as i64) * 1000,
    };

    let json = serde_json::to_vec(&descriptor).expect("descriptor serialization cannot fail");
    Ok(URL_SAFE_NO_PAD.encode(json))
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

/// Decodes and time-checks a token against the current clock.
///
/// See [`decode_at`] for the full contract.
pub fn decode(token: &str) -> Result<DecodedLink, LinkError> {
    decode_at(token, Utc::now())
}

/// Decodes a token and computes its [`LinkStatus`] against the supplied
/// clock.
///
/// The expiry check runs first: a token that is both expired and over the
/// age ceiling reports `Expired`. Tokens from older generators that used
/// standard base64 with padding are accepted too.
///
/// # Errors
///
/// [`LinkError::MalformedToken`] when the string is not base64, not JSON,
/// or not shaped like a payment descriptor.
pub fn decode_at(token: &str, now: DateTime<Utc>) -> Result<DecodedLink, LinkError> {
    let bytes = URL_SAFE_NO_PAD
        .decode(token)
        .or_else(|_| STANDARD.decode(token))
        .map_err(|_| LinkError::MalformedToken)?;
    let descriptor: PaymentDescriptor =
        serde_json::from_slice(&bytes).map_err(|_| LinkError::MalformedToken)?;

    let now_ms = now.timestamp_millis();
    let status = if now_ms > descriptor.expiry {
        LinkStatus::Expired
    } else if now_ms - descriptor.created_at > LINK_MAX_AGE_MS {
        LinkStatus::TooOld
    } else {
        LinkStatus::Valid
    };

    Ok(DecodedLink { descriptor, status })
}

/// Human-readable countdown for a link expiry: `"Expired"` once past, else
/// the remaining whole seconds rounded up, e.g. `"30s remaining"`.
pub fn format_time_remaining(expiry_ms: i64, now: DateTime<Utc>) -> String {
    let diff = expiry_ms - now.timestamp_millis();
    if diff <= 0 {
        return "Expired".to_string();
    }
    let seconds = (diff + 999) / 1000;
    format!("{}s remaining", seconds)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const RECIPIENT: &str = "0x1234567890abcdef1234567890abcdef12345678";

    fn recipient() -> Address {
        Address::parse(RECIPIENT).unwrap()
    }

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn fresh_token_decodes_valid_with_same_fields() {
        let now = at(1_700_000_000_000);
        let token = encode_at(
            recipient(),
            "1.5",
            Some("lunch".to_string()),
            30,
            now,
        )
        .unwrap();

        let decoded = decode_at(&token, now).unwrap();
        assert_eq!(decoded.status, LinkStatus::Valid);
        assert_eq!(decoded.descriptor.recipient, recipient());
        assert_eq!(decoded.descriptor.amount, "1.5");
        assert_eq!(decoded.descriptor.message.as_deref(), Some("lunch"));
        assert_eq!(decoded.descriptor.created_at, 1_700_000_000_000);
        assert_eq!(decoded.descriptor.expiry, 1_700_000_030_000);
    }

    #[test]
    fn token_expires_after_its_ttl() {
        let now = at(1_700_000_000_000);
        let token = encode_at(recipient(), "1.5", None, 30, now).unwrap();

        // 31 seconds later the 30-second token is dead.
        let decoded = decode_at(&token, at(1_700_000_031_000)).unwrap();
        assert_eq!(decoded.status, LinkStatus::Expired);
        assert_eq!(
            decoded.status.reason(),
            Some("Payment link has expired")
        );
        // The descriptor still comes back for display purposes.
        assert_eq!(decoded.descriptor.amount, "1.5");
    }

    #[test]
    fn expiry_boundary_is_exclusive() {
        let now = at(1_700_000_000_000);
        let token = encode_at(recipient(), "1", None, 30, now).unwrap();

        // Exactly at expiry: still valid. One millisecond past: expired.
        let exactly = decode_at(&token, at(1_700_000_030_000)).unwrap();
        assert_eq!(exactly.status, LinkStatus::Valid);
        let past = decode_at(&token, at(1_700_000_030_001)).unwrap();
        assert_eq!(past.status, LinkStatus::Expired);
    }

    #[test]
    fn forged_long_ttl_token_hits_age_ceiling() {
        // Handcraft a token claiming to live for ten minutes.
        let created = 1_700_000_000_000i64;
        let json = format!(
            r#"{{"recipient":"{}","amount":"2","createdAt":{},"expiry":{}}}"#,
            RECIPIENT,
            created,
            created + 600_000
        );
        let token = URL_SAFE_NO_PAD.encode(json);

        // 61 seconds in, the declared expiry is irrelevant.
        let decoded = decode_at(&token, at(created + 61_000)).unwrap();
        assert_eq!(decoded.status, LinkStatus::TooOld);
        assert_eq!(decoded.status.reason(), Some("Payment link is too old"));
    }

    #[test]
    fn age_ceiling_boundary_is_exclusive() {
        let created = 1_700_000_000_000i64;
        let json = format!(
            r#"{{"recipient":"{}","amount":"2","createdAt":{},"expiry":{}}}"#,
            RECIPIENT,
            created,
            created + 600_000
        );
        let token = URL_SAFE_NO_PAD.encode(json);

        let exactly = decode_at(&token, at(created + 60_000)).unwrap();
        assert_eq!(exactly.status, LinkStatus::Valid);
        let past = decode_at(&token, at(created + 60_001)).unwrap();
        assert_eq!(past.status, LinkStatus::TooOld);
    }

    #[test]
    fn expired_wins_over_too_old() {
        // Both checks would fire; expiry is checked first.
        let now = at(1_700_000_000_000);
        let token = encode_at(recipient(), "1", None, 30, now).unwrap();
        let decoded = decode_at(&token, at(1_700_000_120_000)).unwrap();
        assert_eq!(decoded.status, LinkStatus::Expired);
    }

    #[test]
    fn malformed_tokens_are_errors() {
        let cases = [
            "not base64 at all!!!",
            // Valid base64, not JSON.
            &URL_SAFE_NO_PAD.encode("hello world"),
            // Valid JSON, wrong shape.
            &URL_SAFE_NO_PAD.encode(r#"{"foo": 1}"#),
            // Recipient is not an address.
            &URL_SAFE_NO_PAD
                .encode(r#"{"recipient":"bob","amount":"1","createdAt":1,"expiry":2}"#),
            "",
        ];
        for token in cases {
            let err = decode_at(token, at(0)).unwrap_err();
            assert_eq!(err, LinkError::MalformedToken, "token: {token:?}");
            assert_eq!(err.to_string(), "Invalid payment link format");
        }
    }

    #[test]
    fn legacy_standard_base64_tokens_still_decode() {
        // Older generators used btoa(): standard alphabet, padded.
        let now = at(1_700_000_000_000);
        let json = format!(
            r#"{{"recipient":"{}","amount":1.5,"createdAt":{},"expiry":{}}}"#,
            RECIPIENT,
            now.timestamp_millis(),
            now.timestamp_millis() + 30_000
        );
        let token = STANDARD.encode(json);

        let decoded = decode_at(&token, now).unwrap();
        assert_eq!(decoded.status, LinkStatus::Valid);
        // Number-typed amounts normalize to their string form.
        assert_eq!(decoded.descriptor.amount, "1.5");
    }

    #[test]
    fn tokens_are_url_path_safe() {
        let now = at(1_700_000_000_000);
        // A message long enough to hit every base64 position.
        let token = encode_at(
            recipient(),
            "42.000001",
            Some("smörgåsbord & fika ~ 50/50?".to_string()),
            300,
            now,
        )
        .unwrap();
        assert!(token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn ttl_bounds_are_enforced() {
        let now = at(0);
        assert!(matches!(
            encode_at(recipient(), "1", None, 9, now),
            Err(LinkError::TtlOutOfRange { got: 9, .. })
        ));
        assert!(encode_at(recipient(), "1", None, 10, now).is_ok());
        assert!(encode_at(recipient(), "1", None, 300, now).is_ok());
        assert!(matches!(
            encode_at(recipient(), "1", None, 301, now),
            Err(LinkError::TtlOutOfRange { got: 301, .. })
        ));
        assert!(matches!(
            encode_at(recipient(), "1", None, 0, now),
            Err(LinkError::TtlOutOfRange { got: 0, .. })
        ));
    }

    #[test]
    fn encode_validates_the_amount() {
        let now = at(0);
        let err = encode_at(recipient(), "0", None, 30, now).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Amount must be greater than 0"
        );
        assert!(encode_at(recipient(), "", None, 30, now).is_err());
        assert!(encode_at(recipient(), "nope", None, 30, now).is_err());
    }

    #[test]
    fn time_remaining_formats() {
        let expiry = 1_700_000_030_000i64;
        assert_eq!(format_time_remaining(expiry, at(1_700_000_000_000)), "30s remaining");
        // 100 milliseconds left rounds up to a full second.
        assert_eq!(format_time_remaining(expiry, at(1_700_000_029_900)), "1s remaining");
        assert_eq!(format_time_remaining(expiry, at(1_700_000_030_000)), "Expired");
        assert_eq!(format_time_remaining(expiry, at(1_700_000_099_000)), "Expired");
    }
}
