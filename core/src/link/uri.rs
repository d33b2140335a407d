//! Transport shapes for payment links: the hosted `/pay/<token>` page URL
//! and the direct wallet URI a QR code can carry instead.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;

use super::codec::LinkError;
use crate::config::{LINK_TTL_MAX_SECS, LINK_TTL_MIN_SECS, SHARDEUM_CHAIN_ID};
use crate::provider::Address;

/// URL of the hosted payment page for a token.
///
/// The token rides as a path segment, which is why the codec emits the
/// URL-safe base64 alphabet.
pub fn payment_page_url(base_url: &str, token: &str) -> String {
    format!("{}/pay/{}", base_url.trim_end_matches('/'), token)
}

/// A one-click `ethereum:` URI for wallets that open payment QR codes
/// directly, bypassing the hosted page.
///
/// Shape: `ethereum:<address>@<chainId>?value=<baseUnits>` with an optional
/// `&data=` carrying an auxiliary token. The value is base units, not SHM;
/// wallets do their own decimal rendering.
pub fn one_click_uri(recipient: &Address, value_base_units: u128, aux: Option<&str>) -> String {
    let mut uri = format!(
        "ethereum:{}@{}?value={}",
        recipient, SHARDEUM_CHAIN_ID, value_base_units
    );
    if let Some(aux) = aux {
        uri.push_str("&data=");
        uri.push_str(aux);
    }
    uri
}

/// Builds the auxiliary `data=` token for a one-click URI: a base64 JSON
/// envelope carrying only the lifetime fields, so a wallet scanning the
/// QR can refuse a stale payload without the full descriptor.
pub fn aux_expiry_token(ttl_seconds: u64) -> Result<String, LinkError> {
    if !(LINK_TTL_MIN_SECS..=LINK_TTL_MAX_SECS).contains(&ttl_seconds) {
        return Err(LinkError::TtlOutOfRange {
            got: ttl_seconds,
            min: LINK_TTL_MIN_SECS,
            max: LINK_TTL_MAX_SECS,
        });
    }
    let now_ms = Utc::now().timestamp_millis();
    let envelope = serde_json::json!({
        "createdAt": now_ms,
        "expiry": now_ms + (ttl_seconds as i64) * 1000,
    });
    Ok(URL_SAFE_NO_PAD.encode(envelope.to_string()))
}
