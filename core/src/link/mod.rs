//! # Payment Link Module
//!
//! Shareable, expiring payment requests. A link is a base64 JSON token that
//! carries everything the paying side needs -- recipient, amount, optional
//! message -- plus the timestamps that bound its life.
//!
//! ## Architecture
//!
//! ```text
//! codec.rs — Token encode/decode with expiry and absolute age checks
//! uri.rs   — Page URLs and one-click wallet URIs built around a token
//! ```
//!
//! ## Design Decisions
//!
//! - Tokens use URL-safe unpadded base64 so they survive URL path segments
//!   and QR payloads without escaping. Decode also accepts the standard
//!   padded alphabet older generators emitted.
//! - The one-minute absolute age ceiling is enforced at decode regardless
//!   of the embedded TTL. A token is a convenience, not a credential, and
//!   its blast radius is capped accordingly.
//! - `Expired` and `TooOld` are statuses on a successful decode, with the
//!   descriptor still available for display. Only structural failure is an
//!   error.

pub mod codec;
pub mod uri;

pub use codec::{
    decode, decode_at, encode, encode_at, format_time_remaining, DecodedLink, LinkError,
    LinkStatus, PaymentDescriptor,
};
pub use uri::{aux_expiry_token, one_click_uri, payment_page_url};
