//! Core type definitions for the wallet-provider seam.
//!
//! These types form the vocabulary of every call the session makes against
//! a wallet: addresses, transaction hashes, chain descriptors, fee quotes,
//! and receipts. Amounts are always `u128` base units (10^-18 SHM). No
//! floating point anywhere near money.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::config;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Errors raised while parsing 0x-prefixed hex identifiers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HexParseError {
    /// The string does not start with the literal `0x` prefix.
    #[error("missing 0x prefix")]
    MissingPrefix,

    /// The hex payload has the wrong number of digits.
    #[error("invalid hex length: expected {expected} digits, got {got}")]
    InvalidLength {
        /// Expected number of hex digits after the prefix.
        expected: usize,
        /// Number of digits actually found.
        got: usize,
    },

    /// The payload contains a non-hex character.
    #[error("invalid hex digit: {0}")]
    InvalidDigit(String),
}

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// A 20-byte EVM account address.
///
/// Internally stores the raw bytes; the `0x`-prefixed lowercase hex form is
/// computed on the fly. Parsing accepts any capitalization of the 40 hex
/// digits but insists on the exact `0x` prefix.
///
/// # Examples
///
/// ```
/// use paylink_core::provider::Address;
///
/// let addr: Address = "0x1234567890AbCdEf1234567890aBcDeF12345678".parse().unwrap();
/// assert_eq!(addr.to_string(), "0x1234567890abcdef1234567890abcdef12345678");
/// assert_eq!(addr.short(), "0x1234...5678");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address([u8; 20]);

impl Address {
    /// Wraps raw address bytes.
    pub fn from_bytes(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// Parses a `0x`-prefixed 40-digit hex address.
    pub fn parse(s: &str) -> Result<Self, HexParseError> {
        let digits = s.strip_prefix("0x").ok_or(HexParseError::MissingPrefix)?;
        if digits.len() != 40 {
            return Err(HexParseError::InvalidLength {
                expected: 40,
                got: digits.len(),
            });
        }
        let raw = hex::decode(digits).map_err(|e| HexParseError::InvalidDigit(e.to_string()))?;
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&raw);
        Ok(Self(bytes))
    }

    /// Returns the raw 20-byte payload.
    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }

    /// Abbreviated display form: first four hex digits, an ellipsis, and
    /// the last four. The shape users recognize from every wallet UI.
    pub fn short(&self) -> String {
        let full = self.to_string();
        format!("{}...{}", &full[..6], &full[full.len() - 4..])
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl FromStr for Address {
    type Err = HexParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Address::parse(&s).map_err(serde::de::Error::custom)
        } else {
            let bytes = <Vec<u8>>::deserialize(deserializer)?;
            if bytes.len() != 20 {
                return Err(serde::de::Error::custom(format!(
                    "expected 20-byte address, got {}",
                    bytes.len()
                )));
            }
            let mut raw = [0u8; 20];
            raw.copy_from_slice(&bytes);
            Ok(Address(raw))
        }
    }
}

// ---------------------------------------------------------------------------
// TxHash
// ---------------------------------------------------------------------------

/// A 32-byte transaction hash, `0x`-prefixed in its string form.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxHash([u8; 32]);

impl TxHash {
    /// Wraps raw hash bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Parses a `0x`-prefixed 64-digit hex hash.
    pub fn parse(s: &str) -> Result<Self, HexParseError> {
        let digits = s.strip_prefix("0x").ok_or(HexParseError::MissingPrefix)?;
        if digits.len() != 64 {
            return Err(HexParseError::InvalidLength {
                expected: 64,
                got: digits.len(),
            });
        }
        let raw = hex::decode(digits).map_err(|e| HexParseError::InvalidDigit(e.to_string()))?;
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&raw);
        Ok(Self(bytes))
    }

    /// Returns the raw 32-byte payload.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxHash({})", self)
    }
}

impl FromStr for TxHash {
    type Err = HexParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for TxHash {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for TxHash {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            TxHash::parse(&s).map_err(serde::de::Error::custom)
        } else {
            let bytes = <Vec<u8>>::deserialize(deserializer)?;
            if bytes.len() != 32 {
                return Err(serde::de::Error::custom(format!(
                    "expected 32-byte hash, got {}",
                    bytes.len()
                )));
            }
            let mut raw = [0u8; 32];
            raw.copy_from_slice(&bytes);
            Ok(TxHash(raw))
        }
    }
}

// ---------------------------------------------------------------------------
// ChainDescriptor
// ---------------------------------------------------------------------------

/// The native currency block of a chain descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    /// Currency name, e.g. "SHM".
    pub name: String,
    /// Ticker symbol, e.g. "SHM".
    pub symbol: String,
    /// Decimal places of the base unit.
    pub decimals: u8,
}

/// Everything a wallet needs to add and select a chain.
///
/// Serializes with the camelCase field names the `wallet_addEthereumChain`
/// RPC method expects, so the JSON form can go over the wire untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainDescriptor {
    /// Chain id, 0x-prefixed hex.
    pub chain_id: String,
    /// Human-readable chain name.
    pub chain_name: String,
    /// Native currency parameters.
    pub native_currency: NativeCurrency,
    /// JSON-RPC endpoints.
    pub rpc_urls: Vec<String>,
    /// Block explorer base URLs.
    pub block_explorer_urls: Vec<String>,
}

impl ChainDescriptor {
    /// The Shardeum testnet descriptor this crate is built around.
    pub fn shardeum() -> Self {
        Self {
            chain_id: config::SHARDEUM_CHAIN_ID_HEX.to_string(),
            chain_name: config::SHARDEUM_CHAIN_NAME.to_string(),
            native_currency: NativeCurrency {
                name: config::NATIVE_CURRENCY_NAME.to_string(),
                symbol: config::NATIVE_SYMBOL.to_string(),
                decimals: config::NATIVE_DECIMALS,
            },
            rpc_urls: vec![config::SHARDEUM_RPC_URL.to_string()],
            block_explorer_urls: vec![config::SHARDEUM_EXPLORER_URL.to_string()],
        }
    }

    /// Decimal chain id parsed out of the hex field.
    pub fn chain_id_decimal(&self) -> Result<u64, HexParseError> {
        let digits = self
            .chain_id
            .strip_prefix("0x")
            .ok_or(HexParseError::MissingPrefix)?;
        u64::from_str_radix(digits, 16).map_err(|e| HexParseError::InvalidDigit(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// FeeData
// ---------------------------------------------------------------------------

/// Fee quote returned by the provider. Mirrors `eth_feeHistory`-era wallets:
/// legacy gas price and EIP-1559 fields may each be absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeeData {
    /// Legacy gas price, base units per gas.
    pub gas_price: Option<u128>,
    /// EIP-1559 max fee per gas.
    pub max_fee_per_gas: Option<u128>,
    /// EIP-1559 max priority fee per gas.
    pub max_priority_fee_per_gas: Option<u128>,
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// A native-value transfer request handed to the wallet for signing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    /// Sender. `None` lets the wallet use its selected account.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    /// Recipient address.
    pub to: Address,
    /// Transfer value in base units.
    pub value: u128,
    /// Optional auxiliary calldata, 0x-prefixed hex.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl TransactionRequest {
    /// Plain value transfer with no calldata.
    pub fn transfer(to: Address, value: u128) -> Self {
        Self {
            from: None,
            to,
            value,
            data: None,
        }
    }
}

/// Execution outcome recorded in a receipt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReceiptStatus {
    /// The transaction executed and its state changes are final.
    Success,
    /// The transaction was included but execution reverted.
    Reverted,
}

impl ReceiptStatus {
    /// Maps the numeric `status` field of an EVM receipt (1 = success).
    pub fn from_status_code(code: u64) -> Self {
        if code == 1 {
            Self::Success
        } else {
            Self::Reverted
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl fmt::Display for ReceiptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "Success"),
            Self::Reverted => write!(f, "Reverted"),
        }
    }
}

/// A mined-transaction receipt, as much of it as the tracker needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionReceipt {
    /// Hash of the transaction this receipt belongs to.
    pub tx_hash: TxHash,
    /// Execution outcome.
    pub status: ReceiptStatus,
    /// Block the transaction landed in.
    pub block_number: u64,
    /// Sender address.
    pub from: Address,
    /// Recipient address, absent for contract creation.
    pub to: Option<Address>,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    const ADDR: &str = "0x1234567890abcdef1234567890abcdef12345678";

    #[test]
    fn address_roundtrip() {
        let addr = Address::parse(ADDR).unwrap();
        assert_eq!(addr.to_string(), ADDR);
    }

    #[test]
    fn address_normalizes_case() {
        let upper = "0x1234567890ABCDEF1234567890ABCDEF12345678";
        let addr = Address::parse(upper).unwrap();
        assert_eq!(addr.to_string(), ADDR);
        assert_eq!(addr, Address::parse(ADDR).unwrap());
    }

    #[test]
    fn address_short_form() {
        let addr = Address::parse(ADDR).unwrap();
        assert_eq!(addr.short(), "0x1234...5678");
    }

    #[test]
    fn address_rejects_missing_prefix() {
        let err = Address::parse("1234567890abcdef1234567890abcdef12345678").unwrap_err();
        assert_eq!(err, HexParseError::MissingPrefix);
    }

    #[test]
    fn address_rejects_wrong_length() {
        let err = Address::parse("0x1234").unwrap_err();
        assert_eq!(
            err,
            HexParseError::InvalidLength {
                expected: 40,
                got: 4
            }
        );
    }

    #[test]
    fn address_rejects_non_hex() {
        let err = Address::parse("0xzz34567890abcdef1234567890abcdef12345678").unwrap_err();
        assert!(matches!(err, HexParseError::InvalidDigit(_)));
    }

    #[test]
    fn address_serde_json_is_string() {
        let addr = Address::parse(ADDR).unwrap();
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", ADDR));
        let recovered: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(addr, recovered);
    }

    #[test]
    fn tx_hash_roundtrip() {
        let h = format!("0x{}", "ab".repeat(32));
        let hash = TxHash::parse(&h).unwrap();
        assert_eq!(hash.to_string(), h);
        let json = serde_json::to_string(&hash).unwrap();
        let recovered: TxHash = serde_json::from_str(&json).unwrap();
        assert_eq!(hash, recovered);
    }

    #[test]
    fn tx_hash_rejects_address_length() {
        let err = TxHash::parse(ADDR).unwrap_err();
        assert_eq!(
            err,
            HexParseError::InvalidLength {
                expected: 64,
                got: 40
            }
        );
    }

    #[test]
    fn shardeum_descriptor_matches_wallet_wire_format() {
        let desc = ChainDescriptor::shardeum();
        let json = serde_json::to_value(&desc).unwrap();
        assert_eq!(json["chainId"], "0x1F93");
        assert_eq!(json["chainName"], "Shardeum Testnet");
        assert_eq!(json["nativeCurrency"]["symbol"], "SHM");
        assert_eq!(json["nativeCurrency"]["decimals"], 18);
        assert_eq!(json["rpcUrls"][0], "https://api-testnet.shardeum.org/");
        assert_eq!(desc.chain_id_decimal().unwrap(), 8083);
    }

    #[test]
    fn receipt_status_from_code() {
        assert_eq!(ReceiptStatus::from_status_code(1), ReceiptStatus::Success);
        assert_eq!(ReceiptStatus::from_status_code(0), ReceiptStatus::Reverted);
        assert!(ReceiptStatus::Success.is_success());
        assert!(!ReceiptStatus::Reverted.is_success());
    }

    #[test]
    fn transaction_request_serde() {
        let to = Address::parse(ADDR).unwrap();
        let req = TransactionRequest::transfer(to, 1_500_000_000_000_000_000);
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["to"], ADDR);
        assert!(json.get("from").is_none());
        assert!(json.get("data").is_none());
        let recovered: TransactionRequest = serde_json::from_value(json).unwrap();
        assert_eq!(recovered, req);
    }
}
