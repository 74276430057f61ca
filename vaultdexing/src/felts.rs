use derive_more::Display;
use ethers::types::U256;
use ethers::utils::keccak256;

/// The chain's native field element. Hashes, addresses, selectors and raw
/// event payload words are all felts on the wire.
pub type Felt = U256;

#[derive(Debug, Display, Clone, PartialEq, Eq)]
pub enum FeltError {
    #[display("invalid hex text: {_0}")]
    InvalidHex(String),
}

/// Canonical hex text: `0x`-prefixed, lowercase, no leading zeros.
pub fn to_hex(felt: &Felt) -> String {
    format!("{felt:#x}")
}

pub fn from_hex(text: &str) -> Result<Felt, FeltError> {
    let digits = text.strip_prefix("0x").unwrap_or(text);

    if digits.is_empty() {
        return Err(FeltError::InvalidHex(text.to_string()));
    }

    U256::from_str_radix(digits, 16).map_err(|_| FeltError::InvalidHex(text.to_string()))
}

/// Re-renders arbitrary hex text into canonical form so the same logical
/// address always compares equal regardless of source formatting.
pub fn normalize(text: &str) -> Result<String, FeltError> {
    Ok(to_hex(&from_hex(text)?))
}

/// Event selector: keccak-256 of the event name, masked to the low 250 bits
/// to fit the field.
pub fn event_selector(event_name: &str) -> Felt {
    let mut hash = keccak256(event_name.as_bytes());
    hash[0] &= 0x03;

    U256::from_big_endian(&hash)
}
