use crate::reader::DecodeError;
use commonware_utils::{from_hex, hex};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr};

pub const ADDRESS_LENGTH: usize = 32;

/// A 32-byte ledger address. Object ids share the same representation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    pub const ZERO: Self = Self([0u8; ADDRESS_LENGTH]);

    pub const fn new(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Builds the address of a well-known system object (e.g. `0x6`).
    pub const fn from_low_u64(value: u64) -> Self {
        let mut bytes = [0u8; ADDRESS_LENGTH];
        let be = value.to_be_bytes();
        let mut i = 0;
        while i < 8 {
            bytes[ADDRESS_LENGTH - 8 + i] = be[i];
            i += 1;
        }
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, DecodeError> {
        let bytes: [u8; ADDRESS_LENGTH] = bytes
            .try_into()
            .map_err(|_| DecodeError::InvalidAddress(format!("{} bytes", bytes.len())))?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl FromStr for Address {
    type Err = DecodeError;

    /// Accepts `0x`-prefixed or bare hex, left-padding short forms such as `0x6`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .unwrap_or(trimmed);
        if digits.is_empty() || digits.len() > ADDRESS_LENGTH * 2 {
            return Err(DecodeError::InvalidAddress(value.to_string()));
        }
        let padded = format!("{digits:0>64}");
        let bytes = from_hex(&padded).ok_or_else(|| DecodeError::InvalidAddress(value.to_string()))?;
        Self::from_slice(&bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex(&self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_form_is_left_padded() {
        let clock: Address = "0x6".parse().unwrap();
        assert_eq!(clock, Address::from_low_u64(6));
        assert_eq!(
            clock.to_string(),
            "0x0000000000000000000000000000000000000000000000000000000000000006"
        );
    }

    #[test]
    fn test_round_trip_text() {
        let text = "0xbed3a24d91f2fb75ab90d6dfddbfc5f59a7a4b62f5779c1118dc22ab176fca44";
        let address: Address = text.parse().unwrap();
        assert_eq!(address.to_string(), text);
        let bare: Address = text.trim_start_matches("0x").parse().unwrap();
        assert_eq!(bare, address);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!("".parse::<Address>().is_err());
        assert!("0x".parse::<Address>().is_err());
        assert!("0xzz".parse::<Address>().is_err());
        assert!(format!("0x{}", "1".repeat(65)).parse::<Address>().is_err());
    }

    #[test]
    fn test_serde_as_string() {
        let address = Address::from_low_u64(8);
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, format!("\"{address}\""));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
    }
}
