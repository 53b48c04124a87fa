//! Commitment hashing shared with the deployed contract.
//!
//! The preimage is `subject (u64 LE) || opponent level (u8) || opponent element (u8) || secret
//! (UTF-8)` and the commitment is its Keccak-256 digest. The contract recomputes exactly this
//! value at reveal time, so neither the field order nor the byte order may change.

use crate::reader::DecodeError;
use commonware_utils::hex;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use std::fmt;

/// Length of the fixed preimage header preceding the secret.
pub const COMMITMENT_HEADER_LENGTH: usize = 10;

pub const COMMITMENT_HASH_LENGTH: usize = 32;

/// The two commit-reveal flows the contract supports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    Battle,
    Capture,
}

impl Flow {
    pub const ALL: [Flow; 2] = [Flow::Battle, Flow::Capture];

    pub fn as_str(&self) -> &'static str {
        match self {
            Flow::Battle => "battle",
            Flow::Capture => "capture",
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommitmentHash([u8; COMMITMENT_HASH_LENGTH]);

impl CommitmentHash {
    pub const fn new(bytes: [u8; COMMITMENT_HASH_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, DecodeError> {
        let bytes: [u8; COMMITMENT_HASH_LENGTH] =
            bytes.try_into().map_err(|_| DecodeError::FieldType {
                field: "commitment_hash",
                expected: "32-byte digest",
            })?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; COMMITMENT_HASH_LENGTH] {
        &self.0
    }
}

impl AsRef<[u8]> for CommitmentHash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for CommitmentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex(&self.0))
    }
}

impl fmt::Debug for CommitmentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CommitmentHash({self})")
    }
}

/// Builds the exact byte string the contract hashes.
pub fn commitment_preimage(
    subject: u64,
    opponent_level: u8,
    opponent_element: u8,
    secret: &str,
) -> Vec<u8> {
    let mut preimage = Vec::with_capacity(COMMITMENT_HEADER_LENGTH + secret.len());
    preimage.extend_from_slice(&subject.to_le_bytes());
    preimage.push(opponent_level);
    preimage.push(opponent_element);
    preimage.extend_from_slice(secret.as_bytes());
    preimage
}

pub fn commitment_hash(
    subject: u64,
    opponent_level: u8,
    opponent_element: u8,
    secret: &str,
) -> CommitmentHash {
    let preimage = commitment_preimage(subject, opponent_level, opponent_element, secret);
    let digest = Keccak256::digest(&preimage);
    let mut out = [0u8; COMMITMENT_HASH_LENGTH];
    out.copy_from_slice(&digest);
    CommitmentHash(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_preimage_layout() {
        let preimage = commitment_preimage(0x0102_0304_0506_0708, 3, 1, "xyz");
        assert_eq!(
            preimage,
            vec![0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01, 3, 1, b'x', b'y', b'z']
        );
    }

    #[test]
    fn test_keccak_not_sha3() {
        // Keccak-256 of the empty string; SHA3-256 would be a7ffc6f8...
        let digest = Keccak256::digest(b"");
        assert_eq!(
            hex(&digest),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_hash_is_keccak_of_preimage() {
        let expected = Keccak256::digest(commitment_preimage(42, 3, 1, "secret"));
        assert_eq!(commitment_hash(42, 3, 1, "secret").as_bytes()[..], expected[..]);
    }

    #[test]
    fn test_hash_from_slice_rejects_wrong_length() {
        assert!(CommitmentHash::from_slice(&[0u8; 31]).is_err());
        assert!(CommitmentHash::from_slice(&[0u8; 32]).is_ok());
    }

    proptest! {
        #[test]
        fn prop_hash_deterministic(
            subject in any::<u64>(),
            level in 1u8..=255,
            element in any::<u8>(),
            secret in "[a-zA-Z0-9]{0,64}",
        ) {
            prop_assert_eq!(
                commitment_hash(subject, level, element, &secret),
                commitment_hash(subject, level, element, &secret)
            );
        }

        #[test]
        fn prop_single_byte_change_changes_hash(
            subject in any::<u64>(),
            level in 1u8..=255,
            element in any::<u8>(),
            secret in "[a-zA-Z0-9]{1,64}",
            position in any::<prop::sample::Index>(),
            delta in 1u8..=255,
        ) {
            let original = commitment_hash(subject, level, element, &secret);
            let preimage = commitment_preimage(subject, level, element, &secret);
            let mut mutated = preimage.clone();
            let index = position.index(mutated.len());
            mutated[index] = mutated[index].wrapping_add(delta);
            let digest = Keccak256::digest(&mutated);
            prop_assert_ne!(&original.as_bytes()[..], &digest[..]);
        }

        #[test]
        fn prop_field_changes_change_hash(
            subject in any::<u64>(),
            level in 1u8..=254,
            element in 0u8..=254,
            secret in "[a-z]{0,64}",
        ) {
            let base = commitment_hash(subject, level, element, &secret);
            prop_assert_ne!(base, commitment_hash(subject.wrapping_add(1), level, element, &secret));
            prop_assert_ne!(base, commitment_hash(subject, level + 1, element, &secret));
            prop_assert_ne!(base, commitment_hash(subject, level, element + 1, &secret));
            let extended = format!("{secret}a");
            prop_assert_ne!(base, commitment_hash(subject, level, element, &extended));
        }
    }
}
