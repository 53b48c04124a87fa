//! Typed records decoded from read-only contract calls.

use crate::{
    address::Address,
    commitment::{CommitmentHash, Flow},
    reader::{BinaryReader, DecodeError, Result},
    schema::{self, Decoded, ASSET_SCHEMA, ENCOUNTER_SCHEMA},
};
use serde::Serialize;

/// Opponent currently bound to an asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EncounterRecord {
    pub name: String,
    pub level: u8,
    pub element: u8,
    pub category: u8,
    pub is_golden: bool,
    pub generated_at: u64,
}

impl EncounterRecord {
    fn from_decoded(decoded: &Decoded) -> Result<Self> {
        Ok(Self {
            name: decoded.text("name")?,
            level: decoded.u8("level")?,
            element: decoded.u8("element")?,
            category: decoded.u8("category")?,
            is_golden: decoded.bool("is_golden")?,
            generated_at: decoded.u64("generated_at")?,
        })
    }

    #[cfg(any(test, feature = "mocks"))]
    pub(crate) fn to_decoded(&self) -> Decoded {
        use crate::schema::Value;
        Decoded {
            schema: ENCOUNTER_SCHEMA.name,
            fields: vec![
                ("name", Value::Text(self.name.clone())),
                ("level", Value::U8(self.level)),
                ("element", Value::U8(self.element)),
                ("category", Value::U8(self.category)),
                ("is_golden", Value::Bool(self.is_golden)),
                ("generated_at", Value::U64(self.generated_at)),
            ],
        }
    }
}

/// Player-owned asset snapshot.
///
/// `has_active_commitment` is authoritative: it is set by the ledger exactly while one
/// unrevealed commitment exists for the asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AssetRecord {
    pub id: u64,
    /// Object id header carried in the payload.
    pub uid: Address,
    pub owner: Address,
    pub name: String,
    pub element: u8,
    pub category: u8,
    pub level: u8,
    pub experience: u64,
    pub minted_at: u64,
    pub defeated_golden: bool,
    pub current_encounter: Option<EncounterRecord>,
    pub last_encounter_at: u64,
    pub is_listed: bool,
    pub has_active_commitment: bool,
}

impl AssetRecord {
    fn from_decoded(id: u64, decoded: &Decoded) -> Result<Self> {
        let current_encounter = decoded
            .record("current_encounter")?
            .map(EncounterRecord::from_decoded)
            .transpose()?;
        Ok(Self {
            id,
            uid: decoded.address("uid")?,
            owner: decoded.address("owner")?,
            name: decoded.text("name")?,
            element: decoded.u8("element")?,
            category: decoded.u8("category")?,
            level: decoded.u8("level")?,
            experience: decoded.u64("experience")?,
            minted_at: decoded.u64("minted_at")?,
            defeated_golden: decoded.bool("defeated_golden")?,
            current_encounter,
            last_encounter_at: decoded.u64("last_encounter_at")?,
            is_listed: decoded.bool("is_listed")?,
            has_active_commitment: decoded.bool("has_active_commitment")?,
        })
    }

    #[cfg(any(test, feature = "mocks"))]
    pub(crate) fn to_decoded(&self) -> Decoded {
        use crate::schema::Value;
        Decoded {
            schema: ASSET_SCHEMA.name,
            fields: vec![
                ("uid", Value::Address(self.uid)),
                ("owner", Value::Address(self.owner)),
                ("name", Value::Text(self.name.clone())),
                ("element", Value::U8(self.element)),
                ("category", Value::U8(self.category)),
                ("level", Value::U8(self.level)),
                ("experience", Value::U64(self.experience)),
                ("minted_at", Value::U64(self.minted_at)),
                ("defeated_golden", Value::Bool(self.defeated_golden)),
                (
                    "current_encounter",
                    Value::Record(
                        self.current_encounter
                            .as_ref()
                            .map(|encounter| Box::new(encounter.to_decoded())),
                    ),
                ),
                ("last_encounter_at", Value::U64(self.last_encounter_at)),
                ("is_listed", Value::Bool(self.is_listed)),
                ("has_active_commitment", Value::Bool(self.has_active_commitment)),
            ],
        }
    }
}

/// Market listing for one asset.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ListingRecord {
    pub seller: Address,
    pub price: u64,
    pub listed_at: u64,
}

/// Funds held by the contract.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct ContractBalances {
    pub locked: u64,
    pub withdrawable: u64,
}

/// One commit-reveal round as recorded on the ledger.
///
/// `subject_level` is the asset level at commit time and never tracks later level changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitmentRecord {
    pub flow: Flow,
    pub id: Address,
    pub player: Address,
    pub subject: u64,
    pub hash: CommitmentHash,
    pub encounter: EncounterRecord,
    pub subject_level: u8,
    pub subject_element: u8,
    pub committed_at: u64,
    pub revealed: bool,
}

/// Decodes the asset returned for `id`. The id is the query key and is not part of the payload.
pub fn decode_asset(id: u64, bytes: &[u8]) -> Result<AssetRecord> {
    let decoded = schema::decode_exact(&ASSET_SCHEMA, bytes)?;
    AssetRecord::from_decoded(id, &decoded)
}

pub fn decode_encounter(bytes: &[u8]) -> Result<EncounterRecord> {
    let decoded = schema::decode_exact(&ENCOUNTER_SCHEMA, bytes)?;
    EncounterRecord::from_decoded(&decoded)
}

/// Decodes an optional encounter, as returned by `get_nft_current_enemy`.
pub fn decode_optional_encounter(bytes: &[u8]) -> Result<Option<EncounterRecord>> {
    let mut reader = BinaryReader::new(bytes);
    let decoded = reader.read_option(|r| schema::decode(&ENCOUNTER_SCHEMA, r))?;
    reader.finish()?;
    decoded.as_ref().map(EncounterRecord::from_decoded).transpose()
}

/// Decodes a scalar `u64` return value.
pub fn decode_u64(bytes: &[u8]) -> Result<u64> {
    let mut reader = BinaryReader::new(bytes);
    let value = reader.read_u64()?;
    reader.finish()?;
    Ok(value)
}

pub fn decode_address(bytes: &[u8]) -> Result<Address> {
    let mut reader = BinaryReader::new(bytes);
    let value = Address::new(reader.read_array()?);
    reader.finish()?;
    Ok(value)
}

fn expect_returns(returns: &[Vec<u8>], expected: usize) -> Result<()> {
    if returns.len() != expected {
        return Err(DecodeError::ReturnCount {
            expected,
            got: returns.len(),
        });
    }
    Ok(())
}

/// Decodes the three return values of `get_listing_info`: seller, price, listed-at.
pub fn decode_listing(returns: &[Vec<u8>]) -> Result<ListingRecord> {
    expect_returns(returns, 3)?;
    Ok(ListingRecord {
        seller: decode_address(&returns[0])?,
        price: decode_u64(&returns[1])?,
        listed_at: decode_u64(&returns[2])?,
    })
}

/// Decodes the two return values of `get_contract_balances`: locked, withdrawable.
pub fn decode_balances(returns: &[Vec<u8>]) -> Result<ContractBalances> {
    expect_returns(returns, 2)?;
    Ok(ContractBalances {
        locked: decode_u64(&returns[0])?,
        withdrawable: decode_u64(&returns[1])?,
    })
}
