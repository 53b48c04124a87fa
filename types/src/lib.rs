//! Ledger-side data definitions for the suu client.
//!
//! Nothing in this crate performs I/O. It covers the ledger's native binary encoding
//! ([reader], [writer]), the versioned layouts of the records the contract returns ([schema],
//! [records]), commitment hashing ([commitment]) and the game constants the contract enforces
//! ([constants]).

pub mod address;
pub mod commitment;
pub mod constants;
pub mod reader;
pub mod records;
pub mod schema;
pub mod writer;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

pub use address::Address;
pub use commitment::{commitment_hash, commitment_preimage, CommitmentHash, Flow};
pub use constants::{encounter_cooldown, exponential_delay, reveal_delay, Category, Element};
pub use reader::{BinaryReader, DecodeError};
pub use records::{
    decode_address, decode_asset, decode_balances, decode_encounter, decode_listing,
    decode_optional_encounter, decode_u64, AssetRecord, CommitmentRecord, ContractBalances,
    EncounterRecord, ListingRecord,
};
pub use writer::BinaryWriter;
