//! Encoders producing the byte payloads the contract returns, for tests.

use crate::{
    records::{AssetRecord, EncounterRecord, ListingRecord},
    schema::{self, ASSET_SCHEMA, ENCOUNTER_SCHEMA},
    writer::BinaryWriter,
};

/// Encodes an asset the way `get_nft` returns it.
pub fn encode_asset(record: &AssetRecord) -> Vec<u8> {
    let mut writer = BinaryWriter::new();
    schema::encode(&ASSET_SCHEMA, &record.to_decoded(), &mut writer)
        .expect("asset fields follow the asset schema");
    writer.into_vec()
}

/// Encodes a bare encounter.
pub fn encode_encounter(record: &EncounterRecord) -> Vec<u8> {
    let mut writer = BinaryWriter::new();
    schema::encode(&ENCOUNTER_SCHEMA, &record.to_decoded(), &mut writer)
        .expect("encounter fields follow the encounter schema");
    writer.into_vec()
}

/// Encodes an optional encounter the way `get_nft_current_enemy` returns it.
pub fn encode_optional_encounter(record: Option<&EncounterRecord>) -> Vec<u8> {
    let mut writer = BinaryWriter::new();
    writer.write_option(record, |w, encounter| {
        w.write_bytes(&encode_encounter(encounter))
    });
    writer.into_vec()
}

/// Encodes the three return values of `get_listing_info`.
pub fn encode_listing(record: &ListingRecord) -> Vec<Vec<u8>> {
    vec![
        record.seller.as_ref().to_vec(),
        record.price.to_le_bytes().to_vec(),
        record.listed_at.to_le_bytes().to_vec(),
    ]
}

pub fn encode_u64(value: u64) -> Vec<u8> {
    value.to_le_bytes().to_vec()
}
