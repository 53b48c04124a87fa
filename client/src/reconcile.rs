//! Rebuilding commit-reveal state from the ledger after a restart.
//!
//! The local store only holds secrets; everything else about an open round (encounter, frozen
//! level, commit time) is read back from the commitment object the contract keeps. An
//! unrevealed commitment whose secret is missing locally cannot be revealed by this client and
//! is reported as [Error::ReconciliationGap].

use crate::{
    events::{
        commitment_created_event, event_type, json_address, json_bool, json_bytes, json_text,
        json_u64, json_u8, CommitmentCreated,
    },
    ledger::{EventCursor, Ledger},
    protocol::{Context, Round},
    store::{secret_key, SecretStore},
    Error, Result,
};
use serde_json::Value;
use suu_types::{
    commitment_hash, Address, CommitmentHash, CommitmentRecord, EncounterRecord, Flow,
};
use tracing::{debug, warn};

/// An open round recovered from the ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RestoredState {
    pub round: Round,
}

/// Nested structs are rendered as `{ "type": .., "fields": {..} }` by the ledger.
fn struct_fields(value: &Value) -> &Value {
    value.get("fields").unwrap_or(value)
}

/// Parses the content fields of a commitment object.
pub fn parse_commitment(flow: Flow, id: Address, fields: &Value) -> Result<CommitmentRecord> {
    let fields = struct_fields(fields);
    let encounter = fields
        .get("enemy_info")
        .map(struct_fields)
        .ok_or_else(|| Error::Query("commitment field enemy_info missing".to_string()))?;
    let hash = CommitmentHash::from_slice(&json_bytes(fields, "commitment_hash")?)?;
    Ok(CommitmentRecord {
        flow,
        id,
        player: json_address(fields, "player")?,
        subject: json_u64(fields, "nft_id")?,
        hash,
        encounter: EncounterRecord {
            name: json_text(encounter, "name")?,
            level: json_u8(encounter, "level")?,
            element: json_u8(encounter, "element")?,
            category: json_u8(encounter, "monster_type")?,
            is_golden: json_bool(encounter, "is_golden_monster")?,
            generated_at: json_u64(encounter, "generated_at")?,
        },
        subject_level: json_u8(fields, "player_level")?,
        subject_element: json_u8(fields, "player_element")?,
        committed_at: json_u64(fields, "committed_at")?,
        revealed: json_bool(fields, "is_revealed")?,
    })
}

/// Newest unrevealed commitment of `flow` made by `player` for `subject`.
async fn find_unrevealed<L: Ledger, S, K, C>(
    context: &Context<L, S, K, C>,
    flow: Flow,
    player: Address,
    subject: u64,
) -> Result<Option<CommitmentRecord>> {
    let event_type = event_type(
        &context.builder.deployment().package,
        commitment_created_event(flow),
    );
    let mut cursor: Option<EventCursor> = None;
    for page_number in 0..context.max_event_pages {
        let page = context
            .ledger
            .query_events(&event_type, cursor.take(), context.event_page_limit, true)
            .await?;
        debug!(%flow, page = page_number, events = page.data.len(), "scanning commitment events");
        for event in &page.data {
            let created = match CommitmentCreated::parse(flow, &event.parsed) {
                Ok(created) => created,
                Err(err) => {
                    warn!(%flow, error = %err, "skipping malformed commitment event");
                    continue;
                }
            };
            if created.player != player || created.subject != subject {
                continue;
            }
            // cancelled commitments are deleted
            let Some(fields) = context.ledger.object_fields(&created.commitment).await? else {
                debug!(%flow, commitment = %created.commitment, "commitment object gone");
                continue;
            };
            let record = match parse_commitment(flow, created.commitment, &fields) {
                Ok(record) => record,
                Err(err) => {
                    warn!(%flow, commitment = %created.commitment, error = %err, "skipping malformed commitment object");
                    continue;
                }
            };
            if record.revealed {
                continue;
            }
            return Ok(Some(record));
        }
        if !page.has_next_page {
            break;
        }
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }
    Ok(None)
}

/// Restores the open round of `subject`, if the ledger has one.
///
/// Returns `Ok(None)` when the asset has no active commitment. An unrevealed commitment whose
/// secret is missing from the store, or whose stored secret does not match the published hash,
/// is a [Error::ReconciliationGap]. An active commitment that does not show up within the
/// scanned event pages is an [Error::UnlocatedCommitment].
pub async fn reconcile<L, S, K, C>(
    context: &Context<L, S, K, C>,
    player: Address,
    subject: u64,
) -> Result<Option<RestoredState>>
where
    L: Ledger,
    K: SecretStore,
{
    let asset = context.queries().asset(subject).await?;
    if !asset.has_active_commitment {
        debug!(subject, "no active commitment");
        return Ok(None);
    }

    for flow in Flow::ALL {
        let Some(record) = find_unrevealed(context, flow, player, subject).await? else {
            continue;
        };
        let gap = Error::ReconciliationGap {
            subject,
            flow,
            commitment: record.id,
        };
        let Some(secret) = context.store.get(&secret_key(flow, subject))? else {
            warn!(subject, %flow, commitment = %record.id, "unrevealed commitment without local secret");
            return Err(gap);
        };
        let expected = commitment_hash(
            subject,
            record.encounter.level,
            record.encounter.element,
            &secret,
        );
        if expected != record.hash {
            warn!(subject, %flow, commitment = %record.id, "local secret does not match commitment");
            return Err(gap);
        }

        let deadline = record
            .committed_at
            .saturating_add(context.delays.delay(flow, record.subject_level));
        return Ok(Some(RestoredState {
            round: Round {
                flow,
                subject,
                commitment: record.id,
                encounter_level: record.encounter.level,
                encounter_element: record.encounter.element,
                frozen_level: record.subject_level,
                committed_at: record.committed_at,
                deadline,
            },
        }));
    }

    warn!(
        subject,
        pages = context.max_event_pages,
        "asset reports an active commitment not found in recent events"
    );
    Err(Error::UnlocatedCommitment { subject })
}
