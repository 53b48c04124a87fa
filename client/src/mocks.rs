//! In-memory ledger for tests.
//!
//! [MockNetwork] executes the contract's entry points with the guards the deployed contract
//! applies, including the reveal delay and the commitment hash check. Read-only calls are answered
//! with contract-encoded payloads. Transactions can be hidden for a number of polls to imitate
//! event indexing lag.

use crate::{
    events::{self, event_type},
    ledger::{Clock, EventCursor, EventPage, Ledger, LedgerEvent, Signer, Submitted},
    tx::{Deployment, PureArg, Transaction},
    Error, Result,
};
use serde_json::{json, Value};
use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, MutexGuard,
    },
};
use suu_types::{
    commitment_hash,
    constants::{encounter_cooldown, reveal_delay},
    mocks::{encode_asset, encode_listing, encode_optional_encounter, encode_u64},
    Address, AssetRecord, CommitmentHash, CommitmentRecord, EncounterRecord, Flow, ListingRecord,
};

/// Deployment used by every mock.
pub fn test_deployment() -> Deployment {
    Deployment {
        package: Address::from_low_u64(0xaa),
        game_object: Address::from_low_u64(0xbb),
        game_object_initial_version: 3,
        random_initial_version: 4,
    }
}

/// Clock advanced by hand.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

struct StoredTransaction {
    events: Vec<LedgerEvent>,
    hidden_polls: u32,
}

#[derive(Default)]
struct State {
    next_asset: u64,
    next_object: u64,
    next_digest: u64,
    assets: BTreeMap<u64, AssetRecord>,
    active: HashMap<Address, u64>,
    market: Vec<u64>,
    listings: BTreeMap<u64, ListingRecord>,
    balances: (u64, u64),
    commitments: BTreeMap<Address, CommitmentRecord>,
    corrupted: HashSet<Address>,
    log: Vec<(String, LedgerEvent)>,
    transactions: HashMap<String, StoredTransaction>,
    event_lag: u32,
    fail_next: Option<String>,
    submissions: Vec<Transaction>,
}

pub struct MockNetwork {
    clock: Arc<ManualClock>,
    package: Address,
    state: Mutex<State>,
}

impl Default for MockNetwork {
    fn default() -> Self {
        Self::new()
    }
}

fn abort(reason: impl Into<String>) -> Error {
    Error::Submission(format!("MoveAbort: {}", reason.into()))
}

fn argument<T>(tx: &Transaction, position: usize, get: impl Fn(&PureArg) -> Option<T>) -> Result<T> {
    tx.pure_argument(position)
        .and_then(get)
        .ok_or_else(|| abort(format!("bad argument {position}")))
}

fn flow_of(function: &str) -> Flow {
    if function.starts_with("capture") || function.starts_with("cancel_capture") {
        Flow::Capture
    } else {
        Flow::Battle
    }
}

impl MockNetwork {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(ManualClock::new(1_700_000_000_000)),
            package: test_deployment().package,
            state: Mutex::new(State {
                next_asset: 1,
                next_object: 0xc000,
                ..State::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    /// Ledger clock; timestamps of emitted events come from it.
    pub fn clock(&self) -> Arc<ManualClock> {
        self.clock.clone()
    }

    /// Signer submitting as `address`.
    pub fn signer(self: &Arc<Self>, address: Address) -> MockSigner {
        MockSigner {
            network: self.clone(),
            address,
        }
    }

    /// Hides each new transaction from [Ledger::transaction_events] for `polls` lookups.
    pub fn set_event_lag(&self, polls: u32) {
        self.state().event_lag = polls;
    }

    /// Rejects the next submission with `message`.
    pub fn fail_next_submission(&self, message: &str) {
        self.state().fail_next = Some(message.to_string());
    }

    pub fn submissions(&self) -> Vec<Transaction> {
        self.state().submissions.clone()
    }

    pub fn mint(&self, owner: Address, level: u8, element: u8) -> u64 {
        let now = self.clock.now_ms();
        insert_asset(&mut self.state(), owner, level, element, now)
    }

    pub fn set_encounter(&self, id: u64, level: u8, element: u8, is_golden: bool) {
        let now = self.clock.now_ms();
        let mut state = self.state();
        if let Some(asset) = state.assets.get_mut(&id) {
            asset.current_encounter = Some(EncounterRecord {
                name: format!("Wild #{level}"),
                level,
                element,
                category: 0,
                is_golden,
                generated_at: now,
            });
            asset.last_encounter_at = now;
        }
    }

    pub fn set_level(&self, id: u64, level: u8) {
        if let Some(asset) = self.state().assets.get_mut(&id) {
            asset.level = level;
        }
    }

    pub fn set_active(&self, owner: Address, id: u64) {
        self.state().active.insert(owner, id);
    }

    pub fn list(&self, id: u64, price: u64, listed_at: u64) {
        let mut state = self.state();
        let Some(asset) = state.assets.get_mut(&id) else {
            return;
        };
        asset.is_listed = true;
        let seller = asset.owner;
        let event = self.event(
            events::LISTING_CREATED,
            json!({
                "nft_id": id.to_string(),
                "seller": seller.to_string(),
                "price": price.to_string(),
                "timestamp": listed_at.to_string(),
            }),
        );
        state.log.push((format!("L{id}"), event));
        state.market.push(id);
        state.listings.insert(
            id,
            ListingRecord {
                seller,
                price,
                listed_at,
            },
        );
    }

    pub fn set_balances(&self, locked: u64, withdrawable: u64) {
        self.state().balances = (locked, withdrawable);
    }

    pub fn asset_ids_of(&self, owner: Address) -> Vec<u64> {
        self.state()
            .assets
            .values()
            .filter(|asset| asset.owner == owner)
            .map(|asset| asset.id)
            .collect()
    }

    pub fn asset(&self, id: u64) -> Option<AssetRecord> {
        self.state().assets.get(&id).cloned()
    }

    /// Unrevealed commitment for `subject`, if any.
    pub fn active_commitment(&self, subject: u64) -> Option<CommitmentRecord> {
        self.state()
            .commitments
            .values()
            .find(|commitment| commitment.subject == subject && !commitment.revealed)
            .cloned()
    }

    /// Settles a commitment without its secret, as an out-of-band process would.
    pub fn settle(&self, commitment: &Address) {
        let mut state = self.state();
        let Some(record) = state.commitments.get_mut(commitment) else {
            return;
        };
        record.revealed = true;
        let subject = record.subject;
        if let Some(asset) = state.assets.get_mut(&subject) {
            asset.has_active_commitment = false;
        }
    }

    /// Serves the object `id` without its content fields from now on.
    pub fn corrupt_object(&self, id: &Address) {
        self.state().corrupted.insert(*id);
    }

    fn event(&self, name: &str, parsed: Value) -> LedgerEvent {
        LedgerEvent {
            event_type: event_type(&self.package, name),
            parsed,
            timestamp_ms: Some(self.clock.now_ms()),
            cursor: None,
        }
    }

    fn execute(&self, state: &mut State, sender: Address, tx: &Transaction) -> Result<Vec<LedgerEvent>> {
        let now = self.clock.now_ms();
        let function = tx.function().ok_or_else(|| abort("no move call"))?;
        match function {
            "buy_nft" => {
                let id = insert_asset(state, sender, 1, (now % 5) as u8, now);
                Ok(vec![self.event(
                    events::ASSET_MINTED,
                    json!({
                        "nft_id": id.to_string(),
                        "owner": sender.to_string(),
                        "element": (now % 5) as u8,
                        "monster_type": (id % 6) as u8,
                        "level": 1,
                        "timestamp": now.to_string(),
                    }),
                )])
            }
            "set_active_nft" => {
                let id = argument(tx, 1, PureArg::as_u64)?;
                owned_asset(state, sender, id)?;
                state.active.insert(sender, id);
                Ok(vec![])
            }
            "random_enemy" => {
                let id = argument(tx, 1, PureArg::as_u64)?;
                let asset = owned_asset(state, sender, id)?;
                if asset.has_active_commitment {
                    return Err(abort("commitment pending"));
                }
                if asset.last_encounter_at != 0
                    && now < asset.last_encounter_at + encounter_cooldown(asset.level)
                {
                    return Err(abort("encounter cooldown"));
                }
                asset.current_encounter = Some(EncounterRecord {
                    name: "Wanderer".to_string(),
                    level: asset.level,
                    element: (id % 5) as u8,
                    category: (id % 6) as u8,
                    is_golden: false,
                    generated_at: now,
                });
                asset.last_encounter_at = now;
                Ok(vec![])
            }
            "battle_commit" | "capture_commit" => {
                let flow = flow_of(function);
                let id = argument(tx, 1, PureArg::as_u64)?;
                let hash = argument(tx, 2, |arg| {
                    arg.as_bytes().and_then(|bytes| CommitmentHash::from_slice(bytes).ok())
                })?;
                let asset = owned_asset(state, sender, id)?;
                if asset.has_active_commitment {
                    return Err(abort("commitment already active"));
                }
                let encounter = asset
                    .current_encounter
                    .clone()
                    .ok_or_else(|| abort("no encounter"))?;
                if flow == Flow::Capture && encounter.is_golden {
                    return Err(abort("golden encounter cannot be captured"));
                }
                asset.has_active_commitment = true;
                let (subject_level, subject_element) = (asset.level, asset.element);
                let commitment = Address::from_low_u64(state.next_object);
                state.next_object += 1;
                let record = CommitmentRecord {
                    flow,
                    id: commitment,
                    player: sender,
                    subject: id,
                    hash,
                    encounter,
                    subject_level,
                    subject_element,
                    committed_at: now,
                    revealed: false,
                };
                let event = self.event(
                    events::commitment_created_event(flow),
                    json!({
                        "commitment_id": record.id.to_string(),
                        "player": sender.to_string(),
                        "nft_id": id.to_string(),
                        "timestamp": now.to_string(),
                    }),
                );
                state.commitments.insert(record.id, record);
                Ok(vec![event])
            }
            "battle_reveal_by_address" | "capture_reveal_by_address" => {
                let flow = flow_of(function);
                let commitment = argument(tx, 1, PureArg::as_address)?;
                let id = argument(tx, 2, PureArg::as_u64)?;
                let level = argument(tx, 3, PureArg::as_u8)?;
                let element = argument(tx, 4, PureArg::as_u8)?;
                let secret = argument(tx, 5, |arg| arg.as_bytes().map(<[u8]>::to_vec))?;
                let secret = String::from_utf8(secret).map_err(|_| abort("secret not utf-8"))?;
                let record = find_commitment(state, flow, sender, commitment, id)?;
                if now < record.committed_at + reveal_delay(flow, record.subject_level) {
                    return Err(abort("reveal too early"));
                }
                if commitment_hash(id, level, element, &secret) != record.hash {
                    return Err(abort("commitment hash mismatch"));
                }
                record.revealed = true;
                let record = record.clone();
                let asset = state
                    .assets
                    .get_mut(&id)
                    .ok_or_else(|| abort("unknown asset"))?;
                asset.has_active_commitment = false;
                asset.current_encounter = None;
                let event = match flow {
                    Flow::Battle => {
                        let is_win = record.subject_level >= record.encounter.level;
                        let experience = if is_win {
                            u64::from(record.encounter.level) * 10
                        } else {
                            0
                        };
                        asset.experience += experience;
                        self.event(
                            events::BATTLE_OUTCOME,
                            json!({
                                "nft_id": id.to_string(),
                                "player": sender.to_string(),
                                "is_golden_monster": record.encounter.is_golden,
                                "enemy_level": record.encounter.level,
                                "enemy_element": record.encounter.element,
                                "player_level": record.subject_level,
                                "player_element": record.subject_element,
                                "is_win": is_win,
                                "experience_gained": experience.to_string(),
                                "level_increased": false,
                                "reward_amount": "0",
                                "timestamp": now.to_string(),
                            }),
                        )
                    }
                    Flow::Capture => self.event(
                        events::CAPTURE_OUTCOME,
                        json!({ "is_success": true, "capture_probability": "50" }),
                    ),
                };
                Ok(vec![event])
            }
            "cancel_battle_commitment_by_address" | "cancel_capture_commitment_by_address" => {
                let flow = flow_of(function);
                let commitment = argument(tx, 1, PureArg::as_address)?;
                let id = argument(tx, 2, PureArg::as_u64)?;
                find_commitment(state, flow, sender, commitment, id)?;
                state.commitments.remove(&commitment);
                if let Some(asset) = state.assets.get_mut(&id) {
                    asset.has_active_commitment = false;
                }
                Ok(vec![])
            }
            other => Err(abort(format!("{other} not supported by mock"))),
        }
    }

    fn commitment_fields(record: &CommitmentRecord) -> Value {
        json!({
            "id": { "id": record.id.to_string() },
            "player": record.player.to_string(),
            "nft_id": record.subject.to_string(),
            "commitment_hash": record.hash.as_bytes().to_vec(),
            "enemy_info": {
                "type": "suu::EnemyInfo",
                "fields": {
                    "name": record.encounter.name.as_bytes().to_vec(),
                    "level": record.encounter.level,
                    "element": record.encounter.element,
                    "monster_type": record.encounter.category,
                    "is_golden_monster": record.encounter.is_golden,
                    "generated_at": record.encounter.generated_at.to_string(),
                }
            },
            "player_level": record.subject_level,
            "player_element": record.subject_element,
            "committed_at": record.committed_at.to_string(),
            "is_revealed": record.revealed,
        })
    }
}

fn insert_asset(state: &mut State, owner: Address, level: u8, element: u8, now: u64) -> u64 {
    let id = state.next_asset;
    state.next_asset += 1;
    state.assets.insert(
        id,
        AssetRecord {
            id,
            uid: Address::from_low_u64(0x1_0000 + id),
            owner,
            name: format!("Asset #{id}"),
            element,
            category: (id % 6) as u8,
            level,
            experience: 0,
            minted_at: now,
            defeated_golden: false,
            current_encounter: None,
            last_encounter_at: 0,
            is_listed: false,
            has_active_commitment: false,
        },
    );
    id
}

fn owned_asset(state: &mut State, sender: Address, id: u64) -> Result<&mut AssetRecord> {
    let asset = state
        .assets
        .get_mut(&id)
        .ok_or_else(|| abort("unknown asset"))?;
    if asset.owner != sender {
        return Err(abort("not owner"));
    }
    Ok(asset)
}

/// Unrevealed commitment object `id`, owned by `sender` and made for `subject`.
fn find_commitment(
    state: &mut State,
    flow: Flow,
    sender: Address,
    id: Address,
    subject: u64,
) -> Result<&mut CommitmentRecord> {
    let record = state
        .commitments
        .get_mut(&id)
        .ok_or_else(|| abort("commitment object not found"))?;
    if record.flow != flow || record.subject != subject {
        return Err(abort("commitment does not match call"));
    }
    if record.player != sender {
        return Err(abort("not commitment owner"));
    }
    if record.revealed {
        return Err(abort("commitment already revealed"));
    }
    Ok(record)
}

impl Ledger for MockNetwork {
    async fn query(&self, call: &Transaction) -> Result<Vec<Vec<u8>>> {
        let function = call
            .function()
            .ok_or_else(|| Error::Query("no move call".to_string()))?;
        let u64_arg = |position| {
            call.pure_argument(position)
                .and_then(PureArg::as_u64)
                .ok_or_else(|| Error::Query(format!("bad argument {position}")))
        };
        let address_arg = |position| {
            call.pure_argument(position)
                .and_then(PureArg::as_address)
                .ok_or_else(|| Error::Query(format!("bad argument {position}")))
        };
        let missing = || Error::Query("MoveAbort: not found".to_string());

        let state = self.state();
        let owned = |owner: Address| -> Vec<u64> {
            state
                .assets
                .values()
                .filter(|asset| asset.owner == owner)
                .map(|asset| asset.id)
                .collect()
        };
        let returns = match function {
            "get_nft" => {
                let asset = state.assets.get(&u64_arg(1)?).ok_or_else(missing)?;
                vec![encode_asset(asset)]
            }
            "get_nft_current_enemy" => {
                let asset = state.assets.get(&u64_arg(1)?).ok_or_else(missing)?;
                vec![encode_optional_encounter(asset.current_encounter.as_ref())]
            }
            "get_next_enemy_random_time" => {
                let asset = state.assets.get(&u64_arg(1)?).ok_or_else(missing)?;
                vec![encode_u64(
                    asset.last_encounter_at + encounter_cooldown(asset.level),
                )]
            }
            "get_owner_nft_count" => vec![encode_u64(owned(address_arg(1)?).len() as u64)],
            "get_owner_nft_id_at" => {
                let ids = owned(address_arg(1)?);
                let id = ids.get(u64_arg(2)? as usize).ok_or_else(missing)?;
                vec![encode_u64(*id)]
            }
            "get_active_nft" => {
                let id = state.active.get(&address_arg(1)?).copied().unwrap_or(0);
                vec![encode_u64(id)]
            }
            "get_market_list_len" => vec![encode_u64(state.market.len() as u64)],
            "get_market_list_id_at" => {
                let id = state.market.get(u64_arg(1)? as usize).ok_or_else(missing)?;
                vec![encode_u64(*id)]
            }
            "get_listing_info" => {
                let listing = state.listings.get(&u64_arg(1)?).ok_or_else(missing)?;
                encode_listing(listing)
            }
            "get_contract_balances" => {
                vec![encode_u64(state.balances.0), encode_u64(state.balances.1)]
            }
            other => return Err(Error::Query(format!("{other} not supported by mock"))),
        };
        Ok(returns)
    }

    async fn query_events(
        &self,
        event_type: &str,
        cursor: Option<EventCursor>,
        limit: usize,
        descending: bool,
    ) -> Result<EventPage> {
        let state = self.state();
        let mut matching: Vec<LedgerEvent> = state
            .log
            .iter()
            .enumerate()
            .filter(|(_, (_, event))| event.event_type == event_type)
            .map(|(seq, (digest, event))| LedgerEvent {
                cursor: Some(EventCursor {
                    tx_digest: digest.clone(),
                    event_seq: seq.to_string(),
                }),
                ..event.clone()
            })
            .collect();
        if descending {
            matching.reverse();
        }
        let start = match &cursor {
            Some(cursor) => matching
                .iter()
                .position(|event| event.cursor.as_ref() == Some(cursor))
                .map_or(0, |position| position + 1),
            None => 0,
        };
        let data: Vec<LedgerEvent> = matching.iter().skip(start).take(limit).cloned().collect();
        let has_next_page = start + data.len() < matching.len();
        Ok(EventPage {
            next_cursor: data.last().and_then(|event| event.cursor.clone()),
            data,
            has_next_page,
        })
    }

    async fn transaction_events(&self, digest: &str) -> Result<Option<Vec<LedgerEvent>>> {
        let mut state = self.state();
        let Some(stored) = state.transactions.get_mut(digest) else {
            return Ok(None);
        };
        if stored.hidden_polls > 0 {
            stored.hidden_polls -= 1;
            return Ok(None);
        }
        Ok(Some(stored.events.clone()))
    }

    async fn object_fields(&self, id: &Address) -> Result<Option<Value>> {
        let state = self.state();
        if state.corrupted.contains(id) {
            return Ok(Some(json!({ "id": { "id": id.to_string() } })));
        }
        Ok(state.commitments.get(id).map(MockNetwork::commitment_fields))
    }
}

/// Submits transactions to a [MockNetwork] as one address.
#[derive(Clone)]
pub struct MockSigner {
    network: Arc<MockNetwork>,
    address: Address,
}

impl Signer for MockSigner {
    fn address(&self) -> Address {
        self.address
    }

    async fn submit(&self, transaction: Transaction) -> Result<Submitted> {
        let network = &self.network;
        let mut state = network.state();
        state.submissions.push(transaction.clone());
        if let Some(message) = state.fail_next.take() {
            return Err(Error::Submission(message));
        }
        let events = network.execute(&mut state, self.address, &transaction)?;
        state.next_digest += 1;
        let digest = format!("D{}", state.next_digest);
        for event in &events {
            state.log.push((digest.clone(), event.clone()));
        }
        let hidden_polls = state.event_lag;
        state.transactions.insert(
            digest.clone(),
            StoredTransaction {
                events,
                hidden_polls,
            },
        );
        Ok(Submitted { digest })
    }
}
