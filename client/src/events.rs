use crate::{
    ledger::{Ledger, LedgerEvent},
    Error, Result,
};
use commonware_utils::from_hex;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use suu_types::{Address, Flow};
use tracing::{debug, warn};

pub const BATTLE_COMMITMENT_CREATED: &str = "BattleCommitmentCreatedEvent";
pub const CAPTURE_COMMITMENT_CREATED: &str = "CaptureCommitmentCreatedEvent";
pub const BATTLE_OUTCOME: &str = "BattleEvent";
pub const CAPTURE_OUTCOME: &str = "CaptureAttemptEvent";
pub const ASSET_MINTED: &str = "NFTMintedEvent";
pub const LISTING_CREATED: &str = "ListingCreatedEvent";
pub const LISTING_CANCELLED: &str = "ListingCancelledEvent";
pub const LISTING_PURCHASED: &str = "ListingPurchasedEvent";

/// Events parsed by [MarketEvent].
pub const MARKET_EVENTS: [&str; 4] = [
    ASSET_MINTED,
    LISTING_CREATED,
    LISTING_CANCELLED,
    LISTING_PURCHASED,
];

/// Fully qualified type of a contract event.
pub fn event_type(package: &Address, name: &str) -> String {
    format!("{package}::{}::{name}", crate::tx::MODULE)
}

pub fn commitment_created_event(flow: Flow) -> &'static str {
    match flow {
        Flow::Battle => BATTLE_COMMITMENT_CREATED,
        Flow::Capture => CAPTURE_COMMITMENT_CREATED,
    }
}

/// Whether `event` has the given unqualified name, regardless of package.
pub fn is_event(event: &LedgerEvent, name: &str) -> bool {
    event
        .event_type
        .rsplit("::")
        .next()
        .is_some_and(|last| last == name)
}

fn field<'a>(parsed: &'a Value, name: &'static str) -> Result<&'a Value> {
    parsed
        .get(name)
        .ok_or_else(|| Error::Query(format!("event field {name} missing")))
}

fn malformed(name: &'static str) -> Error {
    Error::Query(format!("event field {name} malformed"))
}

/// Ledger JSON renders `u64` as strings and narrower integers as numbers.
pub(crate) fn json_u64(parsed: &Value, name: &'static str) -> Result<u64> {
    match field(parsed, name)? {
        Value::Number(number) => number.as_u64(),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
    .ok_or_else(|| malformed(name))
}

pub(crate) fn json_u8(parsed: &Value, name: &'static str) -> Result<u8> {
    u8::try_from(json_u64(parsed, name)?).map_err(|_| malformed(name))
}

pub(crate) fn json_bool(parsed: &Value, name: &'static str) -> Result<bool> {
    field(parsed, name)?.as_bool().ok_or_else(|| malformed(name))
}

pub(crate) fn json_address(parsed: &Value, name: &'static str) -> Result<Address> {
    field(parsed, name)?
        .as_str()
        .and_then(|text| text.parse().ok())
        .ok_or_else(|| malformed(name))
}

/// `vector<u8>` fields arrive as number arrays, or as hex text from some indexers.
pub(crate) fn json_bytes(parsed: &Value, name: &'static str) -> Result<Vec<u8>> {
    match field(parsed, name)? {
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_u64().and_then(|byte| u8::try_from(byte).ok()))
            .collect(),
        Value::String(text) => from_hex(text.trim_start_matches("0x")),
        _ => None,
    }
    .ok_or_else(|| malformed(name))
}

/// Text fields are either JSON strings or UTF-8 byte arrays.
pub(crate) fn json_text(parsed: &Value, name: &'static str) -> Result<String> {
    match field(parsed, name)? {
        Value::String(text) => Ok(text.clone()),
        _ => String::from_utf8(json_bytes(parsed, name)?).map_err(|_| malformed(name)),
    }
}

/// Emitted by a commit transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommitmentCreated {
    pub flow: Flow,
    pub commitment: Address,
    pub player: Address,
    pub subject: u64,
    pub timestamp: u64,
}

impl CommitmentCreated {
    pub fn parse(flow: Flow, parsed: &Value) -> Result<Self> {
        Ok(Self {
            flow,
            commitment: json_address(parsed, "commitment_id")?,
            player: json_address(parsed, "player")?,
            subject: json_u64(parsed, "nft_id")?,
            timestamp: json_u64(parsed, "timestamp")?,
        })
    }

    /// Finds the commitment event of `flow` among a transaction's events.
    pub fn find(flow: Flow, events: &[LedgerEvent]) -> Option<Self> {
        let name = commitment_created_event(flow);
        events
            .iter()
            .filter(|event| is_event(event, name))
            .find_map(|event| match Self::parse(flow, &event.parsed) {
                Ok(created) => Some(created),
                Err(err) => {
                    warn!(error = %err, "skipping malformed commitment event");
                    None
                }
            })
    }
}

/// Result of a battle reveal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BattleOutcome {
    pub subject: u64,
    pub player: Address,
    pub is_golden: bool,
    pub encounter_level: u8,
    pub encounter_element: u8,
    pub player_level: u8,
    pub player_element: u8,
    pub is_win: bool,
    pub experience_gained: u64,
    pub level_increased: bool,
    pub reward_amount: u64,
    pub timestamp: u64,
}

impl BattleOutcome {
    pub fn parse(parsed: &Value) -> Result<Self> {
        Ok(Self {
            subject: json_u64(parsed, "nft_id")?,
            player: json_address(parsed, "player")?,
            is_golden: json_bool(parsed, "is_golden_monster")?,
            encounter_level: json_u8(parsed, "enemy_level")?,
            encounter_element: json_u8(parsed, "enemy_element")?,
            player_level: json_u8(parsed, "player_level")?,
            player_element: json_u8(parsed, "player_element")?,
            is_win: json_bool(parsed, "is_win")?,
            experience_gained: json_u64(parsed, "experience_gained")?,
            level_increased: json_bool(parsed, "level_increased")?,
            reward_amount: json_u64(parsed, "reward_amount")?,
            timestamp: json_u64(parsed, "timestamp")?,
        })
    }
}

/// Result of a capture reveal. `capture_probability` is in percent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CaptureOutcome {
    pub is_success: bool,
    pub capture_probability: u64,
}

impl CaptureOutcome {
    pub fn parse(parsed: &Value) -> Result<Self> {
        Ok(Self {
            is_success: json_bool(parsed, "is_success")?,
            capture_probability: json_u64(parsed, "capture_probability")?,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Battle(BattleOutcome),
    Capture(CaptureOutcome),
}

impl Outcome {
    /// Finds the outcome event of `flow` among a transaction's events.
    pub fn find(flow: Flow, events: &[LedgerEvent]) -> Option<Self> {
        let name = match flow {
            Flow::Battle => BATTLE_OUTCOME,
            Flow::Capture => CAPTURE_OUTCOME,
        };
        let event = events.iter().find(|event| is_event(event, name))?;
        let parsed = match flow {
            Flow::Battle => BattleOutcome::parse(&event.parsed).map(Outcome::Battle),
            Flow::Capture => CaptureOutcome::parse(&event.parsed).map(Outcome::Capture),
        };
        match parsed {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                warn!(%flow, error = %err, "skipping malformed outcome event");
                None
            }
        }
    }
}

/// Market and mint activity.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarketEvent {
    Minted {
        subject: u64,
        owner: Address,
        timestamp: u64,
    },
    Listed {
        subject: u64,
        seller: Address,
        price: u64,
        timestamp: u64,
    },
    Delisted {
        subject: u64,
        seller: Address,
        timestamp: u64,
    },
    Purchased {
        subject: u64,
        seller: Address,
        buyer: Address,
        price: u64,
        timestamp: u64,
    },
}

impl MarketEvent {
    pub fn timestamp(&self) -> u64 {
        match self {
            MarketEvent::Minted { timestamp, .. }
            | MarketEvent::Listed { timestamp, .. }
            | MarketEvent::Delisted { timestamp, .. }
            | MarketEvent::Purchased { timestamp, .. } => *timestamp,
        }
    }

    /// Parses a mint or listing event; other event types yield `None`.
    pub fn parse(event: &LedgerEvent) -> Result<Option<Self>> {
        let parsed = &event.parsed;
        let market = if is_event(event, ASSET_MINTED) {
            MarketEvent::Minted {
                subject: json_u64(parsed, "nft_id")?,
                owner: json_address(parsed, "owner")?,
                timestamp: json_u64(parsed, "timestamp")?,
            }
        } else if is_event(event, LISTING_CREATED) {
            MarketEvent::Listed {
                subject: json_u64(parsed, "nft_id")?,
                seller: json_address(parsed, "seller")?,
                price: json_u64(parsed, "price")?,
                timestamp: json_u64(parsed, "timestamp")?,
            }
        } else if is_event(event, LISTING_CANCELLED) {
            MarketEvent::Delisted {
                subject: json_u64(parsed, "nft_id")?,
                seller: json_address(parsed, "seller")?,
                timestamp: json_u64(parsed, "timestamp")?,
            }
        } else if is_event(event, LISTING_PURCHASED) {
            MarketEvent::Purchased {
                subject: json_u64(parsed, "nft_id")?,
                seller: json_address(parsed, "seller")?,
                buyer: json_address(parsed, "buyer")?,
                price: json_u64(parsed, "price")?,
                timestamp: json_u64(parsed, "timestamp")?,
            }
        } else {
            return Ok(None);
        };
        Ok(Some(market))
    }
}

/// Outcome of waiting for a transaction's event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Confirmation<T> {
    /// The event was observed.
    Confirmed(T),
    /// The transaction is visible but did not emit the event.
    Absent,
    /// Retries ran out before the transaction became visible. Not a failure.
    Unknown,
}

impl<T> Confirmation<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Confirmation<U> {
        match self {
            Confirmation::Confirmed(value) => Confirmation::Confirmed(f(value)),
            Confirmation::Absent => Confirmation::Absent,
            Confirmation::Unknown => Confirmation::Unknown,
        }
    }

    pub fn confirmed(self) -> Option<T> {
        match self {
            Confirmation::Confirmed(value) => Some(value),
            _ => None,
        }
    }
}

/// Bounded polling schedule: attempt `n` (0-based) waits `initial_delay + n * delay_step` first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub attempts: u32,
    pub initial_delay: Duration,
    pub delay_step: Duration,
}

impl ConfirmationPolicy {
    pub fn delay(&self, attempt: u32) -> Duration {
        self.initial_delay
            .saturating_add(self.delay_step.saturating_mul(attempt))
    }
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            initial_delay: Duration::from_millis(1_000),
            delay_step: Duration::from_millis(500),
        }
    }
}

/// Polls a transaction's events until one matches, the transaction proves it has none, or the
/// policy is exhausted. Event indexing lags finality, so an invisible transaction is retried.
#[derive(Clone, Debug)]
pub struct EventRetryFetcher<L> {
    ledger: L,
    policy: ConfirmationPolicy,
}

impl<L: Ledger> EventRetryFetcher<L> {
    pub fn new(ledger: L, policy: ConfirmationPolicy) -> Self {
        Self { ledger, policy }
    }

    pub fn policy(&self) -> &ConfirmationPolicy {
        &self.policy
    }

    pub async fn fetch<T>(
        &self,
        digest: &str,
        extract: impl Fn(&[LedgerEvent]) -> Option<T>,
    ) -> Confirmation<T> {
        for attempt in 0..self.policy.attempts {
            tokio::time::sleep(self.policy.delay(attempt)).await;
            match self.ledger.transaction_events(digest).await {
                Ok(Some(events)) => {
                    return match extract(&events) {
                        Some(value) => {
                            debug!(digest, attempt, "event confirmed");
                            Confirmation::Confirmed(value)
                        }
                        None => {
                            warn!(digest, attempt, events = events.len(), "expected event absent");
                            Confirmation::Absent
                        }
                    };
                }
                Ok(None) => {
                    debug!(digest, attempt, "transaction not yet visible");
                }
                Err(err) => {
                    warn!(digest, attempt, error = %err, "event lookup failed");
                }
            }
        }
        warn!(digest, attempts = self.policy.attempts, "event not observed");
        Confirmation::Unknown
    }

    /// Runs [Self::fetch] as a background task. Dropping the handle cancels it.
    pub fn spawn<T, F>(self, digest: String, extract: F) -> Pending<T>
    where
        L: 'static,
        T: Send + 'static,
        F: Fn(&[LedgerEvent]) -> Option<T> + Send + Sync + 'static,
    {
        let handle = tokio::spawn(async move { self.fetch(&digest, extract).await });
        Pending { handle }
    }
}

/// Background confirmation lookup.
pub struct Pending<T> {
    handle: tokio::task::JoinHandle<Confirmation<T>>,
}

impl<T> Drop for Pending<T> {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl<T> Pending<T> {
    /// Waits for the lookup; a task that panicked or was aborted reports [Confirmation::Unknown].
    pub async fn wait(mut self) -> Confirmation<T> {
        (&mut self.handle).await.unwrap_or(Confirmation::Unknown)
    }

    pub fn cancel(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ledger::{EventCursor, EventPage},
        tx::Transaction,
    };
    use serde_json::json;
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    /// Transaction becomes visible after `hidden_polls` lookups.
    struct LaggingLedger {
        hidden_polls: u32,
        polls: AtomicU32,
        events: Vec<LedgerEvent>,
    }

    impl Ledger for LaggingLedger {
        async fn query(&self, _: &Transaction) -> Result<Vec<Vec<u8>>> {
            Err(Error::UnexpectedResponse)
        }

        async fn query_events(
            &self,
            _: &str,
            _: Option<EventCursor>,
            _: usize,
            _: bool,
        ) -> Result<EventPage> {
            Ok(EventPage::default())
        }

        async fn transaction_events(&self, _: &str) -> Result<Option<Vec<LedgerEvent>>> {
            let poll = self.polls.fetch_add(1, Ordering::SeqCst);
            if poll < self.hidden_polls {
                return Ok(None);
            }
            Ok(Some(self.events.clone()))
        }

        async fn object_fields(&self, _: &Address) -> Result<Option<Value>> {
            Ok(None)
        }
    }

    fn commitment_event() -> LedgerEvent {
        LedgerEvent {
            event_type: "0xaa::suu::BattleCommitmentCreatedEvent".to_string(),
            parsed: json!({
                "commitment_id": Address::from_low_u64(0xc0).to_string(),
                "player": Address::from_low_u64(0x1234).to_string(),
                "nft_id": "42",
                "timestamp": "1700000000000",
            }),
            timestamp_ms: Some(1_700_000_000_000),
            cursor: None,
        }
    }

    fn quick_policy(attempts: u32) -> ConfirmationPolicy {
        ConfirmationPolicy {
            attempts,
            initial_delay: Duration::ZERO,
            delay_step: Duration::from_millis(1),
        }
    }

    fn ledger(hidden_polls: u32, events: Vec<LedgerEvent>) -> Arc<LaggingLedger> {
        Arc::new(LaggingLedger {
            hidden_polls,
            polls: AtomicU32::new(0),
            events,
        })
    }

    #[test]
    fn test_default_schedule() {
        let policy = ConfirmationPolicy::default();
        let delays: Vec<_> = (0..policy.attempts).map(|n| policy.delay(n).as_millis()).collect();
        assert_eq!(delays, vec![1_000, 1_500, 2_000, 2_500, 3_000]);
    }

    #[test]
    fn test_parse_commitment_created() {
        let created = CommitmentCreated::find(Flow::Battle, &[commitment_event()]).unwrap();
        assert_eq!(created.commitment, Address::from_low_u64(0xc0));
        assert_eq!(created.subject, 42);
        assert_eq!(created.timestamp, 1_700_000_000_000);
        assert_eq!(CommitmentCreated::find(Flow::Capture, &[commitment_event()]), None);
    }

    #[test]
    fn test_parse_outcomes() {
        let battle = LedgerEvent {
            event_type: "0xaa::suu::BattleEvent".to_string(),
            parsed: json!({
                "nft_id": "42",
                "player": Address::from_low_u64(0x1234).to_string(),
                "is_golden_monster": false,
                "enemy_level": 3,
                "enemy_element": 1,
                "player_level": 3,
                "player_element": 4,
                "is_win": true,
                "experience_gained": "30",
                "level_increased": false,
                "reward_amount": "0",
                "timestamp": "1700000060000",
            }),
            timestamp_ms: None,
            cursor: None,
        };
        let Some(Outcome::Battle(outcome)) = Outcome::find(Flow::Battle, &[battle]) else {
            panic!("expected battle outcome");
        };
        assert!(outcome.is_win);
        assert_eq!(outcome.experience_gained, 30);
        assert_eq!(outcome.encounter_level, 3);

        let capture = LedgerEvent {
            event_type: "0xaa::suu::CaptureAttemptEvent".to_string(),
            parsed: json!({ "is_success": true, "capture_probability": "35" }),
            timestamp_ms: None,
            cursor: None,
        };
        assert_eq!(
            Outcome::find(Flow::Capture, &[capture]),
            Some(Outcome::Capture(CaptureOutcome {
                is_success: true,
                capture_probability: 35
            }))
        );
    }

    #[test]
    fn test_parse_market_events() {
        let listed = LedgerEvent {
            event_type: "0xaa::suu::ListingCreatedEvent".to_string(),
            parsed: json!({
                "nft_id": "8",
                "seller": Address::from_low_u64(5).to_string(),
                "price": "2500000000",
                "timestamp": "1",
            }),
            timestamp_ms: None,
            cursor: None,
        };
        assert_eq!(
            MarketEvent::parse(&listed).unwrap(),
            Some(MarketEvent::Listed {
                subject: 8,
                seller: Address::from_low_u64(5),
                price: 2_500_000_000,
                timestamp: 1
            })
        );
        assert_eq!(MarketEvent::parse(&commitment_event()).unwrap(), None);
    }

    #[test]
    fn test_malformed_field() {
        let parsed = json!({ "level": 300, "flag": "yes" });
        assert!(json_u8(&parsed, "level").is_err());
        assert!(json_bool(&parsed, "flag").is_err());
        assert!(json_u64(&parsed, "missing").is_err());
    }

    #[tokio::test]
    async fn test_confirms_after_indexing_lag() {
        let ledger = ledger(2, vec![commitment_event()]);
        let fetcher = EventRetryFetcher::new(ledger.clone(), quick_policy(5));
        let confirmation = fetcher
            .fetch("D1", |events| CommitmentCreated::find(Flow::Battle, events))
            .await;
        assert_eq!(confirmation.confirmed().unwrap().subject, 42);
        assert_eq!(ledger.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_unknown_after_exhausting_retries() {
        let ledger = ledger(10, vec![commitment_event()]);
        let fetcher = EventRetryFetcher::new(ledger.clone(), quick_policy(3));
        let confirmation = fetcher
            .fetch("D1", |events| CommitmentCreated::find(Flow::Battle, events))
            .await;
        assert_eq!(confirmation, Confirmation::Unknown);
        assert_eq!(ledger.polls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_absent_when_visible_without_event() {
        let ledger = ledger(0, vec![]);
        let fetcher = EventRetryFetcher::new(ledger.clone(), quick_policy(5));
        let confirmation = fetcher
            .fetch("D1", |events| CommitmentCreated::find(Flow::Battle, events))
            .await;
        assert_eq!(confirmation, Confirmation::Absent);
        assert_eq!(ledger.polls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_spawned_lookup() {
        let ledger = ledger(1, vec![commitment_event()]);
        let pending = EventRetryFetcher::new(ledger, quick_policy(5))
            .spawn("D1".to_string(), |events: &[LedgerEvent]| {
                CommitmentCreated::find(Flow::Battle, events)
            });
        let confirmation = pending.wait().await;
        assert_eq!(
            confirmation.map(|created| created.commitment),
            Confirmation::Confirmed(Address::from_low_u64(0xc0))
        );
    }

    #[tokio::test]
    async fn test_dropping_pending_cancels() {
        let ledger = ledger(u32::MAX, vec![]);
        let pending = EventRetryFetcher::new(
            ledger.clone(),
            ConfirmationPolicy {
                attempts: 100,
                initial_delay: Duration::from_millis(10),
                delay_step: Duration::ZERO,
            },
        )
        .spawn("D1".to_string(), |_: &[LedgerEvent]| Some(()));
        tokio::time::sleep(Duration::from_millis(35)).await;
        pending.cancel();
        let polls = ledger.polls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(ledger.polls.load(Ordering::SeqCst), polls);
    }
}
