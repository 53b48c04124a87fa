//! Boundaries the client consumes: ledger reads, transaction submission and time.

use crate::{tx::Transaction, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    future::Future,
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};
use suu_types::Address;

/// Position in an event stream, as returned by the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventCursor {
    pub tx_digest: String,
    pub event_seq: String,
}

/// One emitted event with its fields still in ledger JSON form.
#[derive(Clone, Debug, PartialEq)]
pub struct LedgerEvent {
    pub event_type: String,
    pub parsed: Value,
    pub timestamp_ms: Option<u64>,
    pub cursor: Option<EventCursor>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventPage {
    pub data: Vec<LedgerEvent>,
    pub next_cursor: Option<EventCursor>,
    pub has_next_page: bool,
}

/// Read access to ledger state.
pub trait Ledger: Send + Sync {
    /// Executes a read-only call and returns the raw encoded return values of its final command.
    fn query(&self, call: &Transaction) -> impl Future<Output = Result<Vec<Vec<u8>>>> + Send;

    /// Pages through events of `event_type`.
    fn query_events(
        &self,
        event_type: &str,
        cursor: Option<EventCursor>,
        limit: usize,
        descending: bool,
    ) -> impl Future<Output = Result<EventPage>> + Send;

    /// Events emitted by a transaction, or `None` while the transaction is not yet visible.
    fn transaction_events(
        &self,
        digest: &str,
    ) -> impl Future<Output = Result<Option<Vec<LedgerEvent>>>> + Send;

    /// Content fields of an object, or `None` if it does not exist.
    fn object_fields(&self, id: &Address) -> impl Future<Output = Result<Option<Value>>> + Send;
}

/// Receipt of an executed transaction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Submitted {
    pub digest: String,
}

/// Signs and executes transactions for one account.
///
/// `submit` resolves successfully only once the transaction executed without aborting.
/// Success says nothing about when its events become queryable.
pub trait Signer: Send + Sync {
    fn address(&self) -> Address;

    fn submit(&self, transaction: Transaction) -> impl Future<Output = Result<Submitted>> + Send;
}

pub trait Clock: Send + Sync {
    /// Milliseconds since the unix epoch.
    fn now_ms(&self) -> u64;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

impl<T: Ledger + ?Sized> Ledger for Arc<T> {
    fn query(&self, call: &Transaction) -> impl Future<Output = Result<Vec<Vec<u8>>>> + Send {
        (**self).query(call)
    }

    fn query_events(
        &self,
        event_type: &str,
        cursor: Option<EventCursor>,
        limit: usize,
        descending: bool,
    ) -> impl Future<Output = Result<EventPage>> + Send {
        (**self).query_events(event_type, cursor, limit, descending)
    }

    fn transaction_events(
        &self,
        digest: &str,
    ) -> impl Future<Output = Result<Option<Vec<LedgerEvent>>>> + Send {
        (**self).transaction_events(digest)
    }

    fn object_fields(&self, id: &Address) -> impl Future<Output = Result<Option<Value>>> + Send {
        (**self).object_fields(id)
    }
}

impl<T: Ledger + ?Sized> Ledger for &T {
    fn query(&self, call: &Transaction) -> impl Future<Output = Result<Vec<Vec<u8>>>> + Send {
        (**self).query(call)
    }

    fn query_events(
        &self,
        event_type: &str,
        cursor: Option<EventCursor>,
        limit: usize,
        descending: bool,
    ) -> impl Future<Output = Result<EventPage>> + Send {
        (**self).query_events(event_type, cursor, limit, descending)
    }

    fn transaction_events(
        &self,
        digest: &str,
    ) -> impl Future<Output = Result<Option<Vec<LedgerEvent>>>> + Send {
        (**self).transaction_events(digest)
    }

    fn object_fields(&self, id: &Address) -> impl Future<Output = Result<Option<Value>>> + Send {
        (**self).object_fields(id)
    }
}

impl<T: Signer + ?Sized> Signer for Arc<T> {
    fn address(&self) -> Address {
        (**self).address()
    }

    fn submit(&self, transaction: Transaction) -> impl Future<Output = Result<Submitted>> + Send {
        (**self).submit(transaction)
    }
}

impl<T: Clock + ?Sized> Clock for Arc<T> {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}
