//! Client for the suu asset game.
//!
//! Transactions are described by [tx::TxBuilder] and handed to a [ledger::Signer]; reads go
//! through [ledger::Ledger], implemented over JSON-RPC by [Client]. The commit-reveal lifecycle
//! of one asset is owned by a [protocol::Session], which [reconcile] rebuilds from the event log
//! after a restart.

pub mod client;
pub mod config;
pub mod events;
pub mod ledger;
pub mod protocol;
pub mod queries;
pub mod reconcile;
pub mod store;
pub mod tx;

#[cfg(any(test, feature = "mocks"))]
pub mod mocks;

pub use client::{Client, RetryPolicy};
pub use events::{Confirmation, ConfirmationPolicy, EventRetryFetcher};
pub use ledger::{Clock, Ledger, Signer, SystemClock};
pub use protocol::{Context, Phase, Round, Session};
pub use reconcile::{reconcile, RestoredState};
pub use store::{MemoryStore, SecretStore, SqliteStore};
pub use tx::{Deployment, Transaction, TxBuilder};

use suu_types::{Address, DecodeError, Flow};
use thiserror::Error;

/// Error type for client operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("reqwest error: {0}")]
    Reqwest(#[from] reqwest::Error),
    #[error("failed: {status}: {body}")]
    FailedWithBody {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("invalid URL scheme: {0} (expected http or https)")]
    InvalidScheme(String),
    #[error("rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unexpected response")]
    UnexpectedResponse,
    #[error("query failed: {0}")]
    Query(String),
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),
    #[error("submission rejected: {0}")]
    Submission(String),
    #[error(
        "{flow} commitment {commitment} for asset {subject} is unrevealed on the ledger but no local secret exists"
    )]
    ReconciliationGap {
        subject: u64,
        flow: Flow,
        commitment: Address,
    },
    #[error("asset {subject} has an active commitment that was not found in recent events")]
    UnlocatedCommitment { subject: u64 },
    #[error("event for transaction {digest} not observed after {attempts} attempts")]
    ConfirmationTimeout { digest: String, attempts: u32 },
    #[error("asset {subject} already has an active commitment")]
    CommitmentOutstanding { subject: u64 },
    #[error("asset {subject} has no commitment in progress")]
    NoCommitment { subject: u64 },
    #[error("reveal window opens in {remaining_ms} ms")]
    RevealTooEarly { remaining_ms: u64 },
    #[error("asset {0} has no encounter")]
    MissingEncounter(u64),
    #[error("golden encounter of asset {0} cannot be captured")]
    GoldenCapture(u64),
    #[error("no local {flow} secret for asset {subject}")]
    MissingSecret { subject: u64, flow: Flow },
    #[error("amount must be greater than zero")]
    InvalidAmount,
    #[error("invalid {field}: {value}")]
    InvalidParameter { field: &'static str, value: u64 },
    #[error("secret store error: {0}")]
    Store(String),
}

/// Result type for client operations.
pub type Result<T> = std::result::Result<T, Error>;
