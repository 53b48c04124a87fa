//! Commit-reveal lifecycle of one asset.
//!
//! A [Session] tracks a single subject through
//! `Idle -> AwaitingConfirmation -> Committed -> Revealed | Cancelled -> Idle`. The ledger is the
//! authority: a commit is only started when the asset record reports no active commitment, and
//! the secret is persisted only once the commitment event has been observed. Everything a
//! session needs that is not specific to its subject lives in a shared [Context], so any number
//! of sessions (one per subject) can run side by side.

use crate::{
    events::{commitment_created_event, CommitmentCreated, Confirmation, ConfirmationPolicy, EventRetryFetcher, Outcome},
    ledger::{Clock, Ledger, Signer, Submitted},
    queries::Queries,
    reconcile::reconcile,
    store::{secret_key, SecretStore},
    tx::TxBuilder,
    Error, Result,
};
use rand::{distributions::Alphanumeric, Rng};
use std::{fmt, sync::Arc};
use suu_types::{
    commitment_hash,
    constants::{BATTLE_REVEAL_DELAY_BASE_MS, CAPTURE_REVEAL_DELAY_BASE_MS},
    exponential_delay, Address, Flow,
};
use tracing::{debug, info, warn};

/// Length of generated secrets.
pub const SECRET_LENGTH: usize = 32;

/// Bases of the per-flow reveal delay, `base * 2^(level - 1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RevealDelays {
    pub battle_base_ms: u64,
    pub capture_base_ms: u64,
}

impl Default for RevealDelays {
    fn default() -> Self {
        Self {
            battle_base_ms: BATTLE_REVEAL_DELAY_BASE_MS,
            capture_base_ms: CAPTURE_REVEAL_DELAY_BASE_MS,
        }
    }
}

impl RevealDelays {
    pub fn delay(&self, flow: Flow, level: u8) -> u64 {
        let base = match flow {
            Flow::Battle => self.battle_base_ms,
            Flow::Capture => self.capture_base_ms,
        };
        exponential_delay(base, level)
    }
}

/// Dependencies shared by every session of one account.
pub struct Context<L, S, K, C> {
    pub ledger: L,
    pub signer: S,
    pub store: K,
    pub clock: C,
    pub builder: TxBuilder,
    pub delays: RevealDelays,
    pub confirmation: ConfirmationPolicy,
    /// Events requested per page while reconciling.
    pub event_page_limit: usize,
    /// Pages scanned per flow before reconciliation gives up.
    pub max_event_pages: usize,
}

impl<L, S, K, C> Context<L, S, K, C> {
    pub fn new(ledger: L, signer: S, store: K, clock: C, builder: TxBuilder) -> Self {
        Self {
            ledger,
            signer,
            store,
            clock,
            builder,
            delays: RevealDelays::default(),
            confirmation: ConfirmationPolicy::default(),
            event_page_limit: 100,
            max_event_pages: 5,
        }
    }

    pub fn with_delays(mut self, delays: RevealDelays) -> Self {
        self.delays = delays;
        self
    }

    pub fn with_confirmation(mut self, confirmation: ConfirmationPolicy) -> Self {
        self.confirmation = confirmation;
        self
    }

    pub fn with_event_paging(mut self, page_limit: usize, max_pages: usize) -> Self {
        self.event_page_limit = page_limit.max(1);
        self.max_event_pages = max_pages;
        self
    }
}

impl<L: Ledger, S, K, C> Context<L, S, K, C> {
    pub fn queries(&self) -> Queries<&L> {
        Queries::new(&self.ledger, self.builder.clone())
    }

    pub fn fetcher(&self) -> EventRetryFetcher<&L> {
        EventRetryFetcher::new(&self.ledger, self.confirmation)
    }
}

/// Commit secret. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn generate() -> Self {
        let secret = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SECRET_LENGTH)
            .map(char::from)
            .collect();
        Self(secret)
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(<redacted>)")
    }
}

/// A commitment accepted by the ledger and not yet revealed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Round {
    pub flow: Flow,
    pub subject: u64,
    pub commitment: Address,
    pub encounter_level: u8,
    pub encounter_element: u8,
    /// Subject level when the commitment was made. The reveal delay is derived from it.
    pub frozen_level: u8,
    pub committed_at: u64,
    pub deadline: u64,
}

/// A submitted commit whose event has not been observed yet. Holds the only copy of the secret.
#[derive(Clone, Debug)]
pub struct PendingCommit {
    pub flow: Flow,
    pub digest: String,
    pub encounter_level: u8,
    pub encounter_element: u8,
    pub frozen_level: u8,
    secret: Secret,
}

#[derive(Clone, Debug)]
pub enum Phase {
    Idle,
    AwaitingConfirmation(PendingCommit),
    Committed(Round),
    /// Unrevealed on the ledger without a usable local secret. Blocks new commits.
    Orphaned { flow: Flow, commitment: Address },
    /// The asset reports an active commitment that reconciliation could not find. Blocks new
    /// commits until a later reconciliation locates or clears it.
    Unlocated,
    Revealed { flow: Flow, digest: String },
    Cancelled { flow: Flow, digest: String },
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::AwaitingConfirmation(_) => "awaiting_confirmation",
            Phase::Committed(_) => "committed",
            Phase::Orphaned { .. } => "orphaned",
            Phase::Unlocated => "unlocated",
            Phase::Revealed { .. } => "revealed",
            Phase::Cancelled { .. } => "cancelled",
        }
    }
}

/// Commit-reveal state of one subject.
pub struct Session<L, S, K, C> {
    context: Arc<Context<L, S, K, C>>,
    subject: u64,
    phase: Phase,
}

impl<L, S, K, C> Session<L, S, K, C>
where
    L: Ledger,
    S: Signer,
    K: SecretStore,
    C: Clock,
{
    /// Starts in [Phase::Idle]. Call [Self::reconcile] to pick up a commitment made earlier.
    pub fn new(context: Arc<Context<L, S, K, C>>, subject: u64) -> Self {
        Self {
            context,
            subject,
            phase: Phase::Idle,
        }
    }

    pub fn subject(&self) -> u64 {
        self.subject
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn round(&self) -> Option<&Round> {
        match &self.phase {
            Phase::Committed(round) => Some(round),
            _ => None,
        }
    }

    fn unlocated(&self) -> Error {
        Error::UnlocatedCommitment {
            subject: self.subject,
        }
    }

    fn gap(&self, flow: Flow, commitment: Address) -> Error {
        Error::ReconciliationGap {
            subject: self.subject,
            flow,
            commitment,
        }
    }

    /// Rebuilds the phase from the ledger and the local store.
    ///
    /// A gap moves the session to [Phase::Orphaned] and an unlocated commitment to
    /// [Phase::Unlocated]; both are returned as errors. Any other error leaves the phase untouched.
    pub async fn reconcile(&mut self) -> Result<&Phase> {
        if let Phase::AwaitingConfirmation(pending) = &self.phase {
            debug!(subject = self.subject, digest = %pending.digest, "reconcile deferred to pending confirmation");
            return Err(Error::CommitmentOutstanding {
                subject: self.subject,
            });
        }
        let player = self.context.signer.address();
        match reconcile(&self.context, player, self.subject).await {
            Ok(Some(restored)) => {
                info!(
                    subject = self.subject,
                    flow = %restored.round.flow,
                    commitment = %restored.round.commitment,
                    deadline = restored.round.deadline,
                    "restored commitment"
                );
                self.phase = Phase::Committed(restored.round);
            }
            Ok(None) => {
                self.phase = Phase::Idle;
            }
            Err(Error::ReconciliationGap {
                subject,
                flow,
                commitment,
            }) => {
                self.phase = Phase::Orphaned { flow, commitment };
                return Err(Error::ReconciliationGap {
                    subject,
                    flow,
                    commitment,
                });
            }
            Err(Error::UnlocatedCommitment { subject }) => {
                self.phase = Phase::Unlocated;
                return Err(Error::UnlocatedCommitment { subject });
            }
            Err(err) => return Err(err),
        }
        Ok(&self.phase)
    }

    /// Commits against the subject's current encounter.
    ///
    /// Nothing is persisted unless the ledger accepted the commit and its event was observed. If
    /// the event does not show up in time the session stays in
    /// [Phase::AwaitingConfirmation] and [Error::ConfirmationTimeout] is returned; retry with
    /// [Self::confirm_pending].
    pub async fn commit(&mut self, flow: Flow) -> Result<Round> {
        match &self.phase {
            Phase::Idle | Phase::Revealed { .. } | Phase::Cancelled { .. } => {}
            Phase::AwaitingConfirmation(_) | Phase::Committed(_) => {
                return Err(Error::CommitmentOutstanding {
                    subject: self.subject,
                })
            }
            Phase::Orphaned { flow, commitment } => return Err(self.gap(*flow, *commitment)),
            Phase::Unlocated => return Err(self.unlocated()),
        }

        let asset = self.context.queries().asset(self.subject).await?;
        if asset.has_active_commitment {
            return Err(Error::CommitmentOutstanding {
                subject: self.subject,
            });
        }
        let encounter = asset
            .current_encounter
            .ok_or(Error::MissingEncounter(self.subject))?;
        if flow == Flow::Capture && encounter.is_golden {
            return Err(Error::GoldenCapture(self.subject));
        }

        let secret = Secret::generate();
        let hash = commitment_hash(
            self.subject,
            encounter.level,
            encounter.element,
            secret.expose(),
        );
        let transaction = self.context.builder.commit(flow, self.subject, &hash);
        let Submitted { digest } = self.context.signer.submit(transaction).await?;
        info!(subject = self.subject, %flow, %digest, "commit submitted");

        self.phase = Phase::AwaitingConfirmation(PendingCommit {
            flow,
            digest,
            encounter_level: encounter.level,
            encounter_element: encounter.element,
            frozen_level: asset.level,
            secret,
        });
        self.confirm_pending().await
    }

    /// Looks for the commitment event of a submitted commit and, once found, persists the
    /// secret and enters [Phase::Committed].
    pub async fn confirm_pending(&mut self) -> Result<Round> {
        let pending = match &self.phase {
            Phase::AwaitingConfirmation(pending) => pending.clone(),
            Phase::Committed(round) => return Ok(round.clone()),
            _ => {
                return Err(Error::NoCommitment {
                    subject: self.subject,
                })
            }
        };
        let flow = pending.flow;
        let confirmation = self
            .context
            .fetcher()
            .fetch(&pending.digest, |events| CommitmentCreated::find(flow, events))
            .await;
        match confirmation {
            Confirmation::Confirmed(created) => {
                self.context
                    .store
                    .set(&secret_key(flow, self.subject), pending.secret.expose())?;
                let deadline = created
                    .timestamp
                    .saturating_add(self.context.delays.delay(flow, pending.frozen_level));
                let round = Round {
                    flow,
                    subject: self.subject,
                    commitment: created.commitment,
                    encounter_level: pending.encounter_level,
                    encounter_element: pending.encounter_element,
                    frozen_level: pending.frozen_level,
                    committed_at: created.timestamp,
                    deadline,
                };
                info!(
                    subject = self.subject,
                    %flow,
                    commitment = %round.commitment,
                    deadline,
                    "committed"
                );
                self.phase = Phase::Committed(round.clone());
                Ok(round)
            }
            Confirmation::Absent => {
                warn!(subject = self.subject, %flow, digest = %pending.digest, "commit emitted no commitment event");
                self.phase = Phase::Idle;
                Err(Error::Submission(format!(
                    "transaction {} emitted no {}",
                    pending.digest,
                    commitment_created_event(flow)
                )))
            }
            Confirmation::Unknown => Err(Error::ConfirmationTimeout {
                digest: pending.digest,
                attempts: self.context.confirmation.attempts,
            }),
        }
    }

    fn require_round(&self) -> Result<Round> {
        match &self.phase {
            Phase::Committed(round) => Ok(round.clone()),
            Phase::Orphaned { flow, commitment } => Err(self.gap(*flow, *commitment)),
            Phase::Unlocated => Err(self.unlocated()),
            _ => Err(Error::NoCommitment {
                subject: self.subject,
            }),
        }
    }

    /// Milliseconds until the reveal window opens; zero once it is open.
    pub fn time_to_reveal(&self) -> Option<u64> {
        self.round()
            .map(|round| round.deadline.saturating_sub(self.context.clock.now_ms()))
    }

    /// Reveals the committed inputs and waits for the outcome event.
    ///
    /// Rejected before the deadline. Once the ledger accepts the reveal the local secret is
    /// dropped; the returned [Confirmation] only describes whether the outcome could be read back.
    pub async fn reveal(&mut self) -> Result<Confirmation<Outcome>> {
        let round = self.require_round()?;
        let now = self.context.clock.now_ms();
        if now < round.deadline {
            return Err(Error::RevealTooEarly {
                remaining_ms: round.deadline - now,
            });
        }
        let key = secret_key(round.flow, self.subject);
        let secret = self
            .context
            .store
            .get(&key)?
            .ok_or(Error::MissingSecret {
                subject: self.subject,
                flow: round.flow,
            })?;

        let transaction = self.context.builder.reveal(
            round.flow,
            round.commitment,
            self.subject,
            round.encounter_level,
            round.encounter_element,
            &secret,
        );
        let Submitted { digest } = self.context.signer.submit(transaction).await?;
        info!(subject = self.subject, flow = %round.flow, %digest, "revealed");
        self.phase = Phase::Revealed {
            flow: round.flow,
            digest: digest.clone(),
        };
        self.forget_secret(&key);

        let flow = round.flow;
        Ok(self
            .context
            .fetcher()
            .fetch(&digest, |events| Outcome::find(flow, events))
            .await)
    }

    /// Abandons the commitment. Allowed any time before reveal, including from
    /// [Phase::Orphaned].
    pub async fn cancel(&mut self) -> Result<Submitted> {
        let (flow, commitment) = match &self.phase {
            Phase::Committed(round) => (round.flow, round.commitment),
            Phase::Orphaned { flow, commitment } => (*flow, *commitment),
            Phase::Unlocated => return Err(self.unlocated()),
            _ => {
                return Err(Error::NoCommitment {
                    subject: self.subject,
                })
            }
        };
        let transaction = self.context.builder.cancel(flow, commitment, self.subject);
        let submitted = self.context.signer.submit(transaction).await?;
        info!(subject = self.subject, %flow, %commitment, digest = %submitted.digest, "cancelled");
        self.phase = Phase::Cancelled {
            flow,
            digest: submitted.digest.clone(),
        };
        self.forget_secret(&secret_key(flow, self.subject));
        Ok(submitted)
    }

    /// Drops a secret whose commitment has been settled on the ledger. A failure leaves a stale
    /// entry that the next commit of the same flow overwrites.
    fn forget_secret(&self, key: &str) {
        if let Err(err) = self.context.store.delete(key) {
            warn!(subject = self.subject, key, error = %err, "failed to delete settled secret");
        }
    }
}
