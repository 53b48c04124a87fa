//! Operator tool for the suu contract: read-only state dumps, commitment hashing, and
//! commit-reveal reconciliation against the local secret store.
//!
//! Usage:
//!   cargo run --release --bin suu-cli -- --config suu.yaml asset 42
//!   cargo run --release --bin suu-cli -- market --limit 20 --page 0
//!   cargo run --release --bin suu-cli -- activity --limit 50
//!   cargo run --release --bin suu-cli -- reconcile 0x1234... 42

use anyhow::{anyhow, Context as _, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::{path::PathBuf, sync::Arc};
use suu_client::{
    config::{Config, Network, ValidatedConfig},
    protocol::Context,
    queries::Queries,
    reconcile, Client, MemoryStore, SecretStore, SqliteStore, SystemClock, TxBuilder,
};
use suu_types::{commitment_hash, commitment_preimage, Address, Flow};
use tracing::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect and reconcile suu game state")]
struct Args {
    /// YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Overrides the configured network.
    #[arg(long)]
    network: Option<String>,

    /// Overrides the configured RPC endpoint.
    #[arg(long)]
    rpc_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode an asset record.
    Asset { id: u64 },
    /// Show a market listing.
    Listing { id: u64 },
    /// List the asset ids held by an address and its active asset.
    Owned { owner: String },
    /// Page through the market, newest listings first.
    Market {
        #[arg(long, default_value = "20")]
        limit: u64,
        #[arg(long, default_value = "0")]
        page: u64,
    },
    /// Locked and withdrawable contract balances.
    Balances,
    /// Latest mints and listing changes, newest first.
    Activity {
        #[arg(long, default_value = "20")]
        limit: usize,
    },
    /// Compute a commitment hash offline.
    Hash {
        subject: u64,
        level: u8,
        element: u8,
        secret: String,
    },
    /// Reveal delay of a flow at a subject level.
    Delay {
        #[arg(value_parser = parse_flow)]
        flow: Flow,
        level: u8,
    },
    /// Restore the open commitment of an asset from the ledger and the secret store.
    Reconcile { player: String, subject: u64 },
}

fn parse_flow(value: &str) -> Result<Flow, String> {
    Flow::ALL
        .into_iter()
        .find(|flow| flow.as_str() == value)
        .ok_or_else(|| format!("expected battle or capture, got {value}"))
}

fn parse_address(value: &str) -> Result<Address> {
    value
        .parse()
        .map_err(|err| anyhow!("invalid address {value}: {err}"))
}

#[derive(Serialize)]
struct Owned {
    owner: String,
    assets: Vec<u64>,
    active: Option<u64>,
}

#[derive(Serialize)]
struct HashOutput {
    preimage: String,
    hash: String,
}

#[derive(Serialize)]
struct DelayOutput {
    flow: Flow,
    level: u8,
    delay_ms: u64,
}

#[derive(Serialize)]
struct RoundOutput {
    flow: Flow,
    subject: u64,
    commitment: String,
    encounter_level: u8,
    encounter_element: u8,
    frozen_level: u8,
    committed_at: u64,
    deadline: u64,
}

fn print(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_config(args: &Args) -> Result<ValidatedConfig> {
    let mut config = match &args.config {
        Some(path) => {
            Config::load(path).with_context(|| format!("loading {}", path.display()))?
        }
        None => Config::from_yaml("{}").context("building default config")?,
    };
    if let Some(network) = &args.network {
        config.network = serde_yaml::from_str::<Network>(network)
            .with_context(|| format!("unknown network {network}"))?;
    }
    if let Some(rpc_url) = &args.rpc_url {
        config.rpc_url = Some(rpc_url.clone());
    }
    config.validate().context("invalid configuration")
}

fn open_store(config: &ValidatedConfig) -> Result<Arc<dyn SecretStore>> {
    Ok(match &config.secret_store {
        Some(path) => Arc::new(
            SqliteStore::open(path)
                .with_context(|| format!("opening secret store {}", path.display()))?,
        ),
        None => Arc::new(MemoryStore::new()),
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    // offline commands
    match &args.command {
        Command::Hash {
            subject,
            level,
            element,
            secret,
        } => {
            let preimage = commitment_preimage(*subject, *level, *element, secret);
            let hash = commitment_hash(*subject, *level, *element, secret);
            return print(&HashOutput {
                preimage: commonware_utils::hex(&preimage),
                hash: hash.to_string(),
            });
        }
        Command::Delay { flow, level } => {
            return print(&DelayOutput {
                flow: *flow,
                level: *level,
                delay_ms: config.delays.delay(*flow, *level),
            });
        }
        _ => {}
    }

    let client = config.client().context("building RPC client")?;
    let deployment = config
        .deployment(&client)
        .await
        .context("resolving deployment")?;
    info!(network = %config.network, package = %deployment.package, "connected");
    let builder = TxBuilder::new(deployment);
    let queries = Queries::new(&client, builder.clone());

    match args.command {
        Command::Asset { id } => print(&queries.asset(id).await?),
        Command::Listing { id } => print(&queries.listing(id).await?),
        Command::Owned { owner } => {
            let address = parse_address(&owner)?;
            let assets = queries.owner_asset_ids(address).await?;
            let active = queries.active_asset(address).await?;
            print(&Owned {
                owner: address.to_string(),
                assets,
                active,
            })
        }
        Command::Market { limit, page } => {
            let total = queries.market_listed_count().await?;
            let ids = queries.market_listed_ids_paged(limit, page).await?;
            info!(total, page, returned = ids.len(), "market page");
            print(&ids)
        }
        Command::Balances => print(&queries.contract_balances().await?),
        Command::Activity { limit } => print(&queries.market_activity(limit).await?),
        Command::Reconcile { player, subject } => {
            let player = parse_address(&player)?;
            let store = open_store(&config)?;
            let context = Context::new(&client, (), store, SystemClock, builder)
                .with_delays(config.delays)
                .with_confirmation(config.confirmation)
                .with_event_paging(config.event_page_limit, config.max_event_pages);
            match reconcile(&context, player, subject).await? {
                Some(restored) => {
                    let round = restored.round;
                    print(&RoundOutput {
                        flow: round.flow,
                        subject: round.subject,
                        commitment: round.commitment.to_string(),
                        encounter_level: round.encounter_level,
                        encounter_element: round.encounter_element,
                        frozen_level: round.frozen_level,
                        committed_at: round.committed_at,
                        deadline: round.deadline,
                    })
                }
                None => {
                    println!("no open commitment for asset {subject}");
                    Ok(())
                }
            }
        }
        Command::Hash { .. } | Command::Delay { .. } => Ok(()),
    }
}
