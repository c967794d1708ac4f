use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use client_core::{
    AllocationClient, FheStubCipher, MissingWallet, SignatureParams, StaticWallet, WalletSession,
};
use ledger::{HttpLedger, LedgerStore, MemoryLedger};
use shared::domain::{AllocationId, AllocationRecord, StatusFilter};
use tracing::info;

mod config;

use config::load_settings;

#[derive(Parser, Debug)]
#[command(about = "Allocation vote client")]
struct Cli {
    /// Overrides the ledger gateway URL from client.toml.
    #[arg(long)]
    ledger_url: Option<String>,
    /// Overrides the connected wallet address from client.toml.
    #[arg(long)]
    wallet: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Lists allocation votes, optionally filtered.
    List {
        #[arg(long, default_value = "")]
        search: String,
        /// pending, approved, rejected or all.
        #[arg(long, default_value = "all")]
        status: String,
    },
    /// Prints aggregate counts over the vote list.
    Stats,
    /// Lists the connected wallet's own votes.
    History,
    /// Submits a new encrypted allocation vote.
    Submit {
        amount: f64,
        #[arg(long)]
        saboteur: bool,
    },
    /// Marks a vote approved.
    Approve { id: String },
    /// Marks a vote rejected.
    Reject { id: String },
    /// Reveals the amount of a vote after a consent signature.
    Decrypt { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let cli = Cli::parse();
    let mut settings = load_settings();
    if cli.ledger_url.is_some() {
        settings.ledger_url = cli.ledger_url.clone();
    }
    if cli.wallet.is_some() {
        settings.wallet_address = cli.wallet.clone();
    }

    let store: Arc<dyn LedgerStore> = match &settings.ledger_url {
        Some(url) => Arc::new(HttpLedger::new(url)),
        None => {
            info!("cli: no ledger_url configured, using an in-memory ledger");
            Arc::new(MemoryLedger::new())
        }
    };
    let wallet: Arc<dyn WalletSession> = match &settings.wallet_address {
        Some(address) => Arc::new(StaticWallet::new(address.clone())),
        None => Arc::new(MissingWallet),
    };
    let client = AllocationClient::new_with_dependencies(
        store,
        wallet,
        Arc::new(FheStubCipher),
        settings.client_options(),
        SignatureParams::generate(settings.contract_address.clone(), settings.chain_id),
    );

    match cli.command {
        Command::List { search, status } => {
            client.refresh().await?;
            let list = client.filtered(&search, parse_filter(&status)).await;
            if list.is_empty() {
                println!("no allocation votes");
            }
            for record in &list {
                print_record(record);
            }
        }
        Command::Stats => {
            client.refresh().await?;
            let stats = client.stats().await;
            println!(
                "total={} approved={} pending={} rejected={} saboteurs={}",
                stats.total, stats.approved, stats.pending, stats.rejected, stats.saboteurs
            );
        }
        Command::History => {
            client.refresh().await?;
            let history = client.voter_history().await;
            if history.is_empty() {
                println!("no votes for the connected wallet");
            }
            for record in &history {
                print_record(record);
            }
        }
        Command::Submit { amount, saboteur } => {
            let record = client.submit_vote(amount, saboteur).await?;
            println!("submitted allocation_id={}", record.id);
        }
        Command::Approve { id } => {
            let record = client.approve(&AllocationId(id)).await?;
            println!("allocation_id={} status={}", record.id, record.status);
        }
        Command::Reject { id } => {
            let record = client.reject(&AllocationId(id)).await?;
            println!("allocation_id={} status={}", record.id, record.status);
        }
        Command::Decrypt { id } => {
            client.refresh().await?;
            let target = AllocationId(id);
            let snapshot = client.snapshot().await;
            let Some(record) = snapshot.allocations.iter().find(|r| r.id == target) else {
                anyhow::bail!("allocation {target} not found");
            };
            match client.decrypt_with_signature(&record.encrypted_amount).await? {
                Some(amount) => println!("allocation_id={target} amount={amount}"),
                None => println!("reveal declined by wallet"),
            }
        }
    }

    Ok(())
}

fn parse_filter(raw: &str) -> StatusFilter {
    if raw.eq_ignore_ascii_case("pending") {
        StatusFilter::Pending
    } else if raw.eq_ignore_ascii_case("approved") {
        StatusFilter::Approved
    } else if raw.eq_ignore_ascii_case("rejected") {
        StatusFilter::Rejected
    } else {
        StatusFilter::All
    }
}

fn print_record(record: &AllocationRecord) {
    println!(
        "allocation_id={} voter={} status={} timestamp={} saboteur={}",
        record.id, record.voter, record.status, record.timestamp, record.is_saboteur
    );
}
