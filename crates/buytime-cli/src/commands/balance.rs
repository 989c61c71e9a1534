use std::sync::Arc;

use buytime_core::api::ApiClient;
use buytime_core::sync::{BalanceReconciler, SyncOutcome};
use buytime_core::{Config, Database, Ledger};
use clap::Subcommand;
use tokio::runtime::Runtime;

use super::{api_client, open_local, open_shared_seeded, print_json, runtime, CliResult};

#[derive(Subcommand)]
pub enum BalanceAction {
    /// Show the local ledger
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Credit minutes from a completed focus session, then sync
    Earn {
        /// Minutes earned
        minutes: u32,
    },
    /// Fetch the remote balance and push any pending delta
    Refresh,
    /// Sync if other processes changed the balance since the last sync
    Foreground,
    /// Seed the ledger from the remote (first launch only)
    Appear,
    /// Overwrite the local balance; the next sync re-seeds from the remote
    Reset {
        /// New balance in minutes
        #[arg(default_value_t = 0)]
        minutes: u32,
    },
}

pub fn run(action: BalanceAction) -> CliResult {
    let config = Config::load()?;
    let ledger = Ledger::new(open_shared_seeded(&config)?, open_local()?);

    match action {
        BalanceAction::Show { json } => {
            let snapshot = ledger.get()?;
            if json {
                print_json(&snapshot)?;
            } else {
                println!("Available:  {} min", snapshot.available_minutes);
                match snapshot.last_confirmed_remote_value.confirmed() {
                    Some(confirmed) => println!("Confirmed:  {confirmed} min"),
                    None => println!("Confirmed:  never synced"),
                }
                if let Some(delta) = snapshot.pending_delta() {
                    println!("Pending:    {delta:+} min");
                }
                println!("Spend unit: {} min", snapshot.spend_unit_minutes);
                println!(
                    "Window:     {}",
                    if snapshot.earned_event_active { "open" } else { "closed" }
                );
            }
        }
        BalanceAction::Reset { minutes } => {
            let stored = ledger.reset_balance(minutes)?;
            println!("balance reset to {stored} min");
        }
        BalanceAction::Earn { minutes } => {
            let (reconciler, rt) = connect(ledger, &config)?;
            let outcome = rt.block_on(async {
                let receipt = reconciler.earn(minutes)?;
                println!("available: {} min", receipt.available_minutes);
                Ok::<_, Box<dyn std::error::Error>>(receipt.sync.await??)
            })?;
            report(&outcome);
        }
        BalanceAction::Refresh => {
            let (reconciler, rt) = connect(ledger, &config)?;
            report(&rt.block_on(reconciler.refresh())?);
        }
        BalanceAction::Foreground => {
            let (reconciler, rt) = connect(ledger, &config)?;
            report(&rt.block_on(reconciler.on_foreground())?);
        }
        BalanceAction::Appear => {
            let (reconciler, rt) = connect(ledger, &config)?;
            report(&rt.block_on(reconciler.on_appear())?);
        }
    }
    Ok(())
}

type Reconciler = BalanceReconciler<Arc<Database>, Arc<Database>, ApiClient>;

fn connect(
    ledger: Ledger<Arc<Database>, Arc<Database>>,
    config: &Config,
) -> Result<(Reconciler, Runtime), Box<dyn std::error::Error>> {
    Ok((BalanceReconciler::new(ledger, api_client(config)?), runtime()?))
}

fn report(outcome: &SyncOutcome) {
    match outcome {
        SyncOutcome::Seeded { confirmed } => println!("seeded from remote: {confirmed} min"),
        SyncOutcome::Accepted { confirmed } => println!("in sync: {confirmed} min"),
        SyncOutcome::Pushed { delta, confirmed } => {
            println!("pushed {delta:+} min, remote now {confirmed} min")
        }
        SyncOutcome::Skipped { reason } => println!("skipped: {reason:?}"),
        SyncOutcome::Failed { kind } => {
            println!("sync failed ({kind:?}); pending changes kept for the next sync")
        }
    }
}
