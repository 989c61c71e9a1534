use std::sync::Arc;

use buytime_core::api::ApiClient;
use buytime_core::reward::{daily_totals, derive_focus, FocusMode};
use buytime_core::sync::{FetchOutcome, PreferenceReconciler, PushOutcome};
use buytime_core::{Config, Database, LocalCache};
use clap::Subcommand;

use super::{api_client, open_local, print_json, runtime, CliResult};

#[derive(Subcommand)]
pub enum PrefsAction {
    /// Show focus preferences and the reward they earn
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set focus duration and mode, then push to the remote
    Set {
        /// Focus duration in minutes (15-60)
        minutes: u32,
        /// Focus mode: hard, medium, easy, fun
        #[arg(long)]
        mode: Option<FocusMode>,
    },
    /// Pick a reward and let focus (and mode if needed) follow
    Reward {
        /// Reward minutes per session
        minutes: f64,
    },
    /// Preview the focus needed for a reward without saving
    Derive {
        /// Reward minutes per session
        reward: f64,
        /// Starting mode (default: current)
        #[arg(long)]
        mode: Option<FocusMode>,
    },
    /// Refetch from the remote if the cache is empty or stale
    Sync,
}

type Reconciler = PreferenceReconciler<Arc<Database>, ApiClient>;

pub fn run(action: PrefsAction) -> CliResult {
    let config = Config::load()?;
    let prefs: Reconciler = PreferenceReconciler::new(
        LocalCache::new(open_local()?),
        api_client(&config)?,
        &config.sync,
    )?;

    match action {
        PrefsAction::Show { json } => {
            let snapshot = prefs.snapshot()?;
            if json {
                return print_json(&snapshot);
            }
            let totals = daily_totals(
                snapshot.focus_duration_minutes as f64,
                snapshot.focus_mode,
            );
            println!("Focus:    {} min", snapshot.focus_duration_minutes);
            println!("Mode:     {}", snapshot.focus_mode.display_name());
            println!("Reward:   {:.1} min per session", snapshot.reward_minutes);
            println!(
                "Per day:  {}h {}m work, {}h {}m reward",
                totals.work.0, totals.work.1, totals.reward.0, totals.reward.1
            );
            match snapshot.last_fetched_at {
                Some(at) => println!("Fetched:  {}", at.format("%Y-%m-%d %H:%M UTC")),
                None => println!("Fetched:  never"),
            }
        }
        PrefsAction::Set { minutes, mode } => {
            let mode = match mode {
                Some(mode) => mode,
                None => prefs.snapshot()?.focus_mode,
            };
            let rt = runtime()?;
            let outcome = rt.block_on(async {
                prefs.on_preference_changed(minutes, mode)?;
                Ok::<_, Box<dyn std::error::Error>>(prefs.flush().await)
            })?;
            report_push(outcome, &prefs)?;
        }
        PrefsAction::Reward { minutes } => {
            let before = prefs.snapshot()?.focus_mode;
            let rt = runtime()?;
            let (derivation, outcome) = rt.block_on(async {
                let derivation = prefs.on_reward_changed(minutes)?;
                Ok::<_, Box<dyn std::error::Error>>((derivation, prefs.flush().await))
            })?;
            if derivation.mode_changed_from(before) {
                println!("mode switched to {}", derivation.mode.display_name());
            }
            report_push(outcome, &prefs)?;
        }
        PrefsAction::Derive { reward, mode } => {
            let mode = match mode {
                Some(mode) => mode,
                None => prefs.snapshot()?.focus_mode,
            };
            let d = derive_focus(reward, mode);
            println!(
                "{} min focus in {} mode",
                d.focus_whole_minutes(),
                d.mode.display_name()
            );
        }
        PrefsAction::Sync => {
            let rt = runtime()?;
            match rt.block_on(prefs.on_appear())? {
                FetchOutcome::Updated => println!("updated from remote"),
                FetchOutcome::Unchanged => println!("already up to date"),
                FetchOutcome::Skipped { reason } => println!("skipped: {reason:?}"),
                FetchOutcome::Failed { kind } => println!("fetch failed ({kind:?}); using cache"),
            }
        }
    }
    Ok(())
}

fn report_push(outcome: Option<PushOutcome>, prefs: &Reconciler) -> CliResult {
    let snapshot = prefs.snapshot()?;
    match outcome {
        Some(PushOutcome::Confirmed) => println!(
            "saved: {} min {}",
            snapshot.focus_duration_minutes, snapshot.focus_mode
        ),
        Some(PushOutcome::RolledBack { .. }) => {
            let message = snapshot.error_message.unwrap_or_default();
            return Err(format!(
                "{message} (kept {} min {})",
                snapshot.focus_duration_minutes, snapshot.focus_mode
            )
            .into());
        }
        None => println!("no change pushed"),
    }
    Ok(())
}
