use std::sync::Arc;

use buytime_core::restriction::{
    RestrictionMachine, RestrictionSelection, RestrictionState, StorePlatform, Transition,
};
use buytime_core::{Config, Database};
use clap::{Args, Subcommand};

use super::{open_shared_seeded, print_json, CliResult};

#[derive(Args)]
pub struct SelectionArgs {
    /// Application bundle id
    #[arg(long = "app")]
    applications: Vec<String>,
    /// Category name
    #[arg(long = "category")]
    categories: Vec<String>,
    /// Web domain
    #[arg(long = "domain")]
    web_domains: Vec<String>,
}

impl From<SelectionArgs> for RestrictionSelection {
    fn from(args: SelectionArgs) -> Self {
        RestrictionSelection {
            applications: args.applications.into_iter().collect(),
            categories: args.categories.into_iter().collect(),
            web_domains: args.web_domains.into_iter().collect(),
        }
    }
}

#[derive(Subcommand)]
pub enum ShieldAction {
    /// First-run setup: choose what gets blocked and start the daily blocker
    Setup(SelectionArgs),
    /// Replace the selection from settings
    Update(SelectionArgs),
    /// Spend one unit to lift shields for N minutes of usage
    Spend {
        /// Usage minutes before shields return
        #[arg(long, default_value_t = 15)]
        minutes: u32,
    },
    /// Deliver a usage-threshold callback
    Threshold {
        /// Activity id of the schedule
        activity_id: String,
    },
    /// Deliver an interval-end callback
    IntervalEnd {
        /// Activity id of the schedule
        activity_id: String,
    },
    /// Retry a deferred shield re-application
    Retry,
    /// Show restriction state
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or set the minutes debited per spend
    SpendUnit {
        /// New spend unit in minutes
        minutes: Option<u32>,
    },
}

type Machine = RestrictionMachine<Arc<Database>, StorePlatform<Arc<Database>>>;

pub fn run(action: ShieldAction) -> CliResult {
    let config = Config::load()?;
    let store = open_shared_seeded(&config)?;
    let machine: Machine = RestrictionMachine::new(
        Arc::clone(&store),
        StorePlatform::new(store),
        &config.restriction,
    );

    match action {
        ShieldAction::Setup(args) => {
            let selection = RestrictionSelection::from(args);
            let state = machine.setup(&selection)?;
            println!("{} target(s) selected; {}", selection.len(), describe(&state));
        }
        ShieldAction::Update(args) => {
            let selection = RestrictionSelection::from(args);
            let state = machine.update_selection(&selection)?;
            println!("{} target(s) selected; {}", selection.len(), describe(&state));
        }
        ShieldAction::Spend { minutes } => {
            let receipt = machine.spend(minutes)?;
            println!(
                "spent {} min; {} min left; unlocked until {} or {} min of use",
                receipt.debited_minutes,
                receipt.available_minutes,
                receipt.schedule.interval_end.format("%H:%M"),
                minutes
            );
        }
        ShieldAction::Threshold { activity_id } => {
            report(machine.threshold_reached(&activity_id)?);
        }
        ShieldAction::IntervalEnd { activity_id } => {
            report(machine.interval_ended(&activity_id)?);
        }
        ShieldAction::Retry => report(machine.retry_reapply()?),
        ShieldAction::Status { json } => {
            let state = machine.state()?;
            if json {
                return print_json(&state);
            }
            println!("State:      {}", describe(&state));
            println!("Policy:     {:?}", machine.policy());
            println!("Selection:  {} target(s)", machine.ledger().selection()?.len());
            println!("Available:  {} min", machine.ledger().available_minutes()?);
            if machine.ledger().reapply_pending()? {
                println!("Re-apply:   pending");
            }
        }
        ShieldAction::SpendUnit { minutes } => {
            let unit = match minutes {
                Some(minutes) => machine.ledger().set_spend_unit_minutes(minutes)?,
                None => machine.ledger().spend_unit_minutes()?,
            };
            println!("{unit}");
        }
    }
    Ok(())
}

fn describe(state: &RestrictionState) -> String {
    match state {
        RestrictionState::Unrestricted => "unrestricted".into(),
        RestrictionState::Restricted => "restricted".into(),
        RestrictionState::Monitoring { schedule } => format!(
            "unlocked ({}, ends {})",
            schedule.activity_id,
            schedule.interval_end.format("%H:%M")
        ),
    }
}

fn report(transition: Transition) {
    match transition {
        Transition::Relocked => println!("shields re-applied"),
        Transition::ReapplyDeferred => println!("re-apply failed; retry pending"),
        Transition::Ignored => println!("no matching window; ignored"),
    }
}
