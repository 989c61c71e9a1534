use buytime_core::api::{poll_until_provisioned, token, AccountService, RetryPolicy};
use buytime_core::Config;
use clap::Subcommand;

use super::{api_client, print_json, runtime, CliResult};

#[derive(Subcommand)]
pub enum AuthAction {
    /// Store the API token in the OS keyring
    Login {
        /// Bearer token issued by the backend
        #[arg(long)]
        token: String,
    },
    /// Remove the stored token
    Logout,
    /// Check whether a token is available
    Status,
    /// Show the signed-in user
    Whoami {
        /// Keep polling while the account is still being provisioned
        #[arg(long)]
        wait: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: AuthAction) -> CliResult {
    match action {
        AuthAction::Login { token: value } => {
            let value = value.trim();
            if value.is_empty() {
                return Err("--token must not be empty".into());
            }
            token::set(value)?;
            println!("token stored");
        }
        AuthAction::Logout => {
            token::delete()?;
            println!("signed out");
        }
        AuthAction::Status => {
            let source = if std::env::var(token::TOKEN_ENV).is_ok_and(|t| !t.trim().is_empty()) {
                "authenticated (from environment)"
            } else if token::resolve().is_some() {
                "authenticated"
            } else {
                "not authenticated"
            };
            println!("{source}");
        }
        AuthAction::Whoami { wait, json } => {
            let config = Config::load()?;
            let client = api_client(&config)?;
            if !client.is_authenticated() {
                return Err("not signed in; run `buytime auth login --token <TOKEN>`".into());
            }
            let rt = runtime()?;
            let user = if wait {
                let policy = RetryPolicy::from_config(&config.api);
                rt.block_on(poll_until_provisioned(policy, || client.get_user()))?
            } else {
                rt.block_on(client.get_user())?
            };
            if json {
                return print_json(&user);
            }
            println!("id:    {}", user.id);
            if let Some(email) = &user.email {
                println!("email: {email}");
            }
            if let Some(name) = &user.display_name {
                println!("name:  {name}");
            }
            if let Some(tier) = &user.subscription_tier {
                println!("tier:  {tier}");
            }
        }
    }
    Ok(())
}
