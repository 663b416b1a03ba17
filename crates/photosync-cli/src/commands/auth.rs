//! Auth commands - device-code login and logout per profile

use anyhow::{bail, Result};
use clap::Subcommand;
use tracing::info;

use super::AppContext;

#[derive(Debug, Subcommand)]
pub enum AuthCommand {
    /// Sign in with the device-code flow and store the tokens
    Login {
        /// Only this profile (default: every configured profile)
        #[arg(long)]
        profile: Option<String>,
        /// Ignore stored tokens and sign in again
        #[arg(long)]
        force: bool,
    },
    /// Remove stored tokens
    Logout {
        /// Only this profile (default: every configured profile)
        #[arg(long)]
        profile: Option<String>,
    },
}

impl AuthCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let fmt = ctx.formatter();
        let authenticator = ctx.authenticator()?;

        let (profile, login) = match self {
            AuthCommand::Login { profile, .. } => (profile, true),
            AuthCommand::Logout { profile } => (profile, false),
        };
        let names = match profile {
            Some(name) => vec![name.clone()],
            None => ctx.all_profile_names(),
        };
        if names.is_empty() {
            fmt.warn("No profiles configured");
            return Ok(());
        }

        let mut failed = 0usize;
        for name in &names {
            match self {
                AuthCommand::Login { force, .. } => {
                    info!(profile = %name, force, "Logging in");
                    fmt.info(&format!("Authenticating profile '{name}'..."));
                    match authenticator.login(name, *force).await {
                        Ok(tokens) => fmt.success(&format!(
                            "Profile '{name}' authenticated (token valid until {})",
                            tokens.expires_at.format("%Y-%m-%d %H:%M UTC")
                        )),
                        Err(e) => {
                            failed += 1;
                            fmt.error(&format!("Profile '{name}': {e}"));
                        }
                    }
                }
                AuthCommand::Logout { .. } => match authenticator.logout(name) {
                    Ok(()) => fmt.success(&format!("Profile '{name}' logged out")),
                    Err(e) => {
                        failed += 1;
                        fmt.error(&format!("Profile '{name}': {e}"));
                    }
                },
            }
        }

        if failed > 0 {
            let action = if login { "login" } else { "logout" };
            bail!("{action} failed for {failed} of {} profile(s)", names.len());
        }
        Ok(())
    }
}
