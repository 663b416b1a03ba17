//! Sync command - camera roll download for every download profile

use anyhow::{bail, Result};
use clap::Args;

use photosync_sync::ProfileStatus;

use super::{cancel_on_ctrl_c, AppContext};
use crate::output::to_json;

#[derive(Debug, Args)]
pub struct SyncCommand {}

impl SyncCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let fmt = ctx.formatter();
        if ctx.config.profiles.is_empty() {
            fmt.warn("No download profiles configured");
            return Ok(());
        }

        let runner = ctx.runner()?;
        let cancel = cancel_on_ctrl_c();
        let reports = runner.run_downloads(&ctx.config.profiles, &cancel).await;

        if ctx.is_json() {
            fmt.print_json(&to_json(&reports));
        } else {
            for report in &reports {
                match (&report.status, &report.result) {
                    (ProfileStatus::Failed, _) => fmt.error(&format!(
                        "{}: {}",
                        report.profile,
                        report.error.as_deref().unwrap_or("failed")
                    )),
                    (status, Some(r)) => {
                        let line = format!(
                            "{}: {} downloaded, {} skipped, {} errors, {} deleted remotely",
                            report.profile, r.synced, r.skipped, r.errors, r.deleted
                        );
                        if *status == ProfileStatus::Cancelled {
                            fmt.warn(&format!("{line} (cancelled)"));
                        } else {
                            fmt.success(&line);
                        }
                    }
                    (_, None) => fmt.warn(&format!("{}: not run", report.profile)),
                }
            }
        }

        let failed = reports.iter().filter(|r| r.is_failure()).count();
        if failed > 0 {
            bail!("{failed} of {} download profile(s) failed", reports.len());
        }
        Ok(())
    }
}
