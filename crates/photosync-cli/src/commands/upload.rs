//! Upload command - incremental upload for upload profiles

use anyhow::{bail, Result};
use clap::Args;

use photosync_core::domain::RunResult;
use photosync_sync::{ProfileReport, ProfileStatus};

use super::{cancel_on_ctrl_c, AppContext};
use crate::output::{human_bytes, to_json, OutputFormatter};

#[derive(Debug, Args)]
pub struct UploadCommand {
    /// Only this upload profile (default: all)
    #[arg(long)]
    pub profile: Option<String>,
}

impl UploadCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let fmt = ctx.formatter();
        let profiles = ctx.upload_profiles(self.profile.as_deref())?;
        if profiles.is_empty() {
            fmt.warn("No upload profiles configured");
            return Ok(());
        }

        let runner = ctx.runner()?;
        let cancel = cancel_on_ctrl_c();
        let reports = runner.run_uploads(&profiles, &cancel).await;

        if ctx.is_json() {
            fmt.print_json(&to_json(&reports));
        } else {
            for report in &reports {
                print_report(&*fmt, report);
            }
        }

        let failed = reports.iter().filter(|r| r.is_failure()).count();
        if failed > 0 {
            bail!("{failed} of {} upload profile(s) failed", reports.len());
        }
        Ok(())
    }
}

fn print_report(fmt: &dyn OutputFormatter, report: &ProfileReport<RunResult>) {
    let Some(result) = &report.result else {
        match report.status {
            ProfileStatus::Cancelled => fmt.warn(&format!("{}: cancelled before start", report.profile)),
            _ => fmt.error(&format!(
                "{}: {}",
                report.profile,
                report.error.as_deref().unwrap_or("failed")
            )),
        }
        return;
    };

    let line = format!(
        "{}: {} uploaded ({}), {} skipped, {} failed",
        report.profile,
        result.uploaded,
        human_bytes(result.bytes_sent),
        result.skipped,
        result.failed
    );
    match report.status {
        ProfileStatus::Succeeded => fmt.success(&line),
        ProfileStatus::Cancelled => fmt.warn(&format!("{line} (cancelled)")),
        ProfileStatus::Failed => fmt.error(&format!(
            "{line}: {}",
            report.error.as_deref().unwrap_or("failed")
        )),
    }

    if result.local_deleted > 0 {
        fmt.info(&format!("{} local file(s) removed", result.local_deleted));
    }
    for failure in &result.failures {
        fmt.info(&format!(
            "{} [{}] {}",
            failure.relative_path, failure.kind, failure.reason
        ));
    }
    if let Some(watermark) = result.watermark {
        fmt.info(&format!("Watermark: {}", watermark.to_rfc3339()));
    }
}
