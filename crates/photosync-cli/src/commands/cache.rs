//! Cache commands - build from the remote tree, clear, and inspect

use anyhow::Result;
use clap::Subcommand;

use super::AppContext;
use crate::output::to_json;

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Mark files already present on OneDrive with the same size as done
    Build {
        #[arg(long)]
        profile: String,
    },
    /// Forget every cached upload and reset the watermark
    Clear {
        #[arg(long)]
        profile: String,
    },
    /// Show cache counters and the watermark
    Status {
        #[arg(long)]
        profile: String,
    },
}

impl CacheCommand {
    pub async fn execute(&self, ctx: &AppContext) -> Result<()> {
        let fmt = ctx.formatter();
        let runner = ctx.runner()?;

        match self {
            CacheCommand::Build { profile } => {
                let profile = ctx.upload_profile(profile)?;
                fmt.info(&format!("Listing {} ...", profile.onedrive_folder));
                let stats = runner.build_cache(profile).await?;
                if ctx.is_json() {
                    fmt.print_json(&to_json(&stats));
                } else {
                    fmt.success(&format!(
                        "Cache built for '{}': {} remote files, {} matched, {} size mismatches, {} remote only",
                        profile.name,
                        stats.remote_files,
                        stats.matched,
                        stats.size_mismatch,
                        stats.remote_only
                    ));
                }
            }
            CacheCommand::Clear { profile } => {
                let profile = ctx.upload_profile(profile)?;
                runner.clear_cache(profile).await?;
                fmt.success(&format!("Cache and watermark cleared for '{}'", profile.name));
            }
            CacheCommand::Status { profile } => {
                let profile = ctx.upload_profile(profile)?;
                let status = runner.cache_status(profile).await?;
                if ctx.is_json() {
                    fmt.print_json(&to_json(&status));
                    return Ok(());
                }

                fmt.success(&format!("Cache for '{}'", status.profile));
                if let Some(path) = &status.db_path {
                    fmt.info(&format!("Database: {}", path.display()));
                }
                fmt.info(&format!(
                    "Entries: {} ({} uploaded, {} skipped, {} failed)",
                    status.entries, status.uploaded, status.skipped, status.failed
                ));
                match &status.watermark {
                    Some(wm) => fmt.info(&format!(
                        "Watermark: {} (last scan {})",
                        wm.high_water_mtime.to_rfc3339(),
                        wm.last_scan_time.to_rfc3339()
                    )),
                    None => fmt.info("Watermark: none"),
                }
                if status.recovered_from_corruption {
                    fmt.warn("The database was unreadable and has been recreated");
                }
            }
        }
        Ok(())
    }
}
