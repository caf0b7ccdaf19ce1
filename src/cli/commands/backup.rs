use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Args;

use super::print_report;
use crate::cli::output::get_formatter;
use crate::models::OutputFormat;
use crate::pipelines::{BackupOptions, Context, IndexBackup};

#[derive(Debug, Args)]
pub struct BackupArgs {
    #[arg(long, help = "Index to copy from (default: the selected index)")]
    pub source_index: Option<String>,

    #[arg(long, help = "Index to create and copy into")]
    pub target_index: String,

    #[arg(long, help = "Search service endpoint of the source")]
    pub source_endpoint: Option<String>,

    #[arg(long, env = "BACKUP_SOURCE_KEY", hide_env_values = true, help = "API key of the source service")]
    pub source_key: Option<String>,

    #[arg(long, help = "Search service endpoint of the target")]
    pub target_endpoint: Option<String>,

    #[arg(long, env = "BACKUP_TARGET_KEY", hide_env_values = true, help = "API key of the target service")]
    pub target_key: Option<String>,
}

impl BackupArgs {
    fn options(self, default_source: &str) -> BackupOptions {
        BackupOptions {
            source_index: self.source_index.unwrap_or_else(|| default_source.to_string()),
            target_index: self.target_index,
            source_endpoint: self.source_endpoint,
            source_key: self.source_key,
            target_endpoint: self.target_endpoint,
            target_key: self.target_key,
        }
    }
}

pub async fn handle_backup(args: BackupArgs, ctx: &Context, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let options = args.options(&ctx.env.index_name);
    if options.source_index == options.target_index
        && options.source_endpoint == options.target_endpoint
    {
        anyhow::bail!("source and target are the same index");
    }

    let (source, target) = options
        .clients(&ctx.env, &ctx.config.search, ctx.retry())
        .context("failed to build search clients")?;
    let backup = IndexBackup::new(Arc::new(source), Arc::new(target), ctx.config.search.page_size);

    let report = backup.run().await.with_context(|| {
        format!(
            "failed to copy {} into {}",
            options.source_index, options.target_index
        )
    })?;
    print_report(formatter.as_ref(), &report);
    Ok(())
}
