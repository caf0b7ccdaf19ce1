use std::sync::Arc;

use anyhow::{Context as _, Result};

use crate::cli::output::get_formatter;
use crate::models::OutputFormat;
use crate::pipelines::{Context, IndexAdmin};

pub async fn handle_status(ctx: &Context, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let client = ctx.search_client().context("failed to build search client")?;
    let admin = IndexAdmin::new(Arc::new(client), ctx.config.search.page_size);

    let status = admin.status().await.context("failed to read index status")?;
    print!("{}", formatter.format_status(&status));
    Ok(())
}
