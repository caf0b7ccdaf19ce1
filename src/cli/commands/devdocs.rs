use anyhow::{Context as _, Result};
use clap::Subcommand;

use super::print_report;
use crate::cli::output::get_formatter;
use crate::models::{OutputFormat, RunReport};
use crate::pipelines::{Context, DevDocsPipeline};
use crate::sources::DocPage;

#[derive(Debug, Subcommand)]
pub enum DevDocsCommand {
    #[command(about = "Turn raw API listings into documents")]
    ParseApi,
    #[command(about = "Parse the environment setup page")]
    ParseEnvironment,
    #[command(about = "Parse the API scenario page, one document per script")]
    ParseScenario,
    #[command(about = "Parse the API option type page")]
    ParseOptionType,
    #[command(about = "Upload every parsed document")]
    Upload,
    #[command(about = "Delete every parsed document from the index")]
    Delete,
}

pub async fn handle_devdocs(cmd: DevDocsCommand, ctx: &Context, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let pipeline = DevDocsPipeline::new(
        ctx.env.devdocs_dir(),
        &ctx.config.devdocs.base_url,
        ctx.pool(ctx.config.workers.upload).with_message("devdocs"),
    );

    let report = match cmd {
        DevDocsCommand::ParseApi => pipeline.parse_api().context("failed to parse API listings")?,
        DevDocsCommand::ParseEnvironment => parse_page(ctx, &pipeline, DocPage::Environment).await?,
        DevDocsCommand::ParseScenario => parse_page(ctx, &pipeline, DocPage::Scenario).await?,
        DevDocsCommand::ParseOptionType => parse_page(ctx, &pipeline, DocPage::OptionType).await?,
        DevDocsCommand::Upload => {
            let uploader = ctx.uploader()?;
            pipeline.upload(&uploader).await.context("failed to upload developer docs")?
        }
        DevDocsCommand::Delete => {
            let uploader = ctx.uploader()?;
            pipeline.delete(&uploader).await.context("failed to delete developer docs")?
        }
    };

    print_report(formatter.as_ref(), &report);
    Ok(())
}

async fn parse_page(ctx: &Context, pipeline: &DevDocsPipeline, page: DocPage) -> Result<RunReport> {
    let client = ctx.devdocs()?;
    pipeline
        .parse_page(&client, page)
        .await
        .with_context(|| format!("failed to parse {}", page.rst_name()))
}
