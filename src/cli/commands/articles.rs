use anyhow::{Context as _, Result};
use clap::Subcommand;

use super::print_report;
use crate::cli::output::get_formatter;
use crate::models::{ContentKind, OutputFormat};
use crate::pipelines::{ArticlesPipeline, Context};
use crate::services::PageStore;

#[derive(Debug, Subcommand)]
pub enum ArticlesCommand {
    #[command(about = "Fetch every public article into page files")]
    Fetch,
    #[command(about = "Print one article as it would be staged")]
    Get {
        #[arg(help = "Article id")]
        id: u64,
    },
    #[command(about = "Upload staged articles to the index")]
    Upload,
    #[command(about = "Delete articles from the index by id")]
    Delete {
        #[arg(required = true, help = "Article ids")]
        ids: Vec<String>,
    },
    #[command(about = "Delete articles that belong to excluded sections")]
    DeleteExcluded,
}

pub async fn handle_articles(cmd: ArticlesCommand, ctx: &Context, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let workers = match cmd {
        ArticlesCommand::Upload => ctx.config.workers.upload,
        _ => ctx.config.workers.fetch,
    };
    let pipeline = ArticlesPipeline::new(
        ctx.zendesk()?,
        PageStore::new(ctx.env.locale_dir(ContentKind::Articles)),
        ctx.pool(workers).with_message("articles"),
    );
    // clovf articles live in the clo3d index
    let upload_env = ctx.env.for_brand(ctx.env.brand.upload_target());

    match cmd {
        ArticlesCommand::Fetch => {
            let report = pipeline.fetch().await.context("failed to fetch articles")?;
            print_report(formatter.as_ref(), &report);
        }
        ArticlesCommand::Get { id } => {
            let record = pipeline
                .get(id)
                .await
                .with_context(|| format!("failed to get article {id}"))?;
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        ArticlesCommand::Upload => {
            let uploader = ctx.uploader_for(&upload_env)?;
            let report = pipeline.upload(&uploader).await.context("failed to upload articles")?;
            print_report(formatter.as_ref(), &report);
        }
        ArticlesCommand::Delete { ids } => {
            let uploader = ctx.uploader_for(&upload_env)?;
            let report = pipeline
                .delete(&uploader, &ids)
                .await
                .context("failed to delete articles")?;
            print_report(formatter.as_ref(), &report);
        }
        ArticlesCommand::DeleteExcluded => {
            let uploader = ctx.uploader_for(&upload_env)?;
            let report = pipeline
                .delete_excluded(&uploader)
                .await
                .context("failed to delete excluded articles")?;
            print_report(formatter.as_ref(), &report);
        }
    }

    Ok(())
}
