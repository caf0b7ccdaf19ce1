use anyhow::{Context as _, Result};
use clap::Subcommand;

use super::print_report;
use crate::cli::output::get_formatter;
use crate::models::{ContentKind, OutputFormat};
use crate::pipelines::{Context, PostsPipeline};
use crate::services::PageStore;

#[derive(Debug, Subcommand)]
pub enum PostsCommand {
    #[command(about = "Fetch recent community posts with their answers")]
    Fetch {
        #[arg(long, help = "Keep posts created since January 1st, this many years ago")]
        age: Option<i32>,
    },
    #[command(about = "Upload staged posts to the index")]
    Upload,
}

pub async fn handle_posts(cmd: PostsCommand, ctx: &Context, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let max_age = match cmd {
        PostsCommand::Fetch { age: Some(age) } => age,
        _ => ctx.config.zendesk.posts_max_age_years,
    };
    let pipeline = PostsPipeline::new(
        ctx.zendesk()?,
        PageStore::new(ctx.env.locale_dir(ContentKind::Posts)),
        ctx.pool(ctx.config.workers.posts).with_message("posts"),
        max_age,
    );

    let report = match cmd {
        PostsCommand::Fetch { .. } => pipeline.fetch().await.context("failed to fetch posts")?,
        PostsCommand::Upload => {
            let uploader = ctx.uploader()?;
            pipeline.upload(&uploader).await.context("failed to upload posts")?
        }
    };

    print_report(formatter.as_ref(), &report);
    Ok(())
}
