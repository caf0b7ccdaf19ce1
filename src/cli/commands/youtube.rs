use anyhow::{Context as _, Result};
use clap::Subcommand;

use super::print_report;
use crate::cli::output::get_formatter;
use crate::models::OutputFormat;
use crate::pipelines::{Context, YoutubePipeline};
use crate::services::PageStore;

#[derive(Debug, Subcommand)]
pub enum YoutubeCommand {
    #[command(about = "Fetch channel videos and their transcripts")]
    Fetch {
        #[arg(long, help = "Videos published since January 1st, this many years ago")]
        age: Option<i32>,
    },
    #[command(about = "Fetch every video of a playlist, one file per video")]
    Playlist {
        #[arg(help = "Playlist id")]
        id: String,
    },
    #[command(about = "Summarize staged transcripts")]
    Summarize {
        #[arg(long, help = "Only summarize this page file")]
        page: Option<u32>,
    },
    #[command(about = "Upload summarized videos to the index")]
    Upload,
}

pub async fn handle_youtube(cmd: YoutubeCommand, ctx: &Context, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let pipeline = YoutubePipeline::new(
        PageStore::new(ctx.env.youtube_channel_dir()),
        ctx.env.youtube_playlist_dir(),
        ctx.pool(ctx.config.workers.fetch).with_message("videos"),
        ctx.pool(ctx.config.workers.summarize).with_message("summaries"),
        ctx.config.youtube.min_transcript_chars,
    );

    let report = match cmd {
        YoutubeCommand::Fetch { age } => {
            let client = ctx.youtube()?;
            let age = age.unwrap_or(ctx.config.youtube.video_age_years);
            pipeline
                .fetch(&client, age)
                .await
                .context("failed to fetch channel videos")?
        }
        YoutubeCommand::Playlist { id } => {
            let client = ctx.youtube()?;
            pipeline
                .playlist(&client, &id)
                .await
                .with_context(|| format!("failed to fetch playlist {id}"))?
        }
        YoutubeCommand::Summarize { page } => {
            let model = ctx.language_model()?;
            pipeline
                .summarize(model.as_ref(), page)
                .await
                .context("failed to summarize transcripts")?
        }
        YoutubeCommand::Upload => {
            let uploader = ctx.uploader()?;
            pipeline.upload(&uploader).await.context("failed to upload videos")?
        }
    };

    print_report(formatter.as_ref(), &report);
    Ok(())
}
