use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Subcommand;

use super::print_report;
use crate::cli::output::get_formatter;
use crate::models::{ContentKind, OutputFormat};
use crate::pipelines::pdfs::Enrichment;
use crate::pipelines::{Context, PdfPipeline};
use crate::services::PageStore;
use crate::sources::LocalPdfDir;

const DEFAULT_LOCAL_SOURCE: &str = "https://www.udemy.com/user/clo3d-virtual-fashion/";

#[derive(Debug, Subcommand)]
pub enum PdfCommand {
    #[command(about = "Extract text from PDF attachments of every article")]
    Fetch,
    #[command(about = "Extract text from PDF files in a local directory")]
    Local {
        #[arg(long, help = "Directory to scan (default: {data_dir}/{brand}/local_pdf)")]
        dir: Option<PathBuf>,
        #[arg(long, default_value = DEFAULT_LOCAL_SOURCE, help = "Source URL for every document")]
        source_url: String,
    },
    #[command(about = "Summarize staged PDF text")]
    Summarize {
        #[arg(long, help = "Use the local PDF file instead of the attachment pages")]
        local: bool,
    },
    #[command(about = "Generate labels for staged PDFs")]
    Labels {
        #[arg(long, help = "Use the local PDF file instead of the attachment pages")]
        local: bool,
    },
    #[command(about = "Upload summarized PDFs to the index")]
    Upload {
        #[arg(long, help = "Use the local PDF file instead of the attachment pages")]
        local: bool,
    },
}

pub async fn handle_pdf(cmd: PdfCommand, ctx: &Context, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let workers = match cmd {
        PdfCommand::Fetch | PdfCommand::Local { .. } => ctx.config.workers.fetch,
        _ => ctx.config.workers.upload,
    };
    let pipeline = PdfPipeline::new(
        PageStore::new(ctx.env.locale_dir(ContentKind::Pdf)),
        PageStore::new(ctx.env.local_pdf_dir()),
        ctx.pool(workers).with_message("pdf"),
    );

    let report = match cmd {
        PdfCommand::Fetch => {
            let zendesk = ctx.zendesk()?;
            pipeline
                .fetch(&zendesk)
                .await
                .context("failed to fetch PDF attachments")?
        }
        PdfCommand::Local { dir, source_url } => {
            let dir = LocalPdfDir::new(dir.unwrap_or_else(|| ctx.env.local_pdf_dir()));
            pipeline
                .fetch_local(&dir, &source_url)
                .await
                .with_context(|| format!("failed to read PDFs in {}", dir.root().display()))?
        }
        PdfCommand::Summarize { local } => {
            let model = ctx.language_model()?;
            pipeline
                .enrich(model.as_ref(), Enrichment::Summary, local)
                .await
                .context("failed to summarize PDFs")?
        }
        PdfCommand::Labels { local } => {
            let model = ctx.language_model()?;
            pipeline
                .enrich(model.as_ref(), Enrichment::Labels, local)
                .await
                .context("failed to label PDFs")?
        }
        PdfCommand::Upload { local } => {
            let model = ctx.language_model()?;
            let uploader = ctx.uploader()?;
            pipeline
                .upload(&uploader, model.as_ref(), local)
                .await
                .context("failed to upload PDFs")?
        }
    };

    print_report(formatter.as_ref(), &report);
    Ok(())
}
