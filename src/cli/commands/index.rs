use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use chrono::Utc;
use clap::Subcommand;

use super::{confirm, print_report};
use crate::cli::output::get_formatter;
use crate::models::{OutputFormat, Stage};
use crate::pipelines::admin::{missing_sources, read_export, source_breakdown};
use crate::pipelines::{Context, IndexAdmin, jan_first_years_before};

#[derive(Debug, Subcommand)]
pub enum IndexCommand {
    #[command(about = "Create or update an index with the standard schema")]
    Create {
        #[arg(long, help = "Index name (default: the selected brand and language)")]
        name: Option<String>,
        #[arg(long, help = "Embedding dimensions of the vector fields")]
        dimensions: Option<u32>,
    },
    #[command(about = "Delete the index and all of its documents")]
    Drop {
        #[arg(long, short = 'y', help = "Skip confirmation prompt")]
        yes: bool,
    },
    #[command(about = "List documents matching every term of the text")]
    Find {
        #[arg(long, help = "Comma-separated fields to search")]
        fields: Option<String>,
        #[arg(long, default_value = "*", help = "Search text")]
        text: String,
        #[arg(long, help = "Comma-separated fields to return")]
        select: Option<String>,
    },
    #[command(about = "Delete documents matching every term of the text")]
    DeleteDocuments {
        #[arg(long, help = "Comma-separated fields to search")]
        fields: Option<String>,
        #[arg(long, help = "Search text")]
        text: String,
        #[arg(long, short = 'y', help = "Skip confirmation prompt")]
        yes: bool,
    },
    #[command(about = "Write matching documents to the export file")]
    Export {
        #[arg(long, help = "Comma-separated fields to search")]
        fields: Option<String>,
        #[arg(long, default_value = "*", help = "Search text")]
        text: String,
        #[arg(long, short = 'o', help = "Output path (default: indexes/{stage}/...)")]
        output: Option<PathBuf>,
    },
    #[command(about = "Delete exported community posts older than the cutoff")]
    DeletePosts {
        #[arg(long, help = "Delete posts created before January 1st, this many years ago")]
        age: Option<i32>,
        #[arg(long, help = "Export file to read (default: indexes/{stage}/...)")]
        export: Option<PathBuf>,
        #[arg(long, short = 'y', help = "Skip confirmation prompt")]
        yes: bool,
    },
    #[command(about = "Count exported documents per source prefix")]
    Breakdown {
        #[arg(long, help = "Export file to read (default: indexes/{stage}/...)")]
        export: Option<PathBuf>,
    },
    #[command(about = "List sources exported from dev but missing in prod")]
    Missing {
        #[arg(long, help = "Dev export (default: indexes/dev/...)")]
        dev: Option<PathBuf>,
        #[arg(long, help = "Prod export (default: indexes/prod/...)")]
        prod: Option<PathBuf>,
    },
}

pub async fn handle_index(cmd: IndexCommand, ctx: &Context, format: OutputFormat, verbose: bool) -> Result<()> {
    let formatter = get_formatter(format);
    let env = &ctx.env;
    let default_export = || env.export_path(env.stage);

    // Commands that only read export files need no search credentials.
    match cmd {
        IndexCommand::Breakdown { export } => {
            let path = export.unwrap_or_else(default_export);
            let documents =
                read_export(&path).with_context(|| format!("failed to read {}", path.display()))?;
            print!("{}", formatter.format_breakdown(&source_breakdown(&documents)));
            return Ok(());
        }
        IndexCommand::Missing { dev, prod } => {
            let dev = dev.unwrap_or_else(|| env.export_path(Stage::Dev));
            let prod = prod.unwrap_or_else(|| env.export_path(Stage::Prod));
            let dev_docs =
                read_export(&dev).with_context(|| format!("failed to read {}", dev.display()))?;
            let prod_docs =
                read_export(&prod).with_context(|| format!("failed to read {}", prod.display()))?;
            let missing = missing_sources(&dev_docs, &prod_docs);
            print!("{}", formatter.format_list("Sources missing in prod", &missing));
            return Ok(());
        }
        _ => {}
    }

    let client = ctx.search_client().context("failed to build search client")?;
    let admin = IndexAdmin::new(Arc::new(client), ctx.config.search.page_size);
    if verbose {
        eprintln!("Index: {}", admin.index_name());
    }

    match cmd {
        IndexCommand::Create { name, dimensions } => {
            let name = name.unwrap_or_else(|| env.index_name.clone());
            let dimensions = dimensions.unwrap_or(ctx.config.search.embedding_dimensions);
            let created = admin
                .create_index(&name, dimensions)
                .await
                .with_context(|| format!("failed to create index {name}"))?;
            println!(
                "{}",
                formatter.format_message(&format!(
                    "Index {} ready with {} fields",
                    created.name,
                    created.fields.len()
                ))
            );
        }
        IndexCommand::Drop { yes } => {
            if !confirm(&format!("Drop index {}?", admin.index_name()), yes)? {
                println!("{}", formatter.format_message("Aborted."));
                return Ok(());
            }
            let message = if admin.drop_index().await.context("failed to drop index")? {
                format!("Dropped index {}", admin.index_name())
            } else {
                format!("Index {} does not exist", admin.index_name())
            };
            println!("{}", formatter.format_message(&message));
        }
        IndexCommand::Find { fields, text, select } => {
            let documents = admin.find(fields, &text, select).await.context("search failed")?;
            print!("{}", formatter.format_documents(&documents));
        }
        IndexCommand::DeleteDocuments { fields, text, yes } => {
            let prompt = format!("Delete every document of {} matching \"{text}\"?", admin.index_name());
            if !confirm(&prompt, yes)? {
                println!("{}", formatter.format_message("Aborted."));
                return Ok(());
            }
            let report = admin
                .delete_documents(fields, &text)
                .await
                .context("failed to delete documents")?;
            print_report(formatter.as_ref(), &report);
        }
        IndexCommand::Export { fields, text, output } => {
            let path = output.unwrap_or_else(default_export);
            let report = admin
                .export(fields, &text, &path)
                .await
                .context("failed to export documents")?;
            print_report(formatter.as_ref(), &report);
        }
        IndexCommand::DeletePosts { age, export, yes } => {
            let path = export.unwrap_or_else(default_export);
            let documents =
                read_export(&path).with_context(|| format!("failed to read {}", path.display()))?;
            let age = age.unwrap_or(ctx.config.zendesk.posts_max_age_years);
            let cutoff = jan_first_years_before(Utc::now(), age);
            let prompt = format!(
                "Delete posts created before {} from {}?",
                cutoff.format("%Y-%m-%d"),
                admin.index_name()
            );
            if !confirm(&prompt, yes)? {
                println!("{}", formatter.format_message("Aborted."));
                return Ok(());
            }
            let zendesk = ctx.zendesk()?;
            let report = admin
                .delete_posts_before(&documents, &zendesk, cutoff)
                .await
                .context("failed to delete old posts")?;
            print_report(formatter.as_ref(), &report);
        }
        IndexCommand::Breakdown { .. } | IndexCommand::Missing { .. } => {}
    }

    Ok(())
}
