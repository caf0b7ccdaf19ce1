use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context as _, Result};
use clap::Args;

use crate::cli::output::get_formatter;
use crate::models::{OutputFormat, QueryKind};
use crate::pipelines::{Context, IndexAdmin};

#[derive(Debug, Args)]
pub struct SearchArgs {
    #[arg(help = "Retrieval strategy: text, vector, hybrid or semantic")]
    pub kind: QueryKind,

    #[arg(required = true, help = "Search query text")]
    pub query: String,

    #[arg(short = 'k', long = "top", default_value_t = 3, help = "Number of results to return")]
    pub top: u32,
}

pub async fn handle_search(args: SearchArgs, ctx: &Context, format: OutputFormat, verbose: bool) -> Result<()> {
    let query = args.query.trim();
    if query.is_empty() {
        anyhow::bail!("search query cannot be empty");
    }
    if args.top == 0 {
        anyhow::bail!("-k must be at least 1");
    }

    let formatter = get_formatter(format);
    let client = ctx.search_client().context("failed to build search client")?;
    let mut admin = IndexAdmin::new(Arc::new(client), ctx.config.search.page_size);
    if args.kind.needs_embedding() {
        admin = admin.with_model(ctx.language_model()?);
    }

    if verbose {
        eprintln!("Query: \"{query}\"");
        eprintln!("  Kind: {}", args.kind);
        eprintln!("  Index: {}", admin.index_name());
        eprintln!("  Top: {}", args.top);
    }

    let start = Instant::now();
    let page = admin
        .search(args.kind, query, args.top)
        .await
        .context("search failed")?;
    if verbose {
        eprintln!("  Took: {}ms\n", start.elapsed().as_millis());
    }

    print!("{}", formatter.format_search_results(args.kind, query, &page));
    Ok(())
}
