//! CLI module for the knowledge-base indexing tool.

pub mod commands;
pub mod output;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::error::AppError;
use crate::models::{Brand, Config, Environment, Language, OutputFormat, Stage};
use crate::pipelines::Context;

/// Feed help-center, forum, PDF, developer-doc and video content into a hosted search index.
#[derive(Debug, Parser)]
#[command(name = "kbindex")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[arg(
        long,
        short = 's',
        global = true,
        env = "KBINDEX_STAGE",
        default_value = "dev",
        help = "Deployment stage: prod or dev"
    )]
    pub stage: Stage,

    #[arg(
        long,
        short = 'b',
        global = true,
        env = "KBINDEX_BRAND",
        default_value = "clo3d",
        help = "Brand: clo3d, closet, clovf, md or allinone"
    )]
    pub brand: Brand,

    #[arg(
        long,
        short = 'l',
        global = true,
        env = "KBINDEX_LANGUAGE",
        default_value = "English",
        help = "Content language, by name or locale"
    )]
    pub language: Language,

    #[arg(long, global = true, help = "Directory holding .env.prod / .env.dev")]
    pub env_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "Root of the staging tree")]
    pub data_dir: Option<PathBuf>,

    #[arg(long, global = true, help = "Hide progress bars")]
    pub no_progress: bool,

    #[arg(
        long,
        short = 'f',
        global = true,
        help = "Output format: text, json, or markdown"
    )]
    pub format: Option<OutputFormat>,

    #[arg(long, short = 'v', global = true, help = "Enable verbose output")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Resolve the selected stage, brand and language against the config and `.env` file.
    pub fn context(&self, config: Config) -> Result<Context, AppError> {
        let env_dir = self.env_dir.clone().unwrap_or_else(|| config.paths.env_dir.clone());
        let data_dir = self
            .data_dir
            .clone()
            .unwrap_or_else(|| config.paths.data_dir.clone());
        let env = Environment::load(self.stage, self.brand, self.language, &env_dir, &data_dir)?;
        Ok(Context::new(env, config).with_progress(!self.no_progress))
    }
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Help-center articles
    #[command(subcommand)]
    Articles(commands::ArticlesCommand),

    /// PDF attachments and local PDF files
    #[command(subcommand)]
    Pdf(commands::PdfCommand),

    /// Community forum posts
    #[command(subcommand)]
    Posts(commands::PostsCommand),

    /// YouTube channel and playlist transcripts
    #[command(subcommand)]
    Youtube(commands::YoutubeCommand),

    /// Developer documentation
    #[command(subcommand)]
    Devdocs(commands::DevDocsCommand),

    /// Manage the search index (create, drop, find, export, ...)
    #[command(subcommand)]
    Index(commands::IndexCommand),

    /// Query the search index
    Search(commands::SearchArgs),

    /// Copy an index into a new one
    Backup(commands::BackupArgs),

    /// Show index and service statistics
    Status,

    /// Manage configuration
    #[command(subcommand)]
    Config(commands::ConfigCommand),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_selection_parses() {
        let cli = Cli::try_parse_from([
            "kbindex", "articles", "fetch", "--stage", "prod", "--brand", "closet", "-l", "ko",
        ])
        .unwrap();
        assert_eq!(cli.stage, Stage::Prod);
        assert_eq!(cli.brand, Brand::Closet);
        assert_eq!(cli.language, Language::Korean);
    }

    #[test]
    fn test_search_kind_parses() {
        let cli = Cli::try_parse_from(["kbindex", "search", "hybrid", "pleats", "-k", "5"]).unwrap();
        match cli.command {
            Commands::Search(args) => {
                assert_eq!(args.kind, crate::models::QueryKind::Hybrid);
                assert_eq!(args.top, 5);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
