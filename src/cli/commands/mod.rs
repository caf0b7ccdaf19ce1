mod articles;
mod backup;
mod config;
mod devdocs;
mod index;
mod pdf;
mod posts;
mod search;
mod status;
mod youtube;

pub use articles::ArticlesCommand;
pub use backup::BackupArgs;
pub use config::ConfigCommand;
pub use devdocs::DevDocsCommand;
pub use index::IndexCommand;
pub use pdf::PdfCommand;
pub use posts::PostsCommand;
pub use search::SearchArgs;
pub use youtube::YoutubeCommand;

pub use articles::handle_articles;
pub use backup::handle_backup;
pub use config::handle_config;
pub use devdocs::handle_devdocs;
pub use index::handle_index;
pub use pdf::handle_pdf;
pub use posts::handle_posts;
pub use search::handle_search;
pub use status::handle_status;
pub use youtube::handle_youtube;

use anyhow::Result;
use console::Term;

use crate::cli::output::Formatter;
use crate::models::RunReport;

/// Ask on the terminal before a destructive step; `yes` skips the prompt.
pub(crate) fn confirm(prompt: &str, yes: bool) -> Result<bool> {
    if yes {
        return Ok(true);
    }
    let term = Term::stderr();
    if !term.is_term() {
        anyhow::bail!("{prompt} needs confirmation; pass --yes to run non-interactively");
    }
    term.write_str(&format!("{prompt} [y/N] "))?;
    let answer = term.read_line()?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

/// Print a report; a run with failures still exits successfully.
pub(crate) fn print_report(formatter: &dyn Formatter, report: &RunReport) {
    print!("{}", formatter.format_report(report));
    if !report.is_clean() {
        tracing::warn!(
            operation = %report.operation,
            failed = report.failed(),
            "finished with failures"
        );
    }
}
