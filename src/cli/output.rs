use std::fmt::Write as FmtWrite;

use console::style;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::models::{OutputFormat, QueryKind, RunReport, SearchPage};
use crate::pipelines::admin::{IndexStatus, SourceCount};

const PREVIEW_CHARS: usize = 200;

pub trait Formatter {
    fn format_report(&self, report: &RunReport) -> String;
    fn format_search_results(&self, kind: QueryKind, query: &str, page: &SearchPage) -> String;
    fn format_documents(&self, documents: &[Map<String, Value>]) -> String;
    fn format_breakdown(&self, breakdown: &[SourceCount]) -> String;
    fn format_list(&self, title: &str, items: &[String]) -> String;
    fn format_status(&self, status: &IndexStatus) -> String;
    fn format_message(&self, message: &str) -> String;
    fn format_error(&self, error: &str) -> String;
}

fn preview(text: &str) -> String {
    let head: String = text.chars().take(PREVIEW_CHARS).collect();
    if text.chars().count() > PREVIEW_CHARS {
        format!("{head}...")
    } else {
        head
    }
}

fn field<'a>(document: &'a Map<String, Value>, name: &str) -> &'a str {
    document.get(name).and_then(Value::as_str).unwrap_or_default()
}

pub struct TextFormatter;

impl Formatter for TextFormatter {
    fn format_report(&self, report: &RunReport) -> String {
        let mut output = String::new();
        let heading = match &report.target {
            Some(target) => format!("{} -> {}", report.operation, target),
            None => report.operation.clone(),
        };
        writeln!(output, "{heading}").unwrap();
        writeln!(output, "{}", "-".repeat(heading.chars().count())).unwrap();
        writeln!(output, "Total:     {}", report.total).unwrap();
        writeln!(output, "Succeeded: {}", style(report.succeeded).green()).unwrap();
        if report.skipped > 0 {
            writeln!(output, "Skipped:   {}", style(report.skipped).yellow()).unwrap();
        }
        if !report.failures.is_empty() {
            writeln!(output, "Failed:    {}", style(report.failed()).red()).unwrap();
            for failure in &report.failures {
                writeln!(output, "  ✗ {}: {}", failure.item, failure.error).unwrap();
            }
        }
        for note in &report.notes {
            writeln!(output, "  {note}").unwrap();
        }
        output
    }

    fn format_search_results(&self, kind: QueryKind, query: &str, page: &SearchPage) -> String {
        if page.hits.is_empty() {
            return format!("No results found for: {query}\n");
        }

        let mut output = String::new();
        writeln!(output, "{kind} search results for: \"{query}\"\n").unwrap();
        for (i, hit) in page.hits.iter().enumerate() {
            match hit.reranker_score {
                Some(reranker) => writeln!(
                    output,
                    "{}. [Score: {:.3}, Reranker: {:.3}] {}",
                    i + 1,
                    hit.score,
                    reranker,
                    hit.field_str("Title").unwrap_or_default()
                )
                .unwrap(),
                None => writeln!(
                    output,
                    "{}. [Score: {:.3}] {}",
                    i + 1,
                    hit.score,
                    hit.field_str("Title").unwrap_or_default()
                )
                .unwrap(),
            }
            writeln!(output, "   Source: {}", hit.field_str("Source").unwrap_or_default()).unwrap();
            writeln!(output, "   ---").unwrap();
            for line in preview(hit.field_str("Content").unwrap_or_default()).lines() {
                writeln!(output, "   {line}").unwrap();
            }
            writeln!(output).unwrap();
        }
        output
    }

    fn format_documents(&self, documents: &[Map<String, Value>]) -> String {
        if documents.is_empty() {
            return "No documents matched.\n".to_string();
        }
        let mut output = String::new();
        writeln!(output, "{} documents\n", documents.len()).unwrap();
        for document in documents {
            let line: Vec<String> = document
                .iter()
                .map(|(k, v)| match v {
                    Value::String(s) => format!("{k}={}", preview(s)),
                    other => format!("{k}={other}"),
                })
                .collect();
            writeln!(output, "  {}", line.join("  ")).unwrap();
        }
        output
    }

    fn format_breakdown(&self, breakdown: &[SourceCount]) -> String {
        if breakdown.is_empty() {
            return "No documents exported.\n".to_string();
        }
        let mut output = String::new();
        writeln!(output, "Documents per source").unwrap();
        writeln!(output, "--------------------").unwrap();
        for entry in breakdown {
            writeln!(output, "{:>7}  {}", entry.count, entry.prefix).unwrap();
        }
        output
    }

    fn format_list(&self, title: &str, items: &[String]) -> String {
        let mut output = String::new();
        writeln!(output, "{title} ({})", items.len()).unwrap();
        for item in items {
            writeln!(output, "  {item}").unwrap();
        }
        output
    }

    fn format_status(&self, status: &IndexStatus) -> String {
        let mut output = String::new();
        writeln!(output, "Status").unwrap();
        writeln!(output, "------").unwrap();
        writeln!(output, "Index:         {}", status.index_name).unwrap();
        writeln!(output, "  Documents:   {}", status.stats.document_count).unwrap();
        writeln!(output, "  Storage:     {} bytes", status.stats.storage_size).unwrap();
        writeln!(output, "  Vectors:     {} bytes", status.stats.vector_index_size).unwrap();

        if let Some(counters) = status.service.get("counters").and_then(Value::as_object) {
            writeln!(output).unwrap();
            writeln!(output, "Service").unwrap();
            for (name, counter) in counters {
                let usage = counter.get("usage").cloned().unwrap_or(Value::Null);
                match counter.get("quota").filter(|q| !q.is_null()) {
                    Some(quota) => writeln!(output, "  {name}: {usage} / {quota}").unwrap(),
                    None => writeln!(output, "  {name}: {usage}").unwrap(),
                }
            }
        }
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("{message}\n")
    }

    fn format_error(&self, error: &str) -> String {
        format!("{} {error}\n", style("Error:").red().bold())
    }
}

pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn render<T: Serialize + ?Sized>(&self, value: &T) -> String {
        let rendered = if self.pretty {
            serde_json::to_string_pretty(value)
        } else {
            serde_json::to_string(value)
        };
        rendered.unwrap_or_else(|e| serde_json::json!({"error": e.to_string()}).to_string()) + "\n"
    }
}

impl Formatter for JsonFormatter {
    fn format_report(&self, report: &RunReport) -> String {
        self.render(report)
    }

    fn format_search_results(&self, kind: QueryKind, query: &str, page: &SearchPage) -> String {
        self.render(&serde_json::json!({
            "kind": kind,
            "query": query,
            "results": page.hits,
        }))
    }

    fn format_documents(&self, documents: &[Map<String, Value>]) -> String {
        self.render(documents)
    }

    fn format_breakdown(&self, breakdown: &[SourceCount]) -> String {
        self.render(breakdown)
    }

    fn format_list(&self, title: &str, items: &[String]) -> String {
        self.render(&serde_json::json!({ "title": title, "items": items }))
    }

    fn format_status(&self, status: &IndexStatus) -> String {
        self.render(status)
    }

    fn format_message(&self, message: &str) -> String {
        serde_json::json!({"message": message}).to_string() + "\n"
    }

    fn format_error(&self, error: &str) -> String {
        serde_json::json!({"error": error}).to_string() + "\n"
    }
}

pub struct MarkdownFormatter;

impl Formatter for MarkdownFormatter {
    fn format_report(&self, report: &RunReport) -> String {
        let mut output = String::new();
        writeln!(output, "## {}\n", report.operation).unwrap();
        if let Some(target) = &report.target {
            writeln!(output, "**Target:** `{target}`\n").unwrap();
        }
        writeln!(output, "| Metric | Value |").unwrap();
        writeln!(output, "|--------|-------|").unwrap();
        writeln!(output, "| Total | {} |", report.total).unwrap();
        writeln!(output, "| Succeeded | {} |", report.succeeded).unwrap();
        writeln!(output, "| Skipped | {} |", report.skipped).unwrap();
        writeln!(output, "| Failed | {} |", report.failed()).unwrap();

        if !report.failures.is_empty() {
            writeln!(output, "\n### Failures\n").unwrap();
            for failure in &report.failures {
                writeln!(output, "- `{}`: {}", failure.item, failure.error).unwrap();
            }
        }
        if !report.notes.is_empty() {
            writeln!(output).unwrap();
            for note in &report.notes {
                writeln!(output, "> {note}").unwrap();
            }
        }
        output
    }

    fn format_search_results(&self, kind: QueryKind, query: &str, page: &SearchPage) -> String {
        if page.hits.is_empty() {
            return format!("## No results found\n\nQuery: `{query}`\n");
        }

        let mut output = String::new();
        writeln!(output, "## Search Results ({kind})\n").unwrap();
        writeln!(output, "**Query:** `{query}`\n").unwrap();
        for (i, hit) in page.hits.iter().enumerate() {
            writeln!(
                output,
                "### {}. {} (score {:.3})\n",
                i + 1,
                hit.field_str("Title").unwrap_or_default(),
                hit.reranker_score.unwrap_or(hit.score)
            )
            .unwrap();
            writeln!(output, "**Source:** <{}>\n", hit.field_str("Source").unwrap_or_default()).unwrap();
            writeln!(output, "```").unwrap();
            writeln!(output, "{}", preview(hit.field_str("Content").unwrap_or_default())).unwrap();
            writeln!(output, "```\n").unwrap();
        }
        output
    }

    fn format_documents(&self, documents: &[Map<String, Value>]) -> String {
        if documents.is_empty() {
            return "*No documents matched.*\n".to_string();
        }
        let mut output = String::new();
        writeln!(output, "| ArticleId | Title | Source |").unwrap();
        writeln!(output, "|-----------|-------|--------|").unwrap();
        for document in documents {
            writeln!(
                output,
                "| `{}` | {} | {} |",
                field(document, "ArticleId"),
                field(document, "Title"),
                field(document, "Source")
            )
            .unwrap();
        }
        output
    }

    fn format_breakdown(&self, breakdown: &[SourceCount]) -> String {
        let mut output = String::new();
        writeln!(output, "## Documents per source\n").unwrap();
        writeln!(output, "| Source | Count |").unwrap();
        writeln!(output, "|--------|-------|").unwrap();
        for entry in breakdown {
            writeln!(output, "| `{}` | {} |", entry.prefix, entry.count).unwrap();
        }
        output
    }

    fn format_list(&self, title: &str, items: &[String]) -> String {
        let mut output = String::new();
        writeln!(output, "## {title}\n").unwrap();
        if items.is_empty() {
            writeln!(output, "*None.*").unwrap();
        }
        for item in items {
            writeln!(output, "- {item}").unwrap();
        }
        output
    }

    fn format_status(&self, status: &IndexStatus) -> String {
        let mut output = String::new();
        writeln!(output, "## Status\n").unwrap();
        writeln!(output, "### Index `{}`\n", status.index_name).unwrap();
        writeln!(output, "- **Documents:** {}", status.stats.document_count).unwrap();
        writeln!(output, "- **Storage:** {} bytes", status.stats.storage_size).unwrap();
        writeln!(output, "- **Vector index:** {} bytes", status.stats.vector_index_size).unwrap();
        output
    }

    fn format_message(&self, message: &str) -> String {
        format!("> {message}\n")
    }

    fn format_error(&self, error: &str) -> String {
        format!("> ⚠️ **Error:** {error}\n")
    }
}

pub fn get_formatter(format: OutputFormat) -> Box<dyn Formatter> {
    match format {
        OutputFormat::Text => Box::new(TextFormatter),
        OutputFormat::Json => Box::new(JsonFormatter::new(true)),
        OutputFormat::Markdown => Box::new(MarkdownFormatter),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report() -> RunReport {
        let mut report = RunReport::new("upload").with_target("clo3d-index-english");
        report.total = 3;
        report.succeeded = 2;
        report.fail("42", "rejected");
        report
    }

    #[test]
    fn test_text_report_lists_failures() {
        let output = TextFormatter.format_report(&report());
        assert!(output.starts_with("upload -> clo3d-index-english"));
        assert!(output.contains("42: rejected"));
    }

    #[test]
    fn test_json_report_round_trips_counts() {
        let output = JsonFormatter::new(false).format_report(&report());
        let value: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["succeeded"], 2);
        assert_eq!(value["failures"][0]["item"], "42");
    }

    #[test]
    fn test_markdown_search_results() {
        let page: SearchPage = serde_json::from_value(json!({
            "value": [{"@search.score": 0.8, "Title": "Pleats", "Source": "https://x/1", "Content": "Fold it"}]
        }))
        .unwrap();
        let output = MarkdownFormatter.format_search_results(QueryKind::Hybrid, "pleat", &page);
        assert!(output.contains("## Search Results (hybrid)"));
        assert!(output.contains("### 1. Pleats (score 0.800)"));
    }

    #[test]
    fn test_preview_truncates_long_content() {
        let long = "a".repeat(PREVIEW_CHARS + 10);
        assert_eq!(preview(&long).len(), PREVIEW_CHARS + 3);
        assert_eq!(preview("short"), "short");
    }
}
