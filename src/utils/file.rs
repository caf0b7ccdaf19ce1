//! File helpers for the staging tree.

use std::path::Path;

/// Page number encoded in a `page_{n}.json` file name.
pub fn page_number(file_name: &str) -> Option<u32> {
    file_name
        .strip_prefix("page_")?
        .strip_suffix(".json")?
        .parse()
        .ok()
}

pub fn page_file_name(page: u32) -> String {
    format!("page_{page}.json")
}

/// Check if a path looks like a PDF by extension.
pub fn is_pdf_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

pub fn is_json_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Get the relative path from a base directory.
pub fn get_relative_path(base: &Path, path: &Path) -> Option<String> {
    path.strip_prefix(base)
        .ok()
        .map(|p| p.to_string_lossy().to_string())
}

/// Sanitize a filename by replacing invalid characters.
///
/// Replaces characters that are not allowed in filenames on common operating
/// systems (Windows, macOS, Linux) with hyphens.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => '-',
            c => c,
        })
        .collect::<String>()
        .trim_matches('-')
        .trim()
        .to_string()
}
