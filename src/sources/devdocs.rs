//! Developer documentation site: reStructuredText sources and API listings.

use std::collections::BTreeMap;
use std::time::Duration;

use regex::{NoExpand, Regex};
use reqwest::Client;
use serde::Deserialize;

use crate::error::AppError;
use crate::models::{DevDoc, DevDocsConfig};
use crate::utils::retry::{RetryConfig, retry};
use crate::utils::text::{MAX_TOKENS, trim_tokens};

/// Delimiter between code blocks on the scenario page.
const SCENARIO_SEPARATOR: &str = "\n|\n|\n|\n\n\n";

/// Group directory holding parsed API listings.
pub const API_LIST_GROUP: &str = "api_list";

/// Raw API listings live here, below the `api_list` group.
pub const API_SOURCE_DIR: &str = "original_docs";

/// A page of the docs site that is indexed from its `.rst.txt` source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocPage {
    Environment,
    Scenario,
    OptionType,
}

impl DocPage {
    pub fn rst_name(&self) -> &'static str {
        match self {
            DocPage::Environment => "environment",
            DocPage::Scenario => "scenario",
            DocPage::OptionType => "optiontype",
        }
    }

    /// Staging group directory below `devdocs/`.
    pub fn group(&self) -> &'static str {
        match self {
            DocPage::Environment => "env_setup_build",
            DocPage::Scenario => "api_scenario",
            DocPage::OptionType => "api_option_type",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.group())
    }

    pub fn title(&self) -> &'static str {
        match self {
            DocPage::Environment => "Environment Setup & Build",
            DocPage::Scenario => "API Scenario",
            DocPage::OptionType => "API Option & Type",
        }
    }

    pub fn html_url(&self, base_url: &str) -> String {
        format!("{}/{}.html", base_url.trim_end_matches('/'), self.rst_name())
    }

    /// Documents for the page's raw source text.
    pub fn parse(&self, source: &str, base_url: &str) -> Vec<DevDoc> {
        let url = self.html_url(base_url);
        match self {
            DocPage::Scenario => parse_scenario(source, &url),
            _ => vec![DevDoc::new(self.title(), source, url)],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiEntry {
    pub doc: String,
    #[serde(default)]
    pub args: String,
    #[serde(default)]
    pub return_type: String,
}

/// One document per function in an API listing (`{func: {Doc, Args, ReturnType}}`).
///
/// The first `func(...)` mention in each doc is rewritten to the full signature.
pub fn parse_api_listing(listing: &BTreeMap<String, ApiEntry>, base_url: &str) -> Vec<DevDoc> {
    let source = format!("{}/list.html", base_url.trim_end_matches('/'));
    listing
        .iter()
        .map(|(func, entry)| {
            let content = trim_tokens(&entry.doc, MAX_TOKENS);
            let signature = format!("{func}({}) -> {}", entry.args, entry.return_type);
            let content = match Regex::new(&format!(r"{}\(.*?\)", regex::escape(func))) {
                Ok(re) => re.replace_all(&content, NoExpand(&signature)).to_string(),
                Err(_) => content,
            };
            DevDoc::new(format!("{func} API"), content, source.clone())
        })
        .collect()
}

/// One document per code block on the scenario page.
pub fn parse_scenario(source: &str, url: &str) -> Vec<DevDoc> {
    source
        .split(SCENARIO_SEPARATOR)
        .filter(|block| !block.trim().is_empty())
        .map(|block| {
            let heading = block.split("code-block").next().unwrap_or_default();
            let heading: String = heading
                .replace("API Scenario", "")
                .chars()
                .filter(|c| !matches!(c, '\n' | '.' | '-' | '=' | '*'))
                .collect();
            let title = format!("{} Python Script", heading.trim());
            let content = block
                .replace("API Scenario", "")
                .replace("=======================", "")
                .replace("****", "");
            DevDoc::new(title, content, url)
        })
        .collect()
}

/// Fetches page sources from the docs site.
#[derive(Debug, Clone)]
pub struct DevDocsClient {
    client: Client,
    base_url: String,
    retry: RetryConfig,
}

impl DevDocsClient {
    pub fn new(config: &DevDocsConfig, retry: RetryConfig) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Other(e.to_string()))?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            retry,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Raw `_sources/{page}.rst.txt` text.
    pub async fn page_source(&self, page: DocPage) -> Result<String, AppError> {
        let url = format!("{}/_sources/{}.rst.txt", self.base_url, page.rst_name());
        let result: Result<String, reqwest::Error> = retry(&self.retry, || {
            let request = self.client.get(&url);
            async move { request.send().await?.error_for_status()?.text().await }
        })
        .await;
        result.map_err(|e| AppError::Other(format!("failed to fetch {url}: {e}")))
    }
}
