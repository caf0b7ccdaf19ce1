//! Stage, brand and language selections and the secrets/endpoints they resolve to.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_INDEX_NAME: &str = "clo3d-index-english";

/// Deployment stage; selects the `.env.{stage}` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Prod,
    #[default]
    Dev,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Prod => "prod",
            Stage::Dev => "dev",
        }
    }

    pub fn env_file_name(&self) -> String {
        format!(".env.{}", self.as_str())
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Ok(Stage::Prod),
            "dev" | "development" => Ok(Stage::Dev),
            _ => Err(format!("unknown stage: {s}")),
        }
    }
}

/// Product brand. Each brand owns its own index and (except `allinone`) help center.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Brand {
    #[default]
    Clo3d,
    Closet,
    Clovf,
    Md,
    Allinone,
}

impl Brand {
    pub const ALL: [Brand; 5] = [
        Brand::Clo3d,
        Brand::Closet,
        Brand::Clovf,
        Brand::Md,
        Brand::Allinone,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Brand::Clo3d => "clo3d",
            Brand::Closet => "closet",
            Brand::Clovf => "clovf",
            Brand::Md => "md",
            Brand::Allinone => "allinone",
        }
    }

    /// Zendesk subdomain used for API calls.
    pub fn zendesk_subdomain(&self) -> Option<&'static str> {
        match self {
            Brand::Clo3d => Some("clo3d"),
            Brand::Closet => Some("clo-set"),
            Brand::Clovf => Some("clovf"),
            Brand::Md => Some("marvelousdesigner"),
            Brand::Allinone => None,
        }
    }

    /// Public host that article and post `html_url`s live under.
    pub fn help_center_host(&self) -> Option<&'static str> {
        match self {
            Brand::Clo3d => Some("support.clo3d.com"),
            Brand::Closet => Some("support.clo-set.com"),
            Brand::Clovf => Some("clovf.zendesk.com"),
            Brand::Md => Some("support.marvelousdesigner.com"),
            Brand::Allinone => None,
        }
    }

    /// Help-center sections whose articles never enter the index.
    pub fn excluded_sections(&self) -> &'static [u64] {
        match self {
            // PDF reference section and lessons section
            Brand::Clo3d => &[360005512874, 360002306994],
            // update notes, joining connect, account (covered by clovf)
            Brand::Closet => &[
                5026352977423,
                6280973212175,
                360001149855,
                360001011655,
                360000854796,
                7975498603663,
            ],
            _ => &[],
        }
    }

    /// Individual articles excluded regardless of section.
    pub fn excluded_articles(&self) -> &'static [u64] {
        match self {
            Brand::Clo3d => &[115012589987],
            _ => &[],
        }
    }

    /// Brand whose index receives this brand's uploads.
    pub fn upload_target(&self) -> Brand {
        match self {
            Brand::Clovf => Brand::Clo3d,
            other => *other,
        }
    }
}

impl fmt::Display for Brand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Brand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "clo3d" => Ok(Brand::Clo3d),
            "closet" | "clo-set" => Ok(Brand::Closet),
            "clovf" => Ok(Brand::Clovf),
            "md" | "marvelousdesigner" => Ok(Brand::Md),
            "allinone" => Ok(Brand::Allinone),
            _ => Err(format!("unknown brand: {s}")),
        }
    }
}

/// Content language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    Espanol,
    Japanese,
    Korean,
    Portuguese,
    Chinese,
    Taiwanese,
}

impl Language {
    pub const ALL: [Language; 7] = [
        Language::English,
        Language::Espanol,
        Language::Japanese,
        Language::Korean,
        Language::Portuguese,
        Language::Chinese,
        Language::Taiwanese,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Espanol => "Espanol",
            Language::Japanese => "Japanese",
            Language::Korean => "Korean",
            Language::Portuguese => "Portuguese",
            Language::Chinese => "Chinese",
            Language::Taiwanese => "Taiwanese",
        }
    }

    pub fn locale(&self) -> &'static str {
        match self {
            Language::English => "en-us",
            Language::Espanol => "es",
            Language::Japanese => "ja",
            Language::Korean => "ko",
            Language::Portuguese => "pt-br",
            Language::Chinese => "zh-cn",
            Language::Taiwanese => "tw",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Language::ALL
            .into_iter()
            .find(|l| l.name().to_lowercase() == wanted || l.locale() == wanted)
            .ok_or_else(|| format!("unknown language: {s}"))
    }
}

/// Kind of staged help-center content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Articles,
    Pdf,
    Posts,
}

impl ContentKind {
    pub fn dir_name(&self) -> &'static str {
        match self {
            ContentKind::Articles => "articles",
            ContentKind::Pdf => "pdf",
            ContentKind::Posts => "posts",
        }
    }
}

/// Credentials and endpoint for the hosted search service.
#[derive(Debug, Clone, Default)]
pub struct SearchCredentials {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
}

/// Credentials, endpoint and deployments for the hosted language model.
#[derive(Debug, Clone, Default)]
pub struct OpenAiCredentials {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub chat_deployment: Option<String>,
    pub embedding_deployment: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ZendeskCredentials {
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct YoutubeCredentials {
    pub api_key: Option<String>,
    pub channel_id: Option<String>,
}

pub const DEFAULT_YOUTUBE_CHANNEL: &str = "UCApF8J_2QeJ8QPXIAZ25uhw";

/// Everything a job needs to know about where it runs.
#[derive(Debug, Clone)]
pub struct Environment {
    pub stage: Stage,
    pub brand: Brand,
    pub language: Language,
    pub index_name: String,
    pub data_dir: PathBuf,
    pub search: SearchCredentials,
    pub openai: OpenAiCredentials,
    pub zendesk: ZendeskCredentials,
    pub youtube: YoutubeCredentials,
    /// Index of every brand in this stage and language, resolved once.
    brand_indexes: HashMap<Brand, String>,
}

impl Environment {
    /// Load `.env.{stage}` from `env_dir` and resolve the selection.
    ///
    /// Variables already present in the process environment win over the file.
    pub fn load(
        stage: Stage,
        brand: Brand,
        language: Language,
        env_dir: &Path,
        data_dir: &Path,
    ) -> Result<Self, ConfigError> {
        let env_file = env_dir.join(stage.env_file_name());
        if env_file.exists() {
            dotenvy::from_path(&env_file)
                .map_err(|e| ConfigError::DotenvError(format!("{}: {e}", env_file.display())))?;
            tracing::debug!(path = %env_file.display(), "loaded environment file");
        } else {
            tracing::debug!(path = %env_file.display(), "no environment file, using process environment");
        }

        Ok(Self::resolve(stage, brand, language, data_dir, |key| {
            std::env::var(key).ok().filter(|v| !v.trim().is_empty())
        }))
    }

    /// Resolve a selection against an arbitrary variable lookup.
    pub fn resolve<F>(
        stage: Stage,
        brand: Brand,
        language: Language,
        data_dir: &Path,
        lookup: F,
    ) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let search_endpoint = lookup("AZURE_SEARCH_ENDPOINT").or_else(|| {
            lookup("AZURE_SEARCH_SERVICE").map(|s| format!("https://{s}.search.windows.net"))
        });
        let openai_endpoint = lookup("AZURE_OPENAI_ENDPOINT").or_else(|| {
            lookup("AZURE_OPENAI_SERVICE").map(|s| format!("https://{s}.openai.azure.com"))
        });

        let brand_indexes: HashMap<Brand, String> = Brand::ALL
            .into_iter()
            .map(|b| (b, resolve_index_name(b, language, &lookup)))
            .collect();

        Self {
            stage,
            brand,
            language,
            index_name: resolve_index_name(brand, language, &lookup),
            data_dir: data_dir.to_path_buf(),
            search: SearchCredentials {
                endpoint: search_endpoint,
                api_key: lookup("AZURE_SEARCH_KEY"),
            },
            openai: OpenAiCredentials {
                endpoint: openai_endpoint,
                api_key: lookup("AZURE_OPENAI_KEY"),
                chat_deployment: lookup("AZURE_OPENAI_CHATGPT_DEPLOYMENT"),
                embedding_deployment: lookup("AZURE_OPENAI_EMB_DEPLOYMENT"),
            },
            zendesk: ZendeskCredentials {
                base_url: lookup("ZENDESK_BASE_URL"),
                username: lookup("ZENDESK_USERNAME"),
                password: lookup("ZENDESK_PASSWORD"),
            },
            youtube: YoutubeCredentials {
                api_key: lookup("YOUTUBE_API_KEY"),
                channel_id: lookup("YOUTUBE_CHANNEL_ID"),
            },
            brand_indexes,
        }
    }

    /// Same stage and credentials, different brand (and therefore index).
    pub fn for_brand(&self, brand: Brand) -> Self {
        if brand == self.brand {
            return self.clone();
        }
        let index_name = self
            .brand_indexes
            .get(&brand)
            .cloned()
            .unwrap_or_else(|| DEFAULT_INDEX_NAME.to_string());
        Self {
            brand,
            index_name,
            ..self.clone()
        }
    }

    /// `{data_dir}/{brand}/{kind}/{locale}`
    pub fn locale_dir(&self, kind: ContentKind) -> PathBuf {
        self.data_dir
            .join(self.brand.as_str())
            .join(kind.dir_name())
            .join(self.language.locale())
    }

    pub fn youtube_channel_dir(&self) -> PathBuf {
        self.data_dir
            .join(self.brand.as_str())
            .join("youtube")
            .join("channel")
    }

    pub fn youtube_playlist_dir(&self) -> PathBuf {
        self.data_dir
            .join(self.brand.as_str())
            .join("youtube")
            .join("playlist")
    }

    pub fn local_pdf_dir(&self) -> PathBuf {
        self.data_dir.join(self.brand.as_str()).join("local_pdf")
    }

    pub fn devdocs_dir(&self) -> PathBuf {
        self.data_dir.join("devdocs")
    }

    /// `{data_dir}/indexes/{stage}/{brand}-index-{language}.json`
    pub fn export_path(&self, stage: Stage) -> PathBuf {
        self.data_dir.join("indexes").join(stage.as_str()).join(format!(
            "{}-index-{}.json",
            self.brand.as_str(),
            self.language.name().to_lowercase()
        ))
    }

    pub fn search_endpoint(&self) -> Result<&str, ConfigError> {
        self.search
            .endpoint
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVar("AZURE_SEARCH_SERVICE".to_string()))
    }

    pub fn search_key(&self) -> Result<&str, ConfigError> {
        self.search
            .api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVar("AZURE_SEARCH_KEY".to_string()))
    }
}

fn resolve_index_name<F>(brand: Brand, language: Language, lookup: &F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let prefix = brand.as_str().to_uppercase();
    let language = language.name().to_uppercase();
    lookup(&format!("{prefix}_AZURE_SEARCH_INDEX_{language}"))
        .or_else(|| lookup(&format!("{prefix}_AZURE_SEARCH_INDEX")))
        .unwrap_or_else(|| DEFAULT_INDEX_NAME.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_language_parse_by_name_and_locale() {
        assert_eq!("english".parse::<Language>().unwrap(), Language::English);
        assert_eq!("ko".parse::<Language>().unwrap(), Language::Korean);
        assert_eq!("PT-BR".parse::<Language>().unwrap(), Language::Portuguese);
        assert!("klingon".parse::<Language>().is_err());
    }

    #[test]
    fn test_brand_hosts() {
        assert_eq!(Brand::Closet.zendesk_subdomain(), Some("clo-set"));
        assert_eq!(Brand::Md.help_center_host(), Some("support.marvelousdesigner.com"));
        assert_eq!(Brand::Allinone.zendesk_subdomain(), None);
        assert_eq!(Brand::Clovf.upload_target(), Brand::Clo3d);
        assert_eq!(Brand::Md.upload_target(), Brand::Md);
    }

    #[test]
    fn test_index_name_resolution_order() {
        let env = Environment::resolve(
            Stage::Dev,
            Brand::Closet,
            Language::Korean,
            Path::new("/data"),
            lookup_from(&[
                ("CLOSET_AZURE_SEARCH_INDEX_KOREAN", "closet-ko"),
                ("CLOSET_AZURE_SEARCH_INDEX", "closet-any"),
            ]),
        );
        assert_eq!(env.index_name, "closet-ko");

        let env = Environment::resolve(
            Stage::Dev,
            Brand::Closet,
            Language::English,
            Path::new("/data"),
            lookup_from(&[("CLOSET_AZURE_SEARCH_INDEX", "closet-any")]),
        );
        assert_eq!(env.index_name, "closet-any");

        let env = Environment::resolve(
            Stage::Dev,
            Brand::Md,
            Language::English,
            Path::new("/data"),
            lookup_from(&[]),
        );
        assert_eq!(env.index_name, DEFAULT_INDEX_NAME);
    }

    #[test]
    fn test_endpoints_from_service_names() {
        let env = Environment::resolve(
            Stage::Prod,
            Brand::Clo3d,
            Language::English,
            Path::new("/data"),
            lookup_from(&[
                ("AZURE_SEARCH_SERVICE", "kb-search"),
                ("AZURE_SEARCH_KEY", "secret"),
                ("AZURE_OPENAI_SERVICE", "kb-openai"),
            ]),
        );
        assert_eq!(env.search_endpoint().unwrap(), "https://kb-search.search.windows.net");
        assert_eq!(env.search_key().unwrap(), "secret");
        assert_eq!(
            env.openai.endpoint.as_deref(),
            Some("https://kb-openai.openai.azure.com")
        );
    }

    #[test]
    fn test_missing_search_key_is_reported() {
        let env = Environment::resolve(
            Stage::Dev,
            Brand::Clo3d,
            Language::English,
            Path::new("/data"),
            lookup_from(&[]),
        );
        assert!(matches!(env.search_key(), Err(ConfigError::MissingVar(_))));
    }

    #[test]
    fn test_for_brand_uses_resolved_variables() {
        let env = Environment::resolve(
            Stage::Prod,
            Brand::Clovf,
            Language::English,
            Path::new("/data"),
            lookup_from(&[
                ("CLOVF_AZURE_SEARCH_INDEX", "clovf-index"),
                ("CLO3D_AZURE_SEARCH_INDEX_ENGLISH", "clo3d-en"),
                ("AZURE_SEARCH_KEY", "secret"),
            ]),
        );
        assert_eq!(env.index_name, "clovf-index");

        let upload = env.for_brand(env.brand.upload_target());
        assert_eq!(upload.brand, Brand::Clo3d);
        assert_eq!(upload.index_name, "clo3d-en");
        assert_eq!(upload.stage, Stage::Prod);
        assert_eq!(upload.search_key().unwrap(), "secret");

        let md = env.for_brand(Brand::Md);
        assert_eq!(md.index_name, DEFAULT_INDEX_NAME);
    }

    #[test]
    fn test_paths() {
        let env = Environment::resolve(
            Stage::Prod,
            Brand::Closet,
            Language::Japanese,
            Path::new("/data"),
            lookup_from(&[]),
        );
        assert_eq!(
            env.locale_dir(ContentKind::Articles),
            PathBuf::from("/data/closet/articles/ja")
        );
        assert_eq!(
            env.export_path(Stage::Dev),
            PathBuf::from("/data/indexes/dev/closet-index-japanese.json")
        );
        assert_eq!(
            env.youtube_channel_dir(),
            PathBuf::from("/data/closet/youtube/channel")
        );
    }
}
