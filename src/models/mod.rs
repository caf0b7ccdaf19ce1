mod config;
mod document;
mod environment;
mod records;
mod report;
mod schema;
mod search;

pub use config::{
    CONFIG_DIR_NAME, CONFIG_FILE_NAME, Config, DEFAULT_DEVDOCS_URL, DEFAULT_EMBEDDING_DIMENSIONS,
    DEFAULT_OPENAI_API_VERSION, DEFAULT_SEARCH_API_VERSION, DevDocsConfig, OpenAiConfig,
    PROJECT_CONFIG_DIR, PathsConfig, ResolvedConfig, RetrySettings, SearchServiceConfig,
    WorkersConfig, YoutubeConfig, ZendeskConfig,
};
pub use document::{ActionKind, IndexAction, IndexingResult, KEY_FIELD, SearchDocument};
pub use environment::{
    Brand, ContentKind, DEFAULT_INDEX_NAME, DEFAULT_YOUTUBE_CHANNEL, Environment, Language,
    OpenAiCredentials, SearchCredentials, Stage, YoutubeCredentials, ZendeskCredentials,
};
pub use records::{
    ArticleRecord, CommentRecord, DevDoc, PdfRecord, PostRecord, TranscriptRecord, stable_id,
};
pub use report::{Failure, RunReport};
pub use schema::{
    FieldDefinition, IndexDefinition, SEMANTIC_CONFIG, SUGGESTER_NAME, VECTOR_FIELDS,
    VECTOR_PROFILE, default_schema,
};
pub use search::{
    OutputFormat, QueryKind, SearchHit, SearchMode, SearchPage, SearchRequest, VectorQuery,
};
