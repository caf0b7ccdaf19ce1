pub mod openai;
pub mod pool;
pub mod search_index;
pub mod staging;
pub mod uploader;

pub use openai::{AzureOpenAiClient, LanguageModel, parse_labels};
pub use pool::{PoolReport, WorkerPool};
pub use search_index::{AzureSearchClient, IndexStats, SearchIndex, UploadSummary};
pub use staging::{PageStore, read_json, write_json};
pub use uploader::{Uploader, Vectorizer};
