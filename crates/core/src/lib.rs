pub mod answer;
pub mod cache;
pub mod chunking;
pub mod download;
pub mod error;
pub mod extractor;
pub mod index;
pub mod ingest;
pub mod models;
pub mod retriever;
pub mod session;
pub mod traits;
pub mod vectorizer;

pub use answer::{
    build_prompt, keyword_answer, llm_answer, retrieval_answer, simulated_answer,
    ChatModelConfig, OpenAiChatClient,
};
pub use cache::{cache_key, IndexCache};
pub use chunking::{chunk_document, chunk_documents, normalize_whitespace, split_text, ChunkingConfig};
pub use download::{resolve_download_url, Downloader};
pub use error::{AnswerError, IndexError, IngestError, SearchError, SessionError};
pub use extractor::{extract_bytes, extract_document, PageText, PdfExtractor, SourceFormat};
pub use index::{ChunkIndex, Neighbor};
pub use ingest::{
    discover_documents, load_documents_best_effort, load_folder_documents, IngestionReport,
    SkippedFile,
};
pub use models::{
    Answer, AnswerMode, Chunk, Document, QueryResult, RetrievalOptions, RetrievedChunk,
    VectorizerConfig,
};
pub use retriever::{retrieve, RetrievalLimits};
pub use session::{IndexOrigin, QaSession};
pub use traits::{ChatMessage, ChatModel};
pub use vectorizer::{SparseVector, TfidfVectorizer};
