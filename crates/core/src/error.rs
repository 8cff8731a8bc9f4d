use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("pdf parse error: {0}")]
    PdfParse(String),

    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("no text could be extracted from {0}")]
    EmptyDocument(String),

    #[error("path has no file name: {0}")]
    MissingFileName(String),

    #[error("invalid chunking config: {0}")]
    InvalidChunkConfig(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("download of {url} failed: {details}")]
    Download { url: String, details: String },

    #[error("multimodal OCR failed: {0}")]
    OcrFailed(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    #[error("cannot build an index over an empty chunk collection")]
    EmptyCorpus,

    #[error("no indexable terms found in {chunks} chunk(s)")]
    EmptyVocabulary { chunks: usize },
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("query is empty")]
    EmptyQuery,
}

#[derive(Debug, Error)]
pub enum AnswerError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid response from {backend}: {details}")]
    BackendResponse { backend: String, details: String },

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("completion returned no content")]
    EmptyCompletion,

    #[error("missing api key for {0}")]
    MissingApiKey(String),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no documents loaded")]
    NoDocuments,

    #[error("index has not been built yet")]
    IndexNotBuilt,

    #[error("no chat model configured for llm answers")]
    ModelNotConfigured,

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Search(#[from] SearchError),

    #[error(transparent)]
    Answer(#[from] AnswerError),
}
