use crate::answer::{keyword_answer, llm_answer, retrieval_answer, simulated_answer};
use crate::cache::{cache_key, IndexCache};
use crate::chunking::{chunk_documents, ChunkingConfig};
use crate::error::SessionError;
use crate::index::ChunkIndex;
use crate::models::{Answer, AnswerMode, Document, QueryResult, RetrievalOptions};
use crate::retriever::{retrieve, RetrievalLimits};
use crate::traits::ChatModel;
use tracing::{info, warn};
use uuid::Uuid;

/// Where a session's current index came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrigin {
    Built,
    Cache,
}

/// Documents loaded for one interaction, the index built over them, and the
/// optional chat model used for llm answers.
pub struct QaSession<M> {
    id: Uuid,
    options: RetrievalOptions,
    documents: Vec<Document>,
    index: Option<ChunkIndex>,
    model: Option<M>,
    cache: Option<IndexCache>,
}

impl<M> QaSession<M>
where
    M: ChatModel,
{
    pub fn new(options: RetrievalOptions) -> Result<Self, SessionError> {
        options.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            options,
            documents: Vec::new(),
            index: None,
            model: None,
            cache: None,
        })
    }

    pub fn with_chat_model(mut self, model: M) -> Self {
        self.model = Some(model);
        self
    }

    pub fn with_cache(mut self, cache: IndexCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn options(&self) -> &RetrievalOptions {
        &self.options
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn index(&self) -> Option<&ChunkIndex> {
        self.index.as_ref()
    }

    /// Adds a document; the current index no longer covers the set and is dropped.
    pub fn add_document(&mut self, document: Document) {
        self.documents.push(document);
        self.index = None;
    }

    pub fn add_documents(&mut self, documents: impl IntoIterator<Item = Document>) {
        for document in documents {
            self.add_document(document);
        }
    }

    /// Chunks every document and replaces the index with a freshly built one.
    pub fn build_index(&mut self) -> Result<IndexOrigin, SessionError> {
        if self.documents.is_empty() {
            return Err(SessionError::NoDocuments);
        }

        let key = cache_key(&self.documents, &self.options);
        if let Some(cached) = self.cache.as_ref().and_then(|cache| cache.load(&key)) {
            info!(session = %self.id, chunks = cached.len(), "loaded index from cache");
            self.index = Some(cached);
            return Ok(IndexOrigin::Cache);
        }

        let config = ChunkingConfig::try_from(&self.options)?;
        let chunks = chunk_documents(&self.documents, config);
        let index = ChunkIndex::build(chunks, &self.options.vectorizer)?;

        info!(
            session = %self.id,
            documents = self.documents.len(),
            chunks = index.len(),
            vocabulary = index.vectorizer().vocabulary_size(),
            "built index"
        );

        if let Some(cache) = &self.cache {
            if let Err(error) = cache.store(&key, &index) {
                warn!(session = %self.id, %error, "failed to write index cache");
            }
        }

        self.index = Some(index);
        Ok(IndexOrigin::Built)
    }

    pub fn retrieve(&self, question: &str) -> Result<QueryResult, SessionError> {
        let index = self.index.as_ref().ok_or(SessionError::IndexNotBuilt)?;
        Ok(retrieve(index, question, RetrievalLimits::from(&self.options))?)
    }

    pub async fn ask(&self, question: &str, mode: AnswerMode) -> Result<Answer, SessionError> {
        if self.documents.is_empty() {
            return Err(SessionError::NoDocuments);
        }

        let answer = match mode {
            AnswerMode::Keyword => keyword_answer(&self.documents, question),
            AnswerMode::Simulated => simulated_answer(&self.documents, question),
            AnswerMode::Retrieval => retrieval_answer(&self.retrieve(question)?),
            AnswerMode::Llm => {
                let model = self.model.as_ref().ok_or(SessionError::ModelNotConfigured)?;
                let result = self.retrieve(question)?;
                llm_answer(model, &result).await?
            }
        };

        info!(
            session = %self.id,
            mode = ?mode,
            sources = answer.sources.len(),
            "answered question"
        );
        Ok(answer)
    }
}
