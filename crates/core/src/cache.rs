use crate::index::ChunkIndex;
use crate::models::{Document, RetrievalOptions};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Best-effort on-disk store of built indexes, one JSON file per key.
///
/// Missing or unreadable entries simply mean the index is rebuilt.
#[derive(Debug, Clone)]
pub struct IndexCache {
    dir: PathBuf,
}

impl IndexCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    pub fn load(&self, key: &str) -> Option<ChunkIndex> {
        let path = self.entry_path(key);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return None,
            Err(error) => {
                warn!(path = %path.display(), %error, "index cache unreadable");
                return None;
            }
        };

        match serde_json::from_slice::<ChunkIndex>(&raw) {
            Ok(index) if index.is_consistent() => {
                debug!(path = %path.display(), "index cache hit");
                Some(index)
            }
            Ok(_) => {
                warn!(path = %path.display(), "index cache entry inconsistent, ignoring");
                None
            }
            Err(error) => {
                warn!(path = %path.display(), %error, "index cache entry corrupt, ignoring");
                None
            }
        }
    }

    pub fn store(&self, key: &str, index: &ChunkIndex) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.entry_path(key);
        let staging = self.dir.join(format!("{key}.json.tmp"));

        let encoded = serde_json::to_vec(index).map_err(io::Error::other)?;
        fs::write(&staging, encoded)?;
        fs::rename(&staging, &path)?;
        debug!(path = %path.display(), "index cache stored");
        Ok(())
    }
}

/// Key over the options that shape the index and every document's content.
pub fn cache_key(documents: &[Document], options: &RetrievalOptions) -> String {
    let mut hasher = Sha256::new();
    hasher.update(options.chunk_size.to_le_bytes());
    hasher.update(options.chunk_overlap.to_le_bytes());
    hasher.update(
        options
            .vectorizer
            .max_features
            .unwrap_or(usize::MAX)
            .to_le_bytes(),
    );
    hasher.update([
        u8::from(options.vectorizer.include_bigrams),
        u8::from(options.vectorizer.remove_stop_words),
    ]);

    for document in documents {
        hasher.update(document.name.as_bytes());
        hasher.update([0u8]);
        hasher.update(document.checksum.as_bytes());
    }

    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::{chunk_documents, ChunkingConfig};
    use tempfile::tempdir;

    fn documents() -> Vec<Document> {
        vec![
            Document::new("a.txt", "a.txt", "Hydraulic pumps raise loop pressure."),
            Document::new("b.txt", "b.txt", "Budget approved by the committee."),
        ]
    }

    fn build_index(documents: &[Document]) -> ChunkIndex {
        let config = ChunkingConfig::new(200, 20).expect("config");
        ChunkIndex::build(chunk_documents(documents, config), &Default::default()).expect("index")
    }

    #[test]
    fn missing_entry_is_a_miss() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let cache = IndexCache::new(dir.path());
        assert!(cache.load("absent").is_none());
        Ok(())
    }

    #[test]
    fn stored_index_is_loaded_back() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let cache = IndexCache::new(dir.path().join("nested"));
        let docs = documents();
        let index = build_index(&docs);
        let key = cache_key(&docs, &RetrievalOptions::default());

        cache.store(&key, &index)?;
        let loaded = cache.load(&key).expect("cache hit");

        assert_eq!(loaded.len(), index.len());
        assert_eq!(loaded.chunks(), index.chunks());
        Ok(())
    }

    #[test]
    fn corrupt_entry_is_ignored() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let cache = IndexCache::new(dir.path());
        fs::write(dir.path().join("broken.json"), b"{not json")?;
        assert!(cache.load("broken").is_none());
        Ok(())
    }

    #[test]
    fn inconsistent_entry_is_ignored() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let cache = IndexCache::new(dir.path());
        let docs = documents();
        let key = cache_key(&docs, &RetrievalOptions::default());

        let mut encoded = serde_json::to_value(build_index(&docs))?;
        encoded["vectorizer"]["idf"] = serde_json::json!([]);
        fs::write(dir.path().join(format!("{key}.json")), serde_json::to_vec(&encoded)?)?;

        assert!(cache.load(&key).is_none());
        Ok(())
    }

    #[test]
    fn entry_with_missing_vectors_is_ignored() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let cache = IndexCache::new(dir.path());
        let docs = documents();
        let key = cache_key(&docs, &RetrievalOptions::default());

        let mut encoded = serde_json::to_value(build_index(&docs))?;
        encoded["vectors"] = serde_json::json!([]);
        fs::write(dir.path().join(format!("{key}.json")), serde_json::to_vec(&encoded)?)?;

        assert!(cache.load(&key).is_none());
        Ok(())
    }

    #[test]
    fn key_depends_on_content_and_options() {
        let docs = documents();
        let options = RetrievalOptions::default();
        let base = cache_key(&docs, &options);

        assert_eq!(base, cache_key(&docs, &options));

        let changed_options = RetrievalOptions {
            chunk_size: 500,
            ..RetrievalOptions::default()
        };
        assert_ne!(base, cache_key(&docs, &changed_options));

        let mut changed_docs = docs.clone();
        changed_docs[1] = Document::new("b.txt", "b.txt", "Budget rejected.");
        assert_ne!(base, cache_key(&changed_docs, &options));
    }
}
