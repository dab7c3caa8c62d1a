use crate::embeddings::Embedder;
use crate::stores::{LocalIndex, RemoteConfig, RemoteIndex};
use crate::traits::VectorIndex;
use crate::{Chunk, SearchError, SearchHit};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub const SNAPSHOT_FILE: &str = "vector_store.json";

#[derive(Debug, Clone, Default)]
pub struct StoreConfig {
    /// Where the local snapshot lives. `None` keeps it in memory only.
    pub snapshot_path: Option<PathBuf>,
    pub remote: Option<RemoteConfig>,
}

impl StoreConfig {
    pub fn local(snapshot_path: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_path: Some(snapshot_path.into()),
            remote: None,
        }
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn with_remote(mut self, remote: Option<RemoteConfig>) -> Self {
        self.remote = remote;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    Local,
    RemoteBacked,
}

/// Which tier ended up holding an added batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Empty,
    Remote,
    Local,
    LocalFallback,
}

enum Backend {
    Local,
    Remote(Box<dyn VectorIndex>),
}

struct StoreState {
    local: LocalIndex,
    dimensions: Option<usize>,
    next_remote_id: u64,
}

impl StoreState {
    fn check_dimensions(&mut self, found: usize) -> Result<(), SearchError> {
        match self.dimensions {
            Some(expected) if expected != found => {
                Err(SearchError::DimensionMismatch { expected, found })
            }
            Some(_) => Ok(()),
            None => {
                self.dimensions = Some(found);
                Ok(())
            }
        }
    }
}

/// Holds chunk embeddings and answers similarity queries. A remote-backed
/// store sends batches and queries to the remote index and keeps anything the
/// remote rejects in the local snapshot; a local store only uses the snapshot.
///
/// `writer` serialises whole `add` calls. `state` is only held for short
/// local reads and writes, never across a remote request.
pub struct VectorStore {
    embedder: Arc<dyn Embedder>,
    backend: Backend,
    writer: Mutex<()>,
    state: Mutex<StoreState>,
}

impl VectorStore {
    /// Opens the snapshot eagerly and picks the backend from `config`.
    pub fn open(config: StoreConfig, embedder: Arc<dyn Embedder>) -> Result<Self, SearchError> {
        let local = match &config.snapshot_path {
            Some(path) => LocalIndex::open(path),
            None => LocalIndex::in_memory(),
        };

        match &config.remote {
            Some(remote) => {
                let index = RemoteIndex::new(remote)?;
                info!(
                    url = %remote.base_url,
                    records = local.len(),
                    "opened remote-backed vector store"
                );
                Ok(Self::remote_backed(local, Box::new(index), embedder))
            }
            None => {
                info!(records = local.len(), "opened local vector store");
                Ok(Self::local(local, embedder))
            }
        }
    }

    pub fn local(local: LocalIndex, embedder: Arc<dyn Embedder>) -> Self {
        Self::with_backend(local, Backend::Local, embedder)
    }

    pub fn remote_backed(
        local: LocalIndex,
        remote: Box<dyn VectorIndex>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        Self::with_backend(local, Backend::Remote(remote), embedder)
    }

    fn with_backend(local: LocalIndex, backend: Backend, embedder: Arc<dyn Embedder>) -> Self {
        let state = StoreState {
            dimensions: local.dimensions(),
            next_remote_id: local.len() as u64,
            local,
        };
        Self {
            embedder,
            backend,
            writer: Mutex::new(()),
            state: Mutex::new(state),
        }
    }

    pub fn mode(&self) -> StoreMode {
        match self.backend {
            Backend::Local => StoreMode::Local,
            Backend::Remote(_) => StoreMode::RemoteBacked,
        }
    }

    /// Number of records held in the local snapshot.
    pub async fn len(&self) -> usize {
        self.state.lock().await.local.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.local.is_empty()
    }

    pub async fn dimensions(&self) -> Option<usize> {
        self.state.lock().await.dimensions
    }

    pub async fn add(&self, chunks: &[Chunk]) -> Result<AddOutcome, SearchError> {
        if chunks.is_empty() {
            return Ok(AddOutcome::Empty);
        }

        let texts = chunks
            .iter()
            .map(|chunk| chunk.text.clone())
            .collect::<Vec<_>>();
        let embeddings = self.embed_checked(&texts).await?;

        let dimensions = embeddings.first().map(Vec::len);
        let _writer = self.writer.lock().await;

        let remote = match &self.backend {
            Backend::Local => {
                let mut state = self.state.lock().await;
                if let Some(found) = dimensions {
                    state.check_dimensions(found)?;
                }
                state.local.append(chunks, &embeddings)?;
                info!(
                    count = chunks.len(),
                    total = state.local.len(),
                    "added batch to local store"
                );
                return Ok(AddOutcome::Local);
            }
            Backend::Remote(remote) => remote,
        };

        let first_id = {
            let mut state = self.state.lock().await;
            if let Some(found) = dimensions {
                state.check_dimensions(found)?;
            }
            let first_id = state.next_remote_id;
            state.next_remote_id += chunks.len() as u64;
            first_id
        };

        match remote.index_vector_chunks(first_id, chunks, &embeddings).await {
            Ok(()) => {
                info!(
                    backend = remote.backend(),
                    count = chunks.len(),
                    "added batch to remote store"
                );
                Ok(AddOutcome::Remote)
            }
            Err(error) => {
                warn!(
                    backend = remote.backend(),
                    %error,
                    count = chunks.len(),
                    "remote upsert failed, keeping batch in local snapshot"
                );
                self.state.lock().await.local.append(chunks, &embeddings)?;
                Ok(AddOutcome::LocalFallback)
            }
        }
    }

    pub async fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::InvalidArgument("query is empty".to_string()));
        }

        let query_vector = self
            .embed_checked(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .unwrap_or_default();

        if top_k == 0 {
            return Ok(Vec::new());
        }

        if let Some(expected) = self.state.lock().await.dimensions {
            if expected != query_vector.len() {
                return Err(SearchError::DimensionMismatch {
                    expected,
                    found: query_vector.len(),
                });
            }
        }

        if let Backend::Remote(remote) = &self.backend {
            match remote.search_vector(&query_vector, top_k).await {
                Ok(mut hits) => {
                    hits.truncate(top_k);
                    return Ok(hits);
                }
                Err(error) => {
                    warn!(
                        backend = remote.backend(),
                        %error,
                        "remote query failed, searching local snapshot"
                    );
                }
            }
        }

        self.state.lock().await.local.search(&query_vector, top_k)
    }

    async fn embed_checked(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        let embeddings = self.embedder.embed(texts).await?;
        if embeddings.len() != texts.len() {
            return Err(SearchError::BackendResponse {
                backend: self.embedder.name().to_string(),
                details: format!(
                    "expected {} embeddings, received {}",
                    texts.len(),
                    embeddings.len()
                ),
            });
        }

        if let Some(first) = embeddings.first() {
            if let Some(bad) = embeddings.iter().find(|vector| vector.len() != first.len()) {
                return Err(SearchError::DimensionMismatch {
                    expected: first.len(),
                    found: bad.len(),
                });
            }
        }

        Ok(embeddings)
    }
}
