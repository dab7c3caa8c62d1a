use crate::models::Metadata;
use crate::{Chunk, SearchError, SearchHit};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const NORM_EPSILON: f64 = 1e-12;

/// On-disk layout: three parallel arrays, index `i` across them is one record.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Snapshot {
    #[serde(default)]
    chunks: Vec<String>,
    #[serde(default)]
    metadatas: Vec<Metadata>,
    #[serde(default)]
    vectors: Vec<Vec<f32>>,
}

impl Snapshot {
    fn validate(&self) -> Result<(), SearchError> {
        if self.chunks.len() != self.metadatas.len() || self.chunks.len() != self.vectors.len() {
            return Err(SearchError::Snapshot(format!(
                "arrays differ in length: chunks={} metadatas={} vectors={}",
                self.chunks.len(),
                self.metadatas.len(),
                self.vectors.len()
            )));
        }

        if let Some(first) = self.vectors.first() {
            if let Some(bad) = self.vectors.iter().find(|vector| vector.len() != first.len()) {
                return Err(SearchError::DimensionMismatch {
                    expected: first.len(),
                    found: bad.len(),
                });
            }
        }

        Ok(())
    }

    fn truncate(&mut self, len: usize) {
        self.chunks.truncate(len);
        self.metadatas.truncate(len);
        self.vectors.truncate(len);
    }
}

/// In-process index backed by a JSON snapshot that is rewritten in full after
/// every append. Not safe for concurrent writers; callers hold a lock.
#[derive(Debug, Default)]
pub struct LocalIndex {
    path: Option<PathBuf>,
    snapshot: Snapshot,
}

impl LocalIndex {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Loads the snapshot at `path`, or starts empty if it is missing.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, SearchError> {
        let path = path.into();
        let snapshot = if path.exists() {
            let bytes = fs::read(&path)?;
            let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
            snapshot.validate()?;
            snapshot
        } else {
            Snapshot::default()
        };

        debug!(path = %path.display(), records = snapshot.chunks.len(), "loaded local snapshot");
        Ok(Self {
            path: Some(path),
            snapshot,
        })
    }

    /// Like [`LocalIndex::load`], but an unreadable snapshot is logged and
    /// replaced by an empty one on the next write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match Self::load(&path) {
            Ok(index) => index,
            Err(error) => {
                warn!(path = %path.display(), %error, "discarding unreadable local snapshot");
                Self {
                    path: Some(path),
                    snapshot: Snapshot::default(),
                }
            }
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.snapshot.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.chunks.is_empty()
    }

    pub fn dimensions(&self) -> Option<usize> {
        self.snapshot.vectors.first().map(Vec::len)
    }

    /// Appends records and rewrites the snapshot. On a failed write the
    /// in-memory state is rolled back so memory and disk agree.
    pub fn append(
        &mut self,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), SearchError> {
        if chunks.len() != embeddings.len() {
            return Err(SearchError::Request(format!(
                "embedding count {} doesn't match chunk count {}",
                embeddings.len(),
                chunks.len()
            )));
        }

        let expected = self
            .dimensions()
            .or_else(|| embeddings.first().map(Vec::len));
        if let Some(expected) = expected {
            if let Some(bad) = embeddings.iter().find(|vector| vector.len() != expected) {
                return Err(SearchError::DimensionMismatch {
                    expected,
                    found: bad.len(),
                });
            }
        }

        let previous_len = self.len();
        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            self.snapshot.chunks.push(chunk.text.clone());
            self.snapshot.metadatas.push(chunk.metadata.clone());
            self.snapshot.vectors.push(embedding.clone());
        }

        if let Err(error) = self.persist() {
            self.snapshot.truncate(previous_len);
            return Err(error);
        }
        Ok(())
    }

    /// Writes to a sibling temporary file, then renames it over the snapshot.
    pub fn persist(&self) -> Result<(), SearchError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut temporary = path.clone().into_os_string();
        temporary.push(".tmp");
        let temporary = PathBuf::from(temporary);

        fs::write(&temporary, serde_json::to_vec(&self.snapshot)?)?;
        fs::rename(&temporary, path)?;
        debug!(path = %path.display(), records = self.len(), "persisted local snapshot");
        Ok(())
    }

    /// Ranks every record by cosine similarity to `query_vector`. Equal scores
    /// keep insertion order.
    pub fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        if self.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        if let Some(expected) = self.dimensions() {
            if expected != query_vector.len() {
                return Err(SearchError::DimensionMismatch {
                    expected,
                    found: query_vector.len(),
                });
            }
        }

        let mut scored = self
            .snapshot
            .vectors
            .iter()
            .enumerate()
            .map(|(index, vector)| (index, cosine_similarity(query_vector, vector)))
            .collect::<Vec<_>>();

        scored.sort_by(|left, right| right.1.total_cmp(&left.1));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(index, score)| SearchHit {
                text: self.snapshot.chunks[index].clone(),
                metadata: self.snapshot.metadatas[index].clone(),
                score,
            })
            .collect())
    }
}

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> f64 {
    let (dot, left_norm, right_norm) = left.iter().zip(right).fold(
        (0f64, 0f64, 0f64),
        |(dot, left_norm, right_norm), (&a, &b)| {
            let (a, b) = (f64::from(a), f64::from(b));
            (dot + a * b, left_norm + a * a, right_norm + b * b)
        },
    );
    dot / (left_norm.sqrt() * right_norm.sqrt() + NORM_EPSILON)
}
