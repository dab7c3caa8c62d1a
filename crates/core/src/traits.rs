use crate::{Chunk, SearchError, SearchHit};
use async_trait::async_trait;

/// A vector backend that can take a batch of embedded chunks and answer
/// top-k similarity queries.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn backend(&self) -> &str;

    /// Stores `chunks[i]` under id `first_id + i` with vector `embeddings[i]`.
    async fn index_vector_chunks(
        &self,
        first_id: u64,
        chunks: &[Chunk],
        embeddings: &[Vec<f32>],
    ) -> Result<(), SearchError>;

    async fn search_vector(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>, SearchError>;
}
