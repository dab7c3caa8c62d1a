pub mod chunking;
pub mod embeddings;
pub mod error;
pub mod ingest;
pub mod models;
pub mod repository;
pub mod retrieval;
pub mod store;
pub mod stores;
pub mod traits;

pub use chunking::{split_text, ChunkingConfig};
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, OpenAiConfig, OpenAiEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{IngestError, SearchError};
pub use ingest::{
    collect_chunks, discover_source_files, index_directory, index_repository, IngestionReport,
    IngestionSummary, SkippedFile,
};
pub use models::{Chunk, IngestionOptions, Metadata, SearchHit};
pub use repository::{acquire_repository, RepositoryLocation};
pub use retrieval::{AnswerComposer, ChatComposer, Retriever, SnippetComposer, NO_RESULTS_ANSWER};
pub use store::{AddOutcome, StoreConfig, StoreMode, VectorStore, SNAPSHOT_FILE};
pub use stores::{LocalIndex, RemoteConfig, RemoteIndex};
pub use traits::VectorIndex;
