use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

pub type Metadata = Map<String, Value>;

pub const FILENAME_KEY: &str = "filename";

/// A bounded window of a source file, the unit that gets embedded and ranked.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    pub text: String,
    pub metadata: Metadata,
}

impl Chunk {
    pub fn new(text: impl Into<String>, metadata: Metadata) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }

    /// Builds a chunk whose metadata only carries the file it was cut from.
    /// Paths are stored with `/` separators regardless of platform.
    pub fn from_file(text: impl Into<String>, relative_path: &Path) -> Self {
        let filename = relative_path
            .components()
            .map(|component| component.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        let mut metadata = Metadata::new();
        metadata.insert(FILENAME_KEY.to_string(), Value::String(filename));
        Self::new(text, metadata)
    }

    pub fn filename(&self) -> Option<&str> {
        filename_of(&self.metadata)
    }
}

pub fn filename_of(metadata: &Metadata) -> Option<&str> {
    metadata.get(FILENAME_KEY).and_then(Value::as_str)
}

/// One ranked result. `score` is a similarity: higher is closer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    pub text: String,
    pub metadata: Metadata,
    pub score: f64,
}

impl SearchHit {
    pub fn filename(&self) -> Option<&str> {
        filename_of(&self.metadata)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestionOptions {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub extensions: Vec<String>,
    pub excluded_dirs: Vec<String>,
    pub max_file_bytes: u64,
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            chunk_overlap: 50,
            extensions: ["py", "js", "ts", "java", "rs", "go", "html", "css", "md"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            excluded_dirs: [".git", "node_modules", "__pycache__", "target", ".venv"]
                .into_iter()
                .map(str::to_string)
                .collect(),
            max_file_bytes: 1024 * 1024,
        }
    }
}

impl IngestionOptions {
    pub fn with_chunking(mut self, chunk_size: usize, chunk_overlap: usize) -> Self {
        self.chunk_size = chunk_size;
        self.chunk_overlap = chunk_overlap;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn chunk_from_file_uses_forward_slashes() {
        let path: PathBuf = ["src", "lib", "x.py"].iter().collect();
        let chunk = Chunk::from_file("def f(): pass", &path);
        assert_eq!(chunk.filename(), Some("src/lib/x.py"));
    }

    #[test]
    fn default_options_exclude_vcs_and_dependency_dirs() {
        let options = IngestionOptions::default();
        for dir in [".git", "node_modules", "__pycache__"] {
            assert!(options.excluded_dirs.iter().any(|item| item == dir));
        }
        assert!(options.chunk_overlap < options.chunk_size);
    }
}
