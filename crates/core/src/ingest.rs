use crate::chunking::{split_text, ChunkingConfig};
use crate::repository::{acquire_repository, RepositoryLocation};
use crate::store::{AddOutcome, VectorStore};
use crate::{Chunk, IngestError, IngestionOptions};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::{DirEntry, WalkDir};

pub fn discover_source_files(root: &Path, options: &IngestionOptions) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| !is_excluded(entry, root, &options.excluded_dirs))
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let included = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                options
                    .extensions
                    .iter()
                    .any(|wanted| wanted.trim_start_matches('.').eq_ignore_ascii_case(ext))
            });

        if included {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

fn is_excluded(entry: &DirEntry, root: &Path, excluded_dirs: &[String]) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let Ok(relative) = entry.path().strip_prefix(root) else {
        return false;
    };
    relative.components().any(|component| {
        let segment = component.as_os_str().to_string_lossy();
        excluded_dirs.iter().any(|dir| dir.as_str() == segment)
    })
}

pub fn read_source_file(path: &Path, max_bytes: u64) -> Result<String, IngestError> {
    let size = fs::metadata(path)?.len();
    if size > max_bytes {
        return Err(IngestError::TooLarge {
            path: path.display().to_string(),
            limit: max_bytes,
        });
    }

    let bytes = fs::read(path)?;
    String::from_utf8(bytes).map_err(|_| IngestError::NotText(path.display().to_string()))
}

#[derive(Debug)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct IngestionReport {
    pub chunks: Vec<Chunk>,
    pub files_read: usize,
    pub skipped_files: Vec<SkippedFile>,
}

/// Chunks every matching file under `root`. Files that cannot be read as
/// text are reported and skipped.
pub fn collect_chunks(
    root: &Path,
    options: &IngestionOptions,
) -> Result<IngestionReport, IngestError> {
    let config = ChunkingConfig::from(options);
    config.validate()?;

    let mut report = IngestionReport::default();

    for path in discover_source_files(root, options) {
        let file_chunks = (|| {
            let relative = path
                .strip_prefix(root)
                .map_err(|_| IngestError::OutsideRoot(path.display().to_string()))?;
            let text = read_source_file(&path, options.max_file_bytes)?;
            let chunks = split_text(&text, config)?
                .into_iter()
                .map(|piece| Chunk::from_file(piece, relative))
                .collect::<Vec<_>>();
            Ok::<_, IngestError>(chunks)
        })();

        match file_chunks {
            Ok(chunks) => {
                debug!(path = %path.display(), chunk_count = chunks.len(), "chunked file");
                report.files_read += 1;
                report.chunks.extend(chunks);
            }
            Err(error) => report.skipped_files.push(SkippedFile {
                path,
                reason: error.to_string(),
            }),
        }
    }

    Ok(report)
}

#[derive(Debug)]
pub struct IngestionSummary {
    pub chunk_count: usize,
    pub files_read: usize,
    pub skipped_files: Vec<SkippedFile>,
    pub outcome: AddOutcome,
}

/// Chunks the tree under `root` and adds everything to `store` in a single
/// batch. Finding nothing to index is not an error.
pub async fn index_directory(
    root: &Path,
    options: &IngestionOptions,
    store: &VectorStore,
) -> Result<IngestionSummary, IngestError> {
    if !root.is_dir() {
        return Err(IngestError::InvalidArgument(format!(
            "not a directory: {}",
            root.display()
        )));
    }

    let report = collect_chunks(root, options)?;
    for skipped in &report.skipped_files {
        warn!(path = %skipped.path.display(), reason = %skipped.reason, "skipped file");
    }

    let chunk_count = report.chunks.len();
    if chunk_count == 0 {
        info!(root = %root.display(), "no readable source files to index");
    }
    let outcome = store.add(&report.chunks).await?;

    info!(
        root = %root.display(),
        chunk_count,
        files_read = report.files_read,
        skipped = report.skipped_files.len(),
        "indexed directory"
    );

    Ok(IngestionSummary {
        chunk_count,
        files_read: report.files_read,
        skipped_files: report.skipped_files,
        outcome,
    })
}

/// Resolves `location` to a local checkout under `work_dir` and indexes it.
pub async fn index_repository(
    location: &str,
    work_dir: &Path,
    options: &IngestionOptions,
    store: &VectorStore,
) -> Result<IngestionSummary, IngestError> {
    let location = RepositoryLocation::parse(location)?;
    let root = acquire_repository(&location, work_dir).await?;
    index_directory(&root, options, store).await
}
