use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use coderag_core::embeddings::DEFAULT_OPENAI_BASE_URL;
use coderag_core::retrieval::DEFAULT_TOP_K;
use coderag_core::{
    index_repository, AnswerComposer, CharacterNgramEmbedder, ChatComposer, Embedder,
    IngestionOptions, OpenAiConfig, OpenAiEmbedder, RemoteConfig, Retriever, SnippetComposer,
    StoreConfig, VectorStore, SNAPSHOT_FILE,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "coderag", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory holding the local snapshot and any cloned checkout
    #[arg(long, env = "CODERAG_WORK_DIR", default_value = "repo")]
    work_dir: PathBuf,

    /// Remote vector database base URL
    #[arg(long, env = "ENDEE_URL")]
    endee_url: Option<String>,

    /// Remote vector database API key
    #[arg(long, env = "ENDEE_API_KEY", hide_env_values = true)]
    endee_api_key: Option<String>,

    /// API key for hosted embeddings and chat
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, env = "OPENAI_BASE_URL", default_value = DEFAULT_OPENAI_BASE_URL)]
    openai_base_url: String,

    /// Which embedder turns text into vectors
    #[arg(long, value_enum, default_value_t = EmbedderKind::Openai)]
    embedder: EmbedderKind,
}

#[derive(Clone, Copy, ValueEnum)]
enum EmbedderKind {
    /// Hosted OpenAI-compatible embeddings
    Openai,
    /// Local character trigram hashing, no network
    Ngram,
}

#[derive(Clone, Copy, ValueEnum)]
enum ComposerKind {
    /// Numbered list of the retrieved snippets
    Snippets,
    /// Hosted chat model grounded on the snippets
    Chat,
}

#[derive(Subcommand)]
enum Command {
    /// Clone or refresh a repository (or use a local directory) and index it.
    Index {
        /// Git URL or local directory
        #[arg(long)]
        repo: String,
        /// Maximum characters per chunk
        #[arg(long, default_value = "500")]
        chunk_size: usize,
        /// Characters shared by consecutive chunks
        #[arg(long, default_value = "50")]
        overlap: usize,
    },
    /// Print the chunks most similar to a query.
    Search {
        #[arg(long)]
        query: String,
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
    },
    /// Answer a question from the most similar chunks.
    Ask {
        #[arg(long)]
        question: String,
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
        #[arg(long, value_enum, default_value_t = ComposerKind::Snippets)]
        composer: ComposerKind,
    },
}

impl Cli {
    fn openai_config(&self) -> OpenAiConfig {
        OpenAiConfig {
            api_key: self.openai_api_key.clone(),
            base_url: self.openai_base_url.clone(),
            ..OpenAiConfig::default()
        }
    }

    fn build_embedder(&self) -> anyhow::Result<Arc<dyn Embedder>> {
        Ok(match self.embedder {
            EmbedderKind::Openai => Arc::new(OpenAiEmbedder::new(&self.openai_config())?),
            EmbedderKind::Ngram => Arc::new(CharacterNgramEmbedder::default()),
        })
    }

    fn open_store(&self) -> anyhow::Result<VectorStore> {
        let remote = RemoteConfig::from_parts(self.endee_url.clone(), self.endee_api_key.clone());
        let config = StoreConfig::local(self.work_dir.join(SNAPSHOT_FILE)).with_remote(remote);
        Ok(VectorStore::open(config, self.build_embedder()?)?)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let app_version = env!("CARGO_PKG_VERSION");

    if let Err(error) = dotenvy::dotenv() {
        if !error.not_found() {
            eprintln!("failed to load .env: {error}");
        }
    }

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let store = Arc::new(cli.open_store()?);

    info!(
        version = app_version,
        mode = ?store.mode(),
        started_at = %Utc::now().to_rfc3339(),
        "coderag boot"
    );

    match &cli.command {
        Command::Index {
            repo,
            chunk_size,
            overlap,
        } => {
            let options = IngestionOptions::default().with_chunking(*chunk_size, *overlap);
            let summary = index_repository(repo, &cli.work_dir, &options, &store).await?;

            if !summary.skipped_files.is_empty() {
                warn!(
                    "skipped_files={} for repo={}",
                    summary.skipped_files.len(),
                    repo
                );
            }

            println!(
                "Indexed {} chunks from {} files at {}",
                summary.chunk_count,
                summary.files_read,
                Utc::now().to_rfc3339()
            );
        }
        Command::Search { query, top_k } => {
            let hits = store.search(query, *top_k).await?;
            if hits.is_empty() {
                println!("no results");
            }
            for (rank, hit) in hits.iter().enumerate() {
                println!(
                    "[{}] score={:.4} file={}",
                    rank + 1,
                    hit.score,
                    hit.filename().unwrap_or("unknown")
                );
                println!("{}\n", hit.text);
            }
        }
        Command::Ask {
            question,
            top_k,
            composer,
        } => {
            let composer: Box<dyn AnswerComposer> = match composer {
                ComposerKind::Snippets => Box::new(SnippetComposer),
                ComposerKind::Chat => Box::new(ChatComposer::new(&cli.openai_config())?),
            };
            let retriever = Retriever::new(Arc::clone(&store), composer);
            let answer = retriever.answer(question, *top_k).await?;
            println!("{answer}");
        }
    }

    Ok(())
}
