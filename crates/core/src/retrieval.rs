use crate::embeddings::{http_client, OpenAiConfig};
use crate::store::VectorStore;
use crate::{SearchError, SearchHit};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::debug;

pub const NO_RESULTS_ANSWER: &str = "No relevant code found for this question.";
pub const DEFAULT_TOP_K: usize = 3;

/// Turns a question and its ranked snippets into the final answer text.
#[async_trait]
pub trait AnswerComposer: Send + Sync {
    async fn compose(&self, question: &str, hits: &[SearchHit]) -> Result<String, SearchError>;
}

/// Numbered transcript of the snippets themselves; needs no external service.
#[derive(Debug, Clone, Copy, Default)]
pub struct SnippetComposer;

#[async_trait]
impl AnswerComposer for SnippetComposer {
    async fn compose(&self, _question: &str, hits: &[SearchHit]) -> Result<String, SearchError> {
        Ok(format_snippets(hits))
    }
}

pub fn format_snippets(hits: &[SearchHit]) -> String {
    let mut answer = String::from("Answer based on retrieved code snippets:\n\n");
    for (rank, hit) in hits.iter().enumerate() {
        let _ = writeln!(
            answer,
            "[Snippet {} | file: {} | score: {:.4}]",
            rank + 1,
            hit.filename().unwrap_or("unknown"),
            hit.score
        );
        answer.push_str(&hit.text);
        answer.push_str("\n\n");
    }
    answer
}

pub fn build_prompt(question: &str, hits: &[SearchHit]) -> String {
    let mut prompt = String::from(
        "Answer the question using only the code snippets below. \
         Cite the file names you rely on. If the snippets do not contain the answer, say so.\n\n",
    );
    for (rank, hit) in hits.iter().enumerate() {
        let _ = writeln!(
            prompt,
            "### Snippet {} ({}, score {:.4})\n```\n{}\n```\n",
            rank + 1,
            hit.filename().unwrap_or("unknown"),
            hit.score,
            hit.text
        );
    }
    let _ = write!(prompt, "Question: {question}");
    prompt
}

/// Composes answers with a hosted chat model over `/chat/completions`.
pub struct ChatComposer {
    client: Client,
    api_key: String,
    endpoint: String,
    model: String,
}

impl ChatComposer {
    pub fn new(config: &OpenAiConfig) -> Result<Self, SearchError> {
        let api_key = config.require_api_key()?.to_string();
        Ok(Self {
            client: http_client()?,
            api_key,
            endpoint: config.endpoint("chat/completions"),
            model: config.chat_model.clone(),
        })
    }
}

#[async_trait]
impl AnswerComposer for ChatComposer {
    async fn compose(&self, question: &str, hits: &[SearchHit]) -> Result<String, SearchError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": self.model,
                "messages": [
                    {
                        "role": "system",
                        "content": "You answer questions about a source code repository."
                    },
                    {"role": "user", "content": build_prompt(question, hits)}
                ]
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "chat".to_string(),
                details: response.status().to_string(),
            });
        }

        let parsed: Value = response.json().await?;
        parsed
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| SearchError::BackendResponse {
                backend: "chat".to_string(),
                details: "response has no message content".to_string(),
            })
    }
}

/// Answers questions from the store's most similar chunks.
pub struct Retriever {
    store: Arc<VectorStore>,
    composer: Box<dyn AnswerComposer>,
}

impl Retriever {
    pub fn new(store: Arc<VectorStore>, composer: Box<dyn AnswerComposer>) -> Self {
        Self { store, composer }
    }

    pub fn with_snippets(store: Arc<VectorStore>) -> Self {
        Self::new(store, Box::new(SnippetComposer))
    }

    pub async fn answer(&self, question: &str, top_k: usize) -> Result<String, SearchError> {
        if question.trim().is_empty() {
            return Err(SearchError::InvalidArgument("question is empty".to_string()));
        }

        let hits = self.store.search(question, top_k).await?;
        if hits.is_empty() {
            return Ok(NO_RESULTS_ANSWER.to_string());
        }

        debug!(hit_count = hits.len(), "composing answer");
        self.composer.compose(question, &hits).await
    }
}
