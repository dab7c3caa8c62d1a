use crate::embeddings::http_client;
use crate::models::Metadata;
use crate::traits::VectorIndex;
use crate::{Chunk, SearchError, SearchHit};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

const BACKEND: &str = "endee";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_key: String,
}

impl RemoteConfig {
    /// A remote store needs both a base URL and a credential; anything less
    /// leaves the store local.
    pub fn from_parts(base_url: Option<String>, api_key: Option<String>) -> Option<Self> {
        let base_url = base_url.filter(|value| !value.trim().is_empty());
        let api_key = api_key.filter(|value| !value.trim().is_empty());

        match (base_url, api_key) {
            (Some(base_url), Some(api_key)) => Some(Self { base_url, api_key }),
            (Some(base_url), None) => {
                warn!(%base_url, "remote vector store url set without api key, using local store");
                None
            }
            _ => None,
        }
    }
}

/// HTTP client for a remote vector database exposing `/vectors/upsert` and
/// `/vectors/query`.
pub struct RemoteIndex {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl std::fmt::Debug for RemoteIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteIndex")
            .field("endpoint", &self.endpoint)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl RemoteIndex {
    pub fn new(config: &RemoteConfig) -> Result<Self, SearchError> {
        let endpoint = Url::parse(config.base_url.trim())?;
        Ok(Self {
            client: http_client()?,
            endpoint: endpoint.as_str().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    /// Sends `body` and returns the raw response bytes of a 2xx reply.
    async fn post(&self, path: &str, body: &Value) -> Result<Vec<u8>, SearchError> {
        let response = self
            .client
            .post(format!("{}/{}", self.endpoint, path))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: BACKEND.to_string(),
                details: response.status().to_string(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}

/// A query reply must be a JSON object; anything else counts as a failed
/// query so the caller can fall back.
fn parse_query_response(bytes: &[u8]) -> Result<Value, SearchError> {
    let invalid = |details: String| SearchError::BackendResponse {
        backend: BACKEND.to_string(),
        details,
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(invalid("query response body is empty".to_string()));
    }
    let parsed: Value = serde_json::from_slice(bytes)
        .map_err(|error| invalid(format!("query response is not json: {error}")))?;
    if !parsed.is_object() {
        return Err(invalid("query response is not a json object".to_string()));
    }
    Ok(parsed)
}

/// First non-empty list under `matches` or `results`.
fn response_matches(parsed: &Value) -> &[Value] {
    ["/matches", "/results"]
        .iter()
        .filter_map(|pointer| parsed.pointer(pointer).and_then(Value::as_array))
        .find(|items| !items.is_empty())
        .map(Vec::as_slice)
        .unwrap_or_default()
}

#[async_trait]
impl VectorIndex for RemoteIndex {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn index_vector_chunks(
        &self,
        first_id: u64,
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

        if chunks.is_empty() {
            return Ok(());
        }

        let vectors = chunks
            .iter()
            .zip(embeddings)
            .zip(first_id..)
            .map(|((chunk, embedding), id)| {
                json!({
                    "id": format!("local-{id}"),
                    "values": embedding,
                    "metadata": chunk.metadata,
                    "payload": { "text": chunk.text },
                })
            })
            .collect::<Vec<_>>();

        self.post("vectors/upsert", &json!({ "vectors": vectors }))
            .await?;
        debug!(count = chunks.len(), first_id, "upserted vectors");
        Ok(())
    }

    async fn search_vector(
        &self,
        query_vector: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        let bytes = self
            .post(
                "vectors/query",
                &json!({ "top_k": top_k, "vector": query_vector }),
            )
            .await?;
        let parsed = parse_query_response(&bytes)?;

        Ok(response_matches(&parsed)
            .iter()
            .take(top_k)
            .map(hit_from_match)
            .collect())
    }
}

fn hit_from_match(item: &Value) -> SearchHit {
    let text = item
        .pointer("/payload/text")
        .and_then(Value::as_str)
        .or_else(|| item.get("payload").and_then(Value::as_str))
        .unwrap_or_default()
        .to_string();

    let metadata = item
        .get("metadata")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_else(Metadata::new);

    SearchHit {
        text,
        metadata,
        score: match_score(item),
    }
}

/// Scores are reported as similarities. A backend that only returns a cosine
/// distance gets it converted with `1 - distance`.
fn match_score(item: &Value) -> f64 {
    if let Some(score) = item.get("score").and_then(Value::as_f64) {
        return score;
    }
    item.get("distance")
        .and_then(Value::as_f64)
        .map_or(0.0, |distance| 1.0 - distance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn remote_for(server: &MockServer) -> RemoteIndex {
        RemoteIndex::new(&RemoteConfig {
            base_url: format!("{}/", server.uri()),
            api_key: "secret".to_string(),
        })
        .unwrap()
    }

    #[test]
    fn both_url_and_key_are_required() {
        assert!(RemoteConfig::from_parts(Some("http://db".into()), None).is_none());
        assert!(RemoteConfig::from_parts(None, Some("key".into())).is_none());
        assert!(RemoteConfig::from_parts(Some(" ".into()), Some("key".into())).is_none());
        assert_eq!(
            RemoteConfig::from_parts(Some("http://db".into()), Some("key".into())),
            Some(RemoteConfig {
                base_url: "http://db".to_string(),
                api_key: "key".to_string(),
            })
        );
    }

    #[test]
    fn malformed_base_url_is_rejected() {
        let result = RemoteIndex::new(&RemoteConfig {
            base_url: "not a url".to_string(),
            api_key: "key".to_string(),
        });
        assert!(matches!(result, Err(SearchError::Url(_))));
    }

    #[tokio::test]
    async fn upsert_sends_one_batch_with_sequential_ids() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(json!({
                "vectors": [
                    {
                        "id": "local-7",
                        "values": [1.0, 0.0],
                        "metadata": {"filename": "a.py"},
                        "payload": {"text": "def f(): pass"}
                    },
                    {
                        "id": "local-8",
                        "metadata": {"filename": "b.md"},
                        "payload": {"text": "hello world"}
                    }
                ]
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let chunks = [
            Chunk::from_file("def f(): pass", Path::new("a.py")),
            Chunk::from_file("hello world", Path::new("b.md")),
        ];
        remote_for(&server)
            .index_vector_chunks(7, &chunks, &[vec![1.0, 0.0], vec![0.0, 1.0]])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn query_reads_matches_or_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vectors/query"))
            .and(body_partial_json(json!({"top_k": 2})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {
                        "payload": {"text": "def f(): pass"},
                        "metadata": {"filename": "a.py"},
                        "score": 0.9
                    },
                    {"payload": "raw text", "distance": 0.25},
                    {"metadata": {"filename": "c.py"}, "score": 0.1}
                ]
            })))
            .mount(&server)
            .await;

        let hits = remote_for(&server)
            .search_vector(&[1.0, 0.0], 2)
            .await
            .unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].text, "def f(): pass");
        assert_eq!(hits[0].filename(), Some("a.py"));
        assert!((hits[0].score - 0.9).abs() < 1e-9);
        assert_eq!(hits[1].text, "raw text");
        assert!(hits[1].metadata.is_empty());
        assert!((hits[1].score - 0.75).abs() < 1e-9);
    }

    #[test]
    fn missing_payload_text_becomes_empty() {
        let hit = hit_from_match(&json!({"payload": {"other": 1}, "score": 0.5}));
        assert_eq!(hit.text, "");
        assert_eq!(match_score(&json!({})), 0.0);
    }

    #[tokio::test]
    async fn error_status_is_a_backend_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = remote_for(&server).search_vector(&[1.0], 3).await;
        assert!(matches!(result, Err(SearchError::BackendResponse { .. })));
    }

    #[tokio::test]
    async fn empty_matches_list_defers_to_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vectors/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "matches": [],
                "results": [{"payload": {"text": "def g(): pass"}, "score": 0.8}]
            })))
            .mount(&server)
            .await;

        let hits = remote_for(&server)
            .search_vector(&[1.0, 0.0], 3)
            .await
            .unwrap();

        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "def g(): pass");
    }

    #[tokio::test]
    async fn object_without_matches_is_an_empty_result() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vectors/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let hits = remote_for(&server).search_vector(&[1.0], 3).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn empty_or_malformed_query_body_is_a_backend_error() {
        for body in ["", "  ", "not json", "[1, 2]"] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/vectors/query"))
                .respond_with(ResponseTemplate::new(200).set_body_string(body))
                .mount(&server)
                .await;

            let result = remote_for(&server).search_vector(&[1.0], 3).await;
            assert!(
                matches!(result, Err(SearchError::BackendResponse { .. })),
                "body {body:?} gave {result:?}"
            );
        }
    }

    #[tokio::test]
    async fn upsert_accepts_an_empty_success_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/vectors/upsert"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let chunks = [Chunk::from_file("def f(): pass", Path::new("a.py"))];
        remote_for(&server)
            .index_vector_chunks(0, &chunks, &[vec![1.0]])
            .await
            .unwrap();
    }
}
