//! HTTP contract tests against a server bound to an ephemeral port.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use nlq_rag::{
    AnswerSynthesizer, EmbeddingProvider, InMemorySource, QueryConfig, QueryService, Result,
    SearchResult,
};
use nlq_server::app_router;
use serde_json::{Map, Value, json};

/// Embeds text as `[length, vowel count]`.
struct ShapeEmbedder;

#[async_trait]
impl EmbeddingProvider for ShapeEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let vowels = text.chars().filter(|c| "aeiou".contains(*c)).count();
        Ok(vec![text.len() as f32, vowels as f32])
    }

    fn dimensions(&self) -> usize {
        2
    }

    fn name(&self) -> &str {
        "shape"
    }
}

struct CountingSynthesizer;

#[async_trait]
impl AnswerSynthesizer for CountingSynthesizer {
    async fn generate(&self, _: &str, results: &[SearchResult], _: &str) -> Result<String> {
        Ok(format!("found {}", results.len()))
    }

    fn name(&self) -> &str {
        "counting"
    }
}

fn row(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn service() -> QueryService {
    let source = InMemorySource::new().with_collection(
        "listings",
        vec![
            row(json!({"id": 1, "title": "Loft", "city": "Lagos"})),
            row(json!({"id": 2, "title": "Garden flat", "city": "Accra"})),
            row(json!({"id": 3, "title": "Studio", "city": "Nairobi"})),
        ],
    );
    QueryService::builder()
        .config(QueryConfig::builder().collection("listings").text_fields(["title"]).build().unwrap())
        .source(Arc::new(source))
        .embedding_provider(Arc::new(ShapeEmbedder))
        .synthesizer(Arc::new(CountingSynthesizer))
        .build()
        .unwrap()
}

async fn spawn(service: QueryService) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = app_router(Arc::new(service));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn ready_server() -> SocketAddr {
    let service = service();
    service.initialize().await.unwrap();
    spawn(service).await
}

#[tokio::test]
async fn health_reports_record_count() {
    let addr = ready_server().await;
    let body: Value =
        reqwest::get(format!("http://{addr}/health")).await.unwrap().json().await.unwrap();
    assert_eq!(body, json!({"status": "ok", "records": 3}));
}

#[tokio::test]
async fn query_returns_answer_and_flat_results() {
    let addr = ready_server().await;
    let response = reqwest::Client::new()
        .post(format!("http://{addr}/query"))
        .json(&json!({"question": "a cosy loft", "num_results": 2}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["question"], "a cosy loft");
    assert_eq!(body["answer"], "found 2");
    let results = body["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert!(results[0]["relevance_score"].as_f64().unwrap() > 0.0);
    assert!(results[0].get("title").is_some());
}

#[tokio::test]
async fn search_defaults_to_five_results_without_answer() {
    let addr = ready_server().await;
    let body: Value = reqwest::Client::new()
        .post(format!("http://{addr}/search"))
        .json(&json!({"question": "studio"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["question"], "studio");
    assert!(body.get("answer").is_none());
    assert_eq!(body["results"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn missing_question_is_a_bad_request() {
    let addr = ready_server().await;
    let client = reqwest::Client::new();

    for payload in [json!({}), json!({"question": "   "}), json!({"num_results": 3})] {
        for path in ["query", "search"] {
            let response = client
                .post(format!("http://{addr}/{path}"))
                .json(&payload)
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), 400, "{path} with {payload}");
            let body: Value = response.json().await.unwrap();
            assert_eq!(body, json!({"error": "Question is required"}));
        }
    }
}

#[tokio::test]
async fn malformed_body_is_a_bad_request() {
    let addr = ready_server().await;
    let response = reqwest::Client::new()
        .post(format!("http://{addr}/query"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn retrieval_failure_is_a_server_error() {
    let addr = spawn(service()).await;
    let response = reqwest::Client::new()
        .post(format!("http://{addr}/query"))
        .json(&json!({"question": "anything"}))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 500);
    let body: Value = response.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("Index not built"));
}
