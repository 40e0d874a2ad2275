//! End-to-end tests for the query service lifecycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use nlq_rag::{
    AnswerSynthesizer, DataSource, ERROR_ANSWER_PREFIX, EmbeddingProvider, Filters,
    InMemorySource, NlqError, QueryConfig, QueryService, Record, Result, SearchResult,
    SourceConfig,
};
use serde_json::{Map, Value, json};

/// Maps known texts to fixed vectors and counts batch calls.
struct FixedEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    batch_calls: AtomicUsize,
}

impl FixedEmbedder {
    fn new(entries: &[(&str, [f32; 2])]) -> Self {
        Self {
            vectors: entries.iter().map(|(t, v)| (t.to_string(), v.to_vec())).collect(),
            batch_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FixedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.vectors.get(text).cloned().ok_or_else(|| NlqError::EmbeddingError {
            provider: "fixed".into(),
            message: format!("unexpected text '{text}'"),
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::SeqCst);
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    fn dimensions(&self) -> usize {
        2
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

struct EchoSynthesizer;

#[async_trait]
impl AnswerSynthesizer for EchoSynthesizer {
    async fn generate(
        &self,
        question: &str,
        results: &[SearchResult],
        _context: &str,
    ) -> Result<String> {
        Ok(format!("{question} -> {} results", results.len()))
    }

    fn name(&self) -> &str {
        "echo"
    }
}

struct FailingSynthesizer;

#[async_trait]
impl AnswerSynthesizer for FailingSynthesizer {
    async fn generate(&self, _: &str, _: &[SearchResult], _: &str) -> Result<String> {
        Err(NlqError::SynthesizerError {
            synthesizer: "failing".into(),
            message: "upstream returned 502".into(),
        })
    }

    fn name(&self) -> &str {
        "failing"
    }
}

/// A source whose connect always fails.
struct BrokenSource;

#[async_trait]
impl DataSource for BrokenSource {
    async fn connect(&self, _config: &SourceConfig) -> Result<()> {
        Err(NlqError::adapter("broken", "connection refused"))
    }

    async fn fetch_data(&self, _: &str, _: Option<&Filters>) -> Result<Vec<Record>> {
        Ok(Vec::new())
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "broken"
    }
}

fn row(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap()
}

fn compass_source() -> InMemorySource {
    InMemorySource::new().with_collection(
        "points",
        vec![
            row(json!({"id": "e", "name": "east", "kind": "cardinal"})),
            row(json!({"id": "n", "name": "north", "kind": "cardinal"})),
            row(json!({"id": "w", "name": "west", "kind": "cardinal"})),
        ],
    )
}

fn compass_embedder() -> Arc<FixedEmbedder> {
    Arc::new(FixedEmbedder::new(&[
        ("name: east", [1.0, 0.0]),
        ("name: north", [0.0, 1.0]),
        ("name: west", [-1.0, 0.0]),
        ("which way is east?", [1.0, 0.0]),
    ]))
}

fn service(
    source: Arc<dyn DataSource>,
    embedder: Arc<FixedEmbedder>,
    synthesizer: Arc<dyn AnswerSynthesizer>,
) -> QueryService {
    QueryService::builder()
        .config(QueryConfig::builder().collection("points").text_fields(["name"]).build().unwrap())
        .source(source)
        .embedding_provider(embedder)
        .synthesizer(synthesizer)
        .build()
        .unwrap()
}

#[tokio::test]
async fn orthogonal_corpus_ranks_exact_match_then_lowest_slot_tie() {
    let service = service(Arc::new(compass_source()), compass_embedder(), Arc::new(EchoSynthesizer));
    assert_eq!(service.initialize().await.unwrap(), 3);

    let response = service.query("which way is east?", Some(2)).await.unwrap();

    assert_eq!(response.question, "which way is east?");
    assert_eq!(response.answer, "which way is east? -> 2 results");
    assert_eq!(response.results.len(), 2);

    let first = &response.results[0];
    assert_eq!((first.slot, first.record_id.as_str()), (0, "e"));
    assert_eq!(first.distance, 0.0);
    assert_eq!(first.relevance_score, 1.0);

    // north (slot 1) and west (slot 2) are both at distance 2; slot 1 wins.
    let second = &response.results[1];
    assert_eq!((second.slot, second.record_id.as_str()), (1, "n"));
    assert_eq!(second.distance, 2.0);
    assert!((second.relevance_score - 1.0 / 3.0).abs() < 1e-6);
}

#[tokio::test]
async fn whole_corpus_is_embedded_in_one_batch() {
    let embedder = compass_embedder();
    let service = service(Arc::new(compass_source()), embedder.clone(), Arc::new(EchoSynthesizer));
    service.initialize().await.unwrap();
    assert_eq!(embedder.batch_calls.load(Ordering::SeqCst), 1);

    service.search("which way is east?", None).await.unwrap();
    assert_eq!(embedder.batch_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn rebuilding_the_index_reproduces_search_results() {
    let service = service(Arc::new(compass_source()), compass_embedder(), Arc::new(EchoSynthesizer));
    service.initialize().await.unwrap();
    let first = service.search("which way is east?", Some(3)).await.unwrap();
    let first_json = serde_json::to_string(&first).unwrap();

    let records: Vec<Record> = ["east", "north", "west"]
        .iter()
        .zip(["e", "n", "w"])
        .enumerate()
        .map(|(i, (name, id))| {
            Record::from_fields(row(json!({"id": id, "name": name, "kind": "cardinal"})), i)
        })
        .collect();
    assert_eq!(service.engine().build_index(records.clone(), &["name"]).await.unwrap(), 3);
    let second = service.search("which way is east?", Some(3)).await.unwrap();
    assert_eq!(second, first);
    assert_eq!(serde_json::to_string(&second).unwrap(), first_json);

    service.engine().build_index(records, &["name"]).await.unwrap();
    let third = service.search("which way is east?", Some(3)).await.unwrap();
    assert_eq!(third, first);
    assert_eq!(
        third.iter().map(|r| (r.slot, r.distance)).collect::<Vec<_>>(),
        vec![(0, 0.0), (1, 2.0), (2, 4.0)]
    );
}

#[tokio::test]
async fn results_carry_record_fields_and_score() {
    let service = service(Arc::new(compass_source()), compass_embedder(), Arc::new(EchoSynthesizer));
    service.initialize().await.unwrap();

    let results = service.search("which way is east?", Some(1)).await.unwrap();
    assert_eq!(
        serde_json::to_value(&results).unwrap(),
        json!([{"id": "e", "name": "east", "kind": "cardinal", "relevance_score": 1.0}])
    );
}

#[tokio::test]
async fn synthesizer_failure_degrades_to_error_answer() {
    let service =
        service(Arc::new(compass_source()), compass_embedder(), Arc::new(FailingSynthesizer));
    service.initialize().await.unwrap();

    let response = service.query("which way is east?", Some(3)).await.unwrap();

    assert!(response.answer.starts_with(ERROR_ANSWER_PREFIX));
    assert!(response.answer.contains("upstream returned 502"));
    assert_eq!(response.results.len(), 3);
}

#[tokio::test]
async fn empty_fetch_fails_before_embedding() {
    let embedder = compass_embedder();
    let source = InMemorySource::new().with_collection("points", Vec::new());
    let service = service(Arc::new(source), embedder.clone(), Arc::new(EchoSynthesizer));

    let err = service.initialize().await.unwrap_err();

    assert!(matches!(err, NlqError::NoDataFound { ref collection } if collection == "points"));
    assert_eq!(embedder.batch_calls.load(Ordering::SeqCst), 0);
    assert!(!service.engine().is_ready().await);
}

#[tokio::test]
async fn query_before_initialize_fails() {
    let service = service(Arc::new(compass_source()), compass_embedder(), Arc::new(EchoSynthesizer));
    let err = service.query("which way is east?", None).await.unwrap_err();
    assert!(matches!(err, NlqError::IndexNotBuilt));
}

#[tokio::test]
async fn adapter_errors_abort_initialization() {
    let service = service(Arc::new(BrokenSource), compass_embedder(), Arc::new(EchoSynthesizer));
    let err = service.initialize().await.unwrap_err();
    assert!(matches!(err, NlqError::AdapterError { ref adapter, .. } if adapter == "broken"));
}

#[tokio::test]
async fn configured_filters_reach_the_source() {
    let source = compass_source();
    let config = QueryConfig::builder()
        .collection("points")
        .text_fields(["name"])
        .filters(row(json!({"name": "north"})))
        .build()
        .unwrap();
    let service = QueryService::builder()
        .config(config)
        .source(Arc::new(source))
        .embedding_provider(compass_embedder())
        .synthesizer(Arc::new(EchoSynthesizer))
        .build()
        .unwrap();

    assert_eq!(service.initialize().await.unwrap(), 1);
}

#[test]
fn builder_requires_every_component() {
    let err = QueryService::builder()
        .config(QueryConfig::builder().collection("points").build().unwrap())
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, NlqError::ConfigError(ref m) if m.contains("source")));
}
