//! End-to-end tests for the chat HTTP API with stub providers

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use campus_rag::config::RagConfig;
use campus_rag::providers::{
    EmbeddingProvider, LlmProvider, LocalVectorStore, StoredChunk, VectorStoreProvider,
};
use campus_rag::retrieval::KnowledgeRetriever;
use campus_rag::server::{app, AppState};
use campus_rag::types::Metadata;
use campus_rag::{Chunk, Error, Result};

#[derive(Default)]
struct StubLlm {
    prompts: Mutex<Vec<String>>,
    down: bool,
}

#[async_trait]
impl LlmProvider for StubLlm {
    async fn generate(&self, prompt: &str, _system: Option<&str>) -> Result<String> {
        if self.down {
            return Err(Error::llm("connection refused"));
        }
        let mut prompts = self.prompts.lock();
        prompts.push(prompt.to_string());
        Ok(format!("我是西小北，第{}次回答", prompts.len()))
    }

    async fn health_check(&self) -> Result<bool> {
        Ok(!self.down)
    }

    fn name(&self) -> &str {
        "stub"
    }

    fn model(&self) -> &str {
        "stub-model"
    }
}

/// Questions mentioning 校医院 land on the stored chunk, everything else misses
struct KeywordEmbedder;

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.contains("校医院") {
            Ok(vec![1.0, 0.0])
        } else {
            Ok(vec![0.0, 1.0])
        }
    }

    fn dimensions(&self) -> usize {
        2
    }

    fn name(&self) -> &str {
        "keyword"
    }
}

async fn retriever() -> Arc<KnowledgeRetriever> {
    let store = LocalVectorStore::create("unused", "keyword", 2);
    let mut metadata = Metadata::new();
    metadata.insert("source_path".into(), "数据集/日常生活相关/校医院.docx".into());
    metadata.insert("category".into(), "日常生活相关".into());
    store
        .insert_chunks(vec![StoredChunk {
            chunk: Chunk::new("校医院周末上午八点到十二点开放".into(), metadata),
            embedding: vec![1.0, 0.0],
        }])
        .await
        .unwrap();

    let config = RagConfig::default();
    Arc::new(KnowledgeRetriever::new(
        Arc::new(KeywordEmbedder),
        Arc::new(store),
        &config.retrieval,
    ))
}

fn build(llm: Arc<StubLlm>, retriever: Option<Arc<KnowledgeRetriever>>) -> Router {
    app(AppState::with_providers(RagConfig::default(), llm, retriever))
}

async fn post_chat(app: &Router, body: Value) -> (StatusCode, Value) {
    let req = Request::builder()
        .method("POST")
        .uri("/chat/generate")
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn health_returns_ok() {
    let app = build(Arc::new(StubLlm::default()), None);
    let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&body[..], b"OK");
}

async fn get_ready(app: &Router) -> (StatusCode, Value) {
    let req = Request::builder().uri("/ready").body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn ready_reports_providers() {
    let app = build(Arc::new(StubLlm::default()), Some(retriever().await));
    let (status, body) = get_ready(&app).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"llm": true, "knowledge": true}));

    let app = build(Arc::new(StubLlm::default()), None);
    let (status, body) = get_ready(&app).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["knowledge"], false);
}

#[tokio::test]
async fn ready_is_unavailable_while_model_is_down() {
    let llm = Arc::new(StubLlm {
        down: true,
        ..Default::default()
    });
    let (status, body) = get_ready(&build(llm, None)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["llm"], false);
}

#[tokio::test]
async fn empty_prompt_is_rejected() {
    let llm = Arc::new(StubLlm::default());
    let app = build(llm.clone(), Some(retriever().await));

    let (status, body) = post_chat(&app, json!({"prompt": "  ", "session_id": "abc"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
    assert_eq!(body["error"], "问题不能为空");
    assert_eq!(body["session_id"], "abc");
    assert!(llm.prompts.lock().is_empty());
}

#[tokio::test]
async fn malformed_json_gets_error_shape() {
    let app = build(Arc::new(StubLlm::default()), None);
    let req = Request::builder()
        .method("POST")
        .uri("/chat/generate")
        .header("content-type", "application/json")
        .body(Body::from("{\"prompt\": "))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["code"], 400);
    assert!(body["error"].as_str().unwrap().starts_with("请求格式错误"));
    assert!(uuid::Uuid::parse_str(body["session_id"].as_str().unwrap()).is_ok());
}

#[tokio::test]
async fn minted_session_is_remembered() {
    let llm = Arc::new(StubLlm::default());
    let app = build(llm.clone(), None);

    let (status, first) = post_chat(&app, json!({"prompt": "我叫小明"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["code"], 100);
    assert_eq!(first["is_knowledge_based"], false);
    assert!(first.get("sources").is_none());
    let session_id = first["session_id"].as_str().unwrap().to_string();
    assert!(uuid::Uuid::parse_str(&session_id).is_ok());

    let (_, second) = post_chat(&app, json!({"prompt": "我叫什么", "session_id": session_id})).await;
    assert_eq!(second["session_id"], session_id.as_str());

    let prompts = llm.prompts.lock();
    assert!(prompts[1].contains("用户：我叫小明"));
    assert!(prompts[1].contains("西小北：我是西小北，第1次回答"));
}

#[tokio::test]
async fn knowledge_without_index_is_unavailable() {
    let app = build(Arc::new(StubLlm::default()), None);
    let (status, body) = post_chat(
        &app,
        json!({"prompt": "校医院周末开吗", "session_id": "s1", "use_knowledge": true}),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], 503);
    assert_eq!(body["session_id"], "s1");
}

#[tokio::test]
async fn knowledge_answer_cites_sources() {
    let llm = Arc::new(StubLlm::default());
    let app = build(llm.clone(), Some(retriever().await));

    let (status, body) =
        post_chat(&app, json!({"prompt": "校医院周末开吗", "use_knowledge": true})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 100);
    assert_eq!(body["is_knowledge_based"], true);
    assert_eq!(body["sources"], json!(["校医院.docx"]));
    assert!(llm.prompts.lock()[0].contains("校医院周末上午八点到十二点开放"));
}

#[tokio::test]
async fn unmatched_question_falls_back_to_conversation() {
    let llm = Arc::new(StubLlm::default());
    let app = build(llm, Some(retriever().await));

    let (status, body) =
        post_chat(&app, json!({"prompt": "推荐一本书", "use_knowledge": true})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_knowledge_based"], false);
    assert!(body.get("sources").is_none());
}

#[tokio::test]
async fn model_outage_returns_degraded_reply() {
    let llm = Arc::new(StubLlm {
        down: true,
        ..Default::default()
    });
    let app = build(llm, Some(retriever().await));

    let (status, body) =
        post_chat(&app, json!({"prompt": "校医院周末开吗", "use_knowledge": true})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 100);
    assert_eq!(body["data"], RagConfig::default().chat.degraded_reply);
    assert_eq!(body["is_knowledge_based"], false);
}

#[tokio::test]
async fn cors_allows_any_origin() {
    let app = build(Arc::new(StubLlm::default()), None);
    let req = Request::builder()
        .uri("/health")
        .header("origin", "http://example.com")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
}

#[tokio::test]
async fn null_use_knowledge_means_conversation() {
    let llm = Arc::new(StubLlm::default());
    let app = build(llm, Some(retriever().await));

    let (status, body) = post_chat(
        &app,
        json!({"prompt": "校医院周末开吗", "session_id": null, "use_knowledge": null}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["code"], 100);
    assert_eq!(body["is_knowledge_based"], false);
}
