use std::net::SocketAddr;

use axum::{
	Json, Router,
	http::{StatusCode, header},
	response::IntoResponse,
	routing::post,
};
use serde_json::{Map, Value};
use tokio::net::TcpListener;

use dossier_config::{EmbeddingProviderConfig, LlmProviderConfig};
use dossier_providers::{Error, embedding, generation};

async fn streamed_completion() -> impl IntoResponse {
	let body = concat!(
		"data: {\"choices\":[{\"delta\":{\"content\":\"{\\\"sections\\\":\"}}]}\n\n",
		"data: {\"choices\":[{\"delta\":{\"content\":\"[]}\"}}]}\n\n",
		"data: [DONE]\n\n",
	);

	([(header::CONTENT_TYPE, "text/event-stream")], body)
}

async fn throttled_completion() -> impl IntoResponse {
	(StatusCode::TOO_MANY_REQUESTS, [(header::RETRY_AFTER, "3")], "slow down")
}

async fn failing_completion() -> impl IntoResponse {
	(
		StatusCode::UNAUTHORIZED,
		Json(serde_json::json!({ "error": { "message": "invalid api key" } })),
	)
}

async fn embeddings(Json(body): Json<Value>) -> Json<Value> {
	let count = body.get("input").and_then(|v| v.as_array()).map(Vec::len).unwrap_or(0);
	let data: Vec<Value> = (0..count)
		.rev()
		.map(|index| serde_json::json!({ "index": index, "embedding": [index as f32, 1.0] }))
		.collect();

	Json(serde_json::json!({ "data": data }))
}

async fn spawn_upstream() -> SocketAddr {
	let router = Router::new()
		.route("/ok/chat/completions", post(streamed_completion))
		.route("/busy/chat/completions", post(throttled_completion))
		.route("/denied/chat/completions", post(failing_completion))
		.route("/ok/embeddings", post(embeddings));
	let listener = TcpListener::bind("127.0.0.1:0").await.expect("Failed to bind upstream.");
	let addr = listener.local_addr().expect("Failed to read upstream address.");

	tokio::spawn(async move {
		let _ = axum::serve(listener, router).await;
	});

	addr
}

fn llm_config(addr: SocketAddr, prefix: &str) -> LlmProviderConfig {
	LlmProviderConfig {
		provider_id: "test".to_string(),
		api_base: format!("http://{addr}/{prefix}"),
		api_key: "key".to_string(),
		path: "/chat/completions".to_string(),
		model: "m".to_string(),
		temperature: 0.0,
		timeout_ms: 5_000,
		default_headers: Map::new(),
	}
}

#[tokio::test]
async fn generation_accumulates_streamed_content() {
	let addr = spawn_upstream().await;
	let messages = vec![serde_json::json!({ "role": "user", "content": "hi" })];
	let out = generation::generate(&llm_config(addr, "ok"), &messages, 256, 0.2)
		.await
		.expect("Generation must succeed.");

	assert_eq!(out, "{\"sections\":[]}");
}

#[tokio::test]
async fn generation_maps_429_to_throttled_with_retry_after() {
	let addr = spawn_upstream().await;
	let err = generation::generate(&llm_config(addr, "busy"), &[], 256, 0.2)
		.await
		.expect_err("Expected throttling.");

	assert!(err.is_throttled());
	assert!(matches!(err, Error::Throttled { retry_after_ms: Some(3_000) }));
}

#[tokio::test]
async fn generation_surfaces_upstream_error_message() {
	let addr = spawn_upstream().await;
	let err = generation::generate(&llm_config(addr, "denied"), &[], 256, 0.2)
		.await
		.expect_err("Expected upstream error.");

	match err {
		Error::Http { status, message } => {
			assert_eq!(status, 401);
			assert_eq!(message, "invalid api key");
		},
		other => panic!("Unexpected error: {other:?}"),
	}
}

#[tokio::test]
async fn embedding_orders_vectors_by_index() {
	let addr = spawn_upstream().await;
	let cfg = EmbeddingProviderConfig {
		provider_id: "test".to_string(),
		api_base: format!("http://{addr}/ok"),
		api_key: "key".to_string(),
		path: "/embeddings".to_string(),
		model: "m".to_string(),
		dimensions: 2,
		timeout_ms: 5_000,
		default_headers: Map::new(),
	};
	let vectors = embedding::embed(&cfg, &["a".to_string(), "b".to_string(), "c".to_string()])
		.await
		.expect("Embedding must succeed.");

	assert_eq!(vectors, vec![vec![0.0, 1.0], vec![1.0, 1.0], vec![2.0, 1.0]]);
}
