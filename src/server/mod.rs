// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// HTTP SERVER - Avaliação de diálogos
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `POST /api/evaluar` - Avalia `{id, texto}` e grava no store
//!
//! Qualquer outro método em `/api/evaluar` responde 405.
//!
//! ## Uso
//!
//! ```bash
//! cargo run -- --port=3000
//! curl -X POST localhost:3000/api/evaluar \
//!      -H 'Content-Type: application/json' \
//!      -d '{"id": "42", "texto": "Cliente: hola..."}'
//! ```

pub mod handlers;
pub mod types;

use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

pub use types::*;

use crate::evaluator::Evaluator;

/// Estado compartilhado entre todos os handlers (somente leitura)
pub struct AppState {
    pub evaluator: Evaluator,
}

impl AppState {
    pub fn new(evaluator: Evaluator) -> Arc<Self> {
        Arc::new(Self { evaluator })
    }
}

/// Monta o router com estado e CORS.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/evaluar",
            post(handlers::evaluar).fallback(handlers::method_not_allowed),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Inicia o servidor HTTP no endereço especificado.
pub async fn start_server(addr: SocketAddr, state: Arc<AppState>) -> anyhow::Result<()> {
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    log::info!("Dialog evaluator listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::ApiKeyPool;
    use crate::llm::MockLlmClient;
    use crate::store::InMemoryStore;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn app(llm: Arc<MockLlmClient>, store: Arc<InMemoryStore>, keys: &str) -> Router {
        router(AppState::new(Evaluator::new(
            llm,
            store,
            ApiKeyPool::parse(keys),
        )))
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/evaluar")
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = app(
            Arc::new(MockLlmClient::replying("")),
            Arc::new(InMemoryStore::new()),
            "a,b",
        );
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["keys"], 2);
        assert_eq!(json["store"], "memory");
    }

    #[tokio::test]
    async fn test_get_is_method_not_allowed() {
        let llm = Arc::new(MockLlmClient::replying("{}"));
        let app = app(llm.clone(), Arc::new(InMemoryStore::new()), "k");

        for method in ["GET", "PUT", "DELETE"] {
            let request = Request::builder()
                .method(method)
                .uri("/api/evaluar")
                .body(Body::from(r#"{"id":"1","texto":"x"}"#))
                .unwrap();
            let response = app.clone().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        }
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_success_response() {
        let store = Arc::new(InMemoryStore::with_rows(["9"]));
        let app = app(
            Arc::new(MockLlmClient::replying(
                r#"prefix {"puntaje": 85, "comentario": "ok"} suffix"#,
            )),
            store.clone(),
            "k",
        );

        let response = app
            .oneshot(post_json(r#"{"id":"9","texto":"Cliente: hola"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["success"], true);
        assert_eq!(json["result"], serde_json::json!({ "puntaje": 85, "comentario": "ok" }));
        assert_eq!(json["data"][0]["estado"], "evaluado");
        assert_eq!(store.get("9").unwrap().puntaje_total, Some(85));
    }

    #[tokio::test]
    async fn test_missing_fields_is_bad_request() {
        let llm = Arc::new(MockLlmClient::replying("{}"));
        let app = app(llm.clone(), Arc::new(InMemoryStore::new()), "k");

        let response = app
            .clone()
            .oneshot(post_json(r#"{"id":"9"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Missing id or texto");
        assert_eq!(json["detail"], "missing fields: texto");

        let response = app.clone().oneshot(post_json("")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app.oneshot(post_json("{no es json")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_key_pool_is_internal_error() {
        let llm = Arc::new(MockLlmClient::replying("{}"));
        let app = app(llm.clone(), Arc::new(InMemoryStore::new()), "[]");

        let response = app
            .oneshot(post_json(r#"{"id":"1","texto":"x"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"], "No OpenAI keys configured");
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_upstream_error_is_internal_error() {
        let store = Arc::new(InMemoryStore::with_rows(["1"]));
        let app = app(
            Arc::new(MockLlmClient::failing(500, r#"{"error":"overloaded"}"#)),
            store.clone(),
            "k",
        );

        let response = app
            .oneshot(post_json(r#"{"id":"1","texto":"x"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"], "OpenAI API error");
        assert_eq!(json["detail"], r#"{"error":"overloaded"}"#);
        assert_eq!(store.call_count(), 0);
    }

    #[tokio::test]
    async fn test_store_error_includes_outcome() {
        let app = app(
            Arc::new(MockLlmClient::replying(r#"{"puntaje": 60, "comentario": "regular"}"#)),
            Arc::new(InMemoryStore::failing("relation \"evaluaciones\" does not exist")),
            "k",
        );

        let response = app
            .oneshot(post_json(r#"{"id":"1","texto":"x"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Supabase update error");
        assert_eq!(json["detail"], "relation \"evaluaciones\" does not exist");
        assert_eq!(json["result"]["puntaje"], 60);
    }
}
