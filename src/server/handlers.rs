// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ENDPOINT HANDLERS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;

use super::types::*;
use super::AppState;
use crate::evaluator::EvaluationError;

// ── GET /health ─────────────────────────────────

/// Health check endpoint
pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "keys": state.evaluator.keys().len(),
        "store": state.evaluator.store_name(),
    }))
}

// ── /api/evaluar (qualquer método ≠ POST) ───────

/// 405 sem processar o corpo
pub async fn method_not_allowed() -> Response {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        [(header::ALLOW, "POST")],
        "Method not allowed",
    )
        .into_response()
}

// ── POST /api/evaluar ───────────────────────────

/// Avalia o diálogo `texto` e grava o resultado na linha `id`.
pub async fn evaluar(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request_id = format!("req_{}", uuid::Uuid::new_v4().simple());

    let body: EvaluarBody = if body.is_empty() {
        EvaluarBody::default()
    } else {
        match serde_json::from_slice(&body) {
            Ok(body) => body,
            Err(e) => {
                log::warn!("[{}] corpo inválido: {}", request_id, e);
                return error_response(
                    StatusCode::BAD_REQUEST,
                    ErrorBody::new("Invalid JSON body").with_detail(e.to_string()),
                );
            }
        }
    };

    let request = match body.into_request() {
        Ok(request) => request,
        Err(missing) => {
            log::warn!("[{}] campos faltando: {:?}", request_id, missing);
            return error_response(
                StatusCode::BAD_REQUEST,
                ErrorBody::new("Missing id or texto")
                    .with_detail(format!("missing fields: {}", missing.join(", "))),
            );
        }
    };

    log::info!(
        "[{}] Avaliando id={} ({} chars)",
        request_id,
        request.id,
        request.texto.len()
    );

    match state.evaluator.evaluate(&request).await {
        Ok(report) => Json(EvaluarResponse {
            success: true,
            result: report.outcome,
            data: report.data,
        })
        .into_response(),
        Err(err) => {
            log::error!("[{}] {}", request_id, err);
            evaluation_error_response(err)
        }
    }
}

// ── Helpers ─────────────────────────────────────

/// Todo erro de avaliação vira 500; muda só o corpo.
fn evaluation_error_response(err: EvaluationError) -> Response {
    let body = match err {
        EvaluationError::Upstream { detail, .. } => {
            ErrorBody::new("OpenAI API error").with_detail(detail)
        }
        EvaluationError::Store { source, outcome } => ErrorBody::new("Supabase update error")
            .with_detail(source.to_string())
            .with_result(outcome),
        other => ErrorBody::new(other.to_string()),
    };

    error_response(StatusCode::INTERNAL_SERVER_ERROR, body)
}

fn error_response(status: StatusCode, body: ErrorBody) -> Response {
    (status, Json(body)).into_response()
}
