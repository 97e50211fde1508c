// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PERSISTÊNCIA - Multi-Backend (Supabase/Postgres/Memória)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Um único update por avaliação: filtra por igualdade em `id` e grava
// puntaje_total, feedback e estado. Não verifica quantas linhas mudaram
// e não impede sobrescrever uma linha já avaliada.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::config::StoreConfig;

/// Valor fixo gravado em `estado` após a avaliação.
pub const ESTADO_EVALUADO: &str = "evaluado";

/// Patch aplicado na linha da tabela de avaliações.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationUpdate {
    pub puntaje_total: Option<i64>,
    pub feedback: String,
    pub estado: String,
}

/// Erros do backend de persistência
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Erro reportado pelo próprio store (mensagem do PostgREST)
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid store response: {0}")]
    Parse(String),

    #[error("Database error: {0}")]
    Database(String),

    /// Falha injetada pelo backend em memória
    #[error("{0}")]
    Rejected(String),
}

/// Trait para backends de persistência das avaliações
#[async_trait]
pub trait EvaluationStore: Send + Sync {
    /// Nome do backend (para logs)
    fn name(&self) -> &'static str;

    /// Atualiza a linha `id`. Devolve o payload do store (linhas afetadas,
    /// contagem, ou `null`).
    async fn update_evaluation(
        &self,
        id: &str,
        update: &EvaluationUpdate,
    ) -> Result<serde_json::Value, StoreError>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BACKEND: Supabase (PostgREST)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Corpo de erro do PostgREST
#[derive(Debug, Deserialize)]
struct PostgrestError {
    message: String,
}

/// Cliente REST para a tabela de avaliações no Supabase.
pub struct SupabaseStore {
    base_url: String,
    api_key: String,
    table: String,
    client: reqwest::Client,
}

impl SupabaseStore {
    pub fn new(config: &StoreConfig) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StoreError::Network(e.to_string()))?;

        Ok(Self {
            base_url: config.url.as_str().trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            table: config.table.clone(),
            client,
        })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }
}

/// Extrai `message` do corpo de erro; se não for JSON, usa o texto cru.
fn postgrest_message(status: u16, body: &str) -> String {
    match serde_json::from_str::<PostgrestError>(body) {
        Ok(err) => err.message,
        Err(_) if !body.trim().is_empty() => body.trim().to_string(),
        Err(_) => format!("HTTP {}", status),
    }
}

#[async_trait]
impl EvaluationStore for SupabaseStore {
    fn name(&self) -> &'static str {
        "supabase"
    }

    async fn update_evaluation(
        &self,
        id: &str,
        update: &EvaluationUpdate,
    ) -> Result<serde_json::Value, StoreError> {
        let response = self
            .client
            .patch(self.table_url())
            .query(&[("id", format!("eq.{}", id))])
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Prefer", "return=representation")
            .json(update)
            .send()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| StoreError::Network(e.to_string()))?;

        if !(200..300).contains(&status) {
            return Err(StoreError::Api {
                status,
                message: postgrest_message(status, &body),
            });
        }

        let data = if body.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(&body).map_err(|e| StoreError::Parse(e.to_string()))?
        };

        if data.as_array().map_or(false, |rows| rows.is_empty()) {
            log::warn!("[{}] nenhuma linha com id={} em {}", self.name(), id, self.table);
        }

        Ok(data)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BACKEND: PostgreSQL direto
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(feature = "postgres")]
pub struct PostgresStore {
    pool: sqlx::PgPool,
    table: String,
}

#[cfg(feature = "postgres")]
impl PostgresStore {
    pub async fn connect(database_url: &str, table: &str) -> Result<Self, StoreError> {
        let pool = sqlx::PgPool::connect(database_url)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        Ok(Self {
            pool,
            table: table.to_string(),
        })
    }
}

#[cfg(feature = "postgres")]
#[async_trait]
impl EvaluationStore for PostgresStore {
    fn name(&self) -> &'static str {
        "postgres"
    }

    async fn update_evaluation(
        &self,
        id: &str,
        update: &EvaluationUpdate,
    ) -> Result<serde_json::Value, StoreError> {
        // Nome da tabela já validado em config::validate_table_name
        let sql = format!(
            "UPDATE \"{}\" SET puntaje_total = $1, feedback = $2, estado = $3 WHERE id::text = $4",
            self.table
        );

        let result = sqlx::query(&sql)
            .bind(update.puntaje_total)
            .bind(&update.feedback)
            .bind(&update.estado)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;

        if result.rows_affected() == 0 {
            log::warn!("[postgres] nenhuma linha com id={} em {}", id, self.table);
        }

        Ok(serde_json::json!({ "rows_affected": result.rows_affected() }))
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BACKEND: Memória - testes e execução local
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Store em memória. Só atualiza linhas previamente semeadas, como o
/// update filtrado do PostgREST.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    rows: Mutex<HashMap<String, Option<EvaluationUpdate>>>,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Semeia linhas ainda não avaliadas.
    pub fn with_rows<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rows = ids.into_iter().map(|id| (id.into(), None)).collect();
        Self {
            rows: Mutex::new(rows),
            ..Self::default()
        }
    }

    /// Todo update falha com `message`.
    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    pub fn get(&self, id: &str) -> Option<EvaluationUpdate> {
        let rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        rows.get(id).cloned().flatten()
    }

    /// Quantas vezes `update_evaluation` foi chamado.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EvaluationStore for InMemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn update_evaluation(
        &self,
        id: &str,
        update: &EvaluationUpdate,
    ) -> Result<serde_json::Value, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(message) = &self.failure {
            return Err(StoreError::Rejected(message.clone()));
        }

        let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
        match rows.get_mut(id) {
            Some(row) => {
                *row = Some(update.clone());
                let mut value = serde_json::to_value(update)
                    .map_err(|e| StoreError::Parse(e.to_string()))?;
                value["id"] = serde_json::Value::String(id.to_string());
                Ok(serde_json::Value::Array(vec![value]))
            }
            None => Ok(serde_json::Value::Array(vec![])),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_update(score: Option<i64>) -> EvaluationUpdate {
        EvaluationUpdate {
            puntaje_total: score,
            feedback: "bien".into(),
            estado: ESTADO_EVALUADO.into(),
        }
    }

    #[test]
    fn test_update_serializes_column_names() {
        let json = serde_json::to_value(sample_update(None)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "puntaje_total": null,
                "feedback": "bien",
                "estado": "evaluado"
            })
        );
    }

    #[test]
    fn test_postgrest_message_extraction() {
        assert_eq!(
            postgrest_message(400, r#"{"code":"22P02","message":"invalid input syntax","details":null,"hint":null}"#),
            "invalid input syntax"
        );
        assert_eq!(postgrest_message(502, "Bad Gateway"), "Bad Gateway");
        assert_eq!(postgrest_message(503, "   "), "HTTP 503");
    }

    #[tokio::test]
    async fn test_memory_store_updates_seeded_row() {
        let store = InMemoryStore::with_rows(["42"]);
        let data = store
            .update_evaluation("42", &sample_update(Some(80)))
            .await
            .unwrap();

        assert_eq!(data[0]["id"], "42");
        assert_eq!(data[0]["puntaje_total"], 80);
        assert_eq!(store.get("42"), Some(sample_update(Some(80))));
        assert_eq!(store.call_count(), 1);
    }

    #[tokio::test]
    async fn test_memory_store_overwrites_evaluated_row() {
        let store = InMemoryStore::with_rows(["1"]);
        store.update_evaluation("1", &sample_update(Some(10))).await.unwrap();
        store.update_evaluation("1", &sample_update(Some(99))).await.unwrap();
        assert_eq!(store.get("1").unwrap().puntaje_total, Some(99));
    }

    #[tokio::test]
    async fn test_memory_store_unknown_id_updates_nothing() {
        let store = InMemoryStore::with_rows(["1"]);
        let data = store
            .update_evaluation("2", &sample_update(None))
            .await
            .unwrap();
        assert_eq!(data, serde_json::json!([]));
        assert!(store.get("2").is_none());
    }

    #[tokio::test]
    async fn test_memory_store_failure() {
        let store = InMemoryStore::failing("permission denied");
        let err = store
            .update_evaluation("1", &sample_update(None))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "permission denied");
        assert_eq!(store.call_count(), 1);
    }
}
