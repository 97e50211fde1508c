//! # Dialog Evaluator
//!
//! Serviço HTTP que avalia a qualidade de um diálogo usando um LLM e grava
//! o resultado (`puntaje`, `comentario`) numa tabela do Supabase.
//!
//! ## Fluxo de um request
//!
//! 1. `POST /api/evaluar` com `{ "id": ..., "texto": ... }`
//! 2. Sorteia uma chave do pool (`OPENAI_API_KEYS`)
//! 3. Monta o prompt e chama a API de chat completions
//! 4. Extrai `{puntaje, comentario}` do texto livre (primeiro `{` até o último `}`)
//! 5. Atualiza a linha `id`: `puntaje_total`, `feedback`, `estado = "evaluado"`
//!
//! Sem retry, sem fila: se o update falhar, o outcome volta só no corpo do erro.
//!
//! ## Exemplo de Uso
//!
//! ```rust,ignore
//! use dialog_evaluator::prelude::*;
//!
//! let evaluator = Evaluator::new(llm, store, ApiKeyPool::from_env());
//! let report = evaluator
//!     .evaluate(&EvaluationRequest { id: "42".into(), texto: dialogo })
//!     .await?;
//! println!("{:?}", report.outcome.puntaje);
//! ```

#![warn(rust_2018_idioms)]

/// Configuração do serviço (LLM, store, servidor) e do runtime Tokio.
///
/// Variáveis principais:
/// - `SUPABASE_URL`, `SUPABASE_SERVICE_KEY` / `SUPABASE_ANON_KEY`
/// - `EVALUATION_TABLE` (padrão: "evaluaciones")
/// - `LLM_MODEL` (padrão: "gpt-4o-mini"), `LLM_MAX_TOKENS` (padrão: 500)
/// - `LLM_TEMPERATURE` (padrão: 0.0), `LLM_TIMEOUT_SECS` (padrão: 60)
/// - `SERVER_HOST` / `SERVER_PORT`
/// - `TOKIO_THREADS` / `TOKIO_MAX_THREADS`
pub mod config;

/// Pool de chaves da API com sorteio uniforme por request.
pub mod keys;

/// Prompt de avaliação enviado ao modelo.
pub mod prompts;

/// Extração best-effort do `{puntaje, comentario}` da resposta do modelo.
pub mod extraction;

/// Clientes LLM: trait `LlmClient`, OpenAI e mock para testes.
pub mod llm;

/// Backends de persistência: Supabase (PostgREST), Postgres direto
/// (feature `postgres`) e memória.
pub mod store;

/// Orquestração de uma avaliação completa.
pub mod evaluator;

/// Servidor HTTP (axum).
pub mod server;

// Re-exports principais
pub use config::{
    create_tokio_runtime, install_panic_hook, load_runtime_config, load_service_config,
    LlmConfig, RuntimeConfig, ServerConfig, ServiceConfig, StoreConfig,
};
pub use evaluator::{EvaluationError, EvaluationReport, EvaluationRequest, Evaluator};
pub use extraction::{extract_outcome, EvaluationOutcome};
pub use keys::ApiKeyPool;

/// Versão da biblioteca.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude com imports comuns.
pub mod prelude {
    pub use crate::evaluator::{EvaluationError, EvaluationReport, EvaluationRequest, Evaluator};
    pub use crate::extraction::{extract_outcome, EvaluationOutcome};
    pub use crate::keys::ApiKeyPool;
    pub use crate::llm::{LlmClient, OpenAiClient};
    pub use crate::prompts::{build_evaluation_prompt, PromptPair};
    pub use crate::store::{EvaluationStore, EvaluationUpdate, InMemoryStore, SupabaseStore};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
