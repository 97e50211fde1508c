// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// AVALIADOR - chave → prompt → completion → extração → persistência
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Fluxo sequencial, um request por vez: a única espera é a chamada ao LLM
// seguida do update no store. Se o update falhar, o outcome calculado se
// perde (só volta no erro, para diagnóstico).
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::sync::Arc;
use std::time::Instant;

use crate::extraction::{extract_outcome, EvaluationOutcome};
use crate::keys::{ApiKeyPool, KeyPoolError};
use crate::llm::{LlmClient, LlmError};
use crate::prompts::build_evaluation_prompt;
use crate::store::{EvaluationStore, StoreError};

/// Pedido de avaliação já validado.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationRequest {
    /// Referência opaca para uma linha existente
    pub id: String,
    /// Diálogo a ser avaliado
    pub texto: String,
}

/// Resultado de uma avaliação persistida.
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub outcome: EvaluationOutcome,
    /// Conteúdo bruto devolvido pelo modelo
    pub raw_content: String,
    /// Payload devolvido pelo store
    pub data: serde_json::Value,
}

/// Erros do fluxo de avaliação
#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    /// Pool vazio: erro de configuração, nenhuma chamada externa foi feita
    #[error(transparent)]
    Keys(#[from] KeyPoolError),

    /// Status não-2xx do provedor; o store não é tocado
    #[error("OpenAI API error")]
    Upstream { status: u16, detail: String },

    /// Falha de rede ou resposta ilegível do provedor
    #[error("{0}")]
    Llm(LlmError),

    /// Falha no update; carrega o outcome calculado
    #[error("Supabase update error: {source}")]
    Store {
        source: StoreError,
        outcome: EvaluationOutcome,
    },
}

impl From<LlmError> for EvaluationError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::ApiError { status, body } => Self::Upstream {
                status,
                detail: body,
            },
            other => Self::Llm(other),
        }
    }
}

/// Orquestra uma avaliação completa.
///
/// Recebe o pool de chaves pronto (carregado na inicialização) e os dois
/// colaboradores externos via trait.
pub struct Evaluator {
    llm: Arc<dyn LlmClient>,
    store: Arc<dyn EvaluationStore>,
    keys: ApiKeyPool,
}

impl Evaluator {
    pub fn new(llm: Arc<dyn LlmClient>, store: Arc<dyn EvaluationStore>, keys: ApiKeyPool) -> Self {
        Self { llm, store, keys }
    }

    pub fn keys(&self) -> &ApiKeyPool {
        &self.keys
    }

    pub fn store_name(&self) -> &'static str {
        self.store.name()
    }

    pub async fn evaluate(
        &self,
        request: &EvaluationRequest,
    ) -> Result<EvaluationReport, EvaluationError> {
        let api_key = self.keys.pick()?;
        let prompt = build_evaluation_prompt(&request.texto);

        let start = Instant::now();
        let content = match self.llm.complete(api_key, &prompt).await {
            Ok(content) => content,
            Err(err) => {
                match &err {
                    LlmError::ApiError { status, body } => {
                        log::error!("OpenAI error {} {}", status, body)
                    }
                    other => log::error!("OpenAI request failed: {}", other),
                }
                return Err(err.into());
            }
        };
        log::info!(
            "🤖 Completion para id={} em {}ms ({} chars)",
            request.id,
            start.elapsed().as_millis(),
            content.len()
        );

        let outcome = extract_outcome(&content);
        let update = outcome.to_update(&content);

        let data = match self.store.update_evaluation(&request.id, &update).await {
            Ok(data) => data,
            Err(source) => {
                log::error!("[{}] update error: {}", self.store.name(), source);
                return Err(EvaluationError::Store { source, outcome });
            }
        };

        log::info!(
            "✅ id={} avaliado (puntaje={:?})",
            request.id,
            outcome.puntaje
        );

        Ok(EvaluationReport {
            outcome,
            raw_content: content,
            data,
        })
    }
}
