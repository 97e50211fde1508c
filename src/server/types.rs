// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SCHEMAS API - POST /api/evaluar
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use crate::evaluator::EvaluationRequest;
use crate::extraction::EvaluationOutcome;

// ─────────────────────────────────────────────────
// Request
// ─────────────────────────────────────────────────

/// Corpo cru do request. Tudo opcional: a presença é checada em
/// [`EvaluarBody::into_request`] para devolver 400 com os campos faltantes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EvaluarBody {
    #[serde(default)]
    pub id: Option<serde_json::Value>,
    #[serde(default)]
    pub texto: Option<serde_json::Value>,
}

impl EvaluarBody {
    /// Valida `id` e `texto`.
    ///
    /// `id` aceita string não vazia ou número; `texto` só string não vazia.
    /// Em caso de erro devolve os nomes dos campos faltantes.
    pub fn into_request(self) -> Result<EvaluationRequest, Vec<&'static str>> {
        let id = match self.id {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        };
        let texto = match self.texto {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s),
            _ => None,
        };

        match (id, texto) {
            (Some(id), Some(texto)) => Ok(EvaluationRequest { id, texto }),
            (id, texto) => {
                let mut missing = Vec::new();
                if id.is_none() {
                    missing.push("id");
                }
                if texto.is_none() {
                    missing.push("texto");
                }
                Err(missing)
            }
        }
    }
}

// ─────────────────────────────────────────────────
// Responses
// ─────────────────────────────────────────────────

/// Resposta 200
#[derive(Debug, Serialize)]
pub struct EvaluarResponse {
    /// Sempre true
    pub success: bool,
    pub result: EvaluationOutcome,
    pub data: serde_json::Value,
}

/// Corpo dos erros 4xx/5xx
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Outcome calculado antes de uma falha de persistência
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<EvaluationOutcome>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            detail: None,
            result: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_result(mut self, result: EvaluationOutcome) -> Self {
        self.result = Some(result);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(json: serde_json::Value) -> EvaluarBody {
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_valid_body() {
        let request = body(serde_json::json!({ "id": "abc", "texto": "hola" }))
            .into_request()
            .unwrap();
        assert_eq!(request.id, "abc");
        assert_eq!(request.texto, "hola");
    }

    #[test]
    fn test_numeric_id_is_accepted() {
        let request = body(serde_json::json!({ "id": 42, "texto": "hola" }))
            .into_request()
            .unwrap();
        assert_eq!(request.id, "42");
    }

    #[test]
    fn test_missing_fields_are_named() {
        assert_eq!(
            body(serde_json::json!({})).into_request().unwrap_err(),
            vec!["id", "texto"]
        );
        assert_eq!(
            body(serde_json::json!({ "id": "1", "texto": "" }))
                .into_request()
                .unwrap_err(),
            vec!["texto"]
        );
        assert_eq!(
            body(serde_json::json!({ "id": null, "texto": "x" }))
                .into_request()
                .unwrap_err(),
            vec!["id"]
        );
        assert_eq!(
            body(serde_json::json!({ "id": "1", "texto": 5 }))
                .into_request()
                .unwrap_err(),
            vec!["texto"]
        );
    }

    #[test]
    fn test_error_body_omits_empty_fields() {
        let json = serde_json::to_value(ErrorBody::new("boom")).unwrap();
        assert_eq!(json, serde_json::json!({ "error": "boom" }));

        let json = serde_json::to_value(
            ErrorBody::new("Supabase update error")
                .with_detail("denied")
                .with_result(EvaluationOutcome::unparsed("x")),
        )
        .unwrap();
        assert_eq!(json["detail"], "denied");
        assert_eq!(json["result"]["comentario"], "x");
    }
}
