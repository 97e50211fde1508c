// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// EXTRAÇÃO DO RESULTADO - texto livre → {puntaje, comentario}
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Heurística best-effort: pega do primeiro `{` até o último `}` e tenta
// desserializar. Qualquer falha devolve o texto bruto como comentário.
//
// Limitação conhecida: com dois fragmentos JSON na mesma resposta, ou chaves
// soltas na prosa ao redor, o recorte fica inválido e cai no fallback.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::{de, Deserialize, Deserializer, Serialize};

use crate::store::{EvaluationUpdate, ESTADO_EVALUADO};

/// Resultado estruturado recuperado da resposta do modelo.
///
/// `puntaje` deveria estar em 0..=100, mas não é validado.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    #[serde(default, deserialize_with = "deserialize_score")]
    pub puntaje: Option<i64>,
    #[serde(default)]
    pub comentario: Option<String>,
}

impl EvaluationOutcome {
    /// Outcome padrão quando nada pôde ser extraído.
    pub fn unparsed(content: &str) -> Self {
        Self {
            puntaje: None,
            comentario: Some(content.to_string()),
        }
    }

    /// Converte no patch da linha persistida.
    ///
    /// `feedback` usa o comentário, ou o conteúdo bruto se ele faltar ou vier vazio.
    pub fn to_update(&self, raw_content: &str) -> EvaluationUpdate {
        let feedback = self
            .comentario
            .as_deref()
            .filter(|c| !c.is_empty())
            .unwrap_or(raw_content)
            .to_string();

        EvaluationUpdate {
            puntaje_total: self.puntaje,
            feedback,
            estado: ESTADO_EVALUADO.to_string(),
        }
    }
}

/// Aceita inteiro, número decimal (arredondado) ou null.
fn deserialize_score<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<serde_json::Value>::deserialize(deserializer)? {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .map(Some)
            .ok_or_else(|| de::Error::custom(format!("puntaje fora do intervalo: {}", n))),
        Some(other) => Err(de::Error::custom(format!(
            "puntaje deve ser numérico, recebido: {}",
            other
        ))),
    }
}

/// Recorte do primeiro `{` ao último `}` (inclusive), se ambos existirem
/// na ordem certa.
pub fn json_candidate(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    if start > end {
        return None;
    }
    Some(&content[start..=end])
}

/// Recupera o `EvaluationOutcome` do conteúdo bruto da resposta.
///
/// Nunca falha: se o recorte não for o formato esperado, devolve
/// `puntaje = None` e o conteúdo inteiro como comentário.
pub fn extract_outcome(content: &str) -> EvaluationOutcome {
    let candidate = match json_candidate(content) {
        Some(c) => c,
        None => {
            log::warn!("No se pudo parsear JSON, guardamos texto completo (sem bloco {{...}})");
            return EvaluationOutcome::unparsed(content);
        }
    };

    match serde_json::from_str::<EvaluationOutcome>(candidate) {
        Ok(outcome) => {
            if let Some(score) = outcome.puntaje {
                if !(0..=100).contains(&score) {
                    log::warn!("puntaje fora de 0-100: {}", score);
                }
            }
            outcome
        }
        Err(e) => {
            log::warn!("No se pudo parsear JSON, guardamos texto completo: {}", e);
            EvaluationOutcome::unparsed(content)
        }
    }
}
