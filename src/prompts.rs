// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PROMPTS DE AVALIAÇÃO
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// O diálogo entra verbatim no prompt: sem escape, sem validação.
// O texto é payload opaco para a API de completions.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Par de prompts (sistema + usuário)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPair {
    pub system: String,
    pub user: String,
}

/// Mensagem de sistema enviada em toda avaliação.
pub const EVALUATOR_SYSTEM_PROMPT: &str = "Eres un evaluador de calidad.";

/// Monta o prompt que pede ao modelo um JSON `{"puntaje", "comentario"}`.
pub fn build_evaluation_prompt(texto: &str) -> PromptPair {
    let user = format!(
        "Eres un evaluador de calidad. Evalúa el siguiente diálogo y devuelve JSON con \
         \"puntaje\" (0-100) y \"comentario\".\n\n\
         DIALOGO:\n{}\n\n\
         RESPONDE sólo JSON: {{\"puntaje\": 85, \"comentario\": \"Texto...\"}}",
        texto
    );

    PromptPair {
        system: EVALUATOR_SYSTEM_PROMPT.to_string(),
        user,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_dialogue_verbatim() {
        let texto = "Agente: Hola\nCliente: {\"raro\": true} \\n";
        let prompt = build_evaluation_prompt(texto);
        assert!(prompt.user.contains(&format!("DIALOGO:\n{}\n\n", texto)));
    }

    #[test]
    fn test_prompt_requests_json_shape() {
        let prompt = build_evaluation_prompt("x");
        assert!(prompt.user.contains("\"puntaje\" (0-100)"));
        assert!(prompt
            .user
            .ends_with("RESPONDE sólo JSON: {\"puntaje\": 85, \"comentario\": \"Texto...\"}"));
        assert_eq!(prompt.system, EVALUATOR_SYSTEM_PROMPT);
    }
}
