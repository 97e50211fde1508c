// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// POOL DE CHAVES DA API
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Lista imutável de credenciais carregada uma vez na inicialização.
// Cada request sorteia uma chave de forma uniforme, sem estado de rotação.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use rand::seq::SliceRandom;
use std::fmt;

/// Variável de ambiente com as chaves (JSON array ou lista separada por vírgula).
pub const KEYS_ENV_VAR: &str = "OPENAI_API_KEYS";

/// Erros do pool de chaves
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyPoolError {
    #[error("No OpenAI keys configured")]
    Empty,
}

/// Pool de credenciais para distribuir carga entre várias chaves.
///
/// Construído uma vez e compartilhado somente para leitura.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ApiKeyPool {
    keys: Vec<String>,
}

impl ApiKeyPool {
    /// Cria o pool a partir de uma lista já separada.
    ///
    /// Entradas vazias (após `trim`) são descartadas.
    pub fn new(keys: Vec<String>) -> Self {
        let keys = keys
            .into_iter()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .collect();
        Self { keys }
    }

    /// Interpreta o valor bruto da configuração.
    ///
    /// Tenta primeiro um JSON array de strings (`["sk-a","sk-b"]`);
    /// se não for JSON válido nesse formato, separa por vírgula.
    pub fn parse(raw: &str) -> Self {
        match serde_json::from_str::<Vec<String>>(raw) {
            Ok(keys) => Self::new(keys),
            Err(_) => Self::new(raw.split(',').map(str::to_string).collect()),
        }
    }

    /// Carrega de `OPENAI_API_KEYS`. Ausente equivale a `[]`.
    pub fn from_env() -> Self {
        let raw = std::env::var(KEYS_ENV_VAR).unwrap_or_else(|_| "[]".to_string());
        let pool = Self::parse(&raw);
        if pool.is_empty() {
            log::warn!("⚠ {} sem chaves: todas as avaliações vão falhar", KEYS_ENV_VAR);
        } else {
            log::info!("🔑 {} chaves carregadas de {}", pool.len(), KEYS_ENV_VAR);
        }
        pool
    }

    /// Sorteia uma chave com probabilidade uniforme.
    pub fn pick(&self) -> Result<&str, KeyPoolError> {
        self.keys
            .choose(&mut rand::thread_rng())
            .map(String::as_str)
            .ok_or(KeyPoolError::Empty)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }
}

// Nunca imprime as chaves em logs.
impl fmt::Debug for ApiKeyPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKeyPool")
            .field("len", &self.keys.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_array() {
        let pool = ApiKeyPool::parse(r#"["sk-AAA","sk-BBB"]"#);
        assert_eq!(pool.len(), 2);
        assert!(pool.contains("sk-AAA"));
        assert!(pool.contains("sk-BBB"));
    }

    #[test]
    fn test_parse_comma_separated() {
        let pool = ApiKeyPool::parse(" sk-AAA , sk-BBB,,  ");
        assert_eq!(pool, ApiKeyPool::parse(r#"["sk-AAA","sk-BBB"]"#));
    }

    #[test]
    fn test_parse_single_bare_key() {
        let pool = ApiKeyPool::parse("sk-ONLY");
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.pick().unwrap(), "sk-ONLY");
    }

    #[test]
    fn test_parse_empty_sources() {
        assert!(ApiKeyPool::parse("[]").is_empty());
        assert!(ApiKeyPool::parse("").is_empty());
        assert!(ApiKeyPool::parse(r#"["", "  "]"#).is_empty());
    }

    #[test]
    fn test_pick_empty_pool_fails() {
        let pool = ApiKeyPool::default();
        assert_eq!(pool.pick(), Err(KeyPoolError::Empty));
        assert_eq!(KeyPoolError::Empty.to_string(), "No OpenAI keys configured");
    }

    #[test]
    fn test_pick_always_returns_configured_key() {
        let pool = ApiKeyPool::parse("k1,k2,k3");
        for _ in 0..200 {
            let key = pool.pick().unwrap();
            assert!(pool.contains(key), "chave fora do pool: {}", key);
        }
    }

    #[test]
    fn test_pick_eventually_uses_every_key() {
        let pool = ApiKeyPool::parse("k1,k2");
        let mut seen = std::collections::HashSet::new();
        for _ in 0..500 {
            seen.insert(pool.pick().unwrap().to_string());
        }
        assert_eq!(seen.len(), 2);
    }

    #[test]
    fn test_debug_hides_keys() {
        let pool = ApiKeyPool::parse("sk-secret");
        let debug = format!("{:?}", pool);
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("len: 1"));
    }
}
