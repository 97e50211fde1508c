// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// CONFIGURAÇÃO DO SERVIÇO E DO RUNTIME
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Tudo vem de variáveis de ambiente (ou .env carregado pelo main).
// A configuração é lida uma vez na inicialização e não muda depois.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

/// Erros de configuração
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} não definido")]
    Missing(&'static str),

    #[error("{var} inválido: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Configuração da API de completions.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Modelo (padrão: "gpt-4o-mini")
    pub model: String,
    /// URL base, sem `/chat/completions`
    pub api_base_url: String,
    /// Limite de tokens de saída (padrão: 500)
    pub max_tokens: u32,
    /// Temperatura; `None` omite o campo no request
    pub temperature: Option<f32>,
    /// Timeout da chamada (padrão: 60s)
    pub timeout: Duration,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            api_base_url: "https://api.openai.com/v1".to_string(),
            max_tokens: 500,
            temperature: Some(0.0),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Configuração do store de avaliações.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// `SUPABASE_URL`
    pub url: Url,
    /// Service key (preferida) ou anon key
    pub api_key: String,
    /// Tabela das avaliações (padrão: "evaluaciones")
    pub table: String,
    pub timeout: Duration,
    /// Com a feature `postgres`, usa conexão direta em vez do PostgREST
    pub database_url: Option<String>,
}

/// Endereço do servidor HTTP.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
                var: "SERVER_HOST",
                reason: e.to_string(),
            })
    }
}

/// Configuração completa do serviço.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub llm: LlmConfig,
    pub store: StoreConfig,
    pub server: ServerConfig,
}

impl ServiceConfig {
    /// Monta a configuração a partir de uma função de lookup.
    ///
    /// Valores vazios contam como ausentes.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        // LLM
        let mut llm = LlmConfig::default();
        if let Some(model) = get("LLM_MODEL") {
            llm.model = model;
        }
        if let Some(base) = get("LLM_API_BASE_URL") {
            Url::parse(&base).map_err(|e| ConfigError::Invalid {
                var: "LLM_API_BASE_URL",
                reason: e.to_string(),
            })?;
            llm.api_base_url = base;
        }
        if let Some(max) = get("LLM_MAX_TOKENS") {
            llm.max_tokens = parse_number("LLM_MAX_TOKENS", &max)?;
        }
        if let Some(temp) = get("LLM_TEMPERATURE") {
            llm.temperature = match temp.trim().to_lowercase().as_str() {
                "none" | "off" => None,
                value => Some(parse_number("LLM_TEMPERATURE", value)?),
            };
        }
        if let Some(secs) = get("LLM_TIMEOUT_SECS") {
            llm.timeout = Duration::from_secs(parse_number("LLM_TIMEOUT_SECS", &secs)?);
        }

        // Store
        let raw_url = get("SUPABASE_URL").ok_or(ConfigError::Missing("SUPABASE_URL"))?;
        let url = Url::parse(&raw_url).map_err(|e| ConfigError::Invalid {
            var: "SUPABASE_URL",
            reason: e.to_string(),
        })?;
        let api_key = get("SUPABASE_SERVICE_KEY")
            .or_else(|| get("SUPABASE_ANON_KEY"))
            .ok_or(ConfigError::Missing("SUPABASE_SERVICE_KEY ou SUPABASE_ANON_KEY"))?;
        let table = get("EVALUATION_TABLE").unwrap_or_else(|| "evaluaciones".to_string());
        validate_table_name(&table)?;
        let store_timeout = match get("STORE_TIMEOUT_SECS") {
            Some(secs) => Duration::from_secs(parse_number("STORE_TIMEOUT_SECS", &secs)?),
            None => Duration::from_secs(30),
        };

        let store = StoreConfig {
            url,
            api_key,
            table,
            timeout: store_timeout,
            database_url: get("DATABASE_URL"),
        };

        // Server
        let mut server = ServerConfig::default();
        if let Some(host) = get("SERVER_HOST") {
            server.host = host;
        }
        if let Some(port) = get("SERVER_PORT") {
            server.port = parse_number("SERVER_PORT", &port)?;
        }

        Ok(Self { llm, store, server })
    }
}

fn parse_number<T>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| ConfigError::Invalid {
        var,
        reason: format!("'{}': {}", value, e),
    })
}

/// A tabela entra em URL (PostgREST) e em SQL (postgres): só identificadores simples.
pub fn validate_table_name(table: &str) -> Result<(), ConfigError> {
    let valid = table
        .chars()
        .next()
        .map_or(false, |c| c.is_ascii_alphabetic() || c == '_')
        && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');

    if valid {
        Ok(())
    } else {
        Err(ConfigError::Invalid {
            var: "EVALUATION_TABLE",
            reason: format!("'{}' não é um identificador simples", table),
        })
    }
}

/// Carrega a configuração do serviço das variáveis de ambiente.
///
/// Variáveis suportadas:
/// - `SUPABASE_URL` (obrigatória)
/// - `SUPABASE_SERVICE_KEY` ou `SUPABASE_ANON_KEY` (obrigatória)
/// - `EVALUATION_TABLE` (padrão: "evaluaciones")
/// - `STORE_TIMEOUT_SECS` (padrão: 30)
/// - `DATABASE_URL` (opcional, feature `postgres`)
/// - `LLM_MODEL`, `LLM_API_BASE_URL`, `LLM_MAX_TOKENS`, `LLM_TEMPERATURE`, `LLM_TIMEOUT_SECS`
/// - `SERVER_HOST`, `SERVER_PORT`
///
/// As chaves da OpenAI ficam fora daqui: ver [`crate::keys::ApiKeyPool::from_env`].
pub fn load_service_config() -> Result<ServiceConfig, ConfigError> {
    let config = ServiceConfig::from_lookup(|name| std::env::var(name).ok())?;

    log::info!(
        "📦 LLM: {} (max_tokens={}, temperature={:?}, timeout={}s)",
        config.llm.model,
        config.llm.max_tokens,
        config.llm.temperature,
        config.llm.timeout.as_secs()
    );
    log::info!(
        "📦 Store: {} tabela={}",
        config.store.url,
        config.store.table
    );

    Ok(config)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// RUNTIME TOKIO
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Configuração do runtime Tokio.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Número fixo de worker threads; `None` = min(cpu_cores, max_threads)
    pub worker_threads: Option<usize>,
    /// Padrão: 16
    pub max_threads: usize,
    pub thread_name: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: None,
            max_threads: 16,
            thread_name: "dialog-evaluator".to_string(),
        }
    }
}

impl RuntimeConfig {
    /// Número efetivo de worker threads.
    pub fn effective_worker_threads(&self) -> usize {
        self.worker_threads
            .unwrap_or_else(|| std::cmp::min(num_cpus::get(), self.max_threads))
            .max(1)
    }
}

/// Lê `TOKIO_THREADS` e `TOKIO_MAX_THREADS`. Valores inválidos ou zero são ignorados.
pub fn load_runtime_config() -> RuntimeConfig {
    let mut config = RuntimeConfig::default();

    let positive = |name: &str| {
        std::env::var(name)
            .ok()
            .and_then(|v| v.trim().parse::<usize>().ok())
            .filter(|v| *v > 0)
    };

    if let Some(threads) = positive("TOKIO_THREADS") {
        config.worker_threads = Some(threads);
        log::info!("📦 TOKIO_THREADS={} (fixo)", threads);
    }
    if let Some(max) = positive("TOKIO_MAX_THREADS") {
        config.max_threads = max;
        log::info!("📦 TOKIO_MAX_THREADS={}", max);
    }

    config
}

/// Instala panic hook que só loga (thread, local, mensagem).
///
/// Um panic dentro de um handler derruba apenas a task; o servidor continua.
pub fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let thread = std::thread::current();
        let thread_name = thread.name().unwrap_or("unnamed");

        let location = panic_info
            .location()
            .map(|loc| format!("{}:{}:{}", loc.file(), loc.line(), loc.column()))
            .unwrap_or_else(|| "unknown location".to_string());

        let message = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic payload".to_string()
        };

        log::error!("[PANIC] Thread {} at {}: {}", thread_name, location, message);
    }));
}

/// Cria o runtime multi-thread com a configuração informada.
pub fn create_tokio_runtime(config: &RuntimeConfig) -> std::io::Result<tokio::runtime::Runtime> {
    let worker_threads = config.effective_worker_threads();
    log::info!("🚀 Criando runtime Tokio: {} workers", worker_threads);

    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_threads)
        .thread_name(&config.thread_name)
        .enable_all()
        .build()
}
