// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DIALOG EVALUATOR SERVER
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//
// Uso:
//   dialog-evaluator-server
//   dialog-evaluator-server --port=8080
//   dialog-evaluator-server --host=127.0.0.1 --port=8080
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use dialog_evaluator::config::{self, ServerConfig, ServiceConfig, StoreConfig};
use dialog_evaluator::llm::OpenAiClient;
use dialog_evaluator::server::{self, AppState};
use dialog_evaluator::store::{EvaluationStore, SupabaseStore};
use dialog_evaluator::{ApiKeyPool, Evaluator};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

/// Tenta carregar o arquivo .env de múltiplos locais possíveis
fn load_dotenv() {
    let possible_paths = [
        PathBuf::from(".env"),
        PathBuf::from("../.env"),
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join(".env"),
    ];

    for path in &possible_paths {
        if path.exists() {
            match dotenvy::from_path(path) {
                Ok(_) => {
                    eprintln!("✓ Carregado .env de: {:?}", path);
                    return;
                }
                Err(e) => {
                    eprintln!("⚠ Erro ao carregar {:?}: {}", path, e);
                }
            }
        }
    }

    eprintln!("⚠ Nenhum arquivo .env encontrado; usando apenas variáveis de ambiente.");
}

/// Aplica `--host=` e `--port=` sobre a configuração do ambiente.
fn apply_args(args: &[String], server: &mut ServerConfig) -> anyhow::Result<()> {
    for arg in args {
        if let Some(port) = arg.strip_prefix("--port=") {
            server.port = port
                .parse()
                .map_err(|e| anyhow::anyhow!("--port inválido '{}': {}", port, e))?;
        } else if let Some(host) = arg.strip_prefix("--host=") {
            server.host = host.to_string();
        } else {
            anyhow::bail!("argumento desconhecido: {}", arg);
        }
    }
    Ok(())
}

fn print_usage(program: &str) {
    eprintln!("Dialog Evaluator v{}", dialog_evaluator::VERSION);
    eprintln!();
    eprintln!("Uso: {} [--host=HOST] [--port=PORT]", program);
    eprintln!();
    eprintln!("Variáveis obrigatórias: SUPABASE_URL, SUPABASE_SERVICE_KEY (ou SUPABASE_ANON_KEY),");
    eprintln!("OPENAI_API_KEYS (JSON array ou lista separada por vírgula).");
}

#[cfg(feature = "postgres")]
async fn connect_postgres(config: &StoreConfig) -> anyhow::Result<Option<Arc<dyn EvaluationStore>>> {
    let database_url = match &config.database_url {
        Some(url) => url,
        None => return Ok(None),
    };
    let store = dialog_evaluator::store::PostgresStore::connect(database_url, &config.table).await?;
    log::info!("🗄 Store: postgres (DATABASE_URL)");
    Ok(Some(Arc::new(store)))
}

#[cfg(not(feature = "postgres"))]
async fn connect_postgres(config: &StoreConfig) -> anyhow::Result<Option<Arc<dyn EvaluationStore>>> {
    if config.database_url.is_some() {
        log::warn!("DATABASE_URL ignorado: compile com --features postgres");
    }
    Ok(None)
}

async fn build_store(config: &StoreConfig) -> anyhow::Result<Arc<dyn EvaluationStore>> {
    if let Some(store) = connect_postgres(config).await? {
        return Ok(store);
    }

    log::info!("🗄 Store: supabase ({})", config.url);
    Ok(Arc::new(SupabaseStore::new(config)?))
}

fn main() -> anyhow::Result<()> {
    // Carregar .env PRIMEIRO, antes de qualquer coisa
    load_dotenv();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    config::install_panic_hook();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().cloned().unwrap_or_else(|| "dialog-evaluator-server".into());
    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage(&program);
        return Ok(());
    }

    let mut service_config = config::load_service_config()?;
    if let Err(e) = apply_args(args.get(1..).unwrap_or_default(), &mut service_config.server) {
        print_usage(&program);
        return Err(e);
    }
    let addr = service_config.server.socket_addr()?;
    let keys = ApiKeyPool::from_env();

    let runtime = config::create_tokio_runtime(&config::load_runtime_config())?;
    runtime.block_on(serve(service_config, keys, addr))
}

async fn serve(config: ServiceConfig, keys: ApiKeyPool, addr: SocketAddr) -> anyhow::Result<()> {
    let llm = Arc::new(OpenAiClient::from_config(&config.llm)?);
    let store = build_store(&config.store).await?;
    let state = AppState::new(Evaluator::new(llm, store, keys));

    server::start_server(addr, state).await
}
