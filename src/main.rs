mod api;
mod backend;
mod config;
mod disposition;
mod greeting;
mod lead;
mod prompt;
mod qualification;
mod script;
mod session;
mod tools;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use backend::LeadClient;
use config::Config;
use script::ScriptLibrary;
use session::SessionRegistry;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared application state accessible from all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub client: Arc<LeadClient>,
    /// Loaded once at startup; never mutated while serving.
    pub library: Arc<ScriptLibrary>,
    pub sessions: SessionRegistry,
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("--scripts") => check_scripts(
            args.get(2).map(Path::new),
            args.get(3).map(|s| s.as_str()),
        ),
        Some("--version") => println!("lead-line {VERSION}"),
        Some("--help") | Some("-h") => print_usage(),
        Some(other) => {
            eprintln!("Unknown option: {other}");
            print_usage();
            std::process::exit(1);
        }
        None => {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    eprintln!("Failed to create tokio runtime: {e}");
                    std::process::exit(1);
                }
            };
            rt.block_on(server());
        }
    }
}

fn print_usage() {
    println!("lead-line {VERSION}");
    println!("Sales call agent service: lead context, script selection and call tools");
    println!();
    println!("Usage: lead-line [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --scripts [FILE] [KEY]  Validate a script catalog (built-in if FILE is \"-\" or omitted)");
    println!("                         and list it, or print script KEY in full");
    println!("  --version               Print version");
    println!("  --help, -h              Print this help message");
    println!();
    println!("Without options, starts the session server.");
}

fn check_scripts(path: Option<&Path>, key: Option<&str>) {
    let library = match path.filter(|p| *p != Path::new("-")) {
        Some(path) => match ScriptLibrary::load(path) {
            Ok(library) => library,
            Err(e) => {
                eprintln!("{e}");
                std::process::exit(1);
            }
        },
        None => ScriptLibrary::builtin(),
    };

    if let Some(key) = key {
        let Some(script) = library.get(key) else {
            eprintln!("No script with key '{key}'");
            std::process::exit(1);
        };
        match serde_json::to_string_pretty(script) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                eprintln!("Failed to render script: {e}");
                std::process::exit(1);
            }
        }
        return;
    }

    let default_key = &library.default_script().key;
    for script in library.scripts() {
        let marker = if &script.key == default_key { "*" } else { " " };
        println!(
            "{marker} {:<24} {:<10} {:<6} {:<12} {}",
            script.key,
            script
                .business_type
                .map(|b| b.as_str())
                .unwrap_or("any"),
            script
                .interest_level
                .map(|i| i.as_str())
                .unwrap_or("any"),
            script
                .region
                .map(|r| format!("{r:?}").to_lowercase())
                .unwrap_or_else(|| "-".to_string()),
            script.name,
        );
    }
    println!();
    println!("{} scripts, default: {default_key}", library.scripts().len());
}

fn load_library(config: &Config) -> Result<ScriptLibrary, script::LibraryError> {
    match config.scripts.path {
        Some(ref path) => {
            let library = ScriptLibrary::load(Path::new(path))?;
            tracing::info!(path = %path, scripts = library.scripts().len(), "Loaded script catalog");
            Ok(library)
        }
        None => {
            tracing::info!("Using built-in script catalog");
            Ok(ScriptLibrary::builtin())
        }
    }
}

async fn server() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lead_line=info,tower_http=info".into()),
        )
        .init();

    // Load config
    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {e}");
            std::process::exit(1);
        }
    };

    let library = match load_library(&config) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to load scripts: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        backend = %config.backend.base_url,
        "Starting lead-line"
    );

    let state = AppState {
        client: Arc::new(LeadClient::new(&config.backend)),
        library: Arc::new(library),
        sessions: SessionRegistry::new(),
        config: config.clone(),
    };

    let cancel = CancellationToken::new();

    let reaper = session::spawn_reaper(
        state.sessions.clone(),
        Arc::clone(&state.client),
        config.agent.agent_id.clone(),
        Duration::from_secs(config.agent.session_timeout_secs),
        cancel.clone(),
    );

    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {e}");
            return;
        }
        tracing::info!("Shutdown requested");
        ctrl_c.cancel();
    });

    let app = api::router(state.clone());

    let addr: SocketAddr = match format!("{}:{}", config.server.host, config.server.port).parse()
    {
        Ok(addr) => addr,
        Err(e) => {
            eprintln!("Invalid server address: {e}");
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Failed to bind {addr}: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(%addr, "Listening");

    let shutdown = cancel.clone();
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
    {
        tracing::error!("Server error: {e}");
    }

    cancel.cancel();
    if let Err(e) = reaper.await {
        tracing::warn!("Reaper task failed: {e}");
    }

    let remaining = state.sessions.drain().await;
    if !remaining.is_empty() {
        tracing::info!(count = remaining.len(), "Flushing open sessions");
    }
    session::flush_all(remaining, &state.client, &state.config.agent.agent_id).await;

    tracing::info!("Stopped");
}
