use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use clap::{Parser, Subcommand};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use forge_domain::config::Config;
use forge_gateway::router::queue::WorkQueue;
use forge_gateway::session_lock::SessionLockMap;
use forge_gateway::state::{AppState, BearerSecret};
use forge_gateway::{lock, router};

/// forge — an agent sidecar.
#[derive(Debug, Parser)]
#[command(name = "forge", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Parse the config file and report any errors.
    ConfigValidate,
    /// Print version information.
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None | Some(Command::Serve) => {
            init_tracing();
            let (config, _config_path) = load_config()?;
            run_server(Arc::new(config)).await
        }
        Some(Command::ConfigValidate) => {
            let (config, config_path) = load_config()?;
            match config.validate() {
                Ok(()) => {
                    println!("{config_path}: ok");
                    Ok(())
                }
                Err(e) => {
                    eprintln!("{config_path}: {e}");
                    std::process::exit(1);
                }
            }
        }
        Some(Command::Version) => {
            println!("forge {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Initialize structured JSON tracing (only for the `serve` command).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,forge_gateway=debug")),
        )
        .json()
        .init();
}

/// Load the config document from `FORGE_CONFIG` (default `config.json`),
/// falling back to defaults when the file doesn't exist.
fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("FORGE_CONFIG").unwrap_or_else(|_| "config.json".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path)
            .with_context(|| format!("reading {config_path}"))?;
        Config::load(&raw).with_context(|| format!("parsing {config_path}"))?
    } else {
        Config::default()
    };

    Ok((config, config_path))
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("forge starting");

    if let Err(e) = config.validate() {
        anyhow::bail!("config validation failed: {e}");
    }

    let database_url = std::env::var("DATABASE_URL").ok();
    let redis_url = std::env::var("REDIS_URL").ok();

    // ── Conversation/registry store ──────────────────────────────────
    let store = forge_registry::build_store(
        &config.conversation,
        database_url.as_deref(),
        redis_url.as_deref(),
        config.sidecar.enabled,
    )
    .await
    .context("initializing store")?;
    tracing::info!(kind = ?config.conversation.store, "store ready");

    // ── HITL pause/resume store ──────────────────────────────────────
    let prefer_postgres = matches!(config.conversation.store, forge_domain::config::StoreKind::Postgres);
    let hitl = forge_hitl::build_hitl_store(redis_url.as_deref(), database_url.as_deref(), prefer_postgres)
        .await
        .context("initializing HITL store")?;
    tracing::info!("HITL store ready");

    // ── Custom verifiers ───────────────────────────────────────────────
    let verifiers_dir = std::env::var("FORGE_VERIFIERS_DIR").unwrap_or_else(|_| "verifiers".into());
    let verifiers = Arc::new(forge_verifiers::custom::CustomVerifierRegistry::new(verifiers_dir));
    tracing::info!("verifier registry ready");

    // ── Session locks (per-session concurrency) ───────────────────────
    let session_locks = Arc::new(SessionLockMap::new());

    // ── Bearer secrets ────────────────────────────────────────────────
    let mcp_key = match std::env::var("FORGE_MCP_KEY") {
        Ok(key) if !key.is_empty() => {
            tracing::info!("MCP bearer auth enabled");
            Some(BearerSecret::new(&key))
        }
        _ => {
            tracing::warn!("FORGE_MCP_KEY unset or empty — /mcp is disabled");
            None
        }
    };
    let admin_key = std::env::var("FORGE_ADMIN_KEY")
        .ok()
        .filter(|k| !k.is_empty())
        .map(|k| BearerSecret::new(&k))
        .or_else(|| config.admin_key.as_deref().map(BearerSecret::new));
    if admin_key.is_none() {
        tracing::warn!("FORGE_ADMIN_KEY unset or empty — /forge-admin is disabled");
    }

    let widget_dir = std::env::var("FORGE_WIDGET_DIR")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| std::path::PathBuf::from("widget"));

    let state = AppState {
        config: Arc::new(parking_lot::RwLock::new((*config).clone())),
        store: store.clone(),
        hitl,
        verifiers,
        session_locks,
        mcp_key,
        admin_key,
        http: reqwest::Client::new(),
        widget_dir,
        queue: Arc::new(WorkQueue::new()),
        last_activity: Arc::new(parking_lot::Mutex::new(Instant::now())),
        started_at: Instant::now(),
        shutdown: Arc::new(tokio::sync::Notify::new()),
    };

    // ── Process lifecycle ─────────────────────────────────────────────
    forge_gateway::session_lock::spawn_pruner(state.session_locks.clone());
    let lock_path = lock::write_lock_file(std::path::Path::new("."), config.sidecar.port)
        .context("writing lock file")?;

    if config.sidecar.enabled {
        tracing::info!("sidecar mode: watchdog disabled, starting drift monitor");
        forge_drift::spawn_background_loop(
            store,
            config.drift.window_size,
            config.drift.threshold,
            std::time::Duration::from_secs(300),
        );
    } else {
        tracing::info!("non-sidecar mode: starting inactivity watchdog");
        lock::spawn_watchdog(state.last_activity.clone(), state.shutdown.clone());
    }

    let cors = build_cors_layer();
    let app = router::build_router(state.clone())
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = format!("0.0.0.0:{}", config.sidecar.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding to {addr}"))?;

    tracing::info!(addr = %addr, "forge listening");

    let shutdown = state.shutdown.clone();
    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.notified().await })
        .await
        .context("axum server error");

    lock::remove_lock_file(&lock_path);
    serve_result
}

/// Build a [`CorsLayer`] from `FORGE_CORS_ORIGINS`, a comma-separated list of
/// allowed origins (default `*`). Entries ending in `:*` match any port on
/// that host; a lone `"*"` allows everything (not recommended for production).
fn build_cors_layer() -> CorsLayer {
    use axum::http::header;

    let raw = std::env::var("FORGE_CORS_ORIGINS").unwrap_or_else(|_| "*".into());
    let origins: Vec<String> = raw.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect();

    if origins.len() == 1 && origins[0] == "*" {
        tracing::warn!("CORS configured with wildcard \"*\" — all origins allowed");
        return CorsLayer::new()
            .allow_origin(tower_http::cors::Any)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);
    }

    let mut exact: Vec<HeaderValue> = Vec::new();
    let mut wildcard_prefixes: Vec<String> = Vec::new();

    for origin in &origins {
        if origin.ends_with(":*") {
            wildcard_prefixes.push(origin.trim_end_matches('*').to_owned());
        } else if let Ok(hv) = origin.parse::<HeaderValue>() {
            exact.push(hv);
        } else {
            tracing::warn!(origin = %origin, "invalid CORS origin, skipping");
        }
    }

    let allow_origin = if wildcard_prefixes.is_empty() {
        AllowOrigin::list(exact)
    } else {
        AllowOrigin::predicate(move |origin, _| {
            let origin_str = origin.to_str().unwrap_or("");
            if exact.iter().any(|e| e.as_bytes() == origin.as_bytes()) {
                return true;
            }
            wildcard_prefixes.iter().any(|prefix| {
                origin_str
                    .strip_prefix(prefix.as_str())
                    .map(|port| !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()))
                    .unwrap_or(false)
            })
        })
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
