use anyhow::Context;
use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
};
use std::io::Read;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::{net::TcpListener, task::JoinHandle, time::MissedTickBehavior};
use tower::ServiceBuilder;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, info_span, warn, Span};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use warden::{
    cli::{
        init::{self, InitConfig, InitResult},
        output::Output,
        Cli, Commands,
    },
    utils::toml_config::ServerConfig,
    AppState, CredentialStore, PasswordHasher, WardenConfig,
};

/// Largest request body accepted, in bytes.
const MAX_BODY_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    match cli.command {
        Some(Commands::Init {
            ref path,
            force,
            ref host,
            port,
        }) => {
            let config = InitConfig {
                path: path.clone(),
                force,
                host: host.clone(),
                port,
            };
            match init::run(config, &output) {
                InitResult::Success | InitResult::AlreadyExists => Ok(()),
                InitResult::Error(e) => anyhow::bail!("init failed: {}", e),
            }
        }
        Some(Commands::HashPassword) => hash_password(&cli.config),
        None => serve(&cli.config, cli.verbose, &output).await,
    }
}

async fn serve(config_path: &Path, verbose: bool, output: &Output) -> anyhow::Result<()> {
    let config = WardenConfig::load(config_path)
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    init_tracing(&config.server, verbose);

    if !config.server.is_production() {
        output.banner();
        output.kv("config", &config_path.display().to_string());
        output.kv("environment", &config.server.environment);
    }

    let provider = config.database_provider()?;
    let store = provider
        .create_store()
        .await
        .context("failed to open credential store")?;
    info!(database = %provider.describe(), "credential store ready");

    let purge = spawn_purge_task(store.clone(), config.database.purge_interval);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::from_config(config, store)?;

    let app = warden::api::routes::app(state).layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(make_span))
            .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)),
    );

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("Listening on {}", addr);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(purge) = purge {
        purge.abort();
    }

    Ok(())
}

fn init_tracing(server: &ServerConfig, verbose: bool) {
    let level = if verbose { "debug" } else { server.log_level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "warden={level},warden_server={level},tower_http={level},info",
            level = level
        )
        .into()
    });

    let registry = tracing_subscriber::registry().with(filter);
    if server.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn make_span(request: &Request<Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|val| val.to_str().ok())
        .unwrap_or("none");
    let matched_path = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = matched_path,
        request_id
    )
}

/// Periodically deletes expired refresh records. `None` when disabled.
fn spawn_purge_task(store: Arc<dyn CredentialStore>, interval_secs: u64) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        return None;
    }

    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            match store.purge_expired_refresh_records().await {
                Ok(0) => {}
                Ok(purged) => info!(purged, "purged expired refresh tokens"),
                Err(e) => warn!(error = %e, "refresh token purge failed"),
            }
        }
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Gracefully shutdown");
}

/// Reads a password from stdin and prints its PHC hash.
///
/// A missing config file falls back to the default parameters; the JWT
/// secret is not needed here.
fn hash_password(config_path: &Path) -> anyhow::Result<()> {
    let config = if config_path.exists() {
        let content = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("failed to parse {}", config_path.display()))?
    } else {
        WardenConfig::default()
    };

    let hasher = PasswordHasher::new(config.hash_config())?;

    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("failed to read password from stdin")?;
    let password = input.trim_end_matches(['\r', '\n']);

    let hash = hasher.hash(password)?;
    println!("{}", hash.as_str());

    Ok(())
}
