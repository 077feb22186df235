use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::signal::ctrl_c;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use av_arena::api::state::AppState;
use av_arena::backend::{DataBackend, MemoryBackend, RestBackend};
use av_arena::bracket::{self, BracketIssue};
use av_arena::config::{AppConfig, BackendKind};
use av_arena::contact::{HttpMailer, LogMailer, Mailer};
use av_arena::models::TournamentId;
use av_arena::realtime::{ChangeFeed, ChangePoller};

const DEFAULT_CONFIG: &str = "./config.toml";

#[derive(Parser)]
#[command(name = "av-arena")]
#[command(about = "Tournament registration, bracket and admin service")]
#[command(version)]
struct Cli {
    /// Path to configuration file (defaults to ./config.toml when present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Host to bind to
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },

    /// Print the bracket for one tournament
    Bracket {
        /// Tournament id
        tournament_id: String,

        /// Print the bracket as JSON
        #[arg(long)]
        json: bool,
    },

    /// Load and validate the configuration, then exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().or_else(|| {
        let default = PathBuf::from(DEFAULT_CONFIG);
        default.exists().then_some(default)
    });
    let config = AppConfig::load(config_path.as_deref())
        .with_context(|| match &config_path {
            Some(path) => format!("Failed to load configuration from {}", path.display()),
            None => "Failed to load configuration".to_string(),
        })?;

    init_tracing(
        cli.log_level.as_deref().unwrap_or(&config.log_level),
        cli.json_logs,
    );

    info!("Starting av-arena v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Serve { host, port } => serve(config, host, port).await?,
        Commands::Bracket {
            tournament_id,
            json,
        } => print_bracket(&config, TournamentId::new(tournament_id), json).await?,
        Commands::CheckConfig => check_config(&config, config_path.as_deref()),
    }

    Ok(())
}

fn init_tracing(level: &str, json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn build_backend(config: &AppConfig, feed: &ChangeFeed) -> Result<Arc<dyn DataBackend>> {
    let backend: Arc<dyn DataBackend> = match config.backend.kind {
        BackendKind::Memory => {
            warn!("Using the in-memory backend; data is lost on exit");
            Arc::new(MemoryBackend::new().with_feed(feed.clone()))
        }
        BackendKind::Rest => {
            info!("Using REST backend at {}", config.backend.url);
            Arc::new(RestBackend::new(config.rest_backend()?)?)
        }
    };
    Ok(backend)
}

fn build_mailer(config: &AppConfig) -> Result<Arc<dyn Mailer>> {
    if config.email.api_key.trim().is_empty() {
        warn!("No email API key configured; contact mail will only be logged");
        return Ok(Arc::new(LogMailer::new()));
    }
    let mailer = HttpMailer::new(
        config.email.api_url.clone(),
        config.email.api_key.clone(),
        Duration::from_secs(config.email.timeout_seconds),
    )?;
    Ok(Arc::new(mailer))
}

async fn serve(mut config: AppConfig, host: Option<String>, port: Option<u16>) -> Result<()> {
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    let feed = ChangeFeed::new();
    let backend = build_backend(&config, &feed)?;

    // The memory backend publishes its own changes; anything else is polled.
    if config.backend.kind == BackendKind::Rest {
        let poller = ChangePoller::new(backend.clone(), feed.clone(), config.poll_interval());
        tokio::spawn(poller.run());
    }

    let mailer = build_mailer(&config)?;
    let state = AppState::new(backend, feed, mailer, config.contact_settings());
    let app = av_arena::api::build_router(state, &config.server);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
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
}

async fn print_bracket(config: &AppConfig, id: TournamentId, json: bool) -> Result<()> {
    let backend = build_backend(config, &ChangeFeed::new())?;
    let tournament = backend
        .get_tournament(&id)
        .await?
        .with_context(|| format!("Tournament '{}' not found", id))?;
    let matches = backend.list_matches(&id).await?;
    let issues = bracket::inspect(&matches);
    let bracket = bracket::build_bracket(matches);

    if json {
        let out = serde_json::json!({
            "tournament_id": id,
            "tournament_title": tournament.title,
            "total_rounds": bracket.total_rounds,
            "rounds": bracket.rounds,
            "issues": issues,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{} ({})", tournament.title, tournament.game);
    if bracket.is_empty() {
        println!("  No bracket yet.");
        return Ok(());
    }

    for column in &bracket.rounds {
        println!();
        println!("Round {}: {}", column.round, column.name);
        for m in &column.matches {
            let mark = |winner: bool| if winner { "*" } else { " " };
            println!(
                "  #{:<3} {}{} {} - {} {}{}  [{}]",
                m.match_number,
                mark(m.player1.is_winner),
                m.player1.name,
                m.player1.score,
                m.player2.score,
                m.player2.name,
                mark(m.player2.is_winner),
                m.status_label,
            );
        }
    }

    if !issues.is_empty() {
        println!();
        println!("Warnings:");
        for issue in &issues {
            println!("  - {}", describe_issue(issue));
        }
    }
    Ok(())
}

fn describe_issue(issue: &BracketIssue) -> String {
    match issue {
        BracketIssue::MissingRound { round } => format!("round {} has no matches", round),
        BracketIssue::DuplicateMatchNumber {
            round,
            match_number,
        } => format!("round {} has more than one match #{}", round, match_number),
        BracketIssue::RoundZero { match_id } => format!("match {} is stored in round 0", match_id),
    }
}

fn check_config(config: &AppConfig, path: Option<&Path>) {
    match path {
        Some(path) => println!("Configuration OK ({})", path.display()),
        None => println!("Configuration OK (defaults and environment)"),
    }
    println!("  server:   {}:{}", config.server.host, config.server.port);
    println!("  backend:  {:?}", config.backend.kind);
    println!(
        "  email:    {}",
        if config.email.api_key.trim().is_empty() {
            "log only"
        } else {
            "http"
        }
    );
    println!("  realtime: poll every {:?}", config.poll_interval());
}
