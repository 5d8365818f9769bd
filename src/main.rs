//! complete-server binary — thin CLI shell over the [`complete_server`] library crate.

use std::io::Write;

use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use complete_server::api;
use complete_server::config::{Cli, ServerConfig};
use complete_server::types::{AppContext, ServerState};

// ---------------------------------------------------------------------------
// Graceful shutdown signal
// ---------------------------------------------------------------------------

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => info!("received SIGINT, shutting down..."),
            _ = sigterm.recv() => info!("received SIGTERM, shutting down..."),
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for Ctrl+C");
        info!("received Ctrl+C, shutting down...");
    }
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("complete_server=info".parse().unwrap()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if cli.wait_for_debugger {
        info!("--wait_for_debugger: sleeping 10s before serving requests");
        tokio::time::sleep(std::time::Duration::from_secs(10)).await;
    }

    if let Some(out_path) = &cli.out {
        redirect_stdio(out_path, "stdout");
    }
    if let Some(err_path) = &cli.err {
        redirect_stdio(err_path, "stderr");
    }

    let config = ServerConfig::load(&cli.options_file).unwrap_or_else(|e| {
        error!(error = %e, "failed to load options file");
        std::process::exit(1);
    });

    let state = std::sync::Arc::new(ServerState::new(config));
    let ctx = AppContext { state };

    let app = Router::new()
        .route("/healthy", get(api::healthy))
        .route("/ready", get(api::ready))
        .route("/shutdown", post(api::shutdown))
        .route("/initialize", post(api::initialize))
        .route("/completions", post(api::completions))
        .route("/event_notification", post(api::event_notification))
        .route("/filter_and_sort_candidates", post(api::filter_and_sort_candidates))
        .route("/defined_subcommands", get(api::defined_subcommands))
        .route("/semantic_completion_available", get(api::semantic_completion_available))
        .route("/signature_help_available", get(api::signature_help_available))
        .route("/detailed_diagnostic", post(api::detailed_diagnostic))
        .route("/debug_info", get(api::debug_info))
        .route("/receive_messages", post(api::receive_messages))
        .route("/semantic_tokens", post(api::semantic_tokens))
        .route("/inlay_hints", post(api::inlay_hints))
        .route("/run_completer_command", post(api::run_completer_command))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", cli.port))
        .await
        .unwrap_or_else(|e| {
            error!(port = cli.port, error = %e, "could not bind to port");
            std::process::exit(1);
        });

    info!(port = cli.port, "serving completions");
    // Machine-readable line for the owning editor process.
    println!("serving on port {}", cli.port);

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await.unwrap();
}

/// Best-effort stdio redirection to a log file, matching the distilled-from
/// implementation's `--out`/`--err` flags; failure to open the file is
/// logged but not fatal, since the owning editor discards this process's
/// normal stdio once it has the port anyway.
fn redirect_stdio(path: &std::path::Path, which: &str) {
    match std::fs::OpenOptions::new().create(true).append(true).open(path) {
        Ok(mut file) => {
            let _ = writeln!(file, "--- {which} redirected to {} ---", path.display());
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "could not open {which} redirect file");
        }
    }
}
