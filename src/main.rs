use clap::Parser;
use colored::*;
use neura_gateway::logging::{init_tracing, setup_panic_hook};
use neura_gateway::server::{build_router, shutdown_signal};
use neura_gateway::*;
use std::sync::Arc;

fn print_banner(args: &Args, state: &AppState) {
    let rule = "=".repeat(60);
    let dispatcher = &state.dispatcher;
    let mode = match dispatcher.mode() {
        Mode::Forward => "ENABLED".green().bold(),
        Mode::Simulation => "DISABLED (simulation)".yellow().bold(),
    };
    let auth = match dispatcher.auth().service_url() {
        Some(url) => format!("{} ({})", "ENABLED".green().bold(), url),
        None => format!("{}", "DISABLED (dev mode)".yellow().bold()),
    };
    let routes = dispatcher.routes();
    let routes_loaded = if routes.is_empty() && dispatcher.mode() == Mode::Forward {
        format!("{}", "0 (every forward will report routing-missing)".red().bold())
    } else {
        routes.len().to_string()
    };

    eprintln!("{}", rule);
    eprintln!("{}", "neura-gateway".bold());
    eprintln!("{}", rule);
    eprintln!("Listen:         {}", args.bind_addr());
    eprintln!("Forward Mode:   {}", mode);
    eprintln!("Timeout:        {:?}", dispatcher.config().timeout);
    eprintln!("Auth Mode:      {}", auth);
    eprintln!("Routing File:   {}", args.routing_path.display());
    eprintln!("Routes Loaded:  {}", routes_loaded);
    eprintln!("Known Agents:   {}", dispatcher.config().known_agents.join(", "));
    eprintln!("{}", rule);
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let args = Arc::new(Args::parse());

    let _log_guard = init_tracing(&args);
    setup_panic_hook();

    let state = match AppState::from_args(args.clone()) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            tracing::error!("Failed to initialize gateway: {}", e);
            std::process::exit(1);
        }
    };

    print_banner(&args, &state);

    let app = build_router(state);

    let addr = args.bind_addr();
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind to {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    tracing::info!("neura-gateway listening on {}", addr);

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }

    tracing::info!("neura-gateway stopped");
}
