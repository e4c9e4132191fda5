//! Astra - gateway for the astrology companion backend

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use astra::{config::Args, db::MongoClient, server, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("astra={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Validate configuration
    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    // Print startup banner
    info!("======================================");
    info!("  Astra - astrology companion gateway");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {}", args.mongodb_uri);
    info!("Frontend: {}", args.frontend_url);
    info!("Task templates: {}", args.task_template_dir);
    info!(
        "Julep: {} (agent: {})",
        args.julep.julep_base_url,
        if args.julep.julep_agent_id.is_empty() {
            "unset"
        } else {
            args.julep.julep_agent_id.as_str()
        }
    );
    info!(
        "ElevenLabs agent: {}",
        if args.elevenlabs.elevenlabs_agent_id.is_empty() {
            "unset"
        } else {
            args.elevenlabs.elevenlabs_agent_id.as_str()
        }
    );
    info!("======================================");

    // Connect to MongoDB (optional in dev mode)
    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            Some(client)
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, continuing without): {}", e);
                None
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    // Create application state
    let state = match AppState::new(args.clone(), mongo).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application state: {}", e);
            std::process::exit(1);
        }
    };

    // Warm the task template cache; missing templates surface at startup
    // instead of on the first enrichment request
    match state.templates.warm_up() {
        Ok(count) => info!("Loaded {} task template(s)", count),
        Err(e) => {
            if args.dev_mode {
                warn!("Task template warm-up failed (dev mode, continuing): {}", e);
            } else {
                error!("Task template warm-up failed: {}", e);
                std::process::exit(1);
            }
        }
    }

    // Initialize usage logging if configured
    if let Some(ref path) = args.usage_log_path {
        if let Err(e) = state.usage.init_file(path.into()).await {
            warn!("Usage log initialization failed (continuing): {}", e);
        }
    }

    let state = Arc::new(state);

    // Run the server
    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
