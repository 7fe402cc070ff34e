pub mod api;
pub mod config;
pub mod db;
pub mod entities;
pub mod models;
pub mod services;
pub mod state;

use std::sync::Arc;
use tokio::signal;
use tokio::sync::RwLock;

use anyhow::Context;
pub use config::Config;
use services::Scheduler;
use state::SharedState;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let prometheus_handle = if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        let handle = builder
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        info!("Prometheus metrics recorder initialized");
        Some(handle)
    } else {
        None
    };

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let fmt_layer = tracing_subscriber::fmt::layer();

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_help();
        return Ok(());
    }

    match args[1].as_str() {
        "daemon" | "-d" | "--daemon" => run_daemon(config, prometheus_handle).await,

        "create-admin" => {
            let username = args.get(2).map(String::as_str).unwrap_or("");
            let password = args.get(3).map(String::as_str).unwrap_or("");

            if username.is_empty() || password.is_empty() {
                anyhow::bail!(
                    "Both username and password are required: hashbrown create-admin <username> <password>"
                );
            }

            cmd_create_admin(&config, username, password).await
        }

        "backup" | "b" => {
            if args.len() < 3 {
                println!("Usage: hashbrown backup <project>");
                println!("       hashbrown backup list <project>");
                println!("       hashbrown backup restore <project> <timestamp>");
                return Ok(());
            }
            match args[2].as_str() {
                "list" | "ls" => {
                    let Some(project) = args.get(3) else {
                        println!("Usage: hashbrown backup list <project>");
                        return Ok(());
                    };
                    cmd_backup_list(&config, project).await
                }
                "restore" => {
                    let (Some(project), Some(timestamp)) = (args.get(3), args.get(4)) else {
                        println!("Usage: hashbrown backup restore <project> <timestamp>");
                        return Ok(());
                    };
                    cmd_backup_restore(&config, project, timestamp).await
                }
                project => cmd_backup_create(&config, project).await,
            }
        }

        "init" | "--init" => {
            Config::create_default_if_missing()?;
            println!("✓ Config file created. Edit config.toml and run again.");
            Ok(())
        }

        "help" | "-h" | "--help" => {
            print_help();
            Ok(())
        }

        _ => {
            println!("Unknown command: {}", args[1]);
            println!();
            print_help();
            Ok(())
        }
    }
}

fn print_help() {
    println!("HashBrown CMS Server");
    println!("Headless content management with per-project scopes and backups");
    println!();
    println!("USAGE:");
    println!("  hashbrown <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("  daemon                         Run the API server with the backup scheduler");
    println!("  create-admin <user> <pass>     Create (or promote) an administrator");
    println!("  backup <project>               Dump a project to a new archive");
    println!("  backup list <project>          List a project's archives");
    println!("  backup restore <project> <ts>  Restore a project from an archive");
    println!("  init                           Create default config file");
    println!("  help                           Show this help message");
    println!();
    println!("EXAMPLES:");
    println!("  hashbrown create-admin admin s3cret42   # Bootstrap the first admin");
    println!("  hashbrown daemon                        # Start the server");
    println!("  hashbrown backup website                # Dump the \"website\" project");
    println!();
    println!("CONFIG:");
    println!("  Edit config.toml to configure storage, scheduler, etc.");
}

async fn cmd_create_admin(config: &Config, username: &str, password: &str) -> anyhow::Result<()> {
    let shared = SharedState::new(config.clone()).await?;

    let admin = shared
        .auth
        .make_admin(username, password)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create admin: {e}"))?;

    println!("✓ Administrator ready: {}", admin.username);
    Ok(())
}

async fn cmd_backup_create(config: &Config, project: &str) -> anyhow::Result<()> {
    let shared = SharedState::new(config.clone()).await?;

    let timestamp = shared
        .backups
        .create(project)
        .await
        .map_err(|e| anyhow::anyhow!("Backup failed: {e}"))?;

    println!("✓ Created backup {timestamp} for project \"{project}\"");
    Ok(())
}

async fn cmd_backup_list(config: &Config, project: &str) -> anyhow::Result<()> {
    let shared = SharedState::new(config.clone()).await?;

    let mut timestamps = shared
        .backups
        .list(project)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to list backups: {e}"))?;
    timestamps.sort_by_key(|t| t.parse::<i64>().unwrap_or(i64::MAX));

    if timestamps.is_empty() {
        println!("No backups for project \"{project}\".");
        return Ok(());
    }

    println!("Backups for \"{project}\" ({} total)", timestamps.len());
    println!("{:-<50}", "");

    for timestamp in timestamps {
        let when = timestamp
            .parse::<i64>()
            .ok()
            .and_then(chrono::DateTime::from_timestamp_millis)
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| "unknown".to_string());

        println!("  {timestamp}  ({when})");
    }

    Ok(())
}

async fn cmd_backup_restore(
    config: &Config,
    project: &str,
    timestamp: &str,
) -> anyhow::Result<()> {
    let shared = SharedState::new(config.clone()).await?;

    shared
        .backups
        .restore(project, timestamp)
        .await
        .map_err(|e| anyhow::anyhow!("Restore failed: {e}"))?;

    println!("✓ Restored project \"{project}\" from backup {timestamp}");
    Ok(())
}

async fn run_daemon(
    config: Config,
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
) -> anyhow::Result<()> {
    info!(
        "HashBrown v{} starting in daemon mode...",
        env!("CARGO_PKG_VERSION")
    );

    let shared = Arc::new(SharedState::new(config.clone()).await?);
    let api_state = api::create_app_state(shared.clone(), prometheus_handle);

    let scheduler_state = Arc::new(RwLock::new((*shared).clone()));
    let scheduler = Scheduler::new(scheduler_state, config.scheduler.clone());

    let scheduler_handle = tokio::spawn(async move {
        if let Err(e) = scheduler.start().await {
            error!("Scheduler error: {}", e);
        }
    });

    let server_handle: Option<tokio::task::JoinHandle<()>> = if config.server.enabled {
        let port = config.server.port;
        info!("Starting Web API on port {}", port);

        let app = api::router(api_state).await;
        let addr = format!("0.0.0.0:{}", port);
        let listener = tokio::net::TcpListener::bind(&addr).await?;

        Some(tokio::spawn(async move {
            info!("🌐 Web Server running at http://0.0.0.0:{}", port);
            if let Err(e) = axum::serve(listener, app).await {
                error!("Web server error: {}", e);
            }
        }))
    } else {
        None
    };

    info!("Daemon running. Press Ctrl+C to stop.");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            error!("Error listening for shutdown: {}", e);
        }
    }

    scheduler_handle.abort();
    if let Some(handle) = server_handle {
        handle.abort();
    }
    info!("Daemon stopped");

    Ok(())
}
