use std::path::PathBuf;
use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use project_monitor::config::Config;
use project_monitor::database::{LibsqlRegistry, Registry, initialize_database};
use project_monitor::monitoring::{
    CycleRunner, HealthProber, HttpChecker, MonitorState, MonitoringScheduler, ScheduleTicker, StatusValue, Target,
    status_for,
};
use project_monitor::{pool, routes};

#[derive(Debug, Parser)]
#[command(name = "project-monitor", version, about = "Periodic liveness checks for dashboard projects")]
struct Cli {
    /// Path to the config file (defaults to $XDG_CONFIG_HOME/project-monitor/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the scheduler and status server until interrupted
    Run,
    /// Run a single monitoring cycle and print its report
    Once,
    /// Probe one URL and print the outcome without touching the registry
    Check { url: String },
    /// Print the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = Config::from_config(cli.config.as_ref()).context("loading configuration")?;
    let ignored_overrides = config.apply_env_overrides();
    let log_format = config.log_format();

    logger::init_tracing(&config.logging.level, log_format.clone().unwrap_or_default());

    // Held back until a subscriber exists
    if let Err(e) = log_format {
        warn!("{e}, using compact");
    }
    for ignored in ignored_overrides {
        warn!("{ignored}");
    }

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Once => once(config).await,
        Command::Check { url } => check(config, url).await,
        Command::ShowConfig => {
            println!("{config}");
            Ok(())
        }
    }
}

async fn open_registry(config: &Config) -> Result<Arc<dyn Registry>> {
    let pool = pool::open(&config.database.path, config.database.max_connections)
        .await
        .with_context(|| format!("opening database {}", config.database.path))?;

    let conn = pool.get().await?;
    info!("Initializing database schema...");
    initialize_database(&conn).await?;
    drop(conn);

    Ok(Arc::new(LibsqlRegistry::new_from_pool(pool)))
}

fn build_checker(config: &Config) -> Result<(Arc<HttpChecker>, std::time::Duration)> {
    let schedule = config.schedule()?;
    let timeout = config.probe_timeout(&schedule)?;
    Ok((Arc::new(HttpChecker::new(timeout, &config.probe.user_agent)?), timeout))
}

async fn run(config: Config) -> Result<()> {
    let schedule = config.schedule()?;
    let (checker, timeout) = build_checker(&config)?;
    let registry = open_registry(&config).await?;

    info!(
        cadence = schedule.expression(),
        timezone = %schedule.timezone(),
        timeout_secs = timeout.as_secs(),
        "Starting project monitor"
    );

    let state = MonitorState::new(schedule.expression(), schedule.timezone().name());
    let runner = Arc::new(CycleRunner::new(registry, checker, timeout).list_timeout(config.list_timeout()));
    let scheduler = MonitoringScheduler::new(runner, state.clone())
        .run_on_start(config.schedule.run_on_start)
        .start(ScheduleTicker::new(schedule));

    if config.server.enabled {
        let data = web::Data::new(state);
        let server = HttpServer::new(move || App::new().app_data(data.clone()).configure(routes::routes))
            .bind((config.server.bind.as_str(), config.server.port))
            .with_context(|| format!("binding {}:{}", config.server.bind, config.server.port))?
            .disable_signals()
            .run();
        let server_handle = server.handle();
        info!("Status server listening on {}:{}", config.server.bind, config.server.port);

        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!("Status server failed: {}", e);
                }
            }
            _ = tokio::signal::ctrl_c() => info!("Shutdown requested"),
        }

        server_handle.stop(true).await;
    } else {
        tokio::signal::ctrl_c().await?;
        info!("Shutdown requested");
    }

    scheduler.stop().await;
    Ok(())
}

async fn once(config: Config) -> Result<()> {
    let (checker, timeout) = build_checker(&config)?;
    let registry = open_registry(&config).await?;

    let runner = CycleRunner::new(registry, checker, timeout).list_timeout(config.list_timeout());
    let report = runner.dispatch().await?.collect().await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

async fn check(config: Config, url: String) -> Result<()> {
    let (checker, timeout) = build_checker(&config)?;
    let prober = HealthProber::new(checker, timeout);

    let target = Target::new(0, "adhoc", Some(url.as_str()), StatusValue::Other("UNKNOWN".to_string()));
    let outcome = prober.probe(&target).await;

    println!("{url}: {outcome} -> {}", status_for(&outcome));
    Ok(())
}
