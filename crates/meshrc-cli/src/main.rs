//! meshrc - terminal chat client for mesh radio networks

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use clap::{CommandFactory, Parser};
use tracing::{error, info};
use tracing_subscriber::fmt::writer::MakeWriterExt;

use meshrc_cli::{cli::Cli, config::AppConfig, error::Result, DeviceConnector};
use meshrc_core::{
    ConnectionState, ConversationEngine, DeviceGateway, GatewayConnector, MeshClient,
    MeshrcError, OfflineGateway, PersistenceSink, SystemTimeSource, TimeSource,
};

/// Set while the terminal UI owns the screen; stderr logging is muted then
static TERMINAL_IN_USE: AtomicBool = AtomicBool::new(false);

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse();

    // Load configuration, then let flags win
    let config = load_configuration(&cli)?;

    let Some(transport) = cli.transport(&config.transport) else {
        Cli::command().print_help()?;
        eprintln!("\nSelect a device with --serial, --target or --address");
        std::process::exit(1);
    };

    setup_logging(cli.verbose, config.logging.debug_log.as_deref())?;
    info!("meshrc starting, device at {}", transport);

    let clock: Arc<dyn TimeSource> = Arc::new(SystemTimeSource);
    let (persistence, log_errors) = PersistenceSink::from_paths(
        config.logging.log_file.as_deref(),
        config.logging.log_db.as_deref(),
        clock.clone(),
    );
    let mut engine = ConversationEngine::new(config.engine_config(), clock, persistence);
    for err in log_errors {
        engine.report(err.into());
    }

    let connector = DeviceConnector::new();
    let gateway = match connector.connect(&transport).await {
        Ok(gateway) => {
            engine.set_connection_state(ConnectionState::Connected);
            gateway
        }
        Err(e) => {
            error!("Could not reach {}: {}", transport, e);
            engine.report(MeshrcError::Connection(e));
            engine.set_connection_state(ConnectionState::Disconnected);
            OfflineGateway::new()
        }
    };

    let mut client = MeshClient::new(gateway, engine);
    let synced = client.bootstrap().await;
    info!("Bootstrap finished, {} queued messages applied", synced);

    if let Err(e) = run_client(client, &config).await {
        error!("meshrc exited with an error: {}", e);
        std::process::exit(1);
    }

    info!("meshrc exited successfully");
    Ok(())
}

/// Setup logging based on verbosity level.
///
/// With a debug log file every event goes there. Without one only warnings
/// reach stderr, and nothing does while the terminal UI is running.
fn setup_logging(verbose: bool, debug_log: Option<&Path>) -> Result<()> {
    let log_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    match debug_log {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            tracing_subscriber::fmt()
                .with_max_level(log_level)
                .with_ansi(false)
                .with_target(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            let stderr = std::io::stderr.with_filter(|_| !TERMINAL_IN_USE.load(Ordering::Relaxed));
            tracing_subscriber::fmt()
                .with_max_level(tracing::Level::WARN)
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_writer(stderr)
                .init();
        }
    }
    Ok(())
}

/// Load configuration from file or use defaults, then apply flags
fn load_configuration(cli: &Cli) -> Result<AppConfig> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_overrides(cli);
    config.validate()?;
    Ok(config)
}

#[cfg(feature = "tui")]
async fn run_client<G: DeviceGateway>(client: MeshClient<G>, config: &AppConfig) -> Result<()> {
    use meshrc_cli::tui::TuiManager;

    TERMINAL_IN_USE.store(true, Ordering::Relaxed);
    let result = match TuiManager::new(client, config.tick_rate()) {
        Ok(mut tui) => tui.run().await,
        Err(e) => Err(e),
    };
    TERMINAL_IN_USE.store(false, Ordering::Relaxed);
    result
}

/// Line mode: each stdin line is submitted to the first channel's
/// conversation, and new timeline lines are printed after every input.
#[cfg(not(feature = "tui"))]
async fn run_client<G: DeviceGateway>(mut client: MeshClient<G>, _config: &AppConfig) -> Result<()> {
    use meshrc_core::ContextId;
    use tokio::io::{AsyncBufReadExt, BufReader};

    client.engine_mut().activate(&ContextId::Channel(0));
    let mut printed = 0;
    let mut last_notice: Option<String> = None;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await? {
        client.submit(&line).await;
        client.poll_events();

        let engine = client.engine();
        let view = engine.view_lines();
        if view.len() < printed {
            printed = 0;
        }
        for display in &view[printed..] {
            println!("{}", display.to_plain());
        }
        printed = view.len();

        if let Some(notification) = engine.latest_notification() {
            if last_notice.as_deref() != Some(notification.message.as_str()) {
                eprintln!("! {}", notification.message);
                last_notice = Some(notification.message.clone());
            }
        }
    }
    Ok(())
}
