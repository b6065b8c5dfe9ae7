use clap::Parser;
use serial_redirector::config::{Config, ConfigLoader, LogFormat};
use serial_redirector::engine::RedirectorEngine;
use serial_redirector::logging;
use serial_redirector::port::DeviceFactory;
use serial_redirector::ControlHandle;
use std::path::{Path, PathBuf};
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "serial-redirector",
    version,
    about = "Expose serial ports as raw, line-printer or RFC2217 telnet TCP endpoints.",
    long_about = "Bridges one or more UARTs to TCP listeners. Telnet ports speak RFC2217 so clients such as pyserial's rfc2217:// URLs can change baud rate and line settings remotely. An optional HTTP API reports port status and accepts management commands."
)]
struct Args {
    /// Configuration file (TOML). Defaults to the standard search path.
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log filter when RUST_LOG is unset, e.g. `info` or `serial_redirector=debug`.
    #[arg(long, value_name = "FILTER")]
    log_level: Option<String>,

    /// Log output format: pretty, compact or json.
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    /// Do not start the HTTP management API.
    #[arg(long)]
    no_api: bool,

    /// Validate the configuration, print the port table and exit.
    #[arg(long)]
    check: bool,

    /// Print the effective configuration as TOML and exit.
    #[arg(long)]
    print_config: bool,
}

// --- Main Application Entry Point ---
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut loader = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    {
        let config = loader.config_mut();
        if let Some(level) = args.log_level {
            config.logging.level = level;
        }
        if let Some(format) = args.log_format {
            config.logging.format = format;
        }
        if args.no_api {
            config.server.enabled = false;
        }
    }
    loader.config().validate()?;

    if args.print_config {
        print!("{}", loader.to_toml()?);
        return Ok(());
    }
    if args.check {
        print_port_table(loader.config(), loader.config_path.as_deref());
        return Ok(());
    }

    let config_path = loader.config_path.clone();
    let config = loader.into_config();
    logging::init(&config.logging)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?config_path,
        ports = config.ports.len(),
        "starting serial-redirector"
    );

    let (mut engine, control) = RedirectorEngine::new(config.engine.clone(), DeviceFactory);
    for port in config.ports.iter().cloned() {
        let tcp_port = port.tcp_port;
        let uart = port.uart.clone();
        if let Err(err) = engine.add_port(port) {
            error!(port = tcp_port, %uart, error = %err, "port not started");
        }
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let engine_task = tokio::spawn(engine.run(shutdown_rx));

    let served = serve(&config, control).await;
    let _ = shutdown_tx.send(true);
    engine_task.await?;
    served?;
    info!("shutdown complete");
    Ok(())
}

/// Serve the management API (if enabled) until a shutdown signal arrives.
#[cfg(feature = "rest-api")]
async fn serve(config: &Config, control: ControlHandle) -> Result<(), Box<dyn std::error::Error>> {
    use serial_redirector::rest_api::{build_router, RestContext};

    if !config.server.enabled {
        shutdown_signal().await;
        return Ok(());
    }

    let app = build_router(RestContext { control });
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %listener.local_addr()?, "management API listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

#[cfg(not(feature = "rest-api"))]
async fn serve(_config: &Config, _control: ControlHandle) -> Result<(), Box<dyn std::error::Error>> {
    shutdown_signal().await;
    Ok(())
}

fn print_port_table(config: &Config, path: Option<&Path>) {
    match path {
        Some(path) => println!("configuration: {}", path.display()),
        None => println!("configuration: built-in defaults"),
    }
    if config.ports.is_empty() {
        println!("no ports configured");
        return;
    }
    println!(
        "{:<6} {:<24} {:<7} {:<8} {:<20} {}",
        "TCP", "UART", "MODE", "ENABLED", "LINE", "IDLE TIMEOUT"
    );
    for port in &config.ports {
        let idle = match port.idle_timeout() {
            Some(timeout) => format!("{}ms", timeout.as_millis()),
            None => "off".to_string(),
        };
        println!(
            "{:<6} {:<24} {:<7} {:<8} {:<20} {}",
            port.tcp_port,
            port.uart,
            port.mode.as_str(),
            port.enabled,
            port.line_params().to_string(),
            idle
        );
    }
}

// --- Graceful Shutdown Handler ---
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to install SIGTERM handler");
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

    info!("signal received, starting graceful shutdown");
}
