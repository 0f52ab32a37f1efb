//! fzlink - device link diagnostics
//!
//! Lists serial endpoints, runs the session handshake against a device and
//! manages the configuration file.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fzlink::{
    config::{self, AppConfig},
    serial::{EndpointLocator, SerialPortOpener, SessionOpener},
    CancelToken,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "fzlink", version, about = "Serial link diagnostics for the handheld device")]
struct Cli {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List serial endpoints and mark the ones that look like the device
    Ports,
    /// Open a session once and report the outcome
    Check {
        /// Endpoint to use instead of autodetection
        #[arg(long)]
        port: Option<String>,
    },
    /// Show the effective configuration
    Config {
        /// Write the defaults to the configuration path
        #[arg(long)]
        write_default: bool,
    },
}

fn init_logging(log_file: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,fzlink=debug"));

    match log_file {
        Some(path) => {
            let dir = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
            let name = path
                .file_name()
                .with_context(|| format!("log file {:?} has no file name", path))?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(writer).with_ansi(false))
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
            Ok(None)
        }
    }
}

fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => config::config_path().context("could not determine config directory"),
    }
}

fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let config = match explicit {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    Ok(config)
}

fn list_ports(config: &AppConfig) -> Result<()> {
    let locator = EndpointLocator::system(config.device.identity());
    let endpoints = locator.endpoints()?;
    if endpoints.is_empty() {
        println!("No serial endpoints found");
        return Ok(());
    }
    let identity = locator.identity();
    for endpoint in endpoints {
        let marker = if endpoint.vendor_id == Some(identity.vendor_id)
            && endpoint.product_id == Some(identity.product_id)
        {
            "*"
        } else {
            " "
        };
        println!("{} {}", marker, endpoint);
    }
    Ok(())
}

fn check(config: &AppConfig, port: Option<String>) -> Result<()> {
    let config = config.clone().with_port(port);
    let endpoint = match &config.device.port {
        Some(port) => port.clone(),
        None => EndpointLocator::system(config.device.identity())
            .with_policy(config.device.multiple_match)
            .locate()?,
    };

    let opener = Arc::new(SerialPortOpener::new(
        config.device.baud_rate,
        config.connection.read_timeout(),
    ));
    let sessions = SessionOpener::new(opener, CancelToken::new());
    let transport = sessions
        .open(&endpoint)
        .with_context(|| format!("handshake failed on {}", endpoint))?;
    println!("RPC session started on {}", transport.name());
    Ok(())
}

fn show_config(path: &Path, write_default: bool, explicit: Option<&Path>) -> Result<()> {
    if write_default {
        if path.exists() {
            anyhow::bail!("{} already exists", path.display());
        }
        AppConfig::default().save_to(path)?;
        println!("Wrote default configuration to {}", path.display());
        return Ok(());
    }
    let config = load_config(explicit)?;
    println!("# {}", path.display());
    print!("{}", config.to_toml()?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_logging(cli.log_file.as_deref())?;
    let explicit = cli.config.as_deref();

    match cli.command {
        Command::Ports => list_ports(&load_config(explicit)?),
        Command::Check { port } => check(&load_config(explicit)?, port),
        Command::Config { write_default } => {
            let path = resolve_config_path(explicit)?;
            show_config(&path, write_default, explicit)
        }
    }
}
