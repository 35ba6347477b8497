//! powervault-exporter - Prometheus exporter for Dell PowerVault MD arrays.
//!
//! Polls the arrays through `SMcli` on a fixed interval and serves the last
//! collected values over HTTP.

mod access_log;
mod handlers;
mod state;

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use powervault_core::config::{DEFAULT_SHELL, DEFAULT_SMCLI_PATH};
use powervault_core::{
    ConfigError, ExporterConfig, MetricRegistry, Scheduler, SmCli, TargetSet, VERSION,
};
use tower_http::compression::CompressionLayer;
use tracing::{Level, error, info};
use tracing_subscriber::EnvFilter;

use crate::access_log::AccessLogLayer;
use crate::state::AppState;

/// Prometheus exporter for Dell PowerVault MD storage arrays.
#[derive(Parser, Debug)]
#[command(name = "powervault-exporter", about, version = VERSION)]
struct Args {
    /// Storage array controller address. Repeat for several controllers.
    #[arg(
        long = "ip",
        alias = "IP",
        value_name = "ADDR",
        default_value = "172.0.0.1",
        env = "PVMD_IP",
        value_delimiter = ','
    )]
    ips: Vec<IpAddr>,

    /// Path to the SMcli binary.
    #[arg(
        long,
        alias = "SMcliPath",
        default_value = DEFAULT_SMCLI_PATH,
        env = "PVMD_SMCLI_PATH"
    )]
    smcli_path: PathBuf,

    /// Interpreter used to launch SMcli. Empty runs SMcli directly.
    #[arg(long, default_value = DEFAULT_SHELL, env = "PVMD_SHELL")]
    shell: String,

    /// Collection interval in seconds.
    #[arg(short, long, default_value = "30", env = "PVMD_INTERVAL")]
    interval: u64,

    /// Seconds before a hung SMcli invocation is killed.
    #[arg(long, default_value = "120", env = "PVMD_COMMAND_TIMEOUT")]
    command_timeout: u64,

    /// Address to serve metrics on. `:PORT` binds all interfaces.
    #[arg(
        long,
        default_value = "0.0.0.0:9362",
        env = "PVMD_LISTEN_ADDRESS",
        value_parser = parse_listen_address
    )]
    listen_address: SocketAddr,

    /// Path under which metrics are exposed.
    #[arg(
        long,
        default_value = "/metrics",
        env = "PVMD_TELEMETRY_PATH",
        value_parser = parse_telemetry_path
    )]
    telemetry_path: String,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Accepts `host:port` or a bare `:port`.
fn parse_listen_address(s: &str) -> Result<SocketAddr, String> {
    let s = s.trim();
    let full = match s.strip_prefix(':') {
        Some(port) => format!("0.0.0.0:{port}"),
        None => s.to_string(),
    };
    full.parse()
        .map_err(|e| format!("invalid listen address '{s}': {e}"))
}

/// A literal route. `/` and `/health` are served by other handlers.
fn parse_telemetry_path(s: &str) -> Result<String, String> {
    if !s.starts_with('/') {
        return Err(format!("telemetry path '{s}' must start with '/'"));
    }
    // route syntax: captures, wildcards and legacy `:param` segments
    if let Some(c) = s.chars().find(|c| matches!(c, '{' | '}' | '*' | ':')) {
        return Err(format!("telemetry path '{s}' may not contain '{c}'"));
    }
    if s == "/" || s == "/health" {
        return Err(format!("telemetry path '{s}' is reserved"));
    }
    Ok(s.to_string())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["powervault_exporter", "powervault_core"] {
        if let Ok(directive) = format!("{target}={level}").parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn build_config(args: &Args) -> Result<ExporterConfig, ConfigError> {
    let targets = TargetSet::new(args.ips.iter().copied())?;
    let shell = (!args.shell.is_empty()).then(|| PathBuf::from(&args.shell));
    let config = ExporterConfig::new(targets, &args.smcli_path)
        .with_shell(shell)
        .with_interval(Duration::from_secs(args.interval))
        .with_command_timeout(Duration::from_secs(args.command_timeout));
    config.validate()?;
    Ok(config)
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
            Ok(mut sig) => {
                sig.recv().await;
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
    info!("shutdown signal received");
}

async fn serve(args: Args, config: ExporterConfig) -> Result<(), String> {
    let registry = Arc::new(MetricRegistry::new().map_err(|e| e.to_string())?);

    let scheduler = Scheduler::new(
        SmCli::from_config(&config),
        registry.clone(),
        config.interval,
    );
    let collector = tokio::spawn(async move { scheduler.run().await });

    let state = AppState {
        registry,
        metrics_path: Arc::from(args.telemetry_path.as_str()),
    };
    let app = handlers::router(state)
        .layer(CompressionLayer::new())
        .layer(AccessLogLayer)
        .into_make_service_with_connect_info::<SocketAddr>();

    let listener = tokio::net::TcpListener::bind(args.listen_address)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", args.listen_address))?;
    info!(
        addr = %args.listen_address,
        path = %args.telemetry_path,
        "listening"
    );

    let result = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("server error: {e}"));

    collector.abort();
    result
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    info!(version = VERSION, "starting powervault-exporter");

    let config = match build_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };
    info!(
        targets = %config.targets,
        smcli = %config.binary.display(),
        interval_secs = config.interval.as_secs(),
        command_timeout_secs = config.command_timeout.as_secs(),
        "configuration loaded"
    );

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(serve(args, config)) {
        error!(error = %e, "exporter stopped");
        std::process::exit(1);
    }
    info!("shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_listen_address_forms() {
        assert_eq!(
            parse_listen_address("0.0.0.0:9362").unwrap(),
            "0.0.0.0:9362".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            parse_listen_address(":9100").unwrap(),
            "0.0.0.0:9100".parse::<SocketAddr>().unwrap()
        );
        assert!(parse_listen_address("localhost").is_err());
        assert!(parse_listen_address(":port").is_err());
    }

    #[test]
    fn parse_telemetry_path_rules() {
        assert_eq!(parse_telemetry_path("/metrics").unwrap(), "/metrics");
        assert!(parse_telemetry_path("metrics").is_err());
        assert!(parse_telemetry_path("/").is_err());
        assert!(parse_telemetry_path("/health").is_err());
        assert_eq!(
            parse_telemetry_path("/exporter/metrics").unwrap(),
            "/exporter/metrics"
        );
        for path in ["/:m", "/{m}", "/metrics/*rest", "/a:b"] {
            assert!(parse_telemetry_path(path).is_err(), "{path}");
        }
    }

    #[test]
    fn args_repeatable_ip() {
        let args = Args::try_parse_from([
            "powervault-exporter",
            "--ip",
            "10.0.0.1",
            "--ip",
            "10.0.0.2,10.0.0.3",
            "--shell",
            "",
        ])
        .unwrap();
        assert_eq!(args.ips.len(), 3);
        assert!(args.shell.is_empty());
        assert!(Args::try_parse_from(["powervault-exporter", "--ip", "array-a"]).is_err());
    }

    #[test]
    fn args_accept_legacy_flag_names() {
        let args = Args::try_parse_from([
            "powervault-exporter",
            "--IP",
            "10.0.0.7",
            "--SMcliPath",
            "/usr/local/bin/SMcli",
        ])
        .unwrap();
        assert_eq!(args.ips, vec!["10.0.0.7".parse::<IpAddr>().unwrap()]);
        assert_eq!(args.smcli_path, PathBuf::from("/usr/local/bin/SMcli"));
    }

    #[test]
    fn build_config_rejects_missing_binary() {
        let args = Args::try_parse_from([
            "powervault-exporter",
            "--smcli-path",
            "/nonexistent/SMcli",
        ])
        .unwrap();
        assert!(matches!(
            build_config(&args),
            Err(ConfigError::BinaryNotFound(_))
        ));
    }

    #[test]
    fn build_config_direct_exec() {
        let dir = tempfile::tempdir().unwrap();
        let binary = dir.path().join("SMcli");
        std::fs::write(&binary, "#!/bin/sh\n").unwrap();
        let args = Args::try_parse_from([
            "powervault-exporter",
            "--smcli-path",
            binary.to_str().unwrap(),
            "--shell",
            "",
            "--ip",
            "10.0.0.1",
            "--ip",
            "10.0.0.1",
        ])
        .unwrap();
        let config = build_config(&args).unwrap();
        assert_eq!(config.shell, None);
        assert_eq!(config.targets.len(), 1);
    }
}
