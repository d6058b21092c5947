//! vulsd - Vulnerability dictionary server daemon
//!
//! Usage:
//!   vulsd [OPTIONS]
//!
//! Examples:
//!   vulsd --cvedb-path /var/lib/vuls/cve.sqlite3
//!   vulsd --cvedb-url http://localhost:1323 --ovaldb-url http://localhost:1324
//!   vulsd --config /etc/vulsd.toml --listen 0.0.0.0:5515

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use vuls_gateway::StartupError;
use vulsd::{Args, ServeError, Settings};

const DEFAULT_FILTER: &str = "vulsd=info,vuls_gateway=info,vuls_api=info";
const DEBUG_FILTER: &str = "vulsd=debug,vuls_gateway=debug,vuls_api=debug,vuls_sqlite=debug,\
vuls_netdb=debug,vuls_proxy=debug,tower_http=debug";
/// Added by --debug-sql so statement logs pass the default filter
const SQL_DIRECTIVES: [&str; 2] = ["vuls_sqlite=info", "vuls_netdb=info"];

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    // Initialize logging
    let mut filter = if args.debug {
        EnvFilter::new(DEBUG_FILTER)
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into())
    };
    if args.debug_sql && !args.debug {
        for directive in SQL_DIRECTIVES {
            filter = filter.add_directive(directive.parse()?);
        }
    }
    let registry = tracing_subscriber::registry().with(filter);
    if args.log_json {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()?;
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()?;
    }

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting vulsd");

    let settings = match Settings::from_args(&args) {
        Ok(settings) => settings,
        Err(e) => return Ok(report(ServeError::Startup(StartupError::Config(e)))),
    };

    match vulsd::run(settings).await {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(e) => Ok(report(e)),
    }
}

fn report(err: ServeError) -> ExitCode {
    match err.remediation() {
        Some(hint) => tracing::error!(error = %err, remediation = %hint, "Failed to start server"),
        None => tracing::error!(error = %err, "Server failed"),
    }
    ExitCode::from(err.exit_code())
}
