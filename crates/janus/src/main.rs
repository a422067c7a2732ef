//! Janus - Entry point
//!
//! Serves the article service on one port until SIGINT or SIGTERM.

use std::path::PathBuf;

use anyhow::Context;
use tracing::{error, info};

use janus::ArticleServer;
use janus_config::{ConfigLoader, JanusConfig};

/// Default configuration file, read when present.
const DEFAULT_CONFIG_FILE: &str = "janus.toml";

/// Command-line arguments.
struct Args {
    /// Path to configuration file.
    config: Option<PathBuf>,
    /// Listen port override.
    port: Option<u16>,
}

impl Args {
    fn parse() -> Self {
        let mut args = std::env::args().skip(1);
        let mut config = None;
        let mut port = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => {
                    config = args.next().map(PathBuf::from);
                }
                "--port" | "-p" => match args.next().map(|value| value.parse::<u16>()) {
                    Some(Ok(value)) => port = Some(value),
                    _ => {
                        eprintln!("--port expects a number between 0 and 65535");
                        std::process::exit(1);
                    }
                },
                "--help" | "-h" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("janus {}", janus::VERSION);
                    std::process::exit(0);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    std::process::exit(1);
                }
            }
        }

        Self { config, port }
    }
}

fn print_help() {
    println!(
        r"Janus - article service, binary RPC and REST on one port

USAGE:
    janus [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Path to configuration file (TOML or JSON)
                           [default: ./janus.toml when present]
    -p, --port <PORT>      Listen port, overrides server.addr's port
    -h, --help             Print help information
    -v, --version          Print version information

ENVIRONMENT VARIABLES:
    JANUS__SERVER__ADDR                  Listen address (default: 0.0.0.0:8004)
    JANUS__AUTH__MODE                    disabled | metadata | credentials
    JANUS__AUTH__APP_KEY                 Expected app_key
    JANUS__AUTH__APP_SECRET              Expected app_secret
    JANUS__STORE__SEED                   Comma-separated titles inserted at startup
    JANUS__TELEMETRY__LOGGING__LEVEL     Log level (default: info)
    JANUS__TELEMETRY__TRACING__ENABLED   Export spans over OTLP

    A .env file in the working directory is read first.

EXAMPLES:
    janus --config /etc/janus/janus.toml
    JANUS__STORE__SEED=first,second,third janus --port 9000

ROUTES:
    /proto.ArticleService/GetArticleList   binary RPC
    GET /v1/articles?page=&size=           REST gateway
    GET /swagger-ui/                       documentation
"
    );
}

fn load_config(args: &Args) -> anyhow::Result<JanusConfig> {
    let loader = ConfigLoader::new().with_defaults();
    let loader = match &args.config {
        Some(path) => loader
            .with_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => loader.with_optional_file(DEFAULT_CONFIG_FILE)?,
    };
    let mut config = loader
        .with_dotenv()?
        .with_env_prefix("JANUS")
        .load_unvalidated()?;

    if let Some(port) = args.port {
        config.server.addr = with_port(&config.server.addr, port);
    }
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Replaces the port of `host:port`, keeping the host.
fn with_port(addr: &str, port: u16) -> String {
    let host = addr.rsplit_once(':').map_or(addr, |(host, _)| host);
    format!("{host}:{port}")
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = load_config(&args)?;
    let _telemetry = janus_telemetry::init_telemetry(&config.telemetry_config())
        .context("failed to initialize telemetry")?;

    info!(version = janus::VERSION, "starting janus");
    let server = ArticleServer::new(config).bind().await?;
    info!(addr = %server.local_addr(), "serving binary RPC and REST");

    if let Err(err) = server.run().await {
        error!(error = %err, "server stopped with error");
        return Err(err.into());
    }
    info!("janus stopped");
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    if let Err(err) = run(args).await {
        eprintln!("janus: {err:#}");
        std::process::exit(1);
    }
}
