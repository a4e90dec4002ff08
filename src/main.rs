use clap::Parser;
use opencode_proxy::config::config_search_paths;
use opencode_proxy::{build_router, AppState, ProxyConfig, SharedLogger};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "opencode-proxy",
    about = "OpenAI-compatible API in front of an OpenCode agent server",
    version
)]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind (overrides config and HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides config and PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// OpenCode server URL (overrides config and OPENCODE_API)
    #[arg(long)]
    backend_url: Option<String>,

    /// Log file path
    #[arg(long, default_value = "opencode-proxy.log")]
    log_file: PathBuf,

    /// Print config search paths and exit
    #[arg(long)]
    show_config_paths: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "opencode_proxy=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if cli.show_config_paths {
        println!("Config search paths:");
        for (i, path) in config_search_paths().iter().enumerate() {
            println!("  {}. {}", i + 1, path.display());
        }
        return Ok(());
    }

    let mut config = ProxyConfig::find_and_load(cli.config.as_deref())?;
    config.apply_env_overrides()?;

    if let Some(host) = cli.host {
        config.host = host;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(url) = cli.backend_url {
        config.backend.base_url = url;
    }
    config.validate()?;

    let logger = SharedLogger::new(&cli.log_file)?;

    let providers: Vec<String> = config
        .routing
        .providers
        .iter()
        .map(ToString::to_string)
        .collect();

    info!("opencode-proxy v{}", env!("CARGO_PKG_VERSION"));
    info!("  Backend:   {}", config.backend.base_url);
    info!("  Default provider id: {}", config.backend.default_provider_id);
    info!("  Routing:   {}", providers.join(", "));
    info!("  Log file:  {}", cli.log_file.display());

    logger.info(
        "startup",
        format!(
            "Starting opencode-proxy backend={} bind={} providers={}",
            config.backend.base_url,
            config.bind_addr(),
            providers.join(",")
        ),
    );

    let mut client = reqwest::Client::builder();
    if let Some(timeout) = config.backend_timeout() {
        client = client.timeout(timeout);
    }
    let client = client.build()?;

    let bind_addr = config.bind_addr();
    let state = Arc::new(AppState::new(config, client, logger));
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Listening on http://{}", bind_addr);
    info!("  OpenAI base URL: http://{}/v1", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
