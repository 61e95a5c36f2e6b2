use auditdns_proxy::{EventSink, JsonLinesSink, Proxy};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

mod bootstrap;

#[derive(Parser)]
#[command(name = "auditdns")]
#[command(version)]
#[command(about = "Transparent DNS forwarding proxy that audits every query and reply")]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<String>,

    /// Port to serve the proxy on (UDP and TCP)
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Bind address; omit to serve on all interfaces
    #[arg(short = 'b', long)]
    bind: Option<String>,

    /// Upstream DNS server as host or host:port (port defaults to 53)
    #[arg(short = 'u', long)]
    upstream_dns: Option<String>,

    /// Audit event output file; omit to write events to stdout
    #[arg(short = 'o', long)]
    output: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let overrides = bootstrap::CliOverrides {
        port: cli.port,
        bind_address: cli.bind,
        upstream_dns: cli.upstream_dns,
        output: cli.output,
        log_level: cli.log_level,
    };
    let config = bootstrap::load_config(cli.config.as_deref(), overrides)?;

    bootstrap::init_logging(&config);
    info!("Starting auditdns v{}", env!("CARGO_PKG_VERSION"));

    let sink: Arc<dyn EventSink> = match &config.sink.path {
        Some(path) => Arc::new(JsonLinesSink::create(path, config.sink.clone()).await?),
        None => Arc::new(JsonLinesSink::stdout(config.sink.clone())),
    };

    let proxy = Proxy::new(config, sink);
    let handle = proxy.start().await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");
    handle.shutdown().await;

    Ok(())
}
