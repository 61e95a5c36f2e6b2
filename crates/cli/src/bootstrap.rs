use anyhow::Context;
use auditdns_domain::Config;
use tracing_subscriber::EnvFilter;

/// Command-line values that take precedence over the config file.
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub bind_address: Option<String>,
    pub upstream_dns: Option<String>,
    pub output: Option<String>,
    pub log_level: Option<String>,
}

pub fn load_config(path: Option<&str>, overrides: CliOverrides) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file '{}'", path))?;
            toml::from_str(&text)
                .with_context(|| format!("failed to parse config file '{}'", path))?
        }
        None => Config::default(),
    };

    if let Some(port) = overrides.port {
        config.server.port = port;
    }
    if let Some(bind_address) = overrides.bind_address {
        config.server.address = bind_address;
    }
    if let Some(upstream_dns) = overrides.upstream_dns {
        config.upstream.upstream_dns = upstream_dns;
    }
    if let Some(output) = overrides.output {
        config.sink.path = Some(output);
    }
    if let Some(log_level) = overrides.log_level {
        config.logging.level = log_level;
    }

    Ok(config)
}

pub fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
