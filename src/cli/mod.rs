//! Command-line interface for tagstats.
//!
//! Runs the status endpoint and one exporter per configured sink until
//! Ctrl-C. A single InfluxDB sink can be given directly on the command line.

use crate::api::{self, Instrumentation};
use crate::core::config::ConfigBuilder;
use crate::core::{Config, InfluxSinkConfig, Result, SinkConfig, StatsError};
use crate::export::{Exporter, InfluxClient};
use crate::metrics::{process, Registry};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Tagged metrics aggregation with periodic InfluxDB export
#[derive(Parser, Debug)]
#[command(name = "tagstats")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Configuration file path (default: ~/.config/tagstats/config.yaml)
    #[arg(short, long, env = "TAGSTATS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Port of the status endpoint
    #[arg(long, env = "TAGSTATS_STATUS_PORT")]
    pub status_port: Option<u16>,

    /// Path of the status endpoint
    #[arg(long, env = "TAGSTATS_STATUS_PATH")]
    pub status_path: Option<String>,

    /// Disable the status endpoint
    #[arg(long)]
    pub no_status: bool,

    /// Value of the `server` tag
    #[arg(long, env = "TAGSTATS_SERVER_NAME")]
    pub server_name: Option<String>,

    /// InfluxDB address for an extra sink
    #[arg(long, env = "TAGSTATS_INFLUX_ADDRESS", requires = "influx_database")]
    pub influx_address: Option<String>,

    /// InfluxDB database for the extra sink
    #[arg(long, env = "TAGSTATS_INFLUX_DATABASE", requires = "influx_address")]
    pub influx_database: Option<String>,

    /// Export interval for the extra sink
    #[arg(long, env = "TAGSTATS_INTERVAL", value_parser = humantime::parse_duration)]
    pub interval: Option<Duration>,

    /// InfluxDB user name for the extra sink
    #[arg(long, env = "TAGSTATS_INFLUX_USERNAME")]
    pub influx_username: Option<String>,

    /// InfluxDB password for the extra sink
    #[arg(long, env = "TAGSTATS_INFLUX_PASSWORD", hide_env_values = true)]
    pub influx_password: Option<String>,

    /// Enable debug logging
    #[arg(short, long, env = "TAGSTATS_DEBUG")]
    pub debug: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub check_config: bool,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Load configuration with proper precedence:
    /// 1. CLI arguments (highest priority)
    /// 2. Environment variables
    /// 3. Config file
    /// 4. Defaults (lowest priority)
    ///
    /// Also returns the file the configuration came from, if any.
    pub async fn load_config(&self) -> Result<(Config, Option<PathBuf>)> {
        let mut builder = ConfigBuilder::new();

        let config_path = match &self.config {
            Some(path) => Some(path.clone()),
            None => dirs::config_dir()
                .map(|d| d.join("tagstats").join("config.yaml"))
                .filter(|p| p.exists()),
        };

        let mut loaded_from = None;
        if let Some(path) = config_path {
            match tokio::fs::read_to_string(&path).await {
                Ok(content) => {
                    builder = builder.from_yaml(&content)?;
                    loaded_from = Some(path);
                },
                Err(e) => {
                    return Err(StatsError::config(format!(
                        "Failed to read config file {:?}: {}",
                        path, e
                    )));
                },
            }
        }

        let config = self.apply_overrides(builder).build()?;
        Ok((config, loaded_from))
    }

    fn apply_overrides(&self, mut builder: ConfigBuilder) -> ConfigBuilder {
        if let Some(port) = self.status_port {
            builder = builder.status_port(port);
        }
        if let Some(path) = &self.status_path {
            builder = builder.status_path(path.clone());
        }
        if self.no_status {
            builder = builder.status_enabled(false);
        }
        if let Some(name) = &self.server_name {
            builder = builder.server_name(name.clone());
        }
        if let (Some(address), Some(database)) = (&self.influx_address, &self.influx_database) {
            let mut sink = InfluxSinkConfig::new(address.clone(), database.clone());
            if let Some(interval) = self.interval {
                sink.interval = interval;
            }
            sink.username = self.influx_username.clone();
            sink.password = self.influx_password.clone();
            builder = builder.sink(SinkConfig::Influx(sink));
        }

        builder.debug(self.debug)
    }

    /// Initialize logging.
    ///
    /// `--debug` wins over `TAGSTATS_LOG_LEVEL`, which wins over the
    /// configured level; `RUST_LOG` overrides all of them.
    pub fn init_logging(&self, config: &Config) -> Result<()> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

        let log_level = if config.debug {
            "debug".to_string()
        } else {
            std::env::var("TAGSTATS_LOG_LEVEL")
                .unwrap_or_else(|_| config.logging.level.as_str().to_string())
        };

        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(config.debug)
            .with_line_number(config.debug)
            .compact();

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| StatsError::config(format!("Failed to initialize logging: {}", e)))?;

        Ok(())
    }
}

/// Execute the tagstats daemon.
pub async fn execute(cli: Cli) -> Result<()> {
    let (config, loaded_from) = cli.load_config().await?;

    if cli.check_config {
        println!("Configuration is valid!");
        println!("  Server name: {}", config.server_name);
        if config.status.enabled {
            println!(
                "  Status endpoint: {}:{}{}",
                config.status.bind_address, config.status.port, config.status.path
            );
        }
        for sink in &config.sinks {
            match sink {
                SinkConfig::Influx(influx) => println!(
                    "  Influx sink: {} db={} every {:?}",
                    influx.address, influx.database, influx.interval
                ),
            }
        }
        return Ok(());
    }

    cli.init_logging(&config)?;
    if let Some(path) = loaded_from {
        tracing::info!("Loaded configuration from: {:?}", path);
    }

    run(config).await
}

/// Run the registry, exporters and status endpoint until Ctrl-C.
pub async fn run(config: Config) -> Result<()> {
    let registry = Arc::new(Registry::with_sample_config(config.sample));
    process::register(&registry);

    let cancel = CancellationToken::new();
    let exporters = match start_exporters(&config, &registry, &cancel).await {
        Ok(handles) => handles,
        Err(e) => {
            cancel.cancel();
            return Err(e);
        },
    };

    let result = if config.status.enabled {
        let instrumentation = Instrumentation::new(Arc::clone(&registry), config.server_name.clone())
            .with_paths(config.paths.clone());
        let server = api::start_server(
            Arc::clone(&registry),
            &config.status,
            instrumentation,
            cancel.clone(),
        );

        tokio::select! {
            result = server => result,
            signal = tokio::signal::ctrl_c() => {
                tracing::info!("Received shutdown signal, stopping...");
                signal.map_err(StatsError::from)
            }
        }
    } else {
        tracing::info!("Status endpoint disabled");
        let signal = tokio::signal::ctrl_c().await;
        tracing::info!("Received shutdown signal, stopping...");
        signal.map_err(StatsError::from)
    };

    cancel.cancel();
    for handle in exporters {
        handle.await?;
    }

    result
}

// A sink that cannot be constructed is fatal; an unreachable one is not.
async fn start_exporters(
    config: &Config,
    registry: &Arc<Registry>,
    cancel: &CancellationToken,
) -> Result<Vec<JoinHandle<()>>> {
    let mut handles = Vec::with_capacity(config.sinks.len());

    for sink in &config.sinks {
        match sink {
            SinkConfig::Influx(influx) => {
                let client = InfluxClient::new(influx.client_config()).map_err(|e| {
                    tracing::error!("Error creating client for influx: {}", e);
                    e
                })?;

                match client.ping().await {
                    Ok(rtt) => tracing::info!("Influx at {} answered in {:?}", influx.address, rtt),
                    Err(e) => tracing::warn!("Influx at {} not reachable yet: {}", influx.address, e),
                }

                let exporter =
                    Exporter::new(Arc::clone(registry), Arc::new(client), influx.export_config());
                handles.push(exporter.spawn(cancel.child_token()));
            },
        }
    }

    Ok(handles)
}
