use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use cmdgate_engine::{CommandCapability, OutputFormat, ResolutionPipeline, collect_table, parse_request};
use cmdgate_registry::{CommandSummary, locate};
use cmdgate_server::{CommandServer, RouteConfig, RouteSettings, RunningServer, ServerConfig, ServerSettings, default_config_path, load_config_from_path};
use cmdgate_util::{default_evaluators, redact_sensitive};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "cmdgate", version, about = "Serve command repositories over HTTP")]
struct Cli {
    /// Configuration file. Defaults to $CMDGATE_CONFIG or <config dir>/cmdgate/config.yaml.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Start the HTTP server. SIGHUP reloads the configuration.
    Serve {
        /// Bind address, overriding the configuration.
        #[arg(long)]
        address: Option<String>,
    },
    /// List the commands of every route.
    Ls {
        #[arg(long)]
        route: Option<String>,
    },
    /// Run one command and print its output.
    Run {
        /// Command path, e.g. `foo/bar`.
        path: String,
        /// Parameters as `key=value`.
        parameters: Vec<String>,
        /// Output format for structured commands: json, yaml, csv, tsv, markdown, html, ascii, excel.
        #[arg(long, short, default_value = "ascii")]
        output: String,
        /// Route whose repositories and parameter rules apply. Defaults to the first route.
        #[arg(long)]
        route: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config_path = cli.config.unwrap_or_else(default_config_path);

    match cli.command {
        CliCommand::Serve { address } => serve(&config_path, address).await,
        CliCommand::Ls { route } => list(&config_path, route.as_deref()),
        CliCommand::Run {
            path,
            parameters,
            output,
            route,
        } => run(&config_path, route.as_deref(), &path, &parameters, &output).await,
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

fn load_config(path: &Path) -> Result<ServerConfig> {
    load_config_from_path(path, &default_evaluators()).with_context(|| format!("failed to load {}", path.display()))
}

fn load_settings(path: &Path, address: Option<&str>) -> Result<ServerSettings> {
    let mut config = load_config(path)?;
    if let Some(address) = address {
        config.address = Some(address.to_string());
    }
    ServerSettings::from_config(&config)
}

async fn serve(config_path: &Path, address: Option<String>) -> Result<()> {
    let settings = load_settings(config_path, address.as_deref())?;
    let server = CommandServer::new(settings).start().await?;
    info!(address = %server.bound_address(), config = %config_path.display(), "serving");

    let mut hangup = hangup::listen()?;
    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                info!("shutting down");
                break;
            }
            _ = hangup::next(&mut hangup) => reload(&server, config_path, address.as_deref()),
        }
    }
    server.stop().await
}

fn reload(server: &RunningServer, config_path: &Path, address: Option<&str>) {
    info!(config = %config_path.display(), "reloading configuration");
    match load_settings(config_path, address) {
        Ok(settings) => server.reload(settings),
        Err(error) => error!("reload failed, keeping the previous configuration: {}", redact_sensitive(&format!("{error:#}"))),
    }
}

fn select_route<'a>(config: &'a ServerConfig, name: Option<&str>) -> Result<&'a RouteConfig> {
    match name {
        Some(name) => config
            .routes
            .iter()
            .find(|route| route.name == name)
            .ok_or_else(|| anyhow!("no route named '{name}'")),
        None => config.routes.first().ok_or_else(|| anyhow!("the configuration has no routes")),
    }
}

fn list(config_path: &Path, route: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    let routes: Vec<&RouteConfig> = match route {
        Some(_) => vec![select_route(&config, route)?],
        None => config.routes.iter().collect(),
    };

    let mut stdout = std::io::stdout().lock();
    for route in routes {
        let settings = RouteSettings::load(route)?;
        writeln!(stdout, "{} ({})", route.name, if settings.mount.is_empty() { "/" } else { &settings.mount })?;
        for command in settings.commands.all() {
            let summary = CommandSummary::from(&command);
            writeln!(stdout, "  {:<32} {:<10} {}", summary.path, command.kind().to_string(), summary.short)?;
        }
    }
    Ok(())
}

fn parse_pairs(parameters: &[String]) -> Result<Vec<(String, String)>> {
    parameters
        .iter()
        .map(|parameter| {
            parameter
                .split_once('=')
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .ok_or_else(|| anyhow!("expected key=value, got '{parameter}'"))
        })
        .collect()
}

async fn run(config_path: &Path, route: Option<&str>, path: &str, parameters: &[String], output: &str) -> Result<()> {
    let config = load_config(config_path)?;
    let route = RouteSettings::load(select_route(&config, route)?)?;
    let command = locate(&route.commands, path)?;
    let description = command.description();

    let request = parse_request(description, &parse_pairs(parameters)?)?;
    let parameters = ResolutionPipeline::from_filter(&route.filter).resolve(description, request)?;

    let buffer = match command.capability() {
        CommandCapability::Structured(producer) => {
            let format: OutputFormat = output.parse()?;
            let table = collect_table(Arc::clone(producer), Arc::new(parameters), config.stream_buffer, &CancellationToken::new()).await?;
            format.render(&table)?
        }
        CommandCapability::Writer(writer) => {
            let mut buffer = Vec::new();
            writer.run(&parameters, &mut buffer).await?;
            buffer
        }
    };
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&buffer)?;
    stdout.flush()?;
    Ok(())
}

#[cfg(unix)]
mod hangup {
    use anyhow::Result;
    use tokio::signal::unix::{Signal, SignalKind, signal};

    pub fn listen() -> Result<Signal> {
        Ok(signal(SignalKind::hangup())?)
    }

    pub async fn next(hangup: &mut Signal) {
        if hangup.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
mod hangup {
    use anyhow::Result;

    pub struct Signal;

    pub fn listen() -> Result<Signal> {
        Ok(Signal)
    }

    pub async fn next(_: &mut Signal) {
        std::future::pending::<()>().await;
    }
}
