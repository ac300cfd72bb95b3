//! Command-line interface for Alertline.

mod client;
mod logging;

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};

use alertline_api::config::LogConfig;
use alertline_api::{hash_token, Config};
use alertline_core::config::env_vars;
use alertline_core::{IncomingReport, Severity, SourceId};

use crate::client::Client;

/// Alertline - incident report aggregation and escalation.
#[derive(Parser, Debug)]
#[command(name = "alertline")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the server.
    Serve {
        /// Config file. Defaults to $ALERTLINE_CONFIG.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Load and validate a config file.
    CheckConfig {
        #[arg(required = true)]
        path: PathBuf,
    },
    /// Print the token_hash for a raw API token.
    HashToken {
        #[arg(required = true)]
        token: String,
    },
    /// Check that the configured server is reachable.
    Ping {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Raw API token.
        #[arg(short, long)]
        token: Option<String>,
    },
    /// Post a report to the configured server.
    Send {
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// info, warning, critical or recovery.
        #[arg(long)]
        severity: String,
        #[arg(long)]
        subject: String,
        #[arg(long, default_value = "")]
        body: String,
        /// Defaults to the configured self-report app.
        #[arg(long)]
        app: Option<String>,
        #[arg(long)]
        instance: Option<String>,
        #[arg(long)]
        tag: Option<String>,
        /// Raw API token.
        #[arg(short, long)]
        token: Option<String>,
    },
}

fn config_path(arg: Option<PathBuf>) -> Result<PathBuf> {
    arg.or_else(|| std::env::var_os(env_vars::CONFIG).map(PathBuf::from))
        .ok_or_else(|| anyhow!("no config file, pass --config or set {}", env_vars::CONFIG))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    match args.command {
        Command::Serve { config } => {
            let config = Config::load(config_path(config)?)?;
            let _guard = logging::init(args.verbose, &config.log)?;
            alertline_api::run(config).await
        }
        Command::CheckConfig { path } => check_config(path),
        Command::HashToken { token } => {
            println!("{}", hash_token(&token));
            Ok(())
        }
        Command::Ping { config, token } => {
            let _guard = logging::init(args.verbose, &LogConfig::default())?;
            let config = Config::load(config_path(config)?)?;
            let client = Client::from_config(&config, token.as_deref())?;
            client.ping().await?;
            println!("{} ok", client.base_url());
            Ok(())
        }
        Command::Send {
            config,
            severity,
            subject,
            body,
            app,
            instance,
            tag,
            token,
        } => {
            let _guard = logging::init(args.verbose, &LogConfig::default())?;
            Severity::parse(&severity)?;
            let config = Config::load(config_path(config)?)?;

            let mut source = SourceId::new(app.unwrap_or_else(|| config.self_report.app.clone()));
            source.instance = instance;
            source.tag = tag;
            let report = IncomingReport::new(source, severity, subject).with_body(body);

            let client = Client::from_config(&config, token.as_deref())?;
            let stored = client.send(&report).await?;
            if let Some(warnings) = stored.get("warnings").and_then(|w| w.as_array()) {
                for warning in warnings {
                    eprintln!("warning: {}", warning.as_str().unwrap_or_default());
                }
            }
            println!("{}", serde_json::to_string_pretty(&stored)?);
            Ok(())
        }
    }
}

fn check_config(path: PathBuf) -> Result<()> {
    let config = Config::load(&path)?;
    println!("{}: ok", path.display());
    for line in config.summary() {
        println!("  {}", line);
    }
    Ok(())
}
