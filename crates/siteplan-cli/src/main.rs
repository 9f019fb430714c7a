mod config;
mod plan_cmds;
mod rates_cmd;
mod serve_cmd;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use config::{CliOverrides, SiteplanConfig};
use plan_cmds::PlanArgs;

#[derive(Parser)]
#[command(
    name = "siteplan",
    version,
    about = "Construction execution-plan synthesis"
)]
struct Cli {
    /// Rate table TOML (overrides SITEPLAN_RATES env var)
    #[arg(long, global = true)]
    rates: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a siteplan config file
    Init {
        /// OpenAI API key to store in the config file
        #[arg(long)]
        api_key: Option<String>,
        /// Overwrite existing config file
        #[arg(long)]
        force: bool,
    },
    /// Run the HTTP API
    Serve {
        /// Address to bind (default: 0.0.0.0)
        #[arg(long)]
        bind: Option<String>,
        /// Port to listen on (overrides API_PORT env var)
        #[arg(long)]
        port: Option<u16>,
        /// Model name (overrides OPENAI_MODEL env var)
        #[arg(long)]
        model: Option<String>,
    },
    /// Generate a plan for one project and print it as JSON
    Plan {
        /// Project identifier
        #[arg(long, default_value = "Unknown")]
        project_id: String,
        /// Project location
        #[arg(long, default_value = "Unknown")]
        location: String,
        /// Free-text scope and constraints
        #[arg(long, default_value = "")]
        notes: String,
        /// PDF specification to ingest before planning
        #[arg(long)]
        spec: Option<PathBuf>,
        /// Write the plan to this file instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
        /// Model name (overrides OPENAI_MODEL env var)
        #[arg(long)]
        model: Option<String>,
    },
    /// Print the effective rate table
    Rates,
}

/// Execute the `siteplan init` command: write config file.
fn cmd_init(api_key: Option<String>, force: bool) -> anyhow::Result<()> {
    let path = config::config_path();

    if path.exists() && !force {
        anyhow::bail!(
            "config file already exists at {}\nUse --force to overwrite.",
            path.display()
        );
    }

    let has_key = api_key.is_some();
    let cfg = config::default_config_file(api_key);
    config::save_config(&cfg)?;

    println!("Config written to {}", path.display());
    if let Some(model) = &cfg.llm.model {
        println!("  llm.model = {model}");
    }
    if let Some(port) = cfg.server.port {
        println!("  server.port = {port}");
    }
    if !has_key {
        println!();
        println!("No API key stored. Set OPENAI_API_KEY or rerun with --api-key.");
    }

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init { api_key, force } => {
            cmd_init(api_key, force)?;
        }
        Commands::Serve { bind, port, model } => {
            let resolved = SiteplanConfig::resolve(&CliOverrides {
                model,
                bind,
                port,
                rates: cli.rates,
            })?;
            serve_cmd::run_serve(&resolved).await?;
        }
        Commands::Plan {
            project_id,
            location,
            notes,
            spec,
            output,
            model,
        } => {
            let resolved = SiteplanConfig::resolve(&CliOverrides {
                model,
                rates: cli.rates,
                ..CliOverrides::default()
            })?;
            let args = PlanArgs {
                project_id,
                location,
                notes,
                spec,
                output,
            };
            plan_cmds::run_plan(&resolved, args).await?;
        }
        Commands::Rates => {
            let rates = config::resolve_rates(cli.rates.as_deref())?;
            rates_cmd::run_rates(&rates);
        }
    }

    Ok(())
}
