mod doctor_cmd;
mod serve_cmd;
mod settings;
mod status_cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ocr_bridge_core::Tier;

use settings::{resolve_config, CliOverrides};

#[derive(Parser)]
#[command(name = "ocr-bridge")]
#[command(about = "Local OCR bridge: fast OCR or a vision-language model behind one HTTP endpoint")]
#[command(version)]
struct Cli {
    /// TOML config file (also read from OCR_BRIDGE_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the tier's backend and serve HTTP
    Serve {
        /// Backend tier: eco, lite or pro
        #[arg(short, long)]
        tier: Option<Tier>,
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
        /// Address to bind the HTTP server to
        #[arg(short, long)]
        bind: Option<String>,
    },
    /// Query a running bridge
    Status {
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Check that the configured tier can start
    Doctor {
        #[arg(short, long)]
        tier: Option<Tier>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Serve { tier, port, bind } => {
            let overrides = CliOverrides { tier, port, bind };
            let config = resolve_config(config_path, &overrides).await?;
            ocr_bridge_logging::init_logger(
                &config.log.level,
                config.log.dir.as_deref(),
                config.log.json,
            );
            serve_cmd::run(config).await?;
        }
        Commands::Status { port } => {
            let overrides = CliOverrides {
                port,
                ..Default::default()
            };
            let config = resolve_config(config_path, &overrides).await?;
            if !status_cmd::run(&config.server.bind, config.server.port).await? {
                std::process::exit(1);
            }
        }
        Commands::Doctor { tier } => {
            let overrides = CliOverrides {
                tier,
                ..Default::default()
            };
            if !doctor_cmd::run(config_path, &overrides).await? {
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
