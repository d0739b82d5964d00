use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use regionstyle::style::StyleRegistry;
use regionstyle::{Config, PromptRequest, StyleSubmission, Studio};

/// Segment photos from point and box prompts and restyle either region.
#[derive(Parser, Debug)]
#[command(name = "regionstyle")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// JSON config file. Built-in defaults are used when omitted.
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Load every style backend before handling the request
    #[arg(long, global = true)]
    preload: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Segment an uploaded image and export every candidate mask
    Segment {
        /// Prompt submission as inline JSON, or @path to read it from a file
        #[arg(short, long)]
        request: String,
    },
    /// Restyle one region of an uploaded image under an exported mask
    Stylize {
        /// Style submission as inline JSON, or @path to read it from a file
        #[arg(short, long)]
        request: String,
    },
    /// List registered styles
    Styles,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("regionstyle={log_level}").into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    if let Err(err) = run(&args) {
        tracing::error!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn run(args: &Args) -> Result<()> {
    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    if let Command::Styles = args.command {
        // Registry entries are lazy, so listing loads no models
        let registry = StyleRegistry::from_specs(&config.styles, &config.default_style)
            .context("Failed to register styles")?;
        let styles: Vec<_> = registry
            .ids()
            .map(|id| StyleListing {
                id,
                default: id == registry.default_id(),
            })
            .collect();
        return print_json(&styles);
    }

    tracing::info!(
        "Loading segmentation model from {}",
        config.segmentation.encoder.display()
    );
    let studio = Studio::from_config(&config).context("Failed to initialize pipeline")?;

    if args.preload {
        studio
            .registry()
            .preload()
            .context("Failed to load style backends")?;
        tracing::info!("All style backends loaded");
    }

    match &args.command {
        Command::Segment { request } => {
            let request = PromptRequest::from_json(&read_request(request)?)?;
            let response = studio.segment(&request).context("Segmentation failed")?;
            print_json(&response)
        }
        Command::Stylize { request } => {
            let submission = StyleSubmission::from_json(&read_request(request)?)?;
            let response = studio.stylize(&submission).context("Stylization failed")?;
            print_json(&response)
        }
        Command::Styles => Ok(()),
    }
}

#[derive(Serialize)]
struct StyleListing<'a> {
    id: &'a str,
    default: bool,
}

fn read_request(arg: &str) -> Result<String> {
    match arg.strip_prefix('@') {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request file {path}")),
        None => Ok(arg.to_string()),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
