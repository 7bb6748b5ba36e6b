//! glyph-probe: operator CLI for the signature router.
//!
//! Usage:
//!   glyph-probe signatures
//!   glyph-probe detect --tool finance_scan --payload result.json [--catalog manifest.json]
//!   glyph-probe detect --payload -            (payload on stdin)
//!   glyph-probe describe --tool notes_add --catalog manifest.json
//!
//! Output is JSON on stdout; logs go to stderr (RUST_LOG, default `info`).

mod manifest;

use clap::{Parser, Subcommand};
use glyph_core::{InMemoryCatalog, RouterConfig, SignatureRouter};
use manifest::CatalogManifest;
use serde_json::Value;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type ProbeResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Parser, Debug)]
#[clap(
    name = "glyph-probe",
    version = env!("CARGO_PKG_VERSION"),
    about = "Inspect how capability results are routed to UI templates"
)]
struct Cli {
    /// Config file (defaults to GLYPH_CONFIG, then config/glyph).
    #[clap(long, global = true)]
    config: Option<PathBuf>,
    /// Catalog manifest (JSON) standing in for the host's capabilities.
    #[clap(long, global = true)]
    catalog: Option<PathBuf>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List every registered signature (built-ins plus anything discovered from --catalog)
    Signatures,
    /// Detect the signature for a tool name and/or payload and print the normalized payload
    Detect {
        /// Invocation name of the capability that produced the payload.
        #[clap(long)]
        tool: Option<String>,
        /// Payload file, or `-` for stdin.
        #[clap(long)]
        payload: Option<PathBuf>,
    },
    /// Print the action description for a tool
    Describe {
        #[clap(long)]
        tool: String,
    },
}

fn main() -> ProbeResult<()> {
    if let Err(e) = dotenvy::dotenv() {
        eprintln!("[glyph-probe] .env not loaded: {} (using system environment)", e);
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let out = run(&cli)?;
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn load_config(path: Option<&Path>) -> RouterConfig {
    let loaded = match path {
        Some(p) => RouterConfig::load_from(p),
        None => RouterConfig::load(),
    };
    loaded.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "config not loaded; using defaults");
        RouterConfig::default()
    })
}

fn build_router(cli: &Cli) -> ProbeResult<SignatureRouter> {
    let catalog = match &cli.catalog {
        Some(path) => CatalogManifest::load(path)?.into_catalog(),
        None => InMemoryCatalog::new(),
    };
    let config = load_config(cli.config.as_deref());
    tracing::debug!(?config, capabilities = catalog.len(), "router configured");
    Ok(SignatureRouter::with_config(Arc::new(catalog), config))
}

fn run(cli: &Cli) -> ProbeResult<Value> {
    let router = build_router(cli)?;
    match &cli.command {
        Command::Signatures => {
            let discovered = router.discover();
            if !discovered.is_empty() {
                tracing::info!(count = discovered.len(), "discovered signatures from catalog");
            }
            Ok(serde_json::to_value(router.state().signatures.list_all())?)
        }
        Command::Detect { tool, payload } => {
            if tool.is_none() && payload.is_none() {
                return Err("detect needs --tool, --payload or both".into());
            }
            let payload = payload.as_deref().map(read_payload).transpose()?;
            match router.route(tool.as_deref(), payload.as_ref()) {
                Some(routed) => Ok(serde_json::to_value(routed)?),
                None => {
                    tracing::info!("no signature matched; generative fallback would render this");
                    Ok(Value::Null)
                }
            }
        }
        Command::Describe { tool } => Ok(Value::String(router.describe_actions(tool))),
    }
}

fn read_payload(path: &Path) -> ProbeResult<Value> {
    let text = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)?
    };
    Ok(serde_json::from_str(&text)?)
}
