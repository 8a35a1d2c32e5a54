use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use autoflow::auth::{AuthTokenProvider, PasswordSignIn};
use autoflow::catalog::{Catalog, CatalogRegistry};
use autoflow::config::Settings;
use autoflow::engine::HttpEngineClient;
use autoflow::error::Issue;
use autoflow::lower::GraphCompiler;
use autoflow::parse::parse_candidate;
use autoflow::safety::guard_with;
use autoflow::validate::validate_with;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Check and deploy flow JSON against an automation engine.
#[derive(Parser)]
#[command(name = "autoflow", version)]
struct Cli {
    /// Settings file (TOML, YAML or JSON). Environment variables still apply.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Validate against the engine's live catalog instead of the built-in one.
    #[arg(long, global = true)]
    live_catalog: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print validation and safety findings for a flow file.
    Check { file: PathBuf },
    /// Compile a flow file on the engine.
    Deploy {
        file: PathBuf,
        /// Publish after building.
        #[arg(long)]
        publish: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = Settings::load(cli.config.as_deref()).context("loading settings")?;

    let http = reqwest::Client::builder()
        .timeout(settings.engine.request_timeout())
        .build()?;
    let auth = Arc::new(AuthTokenProvider::new(Arc::new(PasswordSignIn::new(
        http.clone(),
        &settings.engine.base_url,
        &settings.engine.email,
        &settings.engine.password,
    ))));
    let engine = HttpEngineClient::new(
        http,
        &settings.engine.base_url,
        &settings.engine.project_id,
        auth,
    );

    let registry = CatalogRegistry::new(Catalog::fallback());
    if cli.live_catalog {
        registry.refresh(&engine).await;
    }
    let catalog = registry.snapshot();

    let (file, publish) = match &cli.command {
        Command::Check { file } => (file, false),
        Command::Deploy { file, publish } => (file, *publish),
    };
    let text = fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;
    let candidate = parse_candidate(&text)?;

    let validation = validate_with(&candidate, &catalog, &settings.limits);
    print_issues("error", validation.errors());
    print_issues("warning", validation.warnings());
    let Some(flow) = validation.flow else {
        bail!("flow is not valid");
    };

    let safety = guard_with(&flow, &settings.limits);
    print_issues("blocked", safety.blocks());
    print_issues("warning", safety.warnings());
    if safety.is_blocked() {
        bail!("flow is not allowed");
    }

    let Command::Deploy { .. } = cli.command else {
        println!("ok: {} ({} steps)", flow.display_name, flow.total_actions());
        return Ok(());
    };

    settings.compile.auto_publish |= publish;
    let compiler = GraphCompiler::new(settings.compile_options());
    let compiled = compiler.compile(&flow, &engine).await?;
    info!(flow_id = %compiled.flow_id, "deployed");
    println!("{}", serde_json::to_string_pretty(&compiled)?);
    Ok(())
}

fn print_issues<'a>(label: &str, issues: impl Iterator<Item = &'a Issue>) {
    for issue in issues {
        eprintln!("{label}: {issue}");
    }
}
