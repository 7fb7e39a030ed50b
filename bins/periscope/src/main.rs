//! Periscope CLI and server binary
//!
//! Serves the options chain HTTP API, or runs the same pipeline once from the
//! command line and prints the strike ladder.

mod render;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use cli::{Cli, Commands, ContractKind};
use config::{
    generate_default_config, load_config_or_env, save_config, validate_config, PeriscopeConfig,
};
use market_data::api::{create_api_state, create_router};
use market_data::{
    expirations, nearest_tickers, ChainFilters, ChainService, Contract, HttpSnapshotProvider,
    PipelineSettings,
};
use observability::{init_logging, init_metrics, LogFormat};
use server::{health_routes, HealthState, HttpServer, ServerExt};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const SERVICE_NAME: &str = "periscope";

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse_args();

    let config = match &cli.command {
        Commands::Init { output, force } => {
            init_logging(SERVICE_NAME, log_format(cli.log_format.as_deref(), None))?;
            return init_command(output, *force);
        }
        _ => load_config_or_env(cli.config.as_deref())?,
    };

    init_logging(
        SERVICE_NAME,
        log_format(cli.log_format.as_deref(), Some(config.logging.format.as_str())),
    )?;
    debug!(?cli, "CLI arguments parsed");

    match cli.command {
        Commands::Serve {
            host,
            http,
            metrics_port,
        } => {
            info!("Executing 'serve' command");
            serve_command(config, host, http, metrics_port).await
        }
        Commands::Chain {
            symbol,
            expiration,
            contract_type,
            strike,
            details,
            json,
        } => {
            let request = ChainRequest {
                symbol,
                expiration,
                contract_type,
                strike,
                details,
                json,
            };
            chain_command(&config, request).await
        }
        Commands::Details { tickers } => details_command(&config, &tickers).await,
        Commands::Validate => validate_command(&config, cli.config.as_deref()),
        Commands::Init { .. } => Ok(()),
    }
}

/// CLI flag, then config file, then pretty
fn log_format(flag: Option<&str>, configured: Option<&str>) -> LogFormat {
    flag.or(configured)
        .and_then(LogFormat::parse)
        .unwrap_or_default()
}

fn pipeline_settings(config: &PeriscopeConfig) -> PipelineSettings {
    PipelineSettings {
        timeout: config.provider.timeout(),
        rate_per_second: config.provider.rate_limit_per_second(),
        burst: config.provider.burst(),
        max_pages: config.pagination.max_pages(),
        batch_size: config.details.batch_size(),
        max_tickers: config.details.max_tickers(),
    }
}

/// Refuse to contact the provider with a config that fails validation
fn ensure_valid(config: &PeriscopeConfig) -> Result<()> {
    let report = validate_config(config);

    for warning in &report.warnings {
        warn!(field = %warning.field, message = %warning.message, "Configuration warning");
    }

    if !report.is_valid() {
        error!(error_count = report.errors.len(), "Configuration validation failed");
        for err in &report.errors {
            error!("{}", err);
        }
        anyhow::bail!("Cannot continue due to configuration errors");
    }
    Ok(())
}

fn build_service(config: &PeriscopeConfig) -> Result<ChainService> {
    ensure_valid(config)?;

    let provider = HttpSnapshotProvider::new(
        &config.provider.base_url,
        config.provider.api_key.clone(),
        config.provider.timeout(),
    )
    .context("Failed to create provider client")?;

    ChainService::new(Arc::new(provider), &pipeline_settings(config))
        .context("Failed to build chain service")
}

async fn serve_command(
    config: PeriscopeConfig,
    host: Option<String>,
    http: Option<u16>,
    metrics_port: Option<u16>,
) -> Result<()> {
    // Recorder first so metric handles created during startup reach the exporter
    if let Some(port) = metrics_port.or(config.server.metrics_port) {
        init_metrics(port).context("Failed to start metrics exporter")?;
    }

    let service = build_service(&config)?;

    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = http.unwrap_or(config.server.http_port);
    let server_config = server::ServerConfig::http_only(host, port)
        .with_cors_origins(config.server.cors_origins.clone())
        .with_request_timeout(Duration::from_secs(config.server.request_timeout_seconds));

    let health = HealthState::new(SERVICE_NAME, env!("CARGO_PKG_VERSION"));
    let router = create_router(create_api_state(service, config.details.max_selection()))
        .merge(health_routes(Arc::new(health)));

    info!(
        port,
        max_pages = config.pagination.max_pages(),
        batch_size = config.details.batch_size(),
        "Starting Periscope API"
    );

    HttpServer::new(server_config, router)
        .run_with_signals()
        .await?;
    Ok(())
}

struct ChainRequest {
    symbol: String,
    expiration: Option<String>,
    contract_type: Option<ContractKind>,
    strike: Option<f64>,
    details: Option<usize>,
    json: bool,
}

/// First listed expiration on or after `today`, else the last one listed
fn pick_expiration(listed: &[NaiveDate], today: NaiveDate) -> Option<NaiveDate> {
    listed
        .iter()
        .copied()
        .find(|date| *date >= today)
        .or_else(|| listed.last().copied())
}

fn underlying_price(contracts: &[Contract]) -> Option<f64> {
    contracts
        .iter()
        .filter_map(|c| c.underlying_asset.as_ref().and_then(|u| u.price))
        .find(|p| p.is_finite() && *p > 0.0)
}

async fn chain_command(config: &PeriscopeConfig, request: ChainRequest) -> Result<()> {
    let service = build_service(config)?;
    let cancel = server::shutdown_signal();

    let filters = ChainFilters::parse(
        Some(config.pagination.page_size()),
        request.strike,
        request.expiration.as_deref(),
        request.contract_type.map(|k| k.as_str()),
    )?;

    let loaded = service.load_chain(&request.symbol, &filters, &cancel).await?;
    if loaded.catalog.truncated {
        warn!(
            max_pages = config.pagination.max_pages(),
            "Chain truncated at the page cap, raise pagination.max_pages for the full chain"
        );
    }

    let listed = expirations(&loaded.catalog.results);
    let expiration = match filters.expiration_date {
        Some(date) => Some(date),
        None => pick_expiration(&listed, Local::now().date_naive()),
    };
    let Some(expiration) = expiration else {
        println!("No contracts listed for {}", request.symbol.to_uppercase());
        return Ok(());
    };

    let mut contracts: Vec<Contract> = loaded
        .catalog
        .results
        .into_iter()
        .filter(|c| c.expiration() == Some(expiration))
        .collect();
    let price = loaded
        .outcome
        .price()
        .or_else(|| underlying_price(&contracts))
        .unwrap_or(0.0);

    if let Some(count) = request.details.filter(|n| *n > 0) {
        let tickers = nearest_tickers(&contracts, price, count.min(config.details.max_selection()));
        if !tickers.is_empty() {
            let report = service.enrich(&contracts, &tickers, &cancel).await?;
            contracts = report.contracts;
        }
    }

    let view = service.view(&contracts, Some(expiration), price);
    if request.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    println!(
        "{} {} | expirations listed: {} | underlying: {}",
        request.symbol.to_uppercase(),
        expiration,
        listed.len(),
        if price > 0.0 { format!("{:.2}", price) } else { "unknown".to_string() }
    );
    print!("{}", render::ladder(&request.symbol.to_uppercase(), &view));
    if !view.collisions.is_empty() {
        println!("{} duplicate strike/kind contracts replaced", view.collisions.len());
    }
    Ok(())
}

async fn details_command(config: &PeriscopeConfig, tickers: &[String]) -> Result<()> {
    let service = build_service(config)?;
    let cancel = server::shutdown_signal();

    let contracts = service.load_details(tickers, &cancel).await?;
    if contracts.len() < tickers.len() {
        warn!(
            requested = tickers.len(),
            returned = contracts.len(),
            "Provider did not return every requested contract"
        );
    }

    println!("{}", serde_json::to_string_pretty(&contracts)?);
    Ok(())
}

fn validate_command(config: &PeriscopeConfig, path: Option<&Path>) -> Result<()> {
    info!(?path, "Validating configuration");

    let report = validate_config(config);

    println!("\n=== Configuration Validation Report ===\n");

    if !report.defaults_applied.is_empty() {
        println!("Defaults Applied ({}):", report.defaults_applied.len());
        for default in &report.defaults_applied {
            println!("  [info] {} = {}", default.field, default.value);
        }
        println!();
    }

    if !report.warnings.is_empty() {
        println!("Warnings ({}):", report.warnings.len());
        for warning in &report.warnings {
            println!("  [warn] [{}] {}", warning.field, warning.message);
        }
        println!();
    }

    if !report.errors.is_empty() {
        println!("Errors ({}):", report.errors.len());
        for err in &report.errors {
            println!("  [error] {}", err);
        }
        println!();
        anyhow::bail!("Configuration validation failed");
    }

    println!("[ok] Configuration is valid!");
    println!();
    println!("Provider: {}", config.provider.base_url);
    println!(
        "Rate limit: {}/s (burst {})",
        config.provider.rate_limit_per_second(),
        config.provider.burst()
    );
    println!("Page cap: {}", config.pagination.max_pages());
    println!("Listen: {}:{}", config.server.host, config.server.http_port);

    Ok(())
}

fn init_command(output_path: &Path, force: bool) -> Result<()> {
    info!(?output_path, "Initializing new configuration file");

    if output_path.exists() && !force {
        anyhow::bail!(
            "{:?} already exists, pass --force to overwrite it",
            output_path
        );
    }

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    save_config(&generate_default_config(), output_path)?;

    println!("[ok] Configuration file created successfully!");
    println!();
    println!("Location: {:?}", output_path);
    println!();
    println!("Next steps:");
    println!("  1. Export MASSIVE_API_KEY or put the key in provider.api_key");
    println!("  2. Run 'periscope validate --config {:?}' to check configuration", output_path);
    println!("  3. Run 'periscope serve --config {:?}' to start the API", output_path);

    Ok(())
}
