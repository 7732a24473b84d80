mod cli;

use canopy::enrichment::{
    BroadcastObserver, EnrichmentRequest, FieldSchema, ProgressObserver, RunReport,
    TracingObserver,
};
use canopy::{config, setup};

use anyhow::Result;
use canopy_common::{Category, RequestId};
use clap::Parser;
use cli::{Cli, Commands};
use futures::StreamExt;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "canopy=trace,canopy_db=debug".to_string()
        } else {
            "canopy=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run { limit, json } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(run_enrichment(cli.config.as_deref(), limit, json))
        }
        Commands::Import { id, name } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(import_entry(cli.config.as_deref(), id, name))
        }
        Commands::History { limit, clear } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(show_history(cli.config.as_deref(), limit, clear))
        }
        Commands::Fields => list_fields(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate_config(path.as_deref())
        }
        Commands::Version => {
            println!("canopy {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

async fn run_enrichment(config_path: Option<&Path>, limit: Option<usize>, json: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;

    let pool = setup::open_database(&config)?;
    let client = setup::build_client(&config)?;
    let store = Arc::new(setup::build_store(&config, pool, client.clone()));
    let orchestrator = setup::build_orchestrator(&config, &client, store.clone())?;

    let mut requests: Vec<EnrichmentRequest> = store.pending_requests().await?;
    if let Some(limit) = limit {
        requests.truncate(limit);
    }
    if requests.is_empty() {
        println!("Nothing to enrich.");
        return Ok(());
    }

    tracing::info!("Enriching {} catalog entries", requests.len());

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted; finishing the current stage before stopping");
                cancel.cancel();
            }
        })
    };

    let report = if json {
        let observer = BroadcastObserver::default();
        let mut events = Box::pin(observer.stream());
        let printer = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => tracing::warn!(error = %e, "Failed to serialize event"),
                }
            }
        });
        let result = orchestrator.run(requests, &observer, cancel).await;
        drop(observer);
        let _ = printer.await;
        result?
    } else {
        let observer: &dyn ProgressObserver = &TracingObserver;
        orchestrator.run(requests, observer, cancel).await?
    };
    ctrl_c.abort();

    store.record_outcomes(report.run_id, &report.outcomes).await?;

    if !json {
        print_report(&report);
    }

    Ok(())
}

fn print_report(report: &RunReport) {
    println!();
    for outcome in &report.outcomes {
        let status = if outcome.success {
            "ok"
        } else if outcome.cancelled {
            "cancelled"
        } else {
            "failed"
        };
        print!("  [{status:>9}] {} ({})", outcome.name, outcome.request_id);
        if outcome.images_uploaded > 0 || outcome.images_failed > 0 {
            print!(
                " images: {} uploaded, {} failed",
                outcome.images_uploaded, outcome.images_failed
            );
        }
        if let Some(ref error) = outcome.error {
            if !outcome.cancelled {
                print!(" - {error}");
            }
        }
        println!();
    }
    println!(
        "\n{} succeeded, {} failed, {} skipped in {:.1}s{}",
        report.succeeded,
        report.failed,
        report.skipped,
        report.duration_ms as f64 / 1000.0,
        if report.cancelled { " (cancelled)" } else { "" }
    );
}

async fn import_entry(config_path: Option<&Path>, id: String, name: String) -> Result<()> {
    if name.trim().is_empty() {
        anyhow::bail!("Plant name cannot be empty");
    }

    let config = config::load_config_or_default(config_path)?;
    let pool = setup::open_database(&config)?;
    let client = setup::build_client(&config)?;
    let store = setup::build_store(&config, pool, client);

    let id = RequestId::new(id);
    if store.import(id.clone(), name.clone()).await? {
        println!("Queued {name} ({id})");
    } else {
        println!("Entry {id} already exists");
    }
    Ok(())
}

async fn show_history(config_path: Option<&Path>, limit: u32, clear: bool) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let pool = setup::open_database(&config)?;
    let client = setup::build_client(&config)?;
    let store = setup::build_store(&config, pool, client);

    if clear {
        let removed = store.clear_history().await?;
        println!("Cleared {removed} outcome(s)");
        return Ok(());
    }

    let records = store.history(limit).await?;
    if records.is_empty() {
        println!("No enrichment history.");
        return Ok(());
    }

    for record in records {
        let status = if record.success {
            "ok"
        } else if record.cancelled {
            "cancelled"
        } else {
            "failed"
        };
        print!(
            "{} {:>9} {} ({}) {}ms",
            record.finished_at.format("%Y-%m-%d %H:%M:%S"),
            status,
            record.name,
            record.request_id,
            record.duration_ms
        );
        if let Some(error) = record.error.as_deref().filter(|_| !record.cancelled) {
            print!(" - {error}");
        }
        println!();
    }
    Ok(())
}

fn list_fields(config_path: Option<&Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let schema: FieldSchema = config::field_schema(&config)?;

    for category in Category::ALL {
        let total = schema.category_total(category);
        if total == 0 {
            continue;
        }
        println!("{category} ({total})");
        for field in schema.fields().iter().filter(|f| f.category() == category) {
            println!("  {field}");
        }
    }
    println!("\n{} fields", schema.len());
    Ok(())
}

fn validate_config(path: Option<&Path>) -> Result<()> {
    match path {
        Some(p) => {
            println!("Validating config: {:?}", p);
            let config = config::load_config(p)?;
            println!("✓ Configuration is valid");
            println!("  Data dir: {}", config.storage.resolved_data_dir().display());
            println!(
                "  AI endpoint: {}",
                config.ai.endpoint.as_deref().unwrap_or("(not set)")
            );
            println!("  Translation enabled: {}", config.translation.enabled);
            println!("  Image sources: {}", config.images.sources.len());
            println!(
                "    Enabled: {}",
                config.images.sources.iter().filter(|s| s.enabled).count()
            );
            println!("  Fields: {}", config::field_schema(&config)?.len());
        }
        None => {
            println!("No config file specified, using defaults");
            let config = config::Config::default();
            println!("Default config:");
            println!("  Data dir: {}", config.storage.resolved_data_dir().display());
        }
    }

    Ok(())
}
