// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ic_batch::{BatchEngine, BatchItem, HttpWebhookSender};
use ic_pipeline::ResolveInput;
use ic_queue::JobPriority;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

mod commands;
mod wiring;

use commands::SchemaKind;
use wiring::PipelineItemResolver;

/// Exit code for runtime errors.
const EXIT_RUNTIME_ERROR: i32 = 1;

#[derive(Parser, Debug)]
#[command(name = "ic", version, about = "Intent resolution core CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve a single customer message against a catalog and tenant file.
    Resolve {
        /// Path to the catalog seed file (`{intent_code: [examples]}`).
        #[arg(long)]
        catalog: PathBuf,
        /// Path to the tenant seed file (a JSON array of `TenantConfig`).
        #[arg(long)]
        tenants: PathBuf,
        /// Tenant UUID submitting the request.
        #[arg(long)]
        tenant_id: Uuid,
        /// The raw customer message text.
        text: String,
    },
    /// Submit and drain a batch of messages for one tenant.
    Batch {
        /// Path to the catalog seed file (`{intent_code: [examples]}`).
        #[arg(long)]
        catalog: PathBuf,
        /// Path to the tenant seed file (a JSON array of `TenantConfig`).
        #[arg(long)]
        tenants: PathBuf,
        /// Tenant UUID submitting the batch.
        #[arg(long)]
        tenant_id: Uuid,
        /// Path to a JSON array of `{item_id, raw_text}` items.
        #[arg(long)]
        items: PathBuf,
        /// Maximum items accepted in one batch.
        #[arg(long, default_value_t = 1000)]
        max_batch_size: usize,
        /// Scheduling priority: `low`, `normal`, or `high`.
        #[arg(long, value_enum, default_value_t = PriorityArg::Normal)]
        priority: PriorityArg,
        /// Webhook URL to notify on completion, if any.
        #[arg(long)]
        webhook_url: Option<String>,
        /// HMAC secret for the webhook signature.
        #[arg(long)]
        webhook_secret: Option<String>,
    },
    /// Validate a catalog or tenant seed file without loading it into a pipeline.
    Validate {
        #[command(subcommand)]
        target: ValidateTarget,
    },
    /// Print the JSON schema for a domain type.
    Schema {
        /// Which type to print the schema for.
        #[arg(value_enum)]
        kind: SchemaKindArg,
    },
    /// Load the config file (or defaults) and report validation warnings.
    ConfigCheck {
        /// Path to a TOML config file. Defaults are used if omitted.
        path: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum ValidateTarget {
    /// A catalog seed file (`{intent_code: [examples]}`).
    Catalog {
        /// Path to the file.
        path: PathBuf,
    },
    /// A tenant seed file (a JSON array of `TenantConfig`).
    Tenants {
        /// Path to the file.
        path: PathBuf,
    },
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum PriorityArg {
    Low,
    Normal,
    High,
}

impl From<PriorityArg> for JobPriority {
    fn from(p: PriorityArg) -> Self {
        match p {
            PriorityArg::Low => JobPriority::Low,
            PriorityArg::Normal => JobPriority::Normal,
            PriorityArg::High => JobPriority::High,
        }
    }
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum SchemaKindArg {
    CatalogEntry,
    TenantConfig,
    ResolveOutput,
    BatchJob,
    Config,
}

impl From<SchemaKindArg> for SchemaKind {
    fn from(k: SchemaKindArg) -> Self {
        match k {
            SchemaKindArg::CatalogEntry => SchemaKind::CatalogEntry,
            SchemaKindArg::TenantConfig => SchemaKind::TenantConfig,
            SchemaKindArg::ResolveOutput => SchemaKind::ResolveOutput,
            SchemaKindArg::BatchJob => SchemaKind::BatchJob,
            SchemaKindArg::Config => SchemaKind::Config,
        }
    }
}

#[derive(serde::Deserialize)]
struct BatchItemFile {
    item_id: String,
    raw_text: String,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(cli.command).await {
        eprintln!("error: {err:?}");
        std::process::exit(EXIT_RUNTIME_ERROR);
    }
}

async fn run(command: Commands) -> Result<()> {
    match command {
        Commands::Resolve {
            catalog,
            tenants,
            tenant_id,
            text,
        } => {
            let pipeline = wiring::build_pipeline(&catalog, &tenants, None).await?;
            let output = pipeline
                .resolve(ResolveInput {
                    tenant_id,
                    raw_text: text,
                    previous_intents: Vec::new(),
                })
                .await?;
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Commands::Batch {
            catalog,
            tenants,
            tenant_id,
            items,
            max_batch_size,
            priority,
            webhook_url,
            webhook_secret,
        } => run_batch(
            &catalog,
            &tenants,
            tenant_id,
            &items,
            max_batch_size,
            priority.into(),
            webhook_url,
            webhook_secret,
        )
        .await,
        Commands::Validate { target } => {
            let count = match &target {
                ValidateTarget::Catalog { path } => commands::validate_catalog_file(path)?,
                ValidateTarget::Tenants { path } => commands::validate_tenant_file(path)?.len(),
            };
            println!("{count} entries validated");
            Ok(())
        }
        Commands::Schema { kind } => {
            println!("{}", commands::schema_json(kind.into())?);
            Ok(())
        }
        Commands::ConfigCheck { path } => {
            let warnings = commands::config_check(path.as_deref())?;
            if warnings.is_empty() {
                println!("config OK, no warnings");
            } else {
                for warning in warnings {
                    println!("warning: {warning}");
                }
            }
            Ok(())
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_batch(
    catalog: &std::path::Path,
    tenants: &std::path::Path,
    tenant_id: Uuid,
    items_path: &std::path::Path,
    max_batch_size: usize,
    priority: JobPriority,
    webhook_url: Option<String>,
    webhook_secret: Option<String>,
) -> Result<()> {
    let pipeline = wiring::build_pipeline(catalog, tenants, None).await?;
    let resolver = Arc::new(PipelineItemResolver::new(Arc::new(pipeline)));
    let webhook = Arc::new(HttpWebhookSender::default());
    let engine = BatchEngine::new(resolver, webhook, 10_000);

    let raw = std::fs::read_to_string(items_path)
        .with_context(|| format!("read batch items from '{}'", items_path.display()))?;
    let parsed: Vec<BatchItemFile> =
        serde_json::from_str(&raw).context("parse batch items as a JSON array")?;
    let items: Vec<BatchItem> = parsed
        .into_iter()
        .map(|i| BatchItem {
            item_id: i.item_id,
            raw_text: i.raw_text,
        })
        .collect();

    let job_id = engine.submit(
        tenant_id,
        &items,
        max_batch_size,
        priority,
        webhook_url,
        webhook_secret,
    )?;

    let mut by_job = HashMap::new();
    by_job.insert(job_id, items);
    engine.run_next(&by_job).await;

    let job = engine.job(job_id).context("job vanished after running")?;
    println!("{}", serde_json::to_string_pretty(&job)?);
    Ok(())
}
