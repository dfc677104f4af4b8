//! catalog-sync CLI
//!
//! Single-shot price/stock synchronization and bundle publishing. Each
//! invocation performs one run and exits 0 whether or not the output changed.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use catalog_sync::{
    config::{PRICE_DEFAULT_KINDS, STOCK_DEFAULT_KINDS, load_source_config, load_system_config},
    error::Result,
    models::{SourceKind, SyncMode},
    pipeline::{
        self, Catalog, PriceCatalog, StockCatalog, SyncContext, SyncReport, ValidateTargets,
    },
    source::HttpFetcher,
    storage::LocalStorage,
};
use clap::{Args, Parser, Subcommand};

/// catalog-sync - price and stock bundle synchronizer
#[derive(Parser, Debug)]
#[command(name = "catalog-sync", version, about = "Price and stock catalog bundle synchronizer")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

/// Options shared by the sync commands.
#[derive(Args, Debug)]
struct SyncArgs {
    /// System config (JSON or TOML)
    #[arg(long, default_value = "config/system.json")]
    config: PathBuf,

    /// Output bundle path (default: from the system config)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sync the price bundle
    Price {
        #[command(flatten)]
        sync: SyncArgs,

        /// Price source config
        #[arg(long, default_value = "config/price-source.json")]
        source_config: PathBuf,

        /// Price source schema
        #[arg(long, default_value = "config/price-source.schema.json")]
        schema: PathBuf,

        /// Output mode
        #[arg(long, default_value = "encrypted")]
        mode: SyncMode,

        /// Source URL override
        #[arg(long, env = "PRICE_SOURCE_URL")]
        source_url: Option<String>,

        /// Source bearer token override
        #[arg(long, env = "PRICE_SOURCE_TOKEN", hide_env_values = true)]
        source_token: Option<String>,

        /// Bundle encryption password
        #[arg(long, env = "PRICE_BUNDLE_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// Sync the stock bundle
    Stock {
        #[command(flatten)]
        sync: SyncArgs,

        /// Stock source config
        #[arg(long, default_value = "config/stock-source.json")]
        source_config: PathBuf,

        /// Stock source schema
        #[arg(long, default_value = "config/stock-source.schema.json")]
        schema: PathBuf,

        /// Source URL override
        #[arg(long, env = "STOCK_SOURCE_URL")]
        source_url: Option<String>,

        /// Source bearer token override
        #[arg(long, env = "STOCK_SOURCE_TOKEN", hide_env_values = true)]
        source_token: Option<String>,
    },

    /// Publish a bundle under a content-hashed name with a manifest
    Publish {
        /// Bundle to publish
        #[arg(long, default_value = "apps/v9/price.bundle.js")]
        input: PathBuf,

        /// Directory receiving the hashed copy and the manifest
        #[arg(long, default_value = "apps/v9")]
        output_root: PathBuf,

        /// Logical bundle name (default: derived from the input file name)
        #[arg(long)]
        name: Option<String>,
    },

    /// Validate configuration files and bundle size budgets
    Validate {
        /// System config
        #[arg(long, default_value = "config/system.json")]
        config: PathBuf,

        #[arg(long)]
        price_config: Option<PathBuf>,

        #[arg(long)]
        price_schema: Option<PathBuf>,

        #[arg(long)]
        stock_config: Option<PathBuf>,

        #[arg(long)]
        stock_schema: Option<PathBuf>,
    },
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

struct SyncPlan<'a> {
    sync: &'a SyncArgs,
    source_config: &'a Path,
    schema: &'a Path,
    default_kinds: &'a [SourceKind],
    source_url: Option<String>,
    source_token: Option<String>,
}

async fn sync_catalog<C: Catalog>(catalog: &C, plan: SyncPlan<'_>) -> Result<SyncReport> {
    let system = load_system_config(&plan.sync.config)?;
    let source = load_source_config(plan.source_config, Some(plan.schema), plan.default_kinds)?
        .with_overrides(plan.source_url, plan.source_token);

    let output = plan.sync.output.clone().unwrap_or_else(|| {
        let configured = match catalog.label() {
            "price" => &system.app.price_bundle_path,
            _ => &system.app.stock_bundle_path,
        };
        PathBuf::from(configured)
    });

    let fetcher = HttpFetcher::new(source.timeout())?;
    let storage = LocalStorage::new(".");
    let ctx = SyncContext::new(source, output);
    pipeline::run_sync(catalog, &fetcher, &storage, &ctx).await
}

fn print_summary(label: &str, report: &SyncReport) {
    println!(
        "[sync-{label}] {} mode={} kind={} rows={} hash={} output={}",
        if report.changed { "updated" } else { "unchanged" },
        report.mode,
        report.kind,
        report.row_count,
        report.data_hash,
        report.output_path
    );
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::Price {
            sync,
            source_config,
            schema,
            mode,
            source_url,
            source_token,
            password,
        } => {
            let catalog = PriceCatalog::new(mode, password)?;
            let plan = SyncPlan {
                sync: &sync,
                source_config: &source_config,
                schema: &schema,
                default_kinds: &PRICE_DEFAULT_KINDS,
                source_url,
                source_token,
            };
            let report = sync_catalog(&catalog, plan).await?;
            print_summary("price", &report);
        }

        Command::Stock {
            sync,
            source_config,
            schema,
            source_url,
            source_token,
        } => {
            let plan = SyncPlan {
                sync: &sync,
                source_config: &source_config,
                schema: &schema,
                default_kinds: &STOCK_DEFAULT_KINDS,
                source_url,
                source_token,
            };
            let report = sync_catalog(&StockCatalog, plan).await?;
            print_summary("stock", &report);
        }

        Command::Publish {
            input,
            output_root,
            name,
        } => {
            let storage = LocalStorage::new(&output_root);
            let report = pipeline::publish_bundle(&input, &storage, name.as_deref()).await?;
            println!(
                "[publish] {} hash={} latest={} manifest={}",
                if report.changed { "updated" } else { "unchanged" },
                report.hash,
                report.latest,
                output_root.join(&report.manifest_path).display()
            );
        }

        Command::Validate {
            config,
            price_config,
            price_schema,
            stock_config,
            stock_schema,
        } => {
            let targets = ValidateTargets {
                price_config: price_config.as_deref(),
                price_schema: price_schema.as_deref(),
                stock_config: stock_config.as_deref(),
                stock_schema: stock_schema.as_deref(),
            };
            pipeline::run_validate(&config, &targets)?;
            log::info!("All validations passed!");
        }
    }
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}
