//! ordermetrics — batch ingestion and dual-engine KPI computation
//!
//! Every command prints a structured JSON result; ingestion and KPI
//! failures are reported inside that result and reflected in the exit
//! code, never as an uncaught panic.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use ordermetrics::config::Config;
use ordermetrics::db::Store;
use ordermetrics::ingest::{CustomerPipeline, LoadMode, OrderPipeline};
use ordermetrics::kpi::{
    kpi_catalog, KpiEngine, KpiParams, MemoryKpiEngine, TableKpiEngine,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::info;

#[derive(Parser)]
#[command(name = "ordermetrics", version, about)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Database file (overrides config and ORDERMETRICS_DATABASE)
    #[arg(long, global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database schema (idempotent)
    Init,
    /// Liveness check plus per-table row counts
    Status,
    /// Run an ingestion pipeline
    Ingest {
        #[command(subcommand)]
        source: IngestSource,
    },
    /// Compute one KPI, or all of them
    Kpi {
        /// KPI key (repeat_customers, monthly_trends, regional_revenue,
        /// top_customers) or "all"
        name: String,
        /// Which engine computes the KPI
        #[arg(long, value_enum, default_value_t = EngineChoice::Sql)]
        engine: EngineChoice,
        /// Look-back window in days (top_customers only)
        #[arg(long, default_value_t = 30)]
        days: i64,
        /// Maximum rows returned (top_customers only)
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    /// List the registered KPIs
    KpiList,
}

#[derive(Subcommand)]
enum IngestSource {
    /// Customer records from CSV
    Customers {
        /// Source file; defaults to the configured customers_csv path
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long, default_value = "replace")]
        mode: LoadMode,
    },
    /// Order records from XML
    Orders {
        /// Source file; defaults to the configured orders_xml path
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long, default_value = "replace")]
        mode: LoadMode,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum EngineChoice {
    Sql,
    Memory,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    info!("Starting ordermetrics v{}", env!("CARGO_PKG_VERSION"));

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref(), cli.database.as_deref())?;
    config.ensure_directories()?;

    let store = Store::open(&config.database, &config.pool).await?;
    let exit = run(cli.command, &config, &store).await?;
    store.close().await;
    Ok(exit)
}

async fn run(command: Command, config: &Config, store: &Store) -> Result<ExitCode> {
    match command {
        Command::Init => {
            // Schema creation already ran inside Store::open
            println!("{}", serde_json::json!({ "success": true }));
            Ok(ExitCode::SUCCESS)
        }
        Command::Status => {
            let alive = store.ping().await?;
            let tables = store.table_stats().await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "alive": alive,
                    "tables": tables,
                }))?
            );
            Ok(ExitCode::SUCCESS)
        }
        Command::Ingest { source } => {
            let report = match source {
                IngestSource::Customers { file, mode } => {
                    let path = file.unwrap_or_else(|| config.customers_csv.clone());
                    CustomerPipeline::new(store.clone()).process(&path, mode).await
                }
                IngestSource::Orders { file, mode } => {
                    let path = file.unwrap_or_else(|| config.orders_xml.clone());
                    OrderPipeline::new(store.clone()).process(&path, mode).await
                }
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(if report.success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Kpi {
            name,
            engine,
            days,
            limit,
        } => {
            let params = KpiParams { days, limit };
            match engine {
                EngineChoice::Sql => {
                    run_kpi(&TableKpiEngine::new(store.clone()), &name, &params).await
                }
                EngineChoice::Memory => {
                    run_kpi(&MemoryKpiEngine::new(store.clone()), &name, &params).await
                }
            }
        }
        Command::KpiList => {
            println!("{}", serde_json::to_string_pretty(&kpi_catalog())?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_kpi<E: KpiEngine>(engine: &E, name: &str, params: &KpiParams) -> Result<ExitCode> {
    if name == "all" {
        let reports = engine.calculate_all(params).await;
        println!("{}", serde_json::to_string_pretty(&reports)?);
        let all_ok = reports.values().all(|r| r.success);
        return Ok(if all_ok {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        });
    }

    let report = engine.calculate_by_key(name, params).await;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(if report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
