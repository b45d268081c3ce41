use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use sempala_runner::config::{resolve_backend, ConnectionArgs, FileConfig};
use sempala_runner::db::{self, parse_option_pair, BackendConfig, PlatformSelector, QueryOption};
use sempala_runner::input::load_queries;
use sempala_runner::ledger::ResultLedger;
use sempala_runner::naming::{OutputFormat, TableNaming};
use sempala_runner::runner::{ExecutionMode, QueryRunner, RESULTS_DATABASE};

/// Run translated SPARQL queries against an MPP SQL engine or an embedded
/// engine and record the results
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Translated query file, or a directory of `*.sql` files
    #[arg(short, long)]
    input: PathBuf,

    /// Storage layout the queries were translated for
    #[arg(short, long, value_enum, default_value_t = OutputFormat::PropertyTable)]
    format: OutputFormat,

    /// Database holding the source tables
    #[arg(short, long)]
    database: Option<String>,

    /// Host of the network engine
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Port of the network engine
    #[arg(short, long)]
    port: Option<u16>,

    /// User for the network engine; the password comes from PGPASSWORD or a prompt
    #[arg(short, long)]
    user: Option<String>,

    /// Base name prefixed to result tables of the ExtVP layout
    #[arg(long = "result-table-name")]
    result_table_name: Option<String>,

    /// Partition count of the embedded engine
    #[arg(long)]
    partitions: Option<usize>,

    /// Directory the embedded engine persists result tables in
    #[arg(long)]
    warehouse: Option<PathBuf>,

    /// Drop each result table right after counting it
    #[arg(short, long)]
    benchmark: bool,

    /// Only count the result rows; no table is created
    #[arg(short, long)]
    count: bool,

    /// Query option applied after connecting, as KEY=VALUE (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_set)]
    set: Vec<(QueryOption, String)>,

    /// Pause between statements on the network engine
    #[arg(long)]
    settle_delay_ms: Option<u64>,

    /// Result summary file
    #[arg(long)]
    ledger: Option<PathBuf>,

    /// Configuration file (default: <config dir>/sempala-runner/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,
}

fn parse_set(pair: &str) -> std::result::Result<(QueryOption, String), String> {
    parse_option_pair(pair).ok_or_else(|| format!("expected KEY=VALUE, got {:?}", pair))
}

#[tokio::main]
async fn main() -> ExitCode {
    // Logs go to stderr; stdout carries the per-query result lines
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{:#}", err);
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let file = FileConfig::load(cli.config.as_deref())?;
    let args = ConnectionArgs {
        host: cli.host.clone(),
        port: cli.port,
        database: cli.database.clone(),
        user: cli.user.clone(),
        partitions: cli.partitions,
        warehouse: cli.warehouse.clone(),
        settle_delay_ms: cli.settle_delay_ms,
    };
    let mut backend_config = resolve_backend(cli.format, &args, &file)?;

    // Resolve password: PGPASSWORD env var, then interactive prompt
    if let BackendConfig::Network(config) = &mut backend_config {
        if config.username.is_some() {
            if let Ok(pw) = std::env::var("PGPASSWORD") {
                config.password = pw;
            } else {
                let prompt = format!("Password for {}: ", config.display_string());
                config.password = rpassword::read_password_from_tty(Some(&prompt))
                    .context("Failed to read password")?;
            }
        }
    }

    let queries = load_queries(&cli.input)?;
    if queries.is_empty() {
        warn!("No translated queries found in {}", cli.input.display());
        return Ok(());
    }

    let ledger = ResultLedger::new(file.ledger_path(cli.ledger.as_deref()));
    let options = file.query_options(&cli.set);
    let naming = TableNaming::new(cli.format, cli.result_table_name.clone());
    let mode = ExecutionMode {
        benchmark: cli.benchmark,
        count_only: cli.count,
    };
    let platform = backend_config.platform();

    let mut backend = db::connect(backend_config)
        .await
        .with_context(|| format!("Failed to start the {} backend", platform))?;

    let selector = PlatformSelector::new();
    let result = async {
        backend.create_database_if_absent(RESULTS_DATABASE).await?;
        for (option, value) in &options {
            backend.set_option(option, value).await?;
        }
        selector.set(backend.platform())?;

        let mut runner = QueryRunner::new(backend.as_ref(), selector.get()?, ledger)?;
        let records = runner
            .run_batch(&queries, &naming, mode, &mut std::io::stdout())
            .await?;
        info!(
            "Recorded {} queries in {}",
            records.len(),
            runner.ledger().path().display()
        );
        Ok::<(), sempala_runner::Error>(())
    }
    .await;

    if let Err(e) = backend.close().await {
        warn!("Failed to close the {} backend: {}", platform, e);
    }

    result.context("Query run aborted")
}
