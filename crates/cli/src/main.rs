use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ifmib_core::{ColumnId, EntitySource, IndexKey, TableDef};
use ifmib_persist::SqliteStore;
use ifmib_schema::{InterfaceStore, MemoryStore};
use ifmib_store::{CacheConfig, ReloadStats};
use ifmib_table::{Cell, TableProvider};
use tokio::signal;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "ifmibctl", version, about = "Interface table CLI")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Human)]
    output: Output,

    /// SQLite interface store (default: ~/.ifmib/ifmib.db)
    #[arg(long = "db", global = true, env = "IFMIB_DB_PATH")]
    db: Option<String>,

    /// Serve interfaces from a JSON file instead of SQLite
    #[arg(long = "json", global = true)]
    json: Option<std::path::PathBuf>,

    /// Snapshot TTL in seconds (overrides IFMIB_CACHE_TTL_SECS)
    #[arg(long = "ttl", global = true)]
    ttl: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Human, Json }

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum TableName {
    #[value(name = "ifTable", alias = "if")]
    If,
    #[value(name = "ifXTable", alias = "ifx")]
    IfX,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Read one column of one row
    Get {
        #[arg(value_enum)]
        table: TableName,
        /// Column id or label, e.g. "5" or "ifSpeed"
        column: String,
        /// Row index, e.g. "1"
        key: String,
    },
    /// First instance of a column after a key
    Next {
        #[arg(value_enum)]
        table: TableName,
        column: String,
        /// Start key; empty starts before the first row
        #[arg(default_value = "")]
        key: String,
    },
    /// Up to N instances after a key
    Bulk {
        #[arg(value_enum)]
        table: TableName,
        column: String,
        #[arg(default_value = "")]
        key: String,
        #[arg(long = "max-repetitions", short = 'n', default_value_t = 10)]
        max_repetitions: usize,
    },
    /// Every instance of a column, or of every column when none is given
    Walk {
        #[arg(value_enum)]
        table: TableName,
        column: Option<String>,
    },
    /// Load interface records from a JSON file into the SQLite store
    Seed {
        file: std::path::PathBuf,
    },
    /// Walk a table periodically until Ctrl-C
    Poll {
        #[arg(value_enum)]
        table: TableName,
        column: Option<String>,
        /// Seconds between walks
        #[arg(long = "every", default_value_t = 5)]
        every: u64,
        /// Stop after this many walks
        #[arg(long = "rounds")]
        rounds: Option<u64>,
    },
}

/// Table-level query, dispatched against either table.
#[derive(Debug)]
enum Query {
    Get { column: String, key: String },
    Next { column: String, key: String },
    Bulk { column: String, key: String, max_repetitions: usize },
    Walk { column: Option<String> },
    Poll { column: Option<String>, every: Duration, rounds: Option<u64> },
}

fn init_tracing() {
    let env = std::env::var("IFMIB_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("IFMIB_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            warn!(addr = %addr, "invalid IFMIB_METRICS_ADDR; expected host:port");
        }
    }
}

fn open_sqlite(db: Option<&str>) -> Result<SqliteStore> {
    match db {
        Some(path) => SqliteStore::open(path),
        None => SqliteStore::open_default(),
    }
}

fn open_store(cli: &Cli) -> Result<Arc<dyn InterfaceStore>> {
    if let Some(path) = cli.json.as_deref() {
        return Ok(Arc::new(MemoryStore::from_json_file(path)?));
    }
    Ok(Arc::new(open_sqlite(cli.db.as_deref())?))
}

fn cache_config(ttl: Option<u64>) -> CacheConfig {
    let mut cfg = CacheConfig::from_env();
    if let Some(secs) = ttl { cfg.ttl_secs = secs; }
    cfg
}

/// Accepts a numeric column id or a column label (case-insensitive).
fn resolve_column(def: &TableDef, arg: &str) -> Result<ColumnId> {
    if let Ok(id) = arg.parse::<ColumnId>() {
        return Ok(id);
    }
    match def.columns().into_iter().find(|c| c.label.eq_ignore_ascii_case(arg)) {
        Some(c) => Ok(c.id),
        None => bail!("unknown column {:?} in {}", arg, def.name()),
    }
}

fn walk_columns(def: &TableDef, column: Option<&str>) -> Result<Vec<ColumnId>> {
    match column {
        Some(c) => Ok(vec![resolve_column(def, c)?]),
        None => Ok(def.columns().into_iter().filter(|c| c.kind.is_some()).map(|c| c.id).collect()),
    }
}

fn column_label(def: &TableDef, id: ColumnId) -> String {
    def.column(id).map(|c| c.label.to_string()).unwrap_or_else(|| id.to_string())
}

fn print_cells(def: &TableDef, cells: &[Cell], output: Output) -> Result<()> {
    match output {
        Output::Human => {
            for c in cells {
                println!("{}.{} = {}", column_label(def, c.column), c.key, c.value);
            }
        }
        Output::Json => println!("{}", serde_json::to_string_pretty(cells)?),
    }
    Ok(())
}

async fn run<S: EntitySource>(table: &TableProvider<S>, query: Query, output: Output) -> Result<()> {
    let def = table.def();
    match query {
        Query::Get { column, key } => {
            let column = resolve_column(def, &column)?;
            let key = IndexKey::from_str(&key)?;
            let value = table.get(&key, column)?;
            match output {
                Output::Human => match value {
                    Some(v) => println!("{}.{} = {}", column_label(def, column), key, v),
                    None => println!("{}.{} = No Such Instance currently exists at this OID", column_label(def, column), key),
                },
                Output::Json => println!("{}", serde_json::to_string_pretty(&value)?),
            }
        }
        Query::Next { column, key } => {
            let column = resolve_column(def, &column)?;
            let key = IndexKey::from_str(&key)?;
            let cells: Vec<Cell> = table.get_next(&key, column)?.into_iter().collect();
            if cells.is_empty() && output == Output::Human {
                println!("{}: End of MIB view", column_label(def, column));
            }
            print_cells(def, &cells, output)?;
        }
        Query::Bulk { column, key, max_repetitions } => {
            let column = resolve_column(def, &column)?;
            let key = IndexKey::from_str(&key)?;
            let cells = table.get_bulk(&key, column, max_repetitions)?;
            print_cells(def, &cells, output)?;
        }
        Query::Walk { column } => {
            for column in walk_columns(def, column.as_deref())? {
                let cells = table.walk(column)?;
                print_cells(def, &cells, output)?;
            }
        }
        Query::Poll { column, every, rounds } => {
            let columns = walk_columns(def, column.as_deref())?;
            poll(table, &columns, every, rounds, output).await?;
        }
    }
    Ok(())
}

#[derive(serde::Serialize)]
struct PollReport<'a> {
    at: chrono::DateTime<chrono::Utc>,
    table: &'static str,
    generation: u64,
    rows: usize,
    cells: usize,
    reload: ReloadStats,
    cache: &'a CacheConfig,
}

fn poll_report<S: EntitySource>(table: &TableProvider<S>, cells: usize) -> PollReport<'_> {
    let snap = table.cache().peek();
    PollReport {
        at: chrono::Utc::now(),
        table: table.name(),
        generation: snap.generation(),
        rows: snap.len(),
        cells,
        reload: snap.stats(),
        cache: table.cache().config(),
    }
}

/// Walks `columns` every `every` until Ctrl-C or `rounds` walks; returns walks done.
async fn poll<S: EntitySource>(
    table: &TableProvider<S>,
    columns: &[ColumnId],
    every: Duration,
    rounds: Option<u64>,
    output: Output,
) -> Result<u64> {
    let mut tick = tokio::time::interval(every);
    tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut done = 0u64;
    loop {
        tokio::select! {
            _ = tick.tick() => {
                let mut cells = 0usize;
                for column in columns {
                    cells += table.walk(*column)?.len();
                }
                metrics::counter!("poll_rounds_total", 1u64, "table" => table.name());
                metrics::histogram!("poll_walk_cells", cells as f64, "table" => table.name());
                let report = poll_report(table, cells);
                match output {
                    Output::Human => println!(
                        "{} {} generation={} rows={} cells={} skipped={} invalid={}",
                        report.at.format("%H:%M:%S"), report.table, report.generation, report.rows, report.cells,
                        report.reload.skipped, report.reload.invalid
                    ),
                    Output::Json => println!("{}", serde_json::to_string(&report)?),
                }
                done += 1;
                if rounds.map(|r| done >= r).unwrap_or(false) { break; }
            }
            _ = signal::ctrl_c() => {
                info!("Ctrl-C received; stopping poll");
                break;
            }
        }
    }
    Ok(done)
}

fn seed(db: Option<&str>, file: &std::path::Path) -> Result<usize> {
    let records = MemoryStore::from_json_file(file)?.interfaces().context("reading seed records")?;
    let store = open_sqlite(db)?;
    for rec in &records {
        store.upsert(rec).with_context(|| format!("seeding interface {}", rec.name))?;
    }
    info!(interfaces = records.len(), file = %file.display(), "seeded interface store");
    Ok(records.len())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();

    let (table, query) = match cli.command {
        Commands::Seed { ref file } => {
            let n = seed(cli.db.as_deref(), file)?;
            match cli.output {
                Output::Human => println!("seeded {} interfaces", n),
                Output::Json => println!("{}", serde_json::json!({ "seeded": n })),
            }
            return Ok(());
        }
        Commands::Get { table, ref column, ref key } => (table, Query::Get { column: column.clone(), key: key.clone() }),
        Commands::Next { table, ref column, ref key } => (table, Query::Next { column: column.clone(), key: key.clone() }),
        Commands::Bulk { table, ref column, ref key, max_repetitions } => {
            (table, Query::Bulk { column: column.clone(), key: key.clone(), max_repetitions })
        }
        Commands::Walk { table, ref column } => (table, Query::Walk { column: column.clone() }),
        Commands::Poll { table, ref column, every, rounds } => {
            (table, Query::Poll { column: column.clone(), every: Duration::from_secs(every.max(1)), rounds })
        }
    };

    let store = open_store(&cli)?;
    let config = cache_config(cli.ttl);
    info!(table = ?table, ttl_secs = config.ttl_secs, "serving table");
    match table {
        TableName::If => run(&ifmib_schema::if_table(store, config)?, query, cli.output).await,
        TableName::IfX => run(&ifmib_schema::if_x_table(store, config)?, query, cli.output).await,
    }
}
