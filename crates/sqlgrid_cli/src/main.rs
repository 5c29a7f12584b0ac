//! Command-line browser for SQLite tables, views and queries.

use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use serde_json::{Map, Value as JsonValue};
use sqlgrid_core::{
    GridConfig, GridError, GridModel, ObjectKind, SqliteStore, Store, Value,
};
use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "sqlgrid", about = "Browse and edit SQLite data", version)]
struct Cli {
    /// Database file (can also be set via SQLGRID_DB env var)
    #[arg(short, long, env = "SQLGRID_DB")]
    db: Option<PathBuf>,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct ViewArgs {
    /// Filter rows, as COLUMN=VALUE; repeatable
    #[arg(short, long = "filter", value_name = "COLUMN=VALUE")]
    filters: Vec<String>,

    /// Sort by column
    #[arg(short, long)]
    sort: Option<String>,

    /// Sort descending
    #[arg(long, requires = "sort")]
    desc: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
    /// List the columns of a table or view
    Columns { name: String },
    /// Show rows of a table, view or query
    Show {
        /// Table or view name, or SQL with --query
        target: String,
        /// Treat the target as a SQL query
        #[arg(short, long)]
        query: bool,
        #[command(flatten)]
        view: ViewArgs,
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Export every row as JSON lines
    Export {
        target: String,
        #[arg(short, long)]
        query: bool,
        #[command(flatten)]
        view: ViewArgs,
    },
    /// Set one cell of a table and save it
    Set {
        table: String,
        /// Row index in the filtered and sorted grid
        row: usize,
        column: String,
        value: String,
        #[command(flatten)]
        view: ViewArgs,
    },
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("sqlgrid=warn,sqlgrid_core=warn"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

fn run_and_report<F, E>(runner: F) -> i32
where
    F: FnOnce() -> Result<(), E>,
    E: std::fmt::Display,
{
    match runner() {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("sqlgrid error: {}", err);
            1
        }
    }
}

fn parse_filter_arg(raw: &str) -> CliResult<(&str, &str)> {
    match raw.split_once('=') {
        Some((column, value)) if !column.trim().is_empty() => Ok((column.trim(), value)),
        _ => Err(format!("invalid filter '{}', expected COLUMN=VALUE", raw).into()),
    }
}

fn column_or_err(grid: &GridModel, name: &str) -> Result<usize, GridError> {
    grid.column_index(name)
        .ok_or_else(|| GridError::UnknownColumn(name.to_string()))
}

fn apply_view_args(grid: &mut GridModel, view: &ViewArgs) -> CliResult<()> {
    for raw in &view.filters {
        let (name, value) = parse_filter_arg(raw)?;
        let column = column_or_err(grid, name)?;
        if !grid.add_filter(column, value) {
            return Err(format!("filter value '{}' is not valid for column '{}'", value, name).into());
        }
    }
    if let Some(name) = &view.sort {
        let column = column_or_err(grid, name)?;
        grid.sort_by_column(column);
        if view.desc {
            grid.sort_by_column(column);
        }
    }
    Ok(())
}

fn open_store(db: Option<PathBuf>, config: &GridConfig) -> CliResult<Arc<SqliteStore>> {
    let path = db.ok_or("no database given; pass --db or set SQLGRID_DB")?;
    if !path.exists() {
        return Err(format!("database file not found: {}", path.display()).into());
    }
    Ok(Arc::new(SqliteStore::open(&path, config.clone())?))
}

fn open_grid(
    store: &Arc<SqliteStore>,
    target: &str,
    query: bool,
    config: &GridConfig,
) -> CliResult<GridModel> {
    let shared: Arc<dyn Store> = store.clone();
    if query {
        return Ok(GridModel::for_query(shared, target, config.clone())?);
    }
    match store.object_kind(target)? {
        Some(ObjectKind::Table) => Ok(GridModel::for_table(shared, target, config.clone())?),
        Some(ObjectKind::View) => Ok(GridModel::for_view(shared, target, config.clone())?),
        None => Err(format!("no such table or view: {}", target).into()),
    }
}

fn value_to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Integer(value) => JsonValue::from(*value),
        Value::Real(value) => serde_json::Number::from_f64(*value)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        Value::Text(text) => JsonValue::String(text.clone()),
        Value::Blob(bytes) => JsonValue::String(
            bytes.iter().map(|byte| format!("{:02x}", byte)).collect(),
        ),
    }
}

fn row_to_json(names: &[String], values: &[Value]) -> JsonValue {
    let mut object = Map::new();
    for (name, value) in names.iter().zip(values) {
        object.insert(name.clone(), value_to_json(value));
    }
    JsonValue::Object(object)
}

fn format_rows(names: &[String], rows: &[Vec<Value>], json: bool) -> CliResult<String> {
    if json {
        let items: Vec<JsonValue> = rows.iter().map(|row| row_to_json(names, row)).collect();
        return Ok(serde_json::to_string_pretty(&items)?);
    }
    let mut lines = Vec::with_capacity(rows.len() + 1);
    lines.push(names.join("\t"));
    for row in rows {
        lines.push(
            row.iter()
                .map(|value| value.to_string())
                .collect::<Vec<_>>()
                .join("\t"),
        );
    }
    Ok(lines.join("\n"))
}

fn column_names(grid: &GridModel) -> Vec<String> {
    grid.columns()
        .iter()
        .map(|column| column.name.clone())
        .collect()
}

fn run(cli: Cli) -> CliResult<String> {
    let Cli { db, json, command } = cli;

    if let Commands::Completions { shell } = &command {
        let mut cmd = Cli::command();
        let name = cmd.get_name().to_string();
        let mut buffer = Vec::new();
        generate(*shell, &mut cmd, name, &mut buffer);
        return Ok(String::from_utf8(buffer)?);
    }

    let config = GridConfig::from_env();
    let store = open_store(db, &config)?;

    match command {
        Commands::Completions { .. } => Ok(String::new()),
        Commands::Columns { name } => {
            let columns = store.table_columns(&name)?;
            if columns.is_empty() {
                return Err(format!("no such table or view: {}", name).into());
            }
            if json {
                return Ok(serde_json::to_string_pretty(&columns)?);
            }
            Ok(columns
                .iter()
                .map(|column| {
                    format!(
                        "{}\t{}{}",
                        column.name,
                        column.affinity,
                        if column.primary_key { "\tPRIMARY KEY" } else { "" }
                    )
                })
                .collect::<Vec<_>>()
                .join("\n"))
        }
        Commands::Show {
            target,
            query,
            view,
            limit,
        } => {
            let mut grid = open_grid(&store, &target, query, &config)?;
            apply_view_args(&mut grid, &view)?;
            let rows: Vec<Vec<Value>> = (0..limit)
                .map_while(|index| grid.row_snapshot(index))
                .map(|snapshot| snapshot.values)
                .collect();
            debug!(shown = rows.len(), total = grid.row_count(), "rendering rows");
            let mut output = format_rows(&column_names(&grid), &rows, json)?;
            let remaining = grid.row_count().saturating_sub(rows.len() as u64);
            if !json && remaining > 0 {
                output.push_str(&format!("\n... {} more rows", remaining));
            }
            Ok(output)
        }
        Commands::Export {
            target,
            query,
            view,
        } => {
            let mut grid = open_grid(&store, &target, query, &config)?;
            apply_view_args(&mut grid, &view)?;
            let names = column_names(&grid);
            let mut lines = Vec::new();
            for row in grid.export_rows()? {
                lines.push(serde_json::to_string(&row_to_json(&names, &row?))?);
            }
            Ok(lines.join("\n"))
        }
        Commands::Set {
            table,
            row,
            column,
            value,
            view,
        } => {
            let mut grid = open_grid(&store, &table, false, &config)?;
            apply_view_args(&mut grid, &view)?;
            let column = column_or_err(&grid, &column)?;
            if grid.row_id_at(row).is_none() {
                return Err(format!("row {} not found", row).into());
            }
            let affinity = grid.columns()[column].affinity;
            let Some(parsed) = Value::parse_input(&value, affinity) else {
                return Err(format!("value '{}' is not valid for a {} column", value, affinity).into());
            };
            grid.set_value_at(row, column, parsed)?;
            let summary = grid.change_summary();
            let report = grid.save()?;
            if json {
                return Ok(serde_json::to_string_pretty(&report)?);
            }
            if summary.is_empty() {
                Ok("Nothing to save".to_string())
            } else {
                Ok(format!("Saved: {}", summary))
            }
        }
    }
}

fn main() {
    init_tracing();
    let exit_code = run_and_report(|| {
        let output = run(Cli::parse())?;
        if !output.is_empty() {
            println!("{}", output);
        }
        Ok::<(), Box<dyn Error>>(())
    });
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}
