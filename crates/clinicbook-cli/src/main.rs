// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod demo;
mod replay;
mod runtime;

use anyhow::{Context, Result, anyhow};
use clinicbook_app::{ColumnSpec, FieldValue, GridValue, Partition, RecordStore, SheetKind};
use clinicbook_db::Store;
use clinicbook_sync::{SessionOptions, SheetSession};
use config::Config;
use replay::ReplayStep;
use runtime::SqliteRecordStore;
use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `clinicbook --print-example-config` to generate a v1 template",
            options.config_path.display()
        )
    })?;
    init_logging(config.log_filter());

    let db_path = if options.demo {
        PathBuf::from(":memory:")
    } else {
        config.db_path()?
    };
    if options.print_db_path {
        println!("{}", db_path.display());
        return Ok(());
    }

    let store = Store::open(&db_path).with_context(|| {
        format!(
            "open database {} -- if this path is wrong, set [storage].db_path or CLINICBOOK_DB_PATH",
            db_path.display()
        )
    })?;
    store.bootstrap()?;

    let sheet = options.sheet.unwrap_or_else(|| config.default_sheet());
    let partition = options.month.unwrap_or_else(Partition::current);
    if options.demo {
        let seeded = demo::seed_demo_data(&store, partition)?;
        info!(rows = seeded, "demo data seeded");
    }

    let session_options = config.session_options()?;
    let steps = options
        .replay_path
        .as_deref()
        .map(replay::load_steps)
        .transpose()?;
    if options.check_only {
        for kind in SheetKind::ALL {
            info!(sheet = kind.as_str(), rows = store.count_records(kind)?, "store ok");
        }
        return Ok(());
    }

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("start async runtime")?;
    let records: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::new(store));
    runtime.block_on(show_sheet(records, sheet, partition, session_options, steps))
}

async fn show_sheet(
    records: Arc<dyn RecordStore>,
    sheet: SheetKind,
    partition: Partition,
    options: SessionOptions,
    steps: Option<Vec<ReplayStep>>,
) -> Result<()> {
    let session = SheetSession::open(records, sheet, partition, options)
        .await
        .with_context(|| format!("open {sheet} for {partition}"))?;

    let replayed = match steps {
        Some(steps) => Some(replay::run(&session, steps).await),
        None => None,
    };
    // Pending edits are flushed even when a replay step failed.
    session.unmount().await.context("flush pending saves")?;
    if let Some(summary) = replayed.transpose()? {
        info!(
            steps = summary.steps,
            cells = summary.cells_applied,
            ignored = summary.cells_ignored,
            moved = summary.rows_moved,
            deleted = summary.rows_deleted,
            restored = summary.rows_restored,
            "replay finished"
        );
    }

    let status = session.status();
    if let Some(error) = &status.last_error {
        warn!(%error, "last store error");
    }
    let grid = session.grid();
    let mut stdout = io::stdout().lock();
    write_tsv(
        &mut stdout,
        session.columns(),
        &grid[..status.row_count.min(grid.len())],
    )
    .context("write sheet to stdout")
}

fn init_logging(config_filter: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config_filter.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(io::stderr),
        )
        .try_init();
}

fn write_tsv(out: &mut impl Write, columns: &[ColumnSpec], rows: &[Vec<GridValue>]) -> io::Result<()> {
    let header = columns
        .iter()
        .map(|column| column.label)
        .collect::<Vec<_>>()
        .join("\t");
    writeln!(out, "{header}")?;
    for row in rows {
        let line = row.iter().map(tsv_cell).collect::<Vec<_>>().join("\t");
        writeln!(out, "{line}")?;
    }
    Ok(())
}

fn tsv_cell(value: &GridValue) -> String {
    match value {
        GridValue::Null => String::new(),
        GridValue::Number(number) => FieldValue::Number(*number).display(),
        GridValue::Text(text) => text.replace(['\t', '\n', '\r'], " "),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_db_path: bool,
    demo: bool,
    print_example: bool,
    check_only: bool,
    show_help: bool,
    sheet: Option<SheetKind>,
    month: Option<Partition>,
    replay_path: Option<PathBuf>,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_db_path: false,
        demo: false,
        print_example: false,
        check_only: false,
        show_help: false,
        sheet: None,
        month: None,
        replay_path: None,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--sheet" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--sheet requires one of ar, provider, pay"))?;
                let sheet = SheetKind::parse(value.as_ref()).ok_or_else(|| {
                    anyhow!(
                        "unknown sheet {:?}; use one of ar, provider, pay",
                        value.as_ref()
                    )
                })?;
                options.sheet = Some(sheet);
            }
            "--month" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--month requires a YYYY-MM value"))?;
                let month = Partition::parse(value.as_ref()).ok_or_else(|| {
                    anyhow!("invalid month {:?}; use YYYY-MM", value.as_ref())
                })?;
                options.month = Some(month);
            }
            "--replay" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow!("--replay requires a JSON file path"))?;
                options.replay_path = Some(PathBuf::from(value.as_ref()));
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-path" => {
                options.print_db_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--demo" => {
                options.demo = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("clinicbook");
    println!("  --config <path>          Use a specific config path");
    println!("  --sheet <ar|provider|pay> Sheet to open (default from [sheet].default)");
    println!("  --month <YYYY-MM>        Month to open (default: current month)");
    println!("  --replay <file.json>     Apply a JSON list of grid events, then save");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-path             Print resolved database path");
    println!("  --print-example-config   Print a v1 config template");
    println!("  --demo                   Use seeded demo data (in-memory)");
    println!("  --check                  Validate config + DB and exit");
    println!("  --help                   Show this help");
}
