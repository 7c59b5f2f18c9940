mod tui;

use anyhow::Result;
use clap::Parser;
use common::{
    RecordBatch,
    pretty::{self, TableStyleKind},
};
use database::{Database, QueryResult};
use std::path::PathBuf;

const DEFAULT_DATA_DIR: &str = "./db_data";
const DEFAULT_CATALOG_FILE: &str = "catalog.json";
const DEFAULT_WAL_FILE: &str = "toydb.wal";

#[derive(Parser, Debug)]
#[command(
    name = "toydb-repl",
    about = "Interactive SQL console for the toy database"
)]
struct Args {
    /// Directory containing catalog, WAL, and table files
    #[arg(long, default_value = DEFAULT_DATA_DIR)]
    data_dir: PathBuf,
    /// Catalog filename within the data directory
    #[arg(long, default_value = DEFAULT_CATALOG_FILE)]
    catalog_file: String,
    /// WAL filename within the data directory
    #[arg(long, default_value = DEFAULT_WAL_FILE)]
    wal_file: String,
    /// Maximum number of pages held in the buffer pool
    #[arg(long, default_value_t = 256)]
    buffer_pages: usize,
    /// Execute the provided SQL and exit instead of starting the TUI
    #[arg(short = 'e', long = "execute")]
    execute: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();
    let runtime = tokio::runtime::Runtime::new()?;
    let runtime_handle = runtime.handle().clone();

    let db = runtime.block_on(Database::new(
        &args.data_dir,
        &args.catalog_file,
        &args.wal_file,
        args.buffer_pages,
    ))?;

    if let Some(sql) = args.execute {
        // Execute mode: run SQL and exit without TUI
        runtime.block_on(execute_and_exit(&db, &sql))?;
    } else {
        // TUI mode: interactive terminal UI
        let app = tui::App::new(db, runtime_handle);
        tui::run(app)?;
    }

    Ok(())
}

async fn execute_and_exit(db: &Database, sql: &str) -> Result<()> {
    match db.execute(sql).await? {
        QueryResult::Rows { schema, rows } => {
            let batch = RecordBatch {
                columns: schema,
                rows,
            };
            let rendered = pretty::render_record_batch(&batch, TableStyleKind::Modern);
            println!("{}", rendered);
        }
        QueryResult::Count { affected } => {
            println!("{} row(s) affected.", affected);
        }
        QueryResult::Empty => {
            println!("OK.");
        }
        QueryResult::Text(text) => {
            println!("{}", text);
        }
    }

    Ok(())
}
