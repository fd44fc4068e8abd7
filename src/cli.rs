use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(
    name = "dbview",
    version,
    about = "Browse databases on a DB-viewer server",
    long_about = "dbview talks to a DB-viewer server: browse uploaded databases in a terminal UI, print pages of a table, export tables as CSV, and manage uploads.\n\nExamples:\n  dbview\n  dbview show shop.sqlite Orders --sort Total --desc --search alpha\n  dbview export shop.sqlite Orders --column Name --search alpha\n  dbview --server http://db.internal:5000 databases"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[arg(
        short = 'C',
        long,
        value_name = "FILE",
        global = true,
        help = "Path to config file (defaults to the user config directory)."
    )]
    pub config: Option<PathBuf>,

    #[arg(long, value_name = "URL", global = true, help = "Server base url (overrides config).")]
    pub server: Option<String>,

    #[arg(
        long,
        value_name = "TOKEN",
        env = "DBVIEW_ADMIN_TOKEN",
        hide_env_values = true,
        global = true,
        help = "Admin token for delete and cleanup."
    )]
    pub admin_token: Option<String>,

    #[arg(
        long,
        visible_alias = "per-page",
        value_name = "ROWS",
        global = true,
        help = "Rows per page (overrides config)."
    )]
    pub page_size: Option<u32>,

    #[arg(
        short = 'v',
        long = "verbose",
        action = ArgAction::Count,
        global = true,
        help = "Increase log verbosity (-v, -vv, -vvv)."
    )]
    pub verbose: u8,
}

/// Sort, search and scope flags shared by `show` and `export`
#[derive(clap::Args, Debug, Clone, Default)]
pub struct QueryArgs {
    #[arg(long, value_name = "COLUMN", help = "Sort by this column.")]
    pub sort: Option<String>,

    #[arg(long, requires = "sort", help = "Sort descending.")]
    pub desc: bool,

    #[arg(long, value_name = "TERM", help = "Search term.")]
    pub search: Option<String>,

    #[arg(
        long = "column",
        value_name = "COLUMN",
        action = ArgAction::Append,
        help = "Restrict search to this column (repeatable)."
    )]
    pub columns: Vec<String>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Interactive terminal UI (default)
    Tui {
        /// Open this database on start
        database: Option<String>,
    },

    /// List uploaded databases
    Databases,

    /// List the tables of a database
    Tables { database: String },

    /// Print one page of a table
    Show {
        database: String,
        table: String,

        #[arg(long, default_value_t = 1)]
        page: u32,

        #[command(flatten)]
        query: QueryArgs,

        /// Also write the page as a standalone HTML file
        #[arg(long, value_name = "FILE")]
        html: Option<PathBuf>,
    },

    /// Export a table (with sort and search applied) as CSV
    Export {
        database: String,
        table: String,

        #[command(flatten)]
        query: QueryArgs,

        #[arg(long, value_name = "DIR")]
        output_dir: Option<PathBuf>,
    },

    /// Upload a database file (.mdb, .accdb, .sqlite, .db)
    Upload { file: PathBuf },

    /// Delete an uploaded database (admin)
    Delete {
        database: String,

        #[arg(short, long)]
        yes: bool,
    },

    /// Delete every uploaded database (admin)
    Cleanup {
        #[arg(short, long)]
        yes: bool,
    },

    /// Print a commented default config file
    GenerateConfig,
}
