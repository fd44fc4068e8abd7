use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use crossterm::style::Stylize;
use tracing::{debug, warn};

use dbview::api_client::ApiClient;
use dbview::config::Config;
use dbview::data_exporter::CsvExporter;
use dbview::html_renderer::render_html;
use dbview::logging::{init_stderr_tracing, init_tracing};
use dbview::table_display::{display_databases, display_table, display_tables, format_file_size};
use dbview::tui_app::{run_tui, DbViewTui};
use dbview::view::{DatabaseId, LoadOutcome, LoadRequest, Navigation, SearchScope, TableViewController};

mod cli;

use cli::{Cli, Command, QueryArgs};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.clone().unwrap_or(Command::Tui { database: None });

    if matches!(command, Command::GenerateConfig) {
        print!("{}", Config::create_default_with_comments());
        return Ok(());
    }

    let log_buffer = match command {
        Command::Tui { .. } => Some(init_tracing(tracing_level(cli.verbose))),
        _ => {
            init_stderr_tracing(cli.verbose);
            None
        }
    };

    let config = load_config(&cli)?;
    let client = config.api_client().context("Cannot create API client")?;
    debug!("Using server {}", client.base_url());

    match command {
        Command::Tui { database } => {
            let app = DbViewTui::new(
                Arc::new(client),
                config.view_controller(),
                config.exporter(),
                log_buffer,
            );
            run_tui(app, database.map(DatabaseId::from))
        }
        Command::Databases => {
            let listing = client.list_databases()?;
            display_databases(&listing.databases);
            if listing.admin_enabled {
                println!("{}", "Admin operations enabled".dark_grey());
            }
            Ok(())
        }
        Command::Tables { database } => {
            let tables = client.list_tables(&DatabaseId::from(database))?;
            display_tables(&tables);
            Ok(())
        }
        Command::Show {
            database,
            table,
            page,
            query,
            html,
        } => show_table(&config, &client, database, &table, page, &query, html),
        Command::Export {
            database,
            table,
            query,
            output_dir,
        } => {
            let mut view = config.view_controller();
            prepare_view(&mut view, database, &table, &query)?;

            let exporter = match output_dir {
                Some(dir) => CsvExporter::new(dir, config.export.max_rows),
                None => config.exporter(),
            };
            let summary = exporter.export_current_table(&client, view.state())?;
            let notice = summary.notice();
            if summary.is_truncated() {
                println!("{}", notice.to_string().yellow());
            } else {
                println!("{}", notice.to_string().green());
            }
            println!("{}", summary.path.display());
            Ok(())
        }
        Command::Upload { file } => {
            let info = client.upload(&file)?;
            println!(
                "{} {} ({} tables, {})",
                "Uploaded".green(),
                info.display_name(),
                info.table_count,
                format_file_size(info.file_size)
            );
            println!("Id: {}", info.filename);
            Ok(())
        }
        Command::Delete { database, yes } => {
            if !yes && !confirm(&format!("Delete database {}?", database))? {
                return Ok(());
            }
            let message = client.delete_database(&DatabaseId::from(database))?;
            println!("{}", message.green());
            Ok(())
        }
        Command::Cleanup { yes } => {
            if !yes && !confirm("Delete ALL uploaded databases?")? {
                return Ok(());
            }
            let message = client.cleanup_all()?;
            println!("{}", message.green());
            Ok(())
        }
        Command::GenerateConfig => Ok(()),
    }
}

fn tracing_level(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

/// Config file (explicit or default) with command-line overrides applied
fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load().unwrap_or_else(|e| {
            warn!("Could not load config, using defaults: {:#}", e);
            Config::default()
        }),
    };

    if let Some(server) = &cli.server {
        config.server.base_url = server.clone();
    }
    if cli.admin_token.is_some() {
        config.server.admin_token = cli.admin_token.clone();
    }
    if let Some(page_size) = cli.page_size {
        config.view.page_size = page_size;
    }
    Ok(config.normalized())
}

/// Drive the controller to the requested table, sort, scope and search.
/// Returns the request for the final state; earlier ones are superseded.
fn prepare_view(
    view: &mut TableViewController,
    database: String,
    table: &str,
    query: &QueryArgs,
) -> Result<LoadRequest> {
    view.select_database(DatabaseId::from(database));
    let mut request = view.select_table(table);

    if let Some(column) = &query.sort {
        request = view.sort_by(column).or(request);
        if query.desc {
            request = view.sort_by(column).or(request);
        }
    }
    if !query.columns.is_empty() {
        request = view
            .set_search_scope(SearchScope::from_columns(query.columns.iter().cloned()))
            .or(request);
    }
    if let Some(term) = &query.search {
        request = view.commit_search(term).or(request);
    }

    request.with_context(|| format!("Cannot open table {}", table))
}

fn load(view: &mut TableViewController, client: &ApiClient, request: &LoadRequest) -> Result<()> {
    match view.fetch_and_apply(client, request) {
        LoadOutcome::Applied | LoadOutcome::Stale => Ok(()),
        LoadOutcome::Failed(notice) => bail!("{}", notice),
    }
}

fn show_table(
    config: &Config,
    client: &ApiClient,
    database: String,
    table: &str,
    page: u32,
    query: &QueryArgs,
    html: Option<PathBuf>,
) -> Result<()> {
    let mut view = config.view_controller();
    let request = prepare_view(&mut view, database, table, query)?;
    load(&mut view, client, &request)?;

    // The page bound is only known after the first response
    if page != 1 {
        match view.go_to_page(page) {
            Navigation::Load(request) => load(&mut view, client, &request)?,
            Navigation::Notice(notice) => eprintln!("{}", notice.to_string().yellow()),
            Navigation::Ignored => {}
        }
    }

    let render = view.render();
    display_table(&render);

    if let Some(path) = html {
        std::fs::write(&path, render_html(&render))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("HTML written to {}", path.display());
    }
    Ok(())
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
