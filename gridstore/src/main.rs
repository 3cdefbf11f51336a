//! gridstore - admin CLI for the spreadsheet file vault
//!
//! Stores spreadsheet files as opaque blobs, attaches reusable column filters
//! to (file, sheet, column) coordinates, and re-applies them when a sheet is
//! shown.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/gridstore/files.db (~/.local/share/gridstore/files.db)
//! - Logs: $XDG_STATE_HOME/gridstore/gridstore.log (~/.local/state/gridstore/gridstore.log)
//! - Config: $XDG_CONFIG_HOME/gridstore/config.toml (~/.config/gridstore/config.toml)

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gridstore_core::{
    apply_filters, cell_text, Config, FilterSpec, JsonCodec, Store, TabularCodec,
};
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "gridstore")]
#[command(about = "Store spreadsheet files and re-apply saved column filters")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload one or more spreadsheet files
    Upload {
        /// Files to store
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// List stored files
    Ls,

    /// Rename a stored file (extension and content are kept)
    Rename {
        /// File id
        id: i64,
        /// New display name
        name: String,
    },

    /// Replace a stored file's name, extension, and content from a local file
    Replace {
        /// File id
        id: i64,
        /// Replacement file
        path: PathBuf,
    },

    /// Delete a stored file and its filter links
    Rm {
        /// File id
        id: i64,
    },

    /// Write a stored file's content back to disk
    Download {
        /// File id
        id: i64,
        /// Output path (defaults to the stored name + extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Manage filters and their coordinate links
    #[command(subcommand)]
    Filter(FilterCommand),

    /// Show a decoded sheet with its registered filters applied
    Show {
        /// File id
        id: i64,
        /// Zero-based sheet index
        #[arg(long, default_value_t = 0)]
        sheet: usize,
        /// Print the sheet without applying filters
        #[arg(long)]
        raw: bool,
    },
}

#[derive(Subcommand)]
enum FilterCommand {
    /// Create a filter (method: exact | contains | not-contains | regex)
    Add {
        method: String,
        input: String,
        /// Create the filter disabled
        #[arg(long)]
        disabled: bool,
    },

    /// Print a filter as JSON
    Show {
        /// Filter id
        id: i64,
    },

    /// Replace a filter's method, input, and enabled flag
    Set {
        /// Filter id
        id: i64,
        method: String,
        input: String,
        /// Leave the filter disabled
        #[arg(long)]
        disabled: bool,
    },

    /// Delete a filter and its coordinate links
    Rm {
        /// Filter id
        id: i64,
    },

    /// Attach a filter to a (file, sheet, column) coordinate
    Link {
        /// Filter id
        filter_id: i64,
        /// File id
        #[arg(long)]
        file: i64,
        /// Zero-based sheet index
        #[arg(long)]
        sheet: i64,
        /// Zero-based column index
        #[arg(long)]
        col: i64,
    },

    /// List the filters registered at a coordinate
    At {
        /// File id
        #[arg(long)]
        file: i64,
        /// Zero-based sheet index
        #[arg(long)]
        sheet: i64,
        /// Zero-based column index
        #[arg(long)]
        col: i64,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Ensure XDG environment variables are set before using the core library
    Config::ensure_xdg_env();

    let config = Config::load().context("failed to load configuration")?;

    let _log_guard = gridstore_core::logging::init(&config.logging)
        .context("failed to initialize logging")?;

    tracing::info!("gridstore starting");

    let db_path = Config::database_path();
    tracing::info!(path = %db_path.display(), "Opening store");

    let store = Store::open_with(
        &db_path,
        config.storage.pool_initial,
        config.storage.pool_growth,
    )
    .context("failed to open store")?;

    let outcome = run(args.command, &store, &config);

    // Drain the pool on the way out; a failed command rolls back instead of
    // committing whatever a connection might still hold
    if let Err(e) = store.close(outcome.is_err()) {
        tracing::warn!(error = %e, "Failed to drain connection pool at shutdown");
    }

    outcome
}

fn run(command: Command, store: &Store, config: &Config) -> Result<()> {
    match command {
        Command::Upload { paths } => {
            for path in paths {
                let filename = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .with_context(|| format!("invalid file name: {}", path.display()))?
                    .to_string();

                if !config.upload.is_allowed(&filename) {
                    println!("Skipped {} (extension not allowed)", filename);
                    continue;
                }

                let content = fs::read(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                let id = store
                    .add_file(&filename, &content)
                    .with_context(|| format!("failed to store {}", filename))?;
                println!("Stored {} as file {}", filename, id);
            }
            Ok(())
        }

        Command::Ls => {
            let files = store.list_files().context("failed to list files")?;
            if files.is_empty() {
                println!("No files stored.");
                return Ok(());
            }
            for file in files {
                println!(
                    "{:>6}  {}{}  ({} bytes)",
                    file.id, file.name, file.ext, file.size_bytes
                );
            }
            Ok(())
        }

        Command::Rename { id, name } => {
            store
                .update_file_name(id, &name)
                .with_context(|| format!("failed to rename file {}", id))?;
            println!("Renamed file {} to {}", id, name);
            Ok(())
        }

        Command::Replace { id, path } => {
            let filename = path
                .file_name()
                .and_then(|n| n.to_str())
                .with_context(|| format!("invalid file name: {}", path.display()))?
                .to_string();
            let content =
                fs::read(&path).with_context(|| format!("failed to read {}", path.display()))?;
            store
                .update_file(id, &filename, &content)
                .with_context(|| format!("failed to replace file {}", id))?;
            println!("Replaced file {} with {}", id, filename);
            Ok(())
        }

        Command::Rm { id } => {
            store
                .delete_file(id)
                .with_context(|| format!("failed to delete file {}", id))?;
            println!("Deleted file {}", id);
            Ok(())
        }

        Command::Download { id, output } => {
            let Some(file) = store.get_file(id).context("failed to fetch file")? else {
                bail!("file {} not found", id);
            };
            let target =
                output.unwrap_or_else(|| PathBuf::from(format!("{}{}", file.name, file.ext)));
            fs::write(&target, &file.content)
                .with_context(|| format!("failed to write {}", target.display()))?;
            println!(
                "Wrote {} bytes to {}",
                file.content.len(),
                target.display()
            );
            Ok(())
        }

        Command::Filter(cmd) => run_filter(cmd, store),

        Command::Show { id, sheet, raw } => {
            let Some(file) = store.get_file(id).context("failed to fetch file")? else {
                bail!("file {} not found", id);
            };

            let sheets = JsonCodec.decode(&file.content, Some(&file.ext));
            if sheets.is_empty() {
                println!("No sheets found in file {}", id);
                return Ok(());
            }
            let Some(named) = sheets.get(sheet) else {
                bail!(
                    "sheet {} out of range; file {} has {} sheet(s)",
                    sheet,
                    id,
                    sheets.len()
                );
            };

            let result = if raw {
                named.sheet.clone()
            } else {
                let specs = specs_for_sheet(store, id, sheet as i64, named.sheet.width())?;
                apply_filters(&named.sheet, &specs)
                    .with_context(|| format!("failed to apply filters to sheet {}", sheet))?
            };

            println!("# {} ({} rows)", named.name, result.row_count());
            println!("{}", result.columns.join("\t"));
            for row in &result.rows {
                let line: Vec<String> = row.iter().map(cell_text).collect();
                println!("{}", line.join("\t"));
            }
            Ok(())
        }
    }
}

fn run_filter(command: FilterCommand, store: &Store) -> Result<()> {
    match command {
        FilterCommand::Add {
            method,
            input,
            disabled,
        } => {
            let id = store
                .add_filter(&method, &input, !disabled)
                .context("failed to create filter")?;
            println!("Created filter {}", id);
            Ok(())
        }

        FilterCommand::Show { id } => {
            let Some(filter) = store.get_filter(id).context("failed to fetch filter")? else {
                bail!("filter {} not found", id);
            };
            println!("{}", serde_json::to_string_pretty(&filter)?);
            Ok(())
        }

        FilterCommand::Set {
            id,
            method,
            input,
            disabled,
        } => {
            store
                .update_filter(id, &method, &input, !disabled)
                .with_context(|| format!("failed to update filter {}", id))?;
            println!("Updated filter {}", id);
            Ok(())
        }

        FilterCommand::Rm { id } => {
            store
                .delete_filter(id)
                .with_context(|| format!("failed to delete filter {}", id))?;
            println!("Deleted filter {}", id);
            Ok(())
        }

        FilterCommand::Link {
            filter_id,
            file,
            sheet,
            col,
        } => {
            store
                .link_filter(file, filter_id, sheet, col)
                .with_context(|| {
                    format!(
                        "failed to link filter {} to file {} sheet {} col {}",
                        filter_id, file, sheet, col
                    )
                })?;
            println!(
                "Linked filter {} to file {} sheet {} col {}",
                filter_id, file, sheet, col
            );
            Ok(())
        }

        FilterCommand::At { file, sheet, col } => {
            let filters = store
                .filters_at(file, sheet, col)
                .context("failed to list filters")?;
            if filters.is_empty() {
                println!("No filters at file {} sheet {} col {}", file, sheet, col);
                return Ok(());
            }
            for filter in filters {
                let state = if filter.enabled { "enabled" } else { "disabled" };
                println!(
                    "{:>6}  {:<14} {:?}  [{}]",
                    filter.id, filter.method, filter.input, state
                );
            }
            Ok(())
        }
    }
}

/// Gather applicable specs for every column coordinate of one sheet.
fn specs_for_sheet(
    store: &Store,
    file_id: i64,
    sheet: i64,
    width: usize,
) -> Result<Vec<FilterSpec>> {
    let mut specs = Vec::new();
    for col in 0..width {
        let filters = store
            .filters_at(file_id, sheet, col as i64)
            .with_context(|| format!("failed to list filters for column {}", col))?;
        specs.extend(filters.into_iter().map(|f| f.spec_at(col)));
    }
    Ok(specs)
}
