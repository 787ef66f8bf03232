//! # Report Server CLI (`reports`)
//!
//! The `reports` binary runs the report HTTP server and offers a few
//! commands for inspecting and seeding the configured storage backend.
//!
//! ## Usage
//!
//! ```bash
//! reports --config ./config/reports.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `reports init` | Create the key-value table (no-op for the file backend) |
//! | `reports serve` | Start the HTTP server |
//! | `reports put <docpath> <file>` | Store a file as `data/<docpath>.json` |
//! | `reports get <docpath>` | Print the raw stored JSON |
//! | `reports show <docpath>` | Print a summary of the document's view |
//! | `reports list` | List stored documents |

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;

use report_server::config::{self, Backend, Config};
use report_server::item_list::ItemList;
use report_server::logging;
use report_server::server;
use report_server::store::{self, datafile, KvStore, Storage};
use report_server::views::{GroupBy, ListView};

/// Report server: serves GitHub compliance and collaborator reports.
#[derive(Parser)]
#[command(name = "reports", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/reports.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the key-value table if the key-value backend is configured.
    ///
    /// Idempotent. With the file backend there is nothing to create.
    Init,

    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// Store a JSON file as the document for a docpath.
    ///
    /// The file is stored verbatim, exactly as an authenticated upload would be.
    Put {
        /// Report name, e.g. `github_repositories`.
        docpath: String,
        /// File whose contents become the document.
        file: PathBuf,
    },

    /// Print the raw stored JSON for a docpath.
    Get {
        docpath: String,
    },

    /// Summarize a document through the view that serves it.
    Show {
        docpath: String,

        /// How to group collaborator reports: `repository` or `login`.
        #[arg(long, default_value = "repository")]
        group_by: GroupBy,
    },

    /// List stored documents.
    List,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => match cfg.storage.backend() {
            Backend::Kv { db_path, table } => {
                let kv = KvStore::connect(&db_path, &table).await?;
                kv.ensure_table().await?;
                println!("Table '{}' ready in {}.", table, db_path.display());
            }
            Backend::File { root } => {
                println!(
                    "File backend at {}; nothing to initialize.",
                    root.display()
                );
            }
        },
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Put { docpath, file } => {
            let content = std::fs::read(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let store = store::open(&cfg).await?;
            let path = datafile(&docpath);
            store.store(&path, &content).await?;
            println!("stored {} ({} bytes)", path, content.len());
        }
        Commands::Get { docpath } => {
            let store = store::open(&cfg).await?;
            match store.retrieve(&datafile(&docpath)).await? {
                Some(content) => {
                    let mut stdout = std::io::stdout().lock();
                    stdout.write_all(&content)?;
                    stdout.write_all(b"\n")?;
                }
                None => {
                    eprintln!("Error: no document for {}", docpath);
                    std::process::exit(1);
                }
            }
        }
        Commands::Show { docpath, group_by } => {
            run_show(&cfg, &docpath, group_by).await?;
        }
        Commands::List => {
            let store = store::open(&cfg).await?;
            let paths = store.list_files().await?;
            let files = store.retrieve_many(&paths).await?;
            println!("{:<48} STORED AT", "DOCUMENT");
            for (path, file) in &files {
                println!(
                    "{:<48} {}",
                    path,
                    file.stored_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
        }
    }

    Ok(())
}

async fn run_show(cfg: &Config, docpath: &str, group_by: GroupBy) -> anyhow::Result<()> {
    let store = store::open(cfg).await?;
    let view = ListView::load(store.as_ref(), docpath, &cfg.view(docpath)).await?;

    println!("--- {} ({}) ---", view.docpath(), view.kind().as_str());
    println!(
        "updated_at:   {}",
        if view.updated_at().is_empty() {
            "(no data)"
        } else {
            view.updated_at()
        }
    );
    println!("records:      {}", view.len());

    match view {
        ListView::Items(items) => print_items(&items),
        ListView::Collaborators(c) => {
            let c = c.with_group_by(group_by);
            println!("repositories: {}", c.repositories().len());
            println!("collaborators: {}", c.collaborators().len());
            println!();
            for (group, records) in c.grouped() {
                println!("{}", group);
                for r in records {
                    match c.group_by() {
                        GroupBy::Repository => println!("  {}", r.login),
                        GroupBy::Login => println!("  {}", r.repository),
                    }
                }
            }
        }
        ListView::Repositories(r) => {
            println!("passing:      {}", r.passing().len());
            println!("failing:      {}", r.failing().len());
            println!();
            for repo in r.failing() {
                println!("FAIL {}", repo.name);
                for problem in repo.problems() {
                    println!("  - {}", problem);
                }
            }
        }
    }

    Ok(())
}

fn print_items(items: &ItemList) {
    for record in items.list() {
        println!("  {}", record);
    }
}
