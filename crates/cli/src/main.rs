use api_shared::{FileRecordRes, HashCheckRes};
use catalog_core::config::storage_dir_from_env_value;
use catalog_core::constants::STORAGE_DIR_ENV;
use catalog_core::{CatalogService, CoreConfig, FileId, FileRecord, ListQuery, NewArtifact, Payload};
use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "catalog")]
#[command(about = "File catalogue CLI")]
struct Cli {
    /// Storage directory holding data.json and the stored files
    #[arg(long, global = true, env = STORAGE_DIR_ENV)]
    storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List files, most recent first
    List {
        /// Case-insensitive substring of the display name
        #[arg(long)]
        search: Option<String>,
        /// 1-based page number (omit for all files)
        #[arg(long)]
        page: Option<i64>,
        /// Files per page
        #[arg(long)]
        page_size: Option<i64>,
    },
    /// Show one file as JSON
    Show {
        /// File id
        id: String,
    },
    /// Check whether a file with this content hash exists
    CheckHash {
        /// Content hash (any case)
        hash: String,
    },
    /// Copy a local file into the catalogue
    Import {
        /// Path of the file to import
        path: PathBuf,
        /// Description
        #[arg(long)]
        description: Option<String>,
        /// Tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Rating, 0 to 5
        #[arg(long)]
        stars: Option<i64>,
    },
    /// Delete a file and its preview
    Delete {
        /// File id
        id: String,
    },
    /// Clear missing previews, report missing artifacts, empty the staging area
    Reconcile,
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("No command given. Use --help to see available commands.");
        return Ok(());
    };

    let storage_dir = cli
        .storage_dir
        .unwrap_or_else(|| storage_dir_from_env_value(None));
    let catalog = CatalogService::new(Arc::new(CoreConfig::new(storage_dir)?))?;

    match execute(&catalog, command) {
        Ok(output) => {
            println!("{}", output);
            Ok(())
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn execute(catalog: &CatalogService, command: Commands) -> Result<String, Box<dyn Error>> {
    match command {
        Commands::List {
            search,
            page,
            page_size,
        } => {
            let listing = catalog.list(&ListQuery {
                search,
                page,
                page_size,
            })?;
            if listing.files.is_empty() {
                return Ok("No files found.".into());
            }

            let mut lines: Vec<String> = listing.files.iter().map(summary_line).collect();
            lines.push(format!(
                "{} of {} file(s)",
                listing.files.len(),
                listing.total
            ));
            Ok(lines.join("\n"))
        }
        Commands::Show { id } => {
            let record = catalog.get(FileId::parse(&id)?)?;
            Ok(serde_json::to_string_pretty(&FileRecordRes::from(record))?)
        }
        Commands::CheckHash { hash } => {
            let check = HashCheckRes::from(catalog.check_hash(&hash)?);
            Ok(serde_json::to_string_pretty(&check)?)
        }
        Commands::Import {
            path,
            description,
            tags,
            stars,
        } => {
            let record = catalog.create(NewArtifact {
                payload: Some(Payload::new(file_name_of(&path)?, std::fs::read(&path)?)),
                description,
                tags,
                stars,
                ..Default::default()
            })?;
            Ok(format!("Imported {}", summary_line(&record)))
        }
        Commands::Delete { id } => {
            let removed = catalog.delete(FileId::parse(&id)?)?;
            Ok(format!("Deleted {}", summary_line(&removed)))
        }
        Commands::Reconcile => {
            let report = catalog.reconcile()?;
            Ok(format!(
                "Cleared {} missing preview(s), {} file(s) missing their artifact, removed {} staged upload(s)",
                report.cleared_previews.len(),
                report.missing_artifacts.len(),
                report.staged_files_removed
            ))
        }
    }
}

fn summary_line(record: &FileRecord) -> String {
    format!(
        "ID: {}, Name: {}, Stars: {}, Size: {} bytes, Uploaded: {}",
        record.id,
        record.name,
        record.stars,
        record.size,
        record.upload_time.to_rfc3339()
    )
}

fn file_name_of(path: &Path) -> Result<String, Box<dyn Error>> {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(str::to_owned)
        .ok_or_else(|| format!("not a file path: {}", path.display()).into())
}
