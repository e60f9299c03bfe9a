//! MySQL remote backup and schema-replace tool
//!
//! `backup` dumps a database on a remote server over SSH and pulls the
//! zipped dump locally; `restore` replaces a target database from such an
//! archive.

// dbcourier/src/main.rs
mod backup;
mod config;
mod exec;
mod remote;
mod restore;

use anyhow::{Context, Result};
use std::env;
use std::path::Path;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    match run_app().await {
        Ok(_) => {
            println!("Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app() -> Result<()> {
    let args: Vec<String> = env::args().collect();

    match (args.get(1).map(String::as_str), args.len()) {
        (Some("backup"), 3) => {
            println!("Starting Backup Process...");
            let raw = config::load_raw_config(Path::new(&args[2]))?;
            let backup_config = config::load_backup_config(&raw)
                .context("Failed to load backup configuration")?;
            backup::run_backup_flow(&backup_config)
                .await
                .context("Backup process failed")?;
        }
        (Some("restore"), 4) => {
            println!("Starting Restore Process...");
            let raw = config::load_raw_config(Path::new(&args[2]))?;
            let restore_config = config::load_restore_config(&raw)
                .context("Failed to load restore configuration")?;
            restore::run_restore_flow(&restore_config, Path::new(&args[3]))
                .await
                .context("Restore process failed")?;
        }
        _ => {
            eprintln!("Usage: dbcourier backup <config_file>");
            eprintln!("       dbcourier restore <config_file> <zip_file>");
            anyhow::bail!("Invalid arguments");
        }
    }
    Ok(())
}
