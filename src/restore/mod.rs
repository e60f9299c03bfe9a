mod archive;
mod db_restore;
mod logic;

use anyhow::Result;
use std::path::Path;

use crate::config::RestoreJobConfig;
use db_restore::MysqlCli;

/// Public entry point for the restore process.
pub async fn run_restore_flow(config: &RestoreJobConfig, archive_path: &Path) -> Result<()> {
    println!(
        "Restore target: {}:{}/{}, Archive: {}",
        config.db_host,
        config.db_port,
        config.db_name,
        archive_path.display()
    );
    let client = MysqlCli::new(config)?;
    logic::perform_restore_orchestration(config, &client, archive_path).await
}
