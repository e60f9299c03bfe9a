// dbcourier/src/restore/logic.rs
use anyhow::{Context, Result};
use std::path::Path;

use crate::config::RestoreJobConfig;
use crate::restore::{archive, db_restore};
use crate::restore::db_restore::MysqlClient;

/// Runs the restore sequence: extract the archive into a scoped temp
/// directory, replace the target database from the dump, and let the temp
/// directory clean itself up on every exit path.
pub async fn perform_restore_orchestration(
    config: &RestoreJobConfig,
    client: &dyn MysqlClient,
    archive_path: &Path,
) -> Result<()> {
    let temp_dir = tempfile::tempdir().context("Failed to create temporary extraction directory")?;

    // The TempDir guard is held across the whole run; dropping it removes the
    // extraction directory whether the pipeline succeeded or failed.
    let dump_file = archive::extract_single_file_archive(archive_path, temp_dir.path())?;

    db_restore::replace_target_database(client, &config.db_name, &dump_file).await?;

    println!("Cleaning up temporary directory...");
    temp_dir
        .close()
        .context("Failed to remove temporary extraction directory")?;
    println!("Cleanup completed.");
    Ok(())
}
