mod db_dump;
mod logic;

use anyhow::{Context, Result};

use crate::config::BackupJobConfig;
use crate::remote::SshClient;

/// Public entry point for the backup process.
///
/// Opens one SSH session for the whole run and guarantees it is closed
/// whatever the pipeline's outcome.
pub async fn run_backup_flow(config: &BackupJobConfig) -> Result<()> {
    println!(
        "Connecting to {} as {}...",
        config.remote_server, config.username
    );
    let client = SshClient::new(
        config.remote_server.clone(),
        config.username.clone(),
        config.private_key_path.clone(),
    );
    let session = client
        .connect()
        .await
        .with_context(|| format!("Failed to open SSH session to {}", config.remote_server))?;

    let result = logic::perform_backup_orchestration(config, &session).await;

    if let Err(e) = session.disconnect().await {
        eprintln!("Warning: failed to close SSH session cleanly: {:#}", e);
    }

    result.map(|_| ())
}
