// dbcourier/src/backup/logic.rs
use anyhow::{Context, Result};
use chrono::Local;
use std::fs;
use std::path::PathBuf;

use crate::backup::db_dump;
use crate::config::BackupJobConfig;
use crate::exec::{CommandOutput, ShellCommand};
use crate::remote::RemoteShell;

/// Join a remote unix path without touching the local platform separator.
fn remote_join(dir: &str, name: &str) -> String {
    format!("{}/{}", dir.trim_end_matches('/'), name)
}

async fn run_remote(
    remote: &dyn RemoteShell,
    command: &ShellCommand,
    what: &str,
) -> Result<CommandOutput> {
    let output = remote
        .exec(command)
        .await
        .with_context(|| format!("Failed to {} on the remote server", what))?;
    if !output.success() {
        return Err(anyhow::anyhow!(
            "Remote command to {} failed (exit code {:?}): {}",
            what,
            output.exit_code,
            output.stderr.trim()
        ));
    }
    Ok(output)
}

/// Runs the whole backup sequence over an open remote session and returns the
/// local path of the downloaded archive.
pub async fn perform_backup_orchestration(
    config: &BackupJobConfig,
    remote: &dyn RemoteShell,
) -> Result<PathBuf> {
    let base_name = db_dump::artifact_base_name(&config.db_name, Local::now());
    let remote_dir = &config.remote_backup_directory;

    let structure_sql = remote_join(
        remote_dir,
        &format!("{}_no_data_tables_structure_only.sql", base_name),
    );
    let data_sql = remote_join(remote_dir, &format!("{}_data_tables.sql", base_name));
    let merged_sql = remote_join(remote_dir, &format!("{}.sql", base_name));
    let remote_zip = remote_join(remote_dir, &format!("{}.zip", base_name));

    println!("Creating backup directory on remote server...");
    run_remote(
        remote,
        &ShellCommand::new("mkdir").arg("-p").arg(remote_dir),
        "create the remote backup directory",
    )
    .await?;

    println!("Running backup for table structures without data on remote server...");
    let structure_command = db_dump::structure_dump_command(config, &structure_sql);
    let structure_dumped =
        match run_remote(remote, &structure_command, "dump table structures").await {
            Ok(_) => true,
            Err(e) => {
                eprintln!("Failed to dump table structures without data: {:#}", e);
                println!("Proceeding with data tables dump only...");
                false
            }
        };

    println!("Running backup for tables with data on remote server...");
    let data_command = db_dump::data_dump_command(config, &data_sql);
    run_remote(remote, &data_command, "dump table data").await?;

    println!("Merging dump files...");
    let mut merge_command = ShellCommand::new("cat");
    if structure_dumped {
        merge_command = merge_command.arg(&structure_sql);
    }
    merge_command = merge_command.arg(&data_sql).redirect_stdout(&merged_sql);
    run_remote(remote, &merge_command, "merge the dump files").await?;

    println!("Cleaning up temporary dump files...");
    let mut cleanup_command = ShellCommand::new("rm");
    if structure_dumped {
        cleanup_command = cleanup_command.arg(&structure_sql);
    }
    cleanup_command = cleanup_command.arg(&data_sql);
    run_remote(remote, &cleanup_command, "remove the intermediate dump files").await?;

    println!("Creating zip file for the backup...");
    run_remote(
        remote,
        &ShellCommand::new("zip")
            .arg("-j")
            .arg(&remote_zip)
            .arg(&merged_sql),
        "compress the merged dump",
    )
    .await?;
    run_remote(
        remote,
        &ShellCommand::new("rm").arg(&merged_sql),
        "remove the uncompressed dump",
    )
    .await?;

    println!("Downloading backup file...");
    fs::create_dir_all(&config.local_backup_directory).with_context(|| {
        format!(
            "Failed to create local backup directory {}",
            config.local_backup_directory.display()
        )
    })?;
    let local_zip = config
        .local_backup_directory
        .join(format!("{}.zip", base_name));
    let bytes = remote
        .download(&remote_zip, &local_zip)
        .await
        .with_context(|| format!("Failed to download backup archive {}", remote_zip))?;

    println!(
        "Backup completed and stored at {} ({} bytes)",
        local_zip.display(),
        bytes
    );
    Ok(local_zip)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    struct FakeRemote {
        commands: Mutex<Vec<String>>,
        downloads: Mutex<Vec<(String, PathBuf)>>,
        fail_on: Option<&'static str>,
    }

    impl FakeRemote {
        fn new(fail_on: Option<&'static str>) -> Self {
            Self {
                commands: Mutex::new(Vec::new()),
                downloads: Mutex::new(Vec::new()),
                fail_on,
            }
        }

        fn commands(&self) -> Vec<String> {
            self.commands.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RemoteShell for FakeRemote {
        async fn exec(&self, command: &ShellCommand) -> Result<CommandOutput> {
            let rendered = command.to_shell_string();
            self.commands.lock().unwrap().push(rendered.clone());
            if let Some(pattern) = self.fail_on {
                if rendered.contains(pattern) {
                    return Ok(CommandOutput {
                        stdout: String::new(),
                        stderr: "simulated failure".to_string(),
                        exit_code: Some(1),
                    });
                }
            }
            Ok(CommandOutput {
                stdout: String::new(),
                stderr: String::new(),
                exit_code: Some(0),
            })
        }

        async fn download(&self, remote_path: &str, local_path: &Path) -> Result<u64> {
            self.downloads
                .lock()
                .unwrap()
                .push((remote_path.to_string(), local_path.to_path_buf()));
            Ok(1024)
        }
    }

    fn test_config(local_dir: &Path) -> BackupJobConfig {
        BackupJobConfig {
            remote_server: "db.example.com".to_string(),
            username: "deploy".to_string(),
            private_key_path: PathBuf::from("/home/deploy/.ssh/id_ed25519"),
            db_name: "shop".to_string(),
            db_username: "backup_user".to_string(),
            db_host: "localhost".to_string(),
            db_port: 3306,
            db_pass: "s3cret".to_string(),
            local_backup_directory: local_dir.to_path_buf(),
            remote_backup_directory: "/tmp/dumps".to_string(),
            tables_to_skip_data: vec!["logs".to_string(), "sessions".to_string()],
        }
    }

    #[tokio::test]
    async fn test_full_sequence_and_artifact_name() -> Result<()> {
        let local_dir = tempfile::tempdir()?;
        let config = test_config(local_dir.path());
        let remote = FakeRemote::new(None);

        let local_zip = perform_backup_orchestration(&config, &remote).await?;

        let name = local_zip.file_name().unwrap().to_string_lossy().to_string();
        assert!(name.ends_with("_shop.zip"), "unexpected artifact name {}", name);

        let commands = remote.commands();
        assert!(commands[0].starts_with("mkdir -p /tmp/dumps"));
        assert!(commands[1].contains("--no-data"));
        assert!(commands[2].contains("--ignore-table=shop.logs --ignore-table=shop.sessions"));
        assert!(commands[3].starts_with("cat "));
        assert!(commands[4].starts_with("rm "));
        assert!(commands[5].starts_with("zip -j"));
        assert!(commands[6].starts_with("rm "));

        let downloads = remote.downloads.lock().unwrap();
        assert_eq!(downloads.len(), 1);
        assert!(downloads[0].0.ends_with("_shop.zip"));
        Ok(())
    }

    #[tokio::test]
    async fn test_merge_concatenates_structure_before_data() -> Result<()> {
        let local_dir = tempfile::tempdir()?;
        let config = test_config(local_dir.path());
        let remote = FakeRemote::new(None);

        perform_backup_orchestration(&config, &remote).await?;

        let commands = remote.commands();
        let merge = commands
            .iter()
            .find(|c| c.starts_with("cat "))
            .expect("merge command present");
        let structure_pos = merge
            .find("_no_data_tables_structure_only.sql")
            .expect("structure file in merge");
        let data_pos = merge.find("_data_tables.sql").expect("data file in merge");
        assert!(structure_pos < data_pos);
        Ok(())
    }

    #[tokio::test]
    async fn test_structure_dump_failure_is_best_effort() -> Result<()> {
        let local_dir = tempfile::tempdir()?;
        let config = test_config(local_dir.path());
        let remote = FakeRemote::new(Some("--no-data"));

        let result = perform_backup_orchestration(&config, &remote).await;
        assert!(result.is_ok(), "pipeline must survive a structure dump failure");

        let commands = remote.commands();
        // The data dump and every later step still ran.
        assert!(commands.iter().any(|c| c.contains("--ignore-table=shop.logs")));
        let merge = commands.iter().find(|c| c.starts_with("cat ")).unwrap();
        assert!(!merge.contains("_no_data_tables_structure_only.sql"));
        assert!(commands.iter().any(|c| c.starts_with("zip -j")));
        assert_eq!(remote.downloads.lock().unwrap().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_data_dump_failure_is_fatal() -> Result<()> {
        let local_dir = tempfile::tempdir()?;
        let config = test_config(local_dir.path());
        let remote = FakeRemote::new(Some("--ignore-table=shop.logs"));

        let result = perform_backup_orchestration(&config, &remote).await;
        assert!(result.is_err());

        let commands = remote.commands();
        assert!(!commands.iter().any(|c| c.starts_with("cat ")));
        assert!(remote.downloads.lock().unwrap().is_empty());
        Ok(())
    }
}
