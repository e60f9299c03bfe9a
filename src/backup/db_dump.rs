// dbcourier/src/backup/db_dump.rs
use chrono::{DateTime, Local};

use crate::config::BackupJobConfig;
use crate::exec::ShellCommand;

/// Base name shared by every file one backup run produces.
pub fn artifact_base_name(db_name: &str, now: DateTime<Local>) -> String {
    format!("{}_{}", now.format("%Y%m%d%H%M%S"), db_name)
}

fn mysqldump_base(config: &BackupJobConfig) -> ShellCommand {
    ShellCommand::new("mysqldump")
        .env("MYSQL_PWD", &config.db_pass)
        .arg("-h")
        .arg(&config.db_host)
        .arg("-P")
        .arg(config.db_port.to_string())
        .arg("-u")
        .arg(&config.db_username)
        .arg("--opt")
        .arg("--no-tablespaces")
        .arg("--set-gtid-purged=OFF")
}

/// Structure-only dump of every table in the database.
///
/// The skip-list deliberately does not apply here: it only filters row data
/// out of the data dump, while table definitions are always captured in full.
pub fn structure_dump_command(config: &BackupJobConfig, output_path: &str) -> ShellCommand {
    mysqldump_base(config)
        .arg("--no-data")
        .arg(&config.db_name)
        .redirect_stdout(output_path)
}

/// Full data dump with one `--ignore-table` flag per skip-list entry.
pub fn data_dump_command(config: &BackupJobConfig, output_path: &str) -> ShellCommand {
    let mut command = mysqldump_base(config).arg(&config.db_name);
    for table in &config.tables_to_skip_data {
        command = command.arg(format!("--ignore-table={}.{}", config.db_name, table));
    }
    command.redirect_stdout(output_path)
}
