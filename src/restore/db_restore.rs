// dbcourier/src/restore/db_restore.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use which::which;

use crate::config::RestoreJobConfig;
use crate::exec::CommandOutput;

/// The two operations the restore pipeline needs from a MySQL client.
/// Kept as a trait so the orchestration can be tested without a server.
#[async_trait]
pub trait MysqlClient: Send + Sync {
    /// Run a single SQL statement and capture the client's output.
    async fn run_statement(&self, sql: &str) -> Result<CommandOutput>;

    /// Pipe a SQL file into the given database.
    async fn import_sql_file(&self, database: &str, sql_path: &Path) -> Result<CommandOutput>;
}

/// Finds the mysql executable in the system PATH.
fn find_mysql_executable() -> Result<PathBuf> {
    which("mysql").context(
        "mysql executable not found in PATH. Please ensure MySQL client tools are installed and in your PATH.",
    )
}

/// MySQL client invocation through the `mysql` binary. The password travels
/// via MYSQL_PWD, identifiers are validated at config load, and all
/// arguments are passed as an array, so nothing is shell-interpolated.
pub struct MysqlCli {
    mysql_path: PathBuf,
    host: String,
    port: u16,
    username: String,
    password: String,
}

impl MysqlCli {
    pub fn new(config: &RestoreJobConfig) -> Result<Self> {
        Ok(Self {
            mysql_path: find_mysql_executable()?,
            host: config.db_host.clone(),
            port: config.db_port,
            username: config.db_username.clone(),
            password: config.db_password.clone(),
        })
    }

    fn base_command(&self) -> Command {
        let mut command = Command::new(&self.mysql_path);
        command
            .env("MYSQL_PWD", &self.password)
            .arg("-h")
            .arg(&self.host)
            .arg("-P")
            .arg(self.port.to_string())
            .arg("-u")
            .arg(&self.username);
        command
    }
}

fn capture_output(output: std::process::Output) -> CommandOutput {
    CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code().map(|code| code as u32),
    }
}

#[async_trait]
impl MysqlClient for MysqlCli {
    async fn run_statement(&self, sql: &str) -> Result<CommandOutput> {
        let output = self
            .base_command()
            .arg("-N") // no column header rows in the output
            .arg("-e")
            .arg(sql)
            .output()
            .with_context(|| format!("Failed to execute mysql for statement: {}", sql))?;
        Ok(capture_output(output))
    }

    async fn import_sql_file(&self, database: &str, sql_path: &Path) -> Result<CommandOutput> {
        let dump_file = File::open(sql_path)
            .with_context(|| format!("Failed to open dump file: {}", sql_path.display()))?;
        let output = self
            .base_command()
            .arg(database)
            .stdin(Stdio::from(dump_file))
            .output()
            .with_context(|| {
                format!(
                    "Failed to execute mysql import of {} into database {}",
                    sql_path.display(),
                    database
                )
            })?;
        Ok(capture_output(output))
    }
}

pub fn schema_exists_statement(db_name: &str) -> String {
    // db_name is a validated identifier, see config::validate_identifier.
    format!(
        "SELECT SCHEMA_NAME FROM INFORMATION_SCHEMA.SCHEMATA WHERE SCHEMA_NAME = '{}'",
        db_name
    )
}

pub fn drop_database_statement(db_name: &str) -> String {
    format!("DROP DATABASE IF EXISTS `{}`", db_name)
}

pub fn create_database_statement(db_name: &str) -> String {
    format!("CREATE DATABASE `{}`", db_name)
}

/// Checks the metadata catalog for the database. Existence is decided from
/// the query's result rows, not from the client's exit status.
pub async fn database_exists(client: &dyn MysqlClient, db_name: &str) -> Result<bool> {
    let output = client
        .run_statement(&schema_exists_statement(db_name))
        .await?;
    if !output.success() {
        return Err(anyhow::anyhow!(
            "Failed to check existence of database '{}': {}",
            db_name,
            output.stderr.trim()
        ));
    }
    Ok(output.stdout.lines().any(|line| line.trim() == db_name))
}

/// Drops the target database if present, recreates it, and imports the dump.
/// Any step failure aborts; later steps are never attempted.
pub async fn replace_target_database(
    client: &dyn MysqlClient,
    db_name: &str,
    dump_path: &Path,
) -> Result<()> {
    println!("Checking if database '{}' exists...", db_name);
    if database_exists(client, db_name).await? {
        println!("Database '{}' exists. Dropping it...", db_name);
        let output = client
            .run_statement(&drop_database_statement(db_name))
            .await?;
        if !output.success() {
            return Err(anyhow::anyhow!(
                "Failed to drop database '{}': {}",
                db_name,
                output.stderr.trim()
            ));
        }
    }

    println!("Creating database '{}'...", db_name);
    let output = client
        .run_statement(&create_database_statement(db_name))
        .await?;
    if !output.success() {
        return Err(anyhow::anyhow!(
            "Failed to create database '{}': {}",
            db_name,
            output.stderr.trim()
        ));
    }

    println!(
        "Replacing schema in database '{}' from {}...",
        db_name,
        dump_path.display()
    );
    let output = client.import_sql_file(db_name, dump_path).await?;
    if !output.success() {
        return Err(anyhow::anyhow!(
            "Error importing schema into '{}': {}",
            db_name,
            output.stderr.trim()
        ));
    }

    println!("Schema replacement completed successfully.");
    Ok(())
}
