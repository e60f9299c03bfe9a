// dbcourier/src/config/mod.rs
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_DB_HOST: &str = "localhost";
pub const DEFAULT_DB_PORT: u16 = 3306;

/// Raw key/value view of the config file. Keys mirror the file verbatim;
/// everything is optional here and validated per-operation below.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfig {
    #[serde(rename = "REMOTE_SERVER")]
    pub remote_server: Option<String>,
    #[serde(rename = "USERNAME")]
    pub username: Option<String>,
    #[serde(rename = "PRIVATE_KEY_PATH")]
    pub private_key_path: Option<PathBuf>,
    #[serde(rename = "DB_NAME")]
    pub db_name: Option<String>,
    #[serde(rename = "DB_USERNAME")]
    pub db_username: Option<String>,
    #[serde(rename = "DB_HOST")]
    pub db_host: Option<String>,
    #[serde(rename = "DB_PORT")]
    pub db_port: Option<u16>,
    #[serde(rename = "DB_PASS")]
    pub db_pass: Option<String>,
    #[serde(rename = "LOCAL_BACKUP_DIRECTORY")]
    pub local_backup_directory: Option<PathBuf>,
    #[serde(rename = "REMOTE_BACKUP_DIRECTORY")]
    pub remote_backup_directory: Option<String>,
    #[serde(rename = "TABLES_TO_SKIP_DATA")]
    pub tables_to_skip_data: Option<serde_json::Value>,
    #[serde(rename = "DOCKER_HOST")]
    pub docker_host: Option<String>,
    #[serde(rename = "DOCKER_PORT")]
    pub docker_port: Option<u16>,
    #[serde(rename = "DB_PASSWORD")]
    pub db_password: Option<String>,
}

/// Everything a backup run needs, fully validated.
#[derive(Debug, Clone)]
pub struct BackupJobConfig {
    pub remote_server: String,
    pub username: String,
    pub private_key_path: PathBuf,
    pub db_name: String,
    pub db_username: String,
    pub db_host: String,
    pub db_port: u16,
    pub db_pass: String,
    pub local_backup_directory: PathBuf,
    pub remote_backup_directory: String,
    pub tables_to_skip_data: Vec<String>,
}

/// Everything a restore run needs, fully validated.
#[derive(Debug, Clone)]
pub struct RestoreJobConfig {
    pub db_host: String,
    pub db_port: u16,
    pub db_name: String,
    pub db_username: String,
    pub db_password: String,
}

pub fn load_raw_config(config_path: &Path) -> Result<RawConfig> {
    let config_content = fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config file at {}", config_path.display()))?;
    serde_json::from_str(&config_content).with_context(|| {
        format!(
            "Failed to parse JSON from config file at {}",
            config_path.display()
        )
    })
}

pub fn load_backup_config(raw: &RawConfig) -> Result<BackupJobConfig> {
    let remote_server = raw
        .remote_server
        .as_ref()
        .context("REMOTE_SERVER must be set in the config file for backup")?
        .clone();
    let username = raw
        .username
        .as_ref()
        .context("USERNAME must be set in the config file for backup")?
        .clone();
    let private_key_path = raw
        .private_key_path
        .as_ref()
        .context("PRIVATE_KEY_PATH must be set in the config file for backup")?
        .clone();
    let db_name = raw
        .db_name
        .as_ref()
        .context("DB_NAME must be set in the config file for backup")?
        .clone();
    let db_username = raw
        .db_username
        .as_ref()
        .context("DB_USERNAME must be set in the config file for backup")?
        .clone();
    let db_pass = raw
        .db_pass
        .as_ref()
        .context("DB_PASS must be set in the config file for backup")?
        .clone();
    let local_backup_directory = raw
        .local_backup_directory
        .as_ref()
        .context("LOCAL_BACKUP_DIRECTORY must be set in the config file for backup")?
        .clone();
    let remote_backup_directory = raw
        .remote_backup_directory
        .as_ref()
        .context("REMOTE_BACKUP_DIRECTORY must be set in the config file for backup")?
        .clone();

    if local_backup_directory.to_string_lossy().is_empty() {
        return Err(anyhow::anyhow!(
            "LOCAL_BACKUP_DIRECTORY cannot be empty in the config file."
        ));
    }
    if remote_backup_directory.trim().is_empty() {
        return Err(anyhow::anyhow!(
            "REMOTE_BACKUP_DIRECTORY cannot be empty in the config file."
        ));
    }

    validate_identifier("database", &db_name)?;
    let tables_to_skip_data = parse_tables_to_skip(&raw.tables_to_skip_data)?;
    for table in &tables_to_skip_data {
        validate_identifier("table", table)?;
    }

    Ok(BackupJobConfig {
        remote_server,
        username,
        private_key_path,
        db_name,
        db_username,
        db_host: raw
            .db_host
            .clone()
            .unwrap_or_else(|| DEFAULT_DB_HOST.to_string()),
        db_port: raw.db_port.unwrap_or(DEFAULT_DB_PORT),
        db_pass,
        local_backup_directory,
        remote_backup_directory,
        tables_to_skip_data,
    })
}

pub fn load_restore_config(raw: &RawConfig) -> Result<RestoreJobConfig> {
    let db_host = raw
        .docker_host
        .as_ref()
        .context("DOCKER_HOST must be set in the config file for restore")?
        .clone();
    let db_name = raw
        .db_name
        .as_ref()
        .context("DB_NAME must be set in the config file for restore")?
        .clone();
    let db_username = raw
        .db_username
        .as_ref()
        .context("DB_USERNAME must be set in the config file for restore")?
        .clone();
    let db_password = raw
        .db_password
        .as_ref()
        .context("DB_PASSWORD must be set in the config file for restore")?
        .clone();

    validate_identifier("database", &db_name)?;

    Ok(RestoreJobConfig {
        db_host,
        db_port: raw.docker_port.unwrap_or(DEFAULT_DB_PORT),
        db_name,
        db_username,
        db_password,
    })
}

/// Rejects anything that is not a plain MySQL identifier. Database and table
/// names end up inside command lines and SQL statements, so only
/// alphanumerics, '_' and '-' are allowed.
pub fn validate_identifier(kind: &str, name: &str) -> Result<()> {
    if name.trim().is_empty()
        || name.contains(|c: char| !c.is_ascii_alphanumeric() && c != '_' && c != '-')
    {
        return Err(anyhow::anyhow!(
            "Invalid {} name {:?}: only alphanumeric characters, '_' and '-' are allowed",
            kind,
            name
        ));
    }
    Ok(())
}

/// Parses TABLES_TO_SKIP_DATA, which is either a JSON array of table names or
/// a newline-separated string (the format older config files used).
fn parse_tables_to_skip(value: &Option<serde_json::Value>) -> Result<Vec<String>> {
    match value {
        Some(value) => {
            if value.is_array() {
                let tables: Vec<String> = serde_json::from_value(value.clone())
                    .context("Failed to parse TABLES_TO_SKIP_DATA as an array of table names")?;
                Ok(tables)
            } else if let Some(text) = value.as_str() {
                Ok(text
                    .lines()
                    .map(|line| line.trim().to_string())
                    .filter(|line| !line.is_empty())
                    .collect())
            } else {
                Err(anyhow::anyhow!(
                    "TABLES_TO_SKIP_DATA must be either an array of table names or a newline-separated string"
                ))
            }
        }
        None => Ok(Vec::new()),
    }
}
