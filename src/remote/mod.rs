// dbcourier/src/remote/mod.rs
//! SSH session handling for the backup pipeline.
//!
//! One session is opened per backup run, used to execute the dump commands
//! on the database server and to pull the finished archive down.

use anyhow::{Context, Result};
use async_trait::async_trait;
use russh::client;
use russh_keys::key::PublicKey;
use std::path::Path;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::exec::{CommandOutput, ShellCommand};

const DEFAULT_SSH_PORT: u16 = 22;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Anything the backup orchestration needs from the remote side. Kept as a
/// trait so the pipeline can run against a recording fake in tests.
#[async_trait]
pub trait RemoteShell: Send + Sync {
    /// Execute a command on the remote host and capture its output.
    async fn exec(&self, command: &ShellCommand) -> Result<CommandOutput>;

    /// Copy a remote file to a local path, returning the byte count.
    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<u64>;
}

struct SshHandler;

#[async_trait]
impl client::Handler for SshHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        _server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        // Host key checking is left to the operator's known network.
        Ok(true)
    }
}

/// SSH client configured for key-based authentication.
pub struct SshClient {
    host: String,
    port: u16,
    username: String,
    key_path: std::path::PathBuf,
    timeout_secs: u64,
}

impl SshClient {
    pub fn new(host: String, username: String, key_path: std::path::PathBuf) -> Self {
        Self {
            host,
            port: DEFAULT_SSH_PORT,
            username,
            key_path,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    #[allow(dead_code)]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Connect and authenticate, returning a live session.
    pub async fn connect(&self) -> Result<SshSession> {
        let config = Arc::new(client::Config {
            inactivity_timeout: Some(std::time::Duration::from_secs(self.timeout_secs)),
            ..Default::default()
        });

        let addr = format!("{}:{}", self.host, self.port);
        let stream = tokio::time::timeout(
            std::time::Duration::from_secs(self.timeout_secs),
            TcpStream::connect(&addr),
        )
        .await
        .with_context(|| format!("Connection timeout to {}", addr))?
        .with_context(|| format!("Failed to connect to {}", addr))?;

        let mut session = client::connect_stream(config, stream, SshHandler).await?;

        let key = load_private_key(&self.key_path).await?;
        let authenticated = session
            .authenticate_publickey(&self.username, Arc::new(key))
            .await?;

        if !authenticated {
            return Err(anyhow::anyhow!(
                "Authentication failed for user '{}' on {}",
                self.username,
                self.host
            ));
        }

        Ok(SshSession { session })
    }
}

/// Active SSH session scoped to one backup run.
pub struct SshSession {
    session: client::Handle<SshHandler>,
}

impl SshSession {
    /// Run a command line on the remote host, collecting raw output streams.
    async fn run_command(&self, command_line: &str) -> Result<(Vec<u8>, Vec<u8>, Option<u32>)> {
        let mut channel = self.session.channel_open_session().await?;
        channel.exec(true, command_line).await?;

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_status = None;

        loop {
            match channel.wait().await {
                Some(russh::ChannelMsg::Data { data }) => {
                    stdout.extend_from_slice(&data);
                }
                Some(russh::ChannelMsg::ExtendedData { data, ext }) => {
                    if ext == 1 {
                        stderr.extend_from_slice(&data);
                    }
                }
                Some(russh::ChannelMsg::ExitStatus { exit_status: status }) => {
                    exit_status = Some(status);
                }
                Some(russh::ChannelMsg::Eof) => {}
                Some(russh::ChannelMsg::Close) | None => break,
                _ => {}
            }
        }

        Ok((stdout, stderr, exit_status))
    }

    /// Close the session.
    pub async fn disconnect(self) -> Result<()> {
        self.session
            .disconnect(russh::Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }
}

#[async_trait]
impl RemoteShell for SshSession {
    async fn exec(&self, command: &ShellCommand) -> Result<CommandOutput> {
        let command_line = command.to_shell_string();
        let (stdout, stderr, exit_status) = self.run_command(&command_line).await?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&stdout).to_string(),
            stderr: String::from_utf8_lossy(&stderr).to_string(),
            exit_code: exit_status,
        })
    }

    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<u64> {
        // Stream the file over the exec channel; the bytes stay raw so the
        // archive arrives intact.
        let command_line = ShellCommand::new("cat").arg(remote_path).to_shell_string();
        let (stdout, stderr, exit_status) = self.run_command(&command_line).await?;

        if exit_status != Some(0) {
            return Err(anyhow::anyhow!(
                "Failed to read remote file {}: {}",
                remote_path,
                String::from_utf8_lossy(&stderr).trim()
            ));
        }

        if let Some(parent) = local_path.parent() {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent).await.with_context(|| {
                    format!("Failed to create local directory {}", parent.display())
                })?;
            }
        }

        let mut file = tokio::fs::File::create(local_path)
            .await
            .with_context(|| format!("Failed to create local file {}", local_path.display()))?;
        file.write_all(&stdout)
            .await
            .with_context(|| format!("Failed to write local file {}", local_path.display()))?;
        file.flush().await?;

        Ok(stdout.len() as u64)
    }
}

/// Load a private key from file.
async fn load_private_key(path: &Path) -> Result<russh_keys::key::KeyPair> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read private key file: {}", path.display()))?;

    russh_keys::decode_secret_key(&content, None)
        .with_context(|| format!("Failed to decode private key: {}", path.display()))
}
