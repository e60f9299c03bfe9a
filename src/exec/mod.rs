// dbcourier/src/exec/mod.rs

/// Captured result of a command execution, local or remote.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<u32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// A shell command assembled from discrete parts instead of interpolated
/// strings. Every argument, environment value and redirect target is quoted
/// when the command is rendered, so config values can never smuggle extra
/// shell syntax into the remote command line.
#[derive(Debug, Clone)]
pub struct ShellCommand {
    program: String,
    args: Vec<String>,
    env: Vec<(String, String)>,
    stdout_redirect: Option<String>,
}

impl ShellCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            stdout_redirect: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Sets an environment variable for the command, rendered through `env`.
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Redirects the command's stdout to the given remote path.
    pub fn redirect_stdout(mut self, path: impl Into<String>) -> Self {
        self.stdout_redirect = Some(path.into());
        self
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    /// Renders the command to a single shell line with every part quoted.
    pub fn to_shell_string(&self) -> String {
        let mut parts = Vec::new();
        if !self.env.is_empty() {
            parts.push("env".to_string());
            for (key, value) in &self.env {
                parts.push(shell_quote(&format!("{}={}", key, value)));
            }
        }
        parts.push(shell_quote(&self.program));
        parts.extend(self.args.iter().map(|arg| shell_quote(arg)));
        if let Some(path) = &self.stdout_redirect {
            parts.push(">".to_string());
            parts.push(shell_quote(path));
        }
        parts.join(" ")
    }
}

/// Single-quotes a value unless it consists entirely of characters that no
/// POSIX shell interprets specially.
fn shell_quote(value: &str) -> String {
    let is_safe = |c: char| {
        c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | '/' | '=' | ':' | ',' | '@' | '%' | '+')
    };
    if !value.is_empty() && value.chars().all(is_safe) {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_output_success() {
        let output = CommandOutput {
            stdout: "hello".to_string(),
            stderr: String::new(),
            exit_code: Some(0),
        };
        assert!(output.success());

        let failed = CommandOutput {
            stdout: String::new(),
            stderr: "error".to_string(),
            exit_code: Some(1),
        };
        assert!(!failed.success());
    }

    #[test]
    fn test_plain_arguments_stay_bare() {
        let cmd = ShellCommand::new("mkdir").arg("-p").arg("/tmp/dumps");
        assert_eq!(cmd.to_shell_string(), "mkdir -p /tmp/dumps");
    }

    #[test]
    fn test_special_characters_are_quoted() {
        let cmd = ShellCommand::new("echo").arg("a b").arg("x;rm -rf /");
        assert_eq!(cmd.to_shell_string(), "echo 'a b' 'x;rm -rf /'");
    }

    #[test]
    fn test_single_quotes_are_escaped() {
        let cmd = ShellCommand::new("echo").arg("it's");
        assert_eq!(cmd.to_shell_string(), r"echo 'it'\''s'");
    }

    #[test]
    fn test_env_prefix_and_redirect() {
        let cmd = ShellCommand::new("mysqldump")
            .env("MYSQL_PWD", "p a$s")
            .arg("--no-data")
            .arg("shop")
            .redirect_stdout("/tmp/dumps/out file.sql");
        assert_eq!(
            cmd.to_shell_string(),
            "env 'MYSQL_PWD=p a$s' mysqldump --no-data shop > '/tmp/dumps/out file.sql'"
        );
    }

    #[test]
    fn test_empty_argument_is_quoted() {
        let cmd = ShellCommand::new("echo").arg("");
        assert_eq!(cmd.to_shell_string(), "echo ''");
    }
}
