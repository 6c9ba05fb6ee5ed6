/// External command execution shared by the kubectl, kind and docker backends
use anyhow::{Context, Result};
use std::ffi::OsStr;
use std::process::Stdio;
use tokio::process::{Child, Command};
use tracing::debug;

/// Result from command execution with captured output
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl CommandOutput {
    /// Create from tokio Command output
    fn from_output(output: std::process::Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            success: output.status.success(),
        }
    }

    /// Whether a failed command reported that its target does not exist
    pub fn is_not_found(&self) -> bool {
        !self.success && is_not_found_message(&self.stderr)
    }

    /// Return Ok if successful, otherwise error with stderr
    pub fn into_result(self) -> Result<String> {
        if self.success {
            Ok(self.stdout)
        } else {
            anyhow::bail!("{}", self.stderr.trim())
        }
    }
}

/// kubectl reports `(NotFound)`, kind `No kind clusters found`, docker `No such container`
pub fn is_not_found_message(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    stderr.contains("(notfound)")
        || stderr.contains("no kind clusters found")
        || stderr.contains("no such container")
}

/// Builder for executing external commands with common patterns
pub struct CommandBuilder {
    program: String,
    command: Command,
    context_msg: Option<String>,
}

impl CommandBuilder {
    /// Create a new command builder
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        let mut command = Command::new(program.as_ref());
        command.stdout(Stdio::piped()).stderr(Stdio::piped());
        Self {
            program: program.as_ref().to_string_lossy().to_string(),
            command,
            context_msg: None,
        }
    }

    /// Add a single argument
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.command.arg(arg);
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.command.args(args);
        self
    }

    /// Set context message for error reporting
    pub fn context<S: Into<String>>(mut self, msg: S) -> Self {
        self.context_msg = Some(msg.into());
        self
    }

    /// Execute and return raw output
    pub async fn output(mut self) -> Result<CommandOutput> {
        debug!("exec {} {:?}", self.program, self.command.as_std().get_args());
        let ctx = self
            .context_msg
            .take()
            .unwrap_or_else(|| format!("Failed to execute {}", self.program));
        let output = self.command.output().await.context(ctx)?;
        Ok(CommandOutput::from_output(output))
    }

    /// Execute and return stdout on success, error on failure
    pub async fn run(self) -> Result<String> {
        self.output().await?.into_result()
    }

    /// Execute and ignore output (just check success)
    pub async fn run_silent(self) -> Result<()> {
        self.output().await?.into_result().map(|_| ())
    }

    /// Start the command attached to the operator's terminal
    ///
    /// The child is killed if its handle is dropped.
    pub fn spawn_attached(mut self) -> Result<Child> {
        let ctx = self
            .context_msg
            .take()
            .unwrap_or_else(|| format!("Failed to start {}", self.program));
        self.command
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .context(ctx)
    }
}

/// Check if a command-line tool is installed
pub async fn check_tool_installed(
    tool_name: &str,
    version_args: &[&str],
    install_url: &str,
) -> Result<()> {
    let output = CommandBuilder::new(tool_name)
        .args(version_args)
        .output()
        .await;

    match output {
        Ok(out) if out.success => Ok(()),
        _ => anyhow::bail!(
            "{} is not installed or not in PATH. Please install from {}",
            tool_name,
            install_url
        ),
    }
}
