//! Submission invoker: hands one encoded batch to `oracle-cli`

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::error::{OracleError, Result};

pub const CLI_BINARY: &str = "oracle-cli";

/// Outcome of one submission attempt, as written to the audit log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub command: String,
    pub success: bool,
    /// Combined stdout and stderr
    pub output: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubmissionInvoker: Send + Sync {
    /// Submit a base64 price payload to the given oracle contract.
    async fn add_prices(&self, contract_id: &str, payload: &str) -> Result<Invocation>;
}

/// Arguments passed to `oracle-cli` for one batch.
pub fn add_prices_args(contract_id: &str, payload: &str) -> Vec<String> {
    vec![
        "--oracle-contract-id".to_string(),
        contract_id.to_string(),
        "oracle".to_string(),
        "add-prices-base64".to_string(),
        payload.to_string(),
    ]
}

/// Runs `oracle-cli` as a child process, without a shell.
#[derive(Debug, Clone)]
pub struct CliSubprocessInvoker {
    program: PathBuf,
}

impl CliSubprocessInvoker {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Use `cli_path` if set, otherwise `oracle-cli` next to the running executable.
    pub fn from_config(cli_path: &str) -> Result<Self> {
        if !cli_path.trim().is_empty() {
            return Ok(Self::new(cli_path.trim()));
        }
        let exe = std::env::current_exe()?;
        let dir = exe.parent().ok_or_else(|| {
            OracleError::Config(format!("cannot locate {CLI_BINARY} next to {}", exe.display()))
        })?;
        Ok(Self::new(dir.join(CLI_BINARY)))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

#[async_trait]
impl SubmissionInvoker for CliSubprocessInvoker {
    async fn add_prices(&self, contract_id: &str, payload: &str) -> Result<Invocation> {
        let args = add_prices_args(contract_id, payload);
        let command = args.join(" ");
        debug!(program = %self.program.display(), %command, "spawning");

        // A failed spawn is a failed submission, not a fatal error, so it ends up in the audit log.
        let invocation = match Command::new(&self.program).args(&args).output().await {
            Ok(out) => {
                let mut output = String::from_utf8_lossy(&out.stdout).into_owned();
                output.push_str(&String::from_utf8_lossy(&out.stderr));
                Invocation {
                    command,
                    success: out.status.success(),
                    output,
                }
            }
            Err(e) => Invocation {
                command,
                success: false,
                output: format!("failed to run {}: {e}", self.program.display()),
            },
        };
        Ok(invocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_target_contract_and_payload() {
        assert_eq!(
            add_prices_args("CXLM", "W10="),
            vec![
                "--oracle-contract-id",
                "CXLM",
                "oracle",
                "add-prices-base64",
                "W10="
            ]
        );
    }

    #[test]
    fn explicit_cli_path_wins() {
        let invoker = CliSubprocessInvoker::from_config(" /opt/oracle/bin/oracle-cli ").unwrap();
        assert_eq!(invoker.program(), Path::new("/opt/oracle/bin/oracle-cli"));

        let invoker = CliSubprocessInvoker::from_config("").unwrap();
        assert!(invoker.program().ends_with(CLI_BINARY));
    }

    #[tokio::test]
    async fn missing_binary_is_reported_as_failure() {
        let invoker = CliSubprocessInvoker::new("/nonexistent/oracle-cli");
        let invocation = invoker.add_prices("CUSD", "W10=").await.unwrap();
        assert!(!invocation.success);
        assert_eq!(
            invocation.command,
            "--oracle-contract-id CUSD oracle add-prices-base64 W10="
        );
        assert!(invocation.output.contains("failed to run"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn captures_exit_status_and_output() {
        let invoker = CliSubprocessInvoker::new("echo");
        let invocation = invoker.add_prices("CUSD", "W10=").await.unwrap();
        assert!(invocation.success);
        assert!(invocation.output.contains("add-prices-base64 W10="));

        let invoker = CliSubprocessInvoker::new("false");
        let invocation = invoker.add_prices("CUSD", "W10=").await.unwrap();
        assert!(!invocation.success);
    }
}
