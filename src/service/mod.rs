use serde::Serialize;
use thiserror::Error;
use tokio::process::Command;

/// Errors from the process supervisor boundary
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("`{command}` failed: {output}")]
    Command { command: String, output: String },
}

/// Current state of the managed unit
#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub active: bool,
    pub enabled: bool,
    pub message: String,
}

/// Controls the sing-box systemd unit. Every operation maps 1:1 to a
/// systemctl/journalctl invocation; failures carry the command's combined
/// output and are never retried.
#[derive(Debug, Clone)]
pub struct ServiceController {
    unit: String,
}

impl ServiceController {
    pub fn new(unit: impl Into<String>) -> Self {
        Self { unit: unit.into() }
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Query activation and enablement state plus the raw status text.
    /// `is-active`/`is-enabled` exit non-zero for inactive units, so exit
    /// codes are ignored here and only the output matters.
    pub async fn status(&self) -> Result<ServiceStatus, ServiceError> {
        let active = self.query_state("is-active").await? == "active";
        let enabled = self.query_state("is-enabled").await? == "enabled";

        let message = match run_raw("systemctl", &["status", self.unit.as_str()]).await {
            Ok((_, output)) => output,
            Err(e) => return Err(e),
        };

        Ok(ServiceStatus {
            active,
            enabled,
            message,
        })
    }

    async fn query_state(&self, verb: &str) -> Result<String, ServiceError> {
        let (_, output) = run_raw("systemctl", &[verb, self.unit.as_str()]).await?;
        Ok(output.trim().to_string())
    }

    pub async fn start(&self) -> Result<(), ServiceError> {
        self.systemctl("start").await
    }

    pub async fn stop(&self) -> Result<(), ServiceError> {
        self.systemctl("stop").await
    }

    pub async fn restart(&self) -> Result<(), ServiceError> {
        self.systemctl("restart").await
    }

    /// Apply a changed configuration without a hard restart where the unit
    /// supports it.
    pub async fn reload(&self) -> Result<(), ServiceError> {
        self.systemctl("reload-or-restart").await
    }

    pub async fn enable(&self) -> Result<(), ServiceError> {
        self.systemctl("enable").await
    }

    pub async fn disable(&self) -> Result<(), ServiceError> {
        self.systemctl("disable").await
    }

    /// Fetch the last `lines` journal lines for the unit.
    pub async fn logs(&self, lines: u32) -> Result<String, ServiceError> {
        let lines = lines.to_string();
        let args = ["-u", self.unit.as_str(), "-n", lines.as_str(), "--no-pager"];
        let (success, output) = run_raw("journalctl", &args).await?;
        if !success {
            return Err(ServiceError::Command {
                command: format!("journalctl {}", args.join(" ")),
                output,
            });
        }
        Ok(output)
    }

    async fn systemctl(&self, verb: &str) -> Result<(), ServiceError> {
        let args = [verb, self.unit.as_str()];
        let (success, output) = run_raw("systemctl", &args).await?;
        if !success {
            return Err(ServiceError::Command {
                command: format!("systemctl {verb} {}", self.unit),
                output,
            });
        }
        Ok(())
    }
}

/// Run a command and return (succeeded, combined stdout+stderr).
async fn run_raw(program: &str, args: &[&str]) -> Result<(bool, String), ServiceError> {
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|source| ServiceError::Spawn {
            command: format!("{program} {}", args.join(" ")),
            source,
        })?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));
    Ok((output.status.success(), combined))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn spawn_failure_is_reported() {
        let err = run_raw("sbadmin-no-such-binary", &[]).await.unwrap_err();
        assert!(matches!(err, ServiceError::Spawn { .. }));
    }

    #[tokio::test]
    async fn combined_output_is_captured() {
        let (success, output) = run_raw("echo", &["hello"]).await.expect("echo runs");
        assert!(success);
        assert_eq!(output.trim(), "hello");
    }
}
