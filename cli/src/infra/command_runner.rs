//! Local process execution for `ssh` and `scp`, with a hard timeout.

use std::process::{Output, Stdio};
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Child;

use crate::application::ports::CommandRunner;

/// Default timeout for a single remote command, including connection setup.
pub const DEFAULT_CMD_TIMEOUT: Duration = Duration::from_secs(300);

/// `CommandRunner` backed by `tokio::process`. The child is killed
/// explicitly when the timeout fires.
pub struct TokioCommandRunner {
    timeout: Duration,
}

impl TokioCommandRunner {
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for TokioCommandRunner {
    fn default() -> Self {
        Self::new(DEFAULT_CMD_TIMEOUT)
    }
}

impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        self.run_with_timeout(program, args, self.timeout).await
    }

    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output> {
        tracing::trace!(program, ?args, "spawning");
        let mut child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("failed to spawn {program}"))?;

        let collected = tokio::time::timeout(timeout, collect(&mut child)).await;
        match collected {
            Ok(output) => output.with_context(|| format!("waiting for {program}")),
            Err(_) => {
                if let Err(e) = child.kill().await {
                    tracing::warn!(program, error = %e, "cannot kill timed-out child");
                }
                anyhow::bail!("{program} timed out after {}s", timeout.as_secs())
            }
        }
    }
}

/// Drain both pipes while waiting, so a chatty child cannot block on a full
/// pipe buffer.
async fn collect(child: &mut Child) -> std::io::Result<Output> {
    let (stdout_pipe, stderr_pipe) = (child.stdout.take(), child.stderr.take());
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let (status, out, err) = tokio::join!(
        child.wait(),
        drain(stdout_pipe, &mut stdout),
        drain(stderr_pipe, &mut stderr),
    );
    out?;
    err?;
    Ok(Output {
        status: status?,
        stdout,
        stderr,
    })
}

async fn drain(pipe: Option<impl AsyncRead + Unpin>, buf: &mut Vec<u8>) -> std::io::Result<()> {
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(buf).await?;
    }
    Ok(())
}
