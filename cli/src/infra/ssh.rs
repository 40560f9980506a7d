//! `RemoteShell` over the system OpenSSH client (`ssh` / `scp`).
//!
//! Key material is written to a private temporary file that exists only for
//! the duration of a single call. It never appears on the command line.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Output;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

use crate::application::ports::{CommandOutput, CommandRunner, RemoteShell, RemoteTarget};
use crate::domain::PrivateKey;

/// Location of the known-hosts file used for deployed machines.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn default_known_hosts() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.join(".stratus").join("known_hosts"))
}

/// Production `RemoteShell`: shells out to `ssh` and `scp` through a
/// [`CommandRunner`].
pub struct OpenSshShell<R> {
    runner: R,
    known_hosts: PathBuf,
    connect_timeout_secs: u64,
}

impl<R: CommandRunner> OpenSshShell<R> {
    #[must_use]
    pub fn new(runner: R, known_hosts: PathBuf, connect_timeout_secs: u64) -> Self {
        Self {
            runner,
            known_hosts,
            connect_timeout_secs,
        }
    }

    /// Options shared by `ssh` and `scp`.
    fn common_args(&self, identity: &Path) -> Vec<String> {
        vec![
            "-i".to_owned(),
            identity.display().to_string(),
            "-o".to_owned(),
            "BatchMode=yes".to_owned(),
            "-o".to_owned(),
            "IdentitiesOnly=yes".to_owned(),
            "-o".to_owned(),
            "StrictHostKeyChecking=accept-new".to_owned(),
            "-o".to_owned(),
            format!("UserKnownHostsFile={}", self.known_hosts.display()),
            "-o".to_owned(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
        ]
    }

    fn prepare_known_hosts(&self) -> Result<()> {
        if let Some(parent) = self.known_hosts.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir {}", parent.display()))?;
            set_permissions(parent, 0o700)?;
        }
        Ok(())
    }

    async fn invoke(&self, program: &str, args: &[String]) -> Result<Output> {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        self.runner.run(program, &args).await
    }
}

impl<R: CommandRunner> RemoteShell for OpenSshShell<R> {
    async fn exec(&self, target: &RemoteTarget<'_>, command: &str) -> Result<CommandOutput> {
        self.prepare_known_hosts()?;
        let identity = identity_file(target.key)?;
        let mut args = self.common_args(identity.path());
        args.push(format!("{}@{}", target.user, target.host));
        args.push(command.to_owned());

        let output = self.invoke("ssh", &args).await?;
        check_status("ssh", &output)?;
        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn copy_file(
        &self,
        target: &RemoteTarget<'_>,
        local: &Path,
        remote: &str,
    ) -> Result<()> {
        anyhow::ensure!(local.is_file(), "{} does not exist", local.display());
        self.prepare_known_hosts()?;
        let identity = identity_file(target.key)?;
        let mut args = self.common_args(identity.path());
        args.push(local.display().to_string());
        args.push(format!("{}@{}:{remote}", target.user, target.host));

        let output = self.invoke("scp", &args).await?;
        check_status("scp", &output)
    }
}

/// Write `key` to a 0600 temporary file, removed when the handle drops.
fn identity_file(key: &PrivateKey) -> Result<NamedTempFile> {
    let mut file = tempfile::Builder::new()
        .prefix("stratus-key-")
        .tempfile()
        .context("create identity file")?;
    set_permissions(file.path(), 0o600)?;
    file.write_all(key.expose()).context("write identity file")?;
    // OpenSSH rejects a key without a trailing newline.
    if !key.expose().ends_with(b"\n") {
        file.write_all(b"\n").context("write identity file")?;
    }
    file.flush().context("write identity file")?;
    Ok(file)
}

fn check_status(program: &str, output: &Output) -> Result<()> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr);
    match output.status.code() {
        Some(code) => anyhow::bail!("{program} exited with status {code}: {}", stderr.trim()),
        None => anyhow::bail!("{program} was terminated by a signal: {}", stderr.trim()),
    }
}

#[cfg(unix)]
fn set_permissions(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .with_context(|| format!("set permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn set_permissions(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}
