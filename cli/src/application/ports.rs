//! Seams between the stack declaration and the outside world.
//!
//! Everything here depends on `crate::domain` only; the adapters live in
//! `crate::infra` and the test doubles in `tests/unit/mocks.rs`.

use std::path::{Path, PathBuf};
use std::process::Output;
use std::time::Duration;

use anyhow::Result;

use crate::domain::PrivateKey;
use crate::domain::config::DeployConfig;
use crate::domain::resource::{
    Certificate, CertificateSpec, DnsRecord, DnsRecordSpec, Domain, Droplet, DropletSpec,
    LoadBalancer, LoadBalancerSpec, SshKey,
};

// ── Values ───────────────────────────────────────────────────────────────────

/// Where and as whom a remote command runs. Borrowed for a single call.
#[derive(Debug, Clone, Copy)]
pub struct RemoteTarget<'a> {
    pub host: &'a str,
    pub user: &'a str,
    pub key: &'a PrivateKey,
}

/// Captured output of a remote command that exited successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

// ── Provider Port ─────────────────────────────────────────────────────────────

/// Cloud provider operations.
///
/// `ensure_*` calls are idempotent: when a resource with the same name
/// already exists it is returned instead of creating a second one, so a
/// re-run after a partial failure converges.
#[allow(async_fn_in_trait)]
pub trait CloudProvider {
    /// Look up an account SSH key by name; `None` if there is none.
    async fn lookup_ssh_key(&self, name: &str) -> Result<Option<SshKey>>;
    /// Look up a managed DNS zone by name; `None` if there is none.
    async fn lookup_domain(&self, name: &str) -> Result<Option<Domain>>;
    /// Create (or find) a droplet and wait until it has a public IPv4.
    async fn ensure_droplet(&self, spec: &DropletSpec) -> Result<Droplet>;
    async fn ensure_certificate(&self, spec: &CertificateSpec) -> Result<Certificate>;
    /// Create (or find) a load balancer and wait until it has an IP.
    async fn ensure_load_balancer(&self, spec: &LoadBalancerSpec) -> Result<LoadBalancer>;
    async fn ensure_dns_record(&self, spec: &DnsRecordSpec) -> Result<DnsRecord>;
}

// ── Remote Shell Port ─────────────────────────────────────────────────────────

/// Command execution and file upload on a remote machine.
#[allow(async_fn_in_trait)]
pub trait RemoteShell {
    /// Run `command` on `target`.
    ///
    /// # Errors
    ///
    /// Returns an error on authentication failure, unreachable host, timeout,
    /// or a non-zero exit status (the message carries the captured stderr).
    async fn exec(&self, target: &RemoteTarget<'_>, command: &str) -> Result<CommandOutput>;
    /// Upload `local` to `remote` on `target`.
    async fn copy_file(&self, target: &RemoteTarget<'_>, local: &Path, remote: &str)
    -> Result<()>;
}

// ── Network Probe Port ────────────────────────────────────────────────────────

/// Reachability check used while a fresh machine settles.
#[allow(async_fn_in_trait)]
pub trait NetworkProbe {
    /// `Ok(false)` when nothing accepts connections on `host:port` yet.
    async fn check_tcp_connectivity(&self, host: &str, port: u16) -> Result<bool>;
}

// ── Credential and Config Ports ───────────────────────────────────────────────

/// Source of SSH private-key material.
pub trait KeySource {
    /// Read the private key stored at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the key cannot be read or is empty.
    fn read_private_key(&self, path: &str) -> Result<PrivateKey>;
}

/// Loads the deployment configuration.
pub trait ConfigStore {
    /// Load the config, falling back to defaults when no file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    fn load(&self) -> Result<DeployConfig>;
    /// Location of the config file.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    fn path(&self) -> Result<PathBuf>;
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Local process execution; `ssh` and `scp` go through here.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Run with the runner's own timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`,
    /// in which case the child is killed.
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: Duration,
    ) -> Result<Output>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Progress lines emitted by [`provision`](crate::application::services::stack::provision).
pub trait ProgressReporter {
    /// Something long-running has started.
    fn step(&self, message: &str);
    /// A node succeeded.
    fn success(&self, message: &str);
    /// A node failed or was skipped.
    fn warn(&self, message: &str);
}
