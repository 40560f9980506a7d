//! Remote command chain: wait for the machine, upload the unit file, then
//! activate it with strictly ordered shell commands.
//!
//! Every step is a [`NodeKind::Remote`] node with exactly one explicit
//! predecessor, so step *i+1* never starts before step *i* has finished and
//! a failing step leaves the rest of the chain unexecuted.

use std::path::PathBuf;
use std::rc::Rc;

use crate::application::ports::{CommandOutput, NetworkProbe, RemoteShell};
use crate::application::services::connection::Connection;
use crate::application::services::settle::wait_until_reachable;
use crate::domain::config::ServiceConfig;
use crate::domain::{DeployError, SettlePolicy};
use crate::engine::{Deferred, Failure, Needs, Node, NodeKind, Plan, Settled};

/// Name of the node that waits for the machine to accept connections.
pub const SETTLE_STEP: &str = "settle";

/// A declared remote step; resolves to the command's captured output.
pub type Step = Node<CommandOutput>;

/// One entry of the activation chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationCommand {
    pub name: String,
    pub command: String,
}

/// The ordered commands that register and start the service unit.
#[must_use]
pub fn activation_commands(service: &ServiceConfig) -> Vec<ActivationCommand> {
    [
        ("where-is-docker", "which docker".to_owned()),
        ("open-firewall", format!("ufw allow {}", service.firewall_port)),
        (
            "enable-systemd-manifest",
            format!("systemctl enable {}", service.unit),
        ),
        (
            "start-systemd-manifest",
            format!("systemctl start {}", service.unit),
        ),
    ]
    .into_iter()
    .map(|(name, command)| ActivationCommand {
        name: name.to_owned(),
        command,
    })
    .collect()
}

/// Declare the wait between `machine` and the first remote access.
///
/// # Errors
///
/// Returns a construction error from [`Plan::declare`].
pub fn settle<Q, T>(
    plan: &mut Plan,
    probe: &Rc<Q>,
    connection: &Connection,
    policy: SettlePolicy,
    machine: &Node<T>,
) -> Result<Node<()>, DeployError>
where
    Q: NetworkProbe + 'static,
{
    let probe = Rc::clone(probe);
    let host = connection.host.clone();
    plan.declare(
        SETTLE_STEP,
        NodeKind::Local,
        Needs::none().after(machine).input(&host),
        move || await_machine(probe, host, policy),
    )
}

async fn await_machine<Q: NetworkProbe>(
    probe: Rc<Q>,
    host: Deferred<String>,
    policy: SettlePolicy,
) -> Settled<()> {
    let host = host.resolve().await?;
    wait_until_reachable(&*probe, &host, policy).await?;
    Ok(())
}

/// Declare an upload of `local` to `remote` after `predecessor`.
///
/// # Errors
///
/// Returns a construction error from [`Plan::declare`].
pub fn copy_file<S, T>(
    plan: &mut Plan,
    shell: &Rc<S>,
    connection: &Connection,
    name: &str,
    local: impl Into<PathBuf>,
    remote: impl Into<String>,
    predecessor: &Node<T>,
) -> Result<Step, DeployError>
where
    S: RemoteShell + 'static,
{
    let shell = Rc::clone(shell);
    let conn = connection.clone();
    let step = name.to_owned();
    let (local, remote) = (local.into(), remote.into());
    plan.declare(
        name,
        NodeKind::Remote,
        Needs::none().after(predecessor).input(&connection.host),
        move || upload(shell, conn, step, local, remote),
    )
}

async fn upload<S: RemoteShell>(
    shell: Rc<S>,
    conn: Connection,
    step: String,
    local: PathBuf,
    remote: String,
) -> Settled<CommandOutput> {
    let host = conn.host.resolve().await?;
    tracing::info!(local = %local.display(), %remote, "uploading");
    shell
        .copy_file(&conn.target(&host), &local, &remote)
        .await
        .map_err(|e| remote_failure(step, &e))?;
    Ok(CommandOutput::default())
}

/// Declare `command` to run after `predecessor`, exporting its output as
/// `<name>-stdout` and `<name>-stderr`.
///
/// # Errors
///
/// Returns a construction error from [`Plan::declare`], or
/// [`DeployError::DuplicateExport`] if the output names are taken.
pub fn chain<S, T>(
    plan: &mut Plan,
    shell: &Rc<S>,
    name: &str,
    command: impl Into<String>,
    connection: &Connection,
    predecessor: &Node<T>,
) -> Result<Step, DeployError>
where
    S: RemoteShell + 'static,
{
    let stdout_name = format!("{name}-stdout");
    let stderr_name = format!("{name}-stderr");
    for export in [&stdout_name, &stderr_name] {
        if plan.exports().contains(export) {
            return Err(DeployError::DuplicateExport(export.clone()));
        }
    }

    let shell = Rc::clone(shell);
    let conn = connection.clone();
    let step = name.to_owned();
    let command = command.into();
    let node = plan.declare(
        name,
        NodeKind::Remote,
        Needs::none().after(predecessor).input(&connection.host),
        move || run_command(shell, conn, step, command),
    )?;

    plan.export(stdout_name, node.outputs().map(|out| out.stdout))?;
    plan.export(stderr_name, node.outputs().map(|out| out.stderr))?;
    Ok(node)
}

async fn run_command<S: RemoteShell>(
    shell: Rc<S>,
    conn: Connection,
    step: String,
    command: String,
) -> Settled<CommandOutput> {
    let host = conn.host.resolve().await?;
    tracing::info!(%command, "running");
    shell
        .exec(&conn.target(&host), &command)
        .await
        .map_err(|e| remote_failure(step, &e))
}

/// Thread the activation commands after `copied`, one strictly after another.
/// Returns the last step of the chain.
///
/// # Errors
///
/// Returns the first construction error.
pub fn activate<S>(
    plan: &mut Plan,
    shell: &Rc<S>,
    connection: &Connection,
    service: &ServiceConfig,
    copied: &Step,
) -> Result<Step, DeployError>
where
    S: RemoteShell + 'static,
{
    let mut last = copied.clone();
    for ActivationCommand { name, command } in activation_commands(service) {
        last = chain(plan, shell, &name, command, connection, &last)?;
    }
    Ok(last)
}

fn remote_failure(step: String, err: &anyhow::Error) -> Failure {
    DeployError::RemoteExec {
        step,
        message: format!("{err:#}"),
    }
    .into()
}
