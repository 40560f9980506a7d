//! Command implementations

pub mod config;
pub mod plan;
pub mod up;
pub mod version;

use std::rc::Rc;
use std::time::Duration;

use anyhow::Result;

use crate::domain::DeployConfig;
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::digitalocean::DigitalOcean;
use crate::infra::network::TokioNetworkProbe;
use crate::infra::ssh::{OpenSshShell, default_known_hosts};

/// Production adapters shared by the stack's nodes.
pub(crate) struct Adapters {
    pub provider: Rc<DigitalOcean>,
    pub shell: Rc<OpenSshShell<TokioCommandRunner>>,
    pub probe: Rc<TokioNetworkProbe>,
}

impl Adapters {
    pub(crate) fn new(config: &DeployConfig, provider: DigitalOcean) -> Result<Self> {
        let runner = TokioCommandRunner::new(Duration::from_secs(config.ssh.command_timeout_secs));
        let connect_timeout = Duration::from_secs(config.ssh.connect_timeout_secs);
        Ok(Self {
            provider: Rc::new(provider),
            shell: Rc::new(OpenSshShell::new(
                runner,
                default_known_hosts()?,
                config.ssh.connect_timeout_secs,
            )),
            probe: Rc::new(TokioNetworkProbe::new(connect_timeout)),
        })
    }
}
