//! Connection provisioner. Binds a machine's deferred address to the
//! locally held private key.

use std::fmt;
use std::rc::Rc;

use crate::application::ports::{KeySource, RemoteTarget};
use crate::domain::config::SshConfig;
use crate::domain::resource::Droplet;
use crate::domain::{DeployError, PrivateKey};
use crate::engine::{Deferred, Node};

/// Remote-connection descriptor shared by every step of a chain.
///
/// `host` is deferred, so steps can be declared before the address is known.
#[derive(Clone)]
pub struct Connection {
    pub host: Deferred<String>,
    pub user: String,
    key: Rc<PrivateKey>,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("user", &self.user)
            .field("key", &*self.key)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Borrow a call-scoped target once the host is known.
    #[must_use]
    pub fn target<'a>(&'a self, host: &'a str) -> RemoteTarget<'a> {
        RemoteTarget {
            host,
            user: &self.user,
            key: &self.key,
        }
    }
}

/// Read the private key and bind it to `machine`'s public address.
///
/// # Errors
///
/// Returns [`DeployError::CredentialUnavailable`] if the key cannot be read.
pub fn open_connection(
    keys: &impl KeySource,
    ssh: &SshConfig,
    machine: &Node<Droplet>,
) -> Result<Connection, DeployError> {
    let key = keys
        .read_private_key(&ssh.private_key_path)
        .map_err(|e| DeployError::CredentialUnavailable {
            path: ssh.private_key_path.clone(),
            reason: format!("{e:#}"),
        })?;

    Ok(Connection {
        host: machine.outputs().map(|droplet| droplet.ipv4),
        user: ssh.user.clone(),
        key: Rc::new(key),
    })
}
