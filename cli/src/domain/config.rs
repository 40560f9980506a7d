//! Domain types and validators for Stratus configuration.
//!
//! Pure functions only. No I/O and no filesystem access.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.stratus/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DeployConfig {
    pub provider: ProviderConfig,
    pub droplet: DropletConfig,
    pub ssh: SshConfig,
    pub dns: DnsConfig,
    pub certificate: CertificateConfig,
    pub load_balancer: LoadBalancerConfig,
    pub service: ServiceConfig,
    pub settle: SettleConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub region: String,
    pub api_url: String,
    /// Interval between polls while waiting for an address to be assigned.
    pub poll_interval_secs: u64,
    pub poll_timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            region: "nyc3".to_owned(),
            api_url: "https://api.digitalocean.com".to_owned(),
            poll_interval_secs: 5,
            poll_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DropletConfig {
    pub name: String,
    pub image: String,
    pub size: String,
    /// Name of the SSH key registered with the provider account.
    pub ssh_key_name: String,
}

impl Default for DropletConfig {
    fn default() -> Self {
        Self {
            name: "rust-web".to_owned(),
            image: "docker-20-04".to_owned(),
            size: "s-1vcpu-1gb".to_owned(),
            ssh_key_name: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    pub user: String,
    pub private_key_path: String,
    pub connect_timeout_secs: u64,
    pub command_timeout_secs: u64,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: "root".to_owned(),
            private_key_path: "~/.ssh/id_ed25519".to_owned(),
            connect_timeout_secs: 10,
            command_timeout_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DnsConfig {
    pub domain: String,
    pub subdomain: String,
}

impl Default for DnsConfig {
    fn default() -> Self {
        Self {
            domain: String::new(),
            subdomain: "pulumi".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CertificateConfig {
    pub name: String,
}

impl Default for CertificateConfig {
    fn default() -> Self {
        Self {
            name: "cert".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadBalancerConfig {
    pub name: String,
    pub redirect_http_to_https: bool,
    pub http_port: u16,
    pub target_port: u16,
}

impl Default for LoadBalancerConfig {
    fn default() -> Self {
        Self {
            name: "rocket-lb".to_owned(),
            redirect_http_to_https: true,
            http_port: 80,
            target_port: 80,
        }
    }
}

/// The systemd unit copied to the droplet and activated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub unit: String,
    pub local_path: String,
    pub remote_dir: String,
    pub firewall_port: u16,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            unit: "rocket.service".to_owned(),
            local_path: "rocket.service".to_owned(),
            remote_dir: "/etc/systemd/system".to_owned(),
            firewall_port: 80,
        }
    }
}

impl ServiceConfig {
    /// Absolute path of the unit file on the droplet.
    #[must_use]
    pub fn remote_path(&self) -> String {
        format!("{}/{}", self.remote_dir.trim_end_matches('/'), self.unit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettleMode {
    /// Sleep for `delay_secs` unconditionally.
    Fixed,
    /// Poll TCP reachability with exponential backoff.
    Probe,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    pub mode: SettleMode,
    pub delay_secs: u64,
    pub port: u16,
    pub initial_backoff_ms: u64,
    pub max_backoff_secs: u64,
    pub deadline_secs: u64,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            mode: SettleMode::Probe,
            delay_secs: 30,
            port: 22,
            initial_backoff_ms: 500,
            max_backoff_secs: 8,
            deadline_secs: 180,
        }
    }
}

/// How long to wait before the first remote access to a fresh machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlePolicy {
    Fixed {
        delay: Duration,
    },
    Probe {
        port: u16,
        initial_backoff: Duration,
        max_backoff: Duration,
        deadline: Duration,
    },
}

impl SettleConfig {
    #[must_use]
    pub fn policy(&self) -> SettlePolicy {
        match self.mode {
            SettleMode::Fixed => SettlePolicy::Fixed {
                delay: Duration::from_secs(self.delay_secs),
            },
            SettleMode::Probe => SettlePolicy::Probe {
                port: self.port,
                initial_backoff: Duration::from_millis(self.initial_backoff_ms),
                max_backoff: Duration::from_secs(self.max_backoff_secs),
                deadline: Duration::from_secs(self.deadline_secs),
            },
        }
    }
}

// ── Validators ───────────────────────────────────────────────────────────────

impl DeployConfig {
    /// Check that every setting without a usable default has been provided.
    ///
    /// # Errors
    ///
    /// Returns the first missing or invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("droplet.ssh_key_name", &self.droplet.ssh_key_name),
            ("dns.domain", &self.dns.domain),
            ("ssh.private_key_path", &self.ssh.private_key_path),
            ("service.unit", &self.service.unit),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(ConfigError::Missing { key });
            }
        }

        let ports = [
            ("load_balancer.http_port", self.load_balancer.http_port),
            ("load_balancer.target_port", self.load_balancer.target_port),
            ("service.firewall_port", self.service.firewall_port),
            ("settle.port", self.settle.port),
        ];
        for (key, port) in ports {
            if port == 0 {
                return Err(ConfigError::InvalidValue {
                    key,
                    value: "0".to_owned(),
                    valid: "1-65535".to_owned(),
                });
            }
        }
        Ok(())
    }
}

// ── Unit tests ───────────────────────────────────────────────────────────────
