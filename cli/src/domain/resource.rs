//! Desired-state descriptors and resulting attribute bundles for the
//! resources a stack provisions.
//!
//! Pure data only; the provider adapter maps these onto its wire format.

use crate::domain::error::DeployError;

// ── Lookups ──────────────────────────────────────────────────────────────────

/// An SSH key registered with the provider account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshKey {
    pub id: String,
    pub name: String,
    pub fingerprint: String,
}

/// A DNS zone managed by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    pub name: String,
}

// ── Droplet ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DropletSpec {
    pub name: String,
    pub image: String,
    pub region: String,
    pub size: String,
    /// Provider ids of the SSH keys installed for `root`.
    pub ssh_keys: Vec<String>,
}

/// A running droplet. `id` is string-typed exactly as the provider reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Droplet {
    pub id: String,
    pub ipv4: String,
}

// ── Certificate ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertificateKind {
    LetsEncrypt,
    Custom,
}

impl CertificateKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LetsEncrypt => "lets_encrypt",
            Self::Custom => "custom",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateSpec {
    pub name: String,
    pub domains: Vec<String>,
    pub kind: CertificateKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Certificate {
    pub id: String,
    pub name: String,
}

// ── Load balancer ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingRule {
    pub entry_port: u16,
    pub entry_protocol: String,
    pub target_port: u16,
    pub target_protocol: String,
    /// Name of the certificate terminating TLS on the entry side.
    pub certificate_name: Option<String>,
}

impl ForwardingRule {
    /// Plain HTTP passthrough on `entry_port`.
    #[must_use]
    pub fn http(entry_port: u16, target_port: u16) -> Self {
        Self {
            entry_port,
            entry_protocol: "http".to_owned(),
            target_port,
            target_protocol: "http".to_owned(),
            certificate_name: None,
        }
    }

    /// HTTPS on 443 terminated with `certificate_name`, forwarded as HTTP.
    #[must_use]
    pub fn https(certificate_name: String, target_port: u16) -> Self {
        Self {
            entry_port: 443,
            entry_protocol: "https".to_owned(),
            target_port,
            target_protocol: "http".to_owned(),
            certificate_name: Some(certificate_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBalancerSpec {
    pub name: String,
    pub region: String,
    pub redirect_http_to_https: bool,
    pub disable_lets_encrypt_dns_records: bool,
    pub forwarding_rules: Vec<ForwardingRule>,
    pub droplet_ids: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadBalancer {
    pub id: String,
    pub ip: String,
}

// ── DNS ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecordSpec {
    pub domain: String,
    pub name: String,
    pub record_type: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    pub id: String,
    pub fqdn: String,
}

// ── Conversions ──────────────────────────────────────────────────────────────

/// Convert the provider's string droplet id into the integer the load
/// balancer target list expects.
///
/// # Errors
///
/// Returns [`DeployError::Conversion`] when `raw` is not a non-negative integer.
pub fn parse_droplet_id(raw: &str) -> Result<u64, DeployError> {
    raw.trim().parse().map_err(|_| DeployError::Conversion {
        value: raw.to_owned(),
        target: "droplet id (integer)",
    })
}

/// `<subdomain>.<domain>`, or the bare domain when `subdomain` is `@` or empty.
#[must_use]
pub fn fqdn(subdomain: &str, domain: &str) -> String {
    match subdomain {
        "" | "@" => domain.to_owned(),
        sub => format!("{sub}.{domain}"),
    }
}
