//! `CloudProvider` backed by the DigitalOcean v2 REST API.
//!
//! Every `ensure_*` call first looks for an existing resource with the same
//! name, so re-running after a partial failure converges instead of
//! duplicating resources. A found load balancer gets any missing droplets
//! attached and a found DNS record is rewritten when its value differs;
//! droplets and certificates are reused as they are. Droplets and load
//! balancers are polled until the provider has assigned them a public
//! address.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::application::ports::CloudProvider;
use crate::domain::config::ProviderConfig;
use crate::domain::resource::{
    Certificate, CertificateSpec, DnsRecord, DnsRecordSpec, Domain, Droplet, DropletSpec,
    LoadBalancer, LoadBalancerSpec, SshKey, fqdn,
};

/// Environment variable holding the API token.
pub const TOKEN_ENV: &str = "DIGITALOCEAN_TOKEN";

const PAGE_SIZE: u32 = 200;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct DigitalOcean {
    client: reqwest::Client,
    base: String,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl DigitalOcean {
    /// Build a client authenticated with `token`.
    ///
    /// # Errors
    ///
    /// Returns an error if the token is not a valid header value or the HTTP
    /// client cannot be built.
    pub fn new(token: &str, config: &ProviderConfig) -> Result<Self> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {token}"))
            .context("API token contains invalid characters")?;
        auth.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("stratus/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            base: config.api_url.trim_end_matches('/').to_owned(),
            poll_interval: Duration::from_secs(config.poll_interval_secs.max(1)),
            poll_timeout: Duration::from_secs(config.poll_timeout_secs),
        })
    }

    /// Read the token from [`TOKEN_ENV`].
    ///
    /// # Errors
    ///
    /// Returns an error if the variable is unset or empty.
    pub fn from_env(config: &ProviderConfig) -> Result<Self> {
        let token = std::env::var(TOKEN_ENV)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .with_context(|| format!("{TOKEN_ENV} is not set"))?;
        Self::new(token.trim(), config)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.get_optional(path)
            .await?
            .with_context(|| format!("GET {path}: not found"))
    }

    /// `GET`, mapping 404 to `None`.
    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        tracing::debug!(path, "GET");
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .with_context(|| format!("GET {path}"))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        decode("GET", path, response).await.map(Some)
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        tracing::debug!(path, "POST");
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {path}"))?;
        decode("POST", path, response).await
    }

    /// `POST` to an endpoint that answers with an empty body.
    async fn post_empty<B: Serialize>(&self, path: &str, body: &B) -> Result<()> {
        tracing::debug!(path, "POST");
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {path}"))?;
        successful_body("POST", path, response).await.map(|_| ())
    }

    async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        tracing::debug!(path, "PUT");
        let response = self
            .client
            .put(self.url(path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("PUT {path}"))?;
        decode("PUT", path, response).await
    }

    /// Call `check` every poll interval until it yields a value.
    async fn poll<T, F, Fut>(&self, what: &str, mut check: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let started = Instant::now();
        loop {
            if let Some(value) = check().await? {
                return Ok(value);
            }
            if started.elapsed() >= self.poll_timeout {
                anyhow::bail!(
                    "{what} not ready after {}s",
                    self.poll_timeout.as_secs()
                );
            }
            tracing::debug!(what, "waiting for provider");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn find_droplet(&self, name: &str) -> Result<Option<ApiDroplet>> {
        let page: DropletList = self
            .get(&format!("/v2/droplets?name={name}&per_page={PAGE_SIZE}"))
            .await?;
        Ok(find_named(page.droplets, name))
    }

    async fn find_certificate(&self, name: &str) -> Result<Option<ApiCertificate>> {
        let page: CertificateList = self
            .get(&format!("/v2/certificates?name={name}&per_page={PAGE_SIZE}"))
            .await?;
        Ok(find_named(page.certificates, name))
    }

    async fn find_load_balancer(&self, name: &str) -> Result<Option<ApiLoadBalancer>> {
        let page: LoadBalancerList = self
            .get(&format!("/v2/load_balancers?per_page={PAGE_SIZE}"))
            .await?;
        Ok(find_named(page.load_balancers, name))
    }
}

impl CloudProvider for DigitalOcean {
    async fn lookup_ssh_key(&self, name: &str) -> Result<Option<SshKey>> {
        let page: SshKeyList = self
            .get(&format!("/v2/account/keys?per_page={PAGE_SIZE}"))
            .await?;
        Ok(find_named(page.ssh_keys, name).map(|k| SshKey {
            id: k.id.to_string(),
            name: k.name,
            fingerprint: k.fingerprint,
        }))
    }

    async fn lookup_domain(&self, name: &str) -> Result<Option<Domain>> {
        let found: Option<DomainEnvelope> = self.get_optional(&format!("/v2/domains/{name}")).await?;
        Ok(found.map(|d| Domain {
            name: d.domain.name,
        }))
    }

    async fn ensure_droplet(&self, spec: &DropletSpec) -> Result<Droplet> {
        let id = match self.find_droplet(&spec.name).await? {
            Some(existing) => {
                tracing::info!(name = %spec.name, id = %existing.id, "reusing droplet");
                existing.id
            }
            None => {
                let body = CreateDroplet {
                    name: &spec.name,
                    region: &spec.region,
                    size: &spec.size,
                    image: &spec.image,
                    ssh_keys: &spec.ssh_keys,
                };
                let created: DropletEnvelope = self.post("/v2/droplets", &body).await?;
                tracing::info!(name = %spec.name, id = %created.droplet.id, "droplet created");
                created.droplet.id
            }
        };

        let path = format!("/v2/droplets/{id}");
        let path = path.as_str();
        let ipv4 = self
            .poll("droplet address", move || async move {
                let current: DropletEnvelope = self.get(path).await?;
                Ok::<_, anyhow::Error>(current.droplet.public_ipv4())
            })
            .await?;
        Ok(Droplet {
            id: id.to_string(),
            ipv4,
        })
    }

    async fn ensure_certificate(&self, spec: &CertificateSpec) -> Result<Certificate> {
        let cert = match self.find_certificate(&spec.name).await? {
            Some(existing) => existing,
            None => {
                let body = CreateCertificate {
                    name: &spec.name,
                    kind: spec.kind.as_str(),
                    dns_names: &spec.domains,
                };
                let created: CertificateEnvelope = self.post("/v2/certificates", &body).await?;
                tracing::info!(name = %spec.name, "certificate requested");
                created.certificate
            }
        };
        Ok(Certificate {
            id: cert.id,
            name: cert.name,
        })
    }

    async fn ensure_load_balancer(&self, spec: &LoadBalancerSpec) -> Result<LoadBalancer> {
        let id = match self.find_load_balancer(&spec.name).await? {
            Some(existing) => {
                let missing = missing_droplets(&existing, &spec.droplet_ids);
                if !missing.is_empty() {
                    tracing::info!(name = %spec.name, ?missing, "attaching droplets");
                    self.post_empty(
                        &format!("/v2/load_balancers/{}/droplets", existing.id),
                        &AttachDroplets {
                            droplet_ids: &missing,
                        },
                    )
                    .await?;
                }
                existing.id
            }
            None => {
                let mut rules = Vec::with_capacity(spec.forwarding_rules.len());
                for rule in &spec.forwarding_rules {
                    let certificate_id = match &rule.certificate_name {
                        Some(name) => Some(
                            self.find_certificate(name)
                                .await?
                                .with_context(|| format!("certificate '{name}' not found"))?
                                .id,
                        ),
                        None => None,
                    };
                    rules.push(CreateForwardingRule {
                        entry_protocol: &rule.entry_protocol,
                        entry_port: rule.entry_port,
                        target_protocol: &rule.target_protocol,
                        target_port: rule.target_port,
                        certificate_id,
                    });
                }
                let body = CreateLoadBalancer {
                    name: &spec.name,
                    region: &spec.region,
                    forwarding_rules: rules,
                    redirect_http_to_https: spec.redirect_http_to_https,
                    disable_lets_encrypt_dns_records: spec.disable_lets_encrypt_dns_records,
                    droplet_ids: &spec.droplet_ids,
                };
                let created: LoadBalancerEnvelope =
                    self.post("/v2/load_balancers", &body).await?;
                tracing::info!(name = %spec.name, "load balancer created");
                created.load_balancer.id
            }
        };

        let path = format!("/v2/load_balancers/{id}");
        let path = path.as_str();
        let ip = self
            .poll("load balancer address", move || async move {
                let current: LoadBalancerEnvelope = self.get(path).await?;
                Ok::<_, anyhow::Error>(current.load_balancer.ip.filter(|ip| !ip.is_empty()))
            })
            .await?;
        Ok(LoadBalancer { id, ip })
    }

    async fn ensure_dns_record(&self, spec: &DnsRecordSpec) -> Result<DnsRecord> {
        let full_name = fqdn(&spec.name, &spec.domain);
        let records: DnsRecordList = self
            .get(&format!(
                "/v2/domains/{}/records?type={}&name={full_name}",
                spec.domain, spec.record_type
            ))
            .await?;
        let body = CreateDnsRecord {
            kind: &spec.record_type,
            name: &spec.name,
            data: &spec.value,
        };

        let record = match record_change(records.domain_records, &spec.value) {
            RecordChange::Keep(existing) => existing,
            RecordChange::Update(existing) => {
                tracing::info!(record = %full_name, "updating DNS record");
                let updated: DnsRecordEnvelope = self
                    .put(
                        &format!("/v2/domains/{}/records/{}", spec.domain, existing.id),
                        &body,
                    )
                    .await?;
                updated.domain_record
            }
            RecordChange::Create => {
                let created: DnsRecordEnvelope = self
                    .post(&format!("/v2/domains/{}/records", spec.domain), &body)
                    .await?;
                created.domain_record
            }
        };
        Ok(DnsRecord {
            id: record.id.to_string(),
            fqdn: full_name,
        })
    }
}

// ── Reconciliation ────────────────────────────────────────────────────────────

/// Listed API resources carry a user-chosen name.
trait Named {
    fn name(&self) -> &str;
}

/// The listed resource called exactly `name`.
fn find_named<T: Named>(items: Vec<T>, name: &str) -> Option<T> {
    items.into_iter().find(|item| item.name() == name)
}

/// Ids in `wanted` that `existing` does not balance yet, in `wanted` order.
fn missing_droplets(existing: &ApiLoadBalancer, wanted: &[u64]) -> Vec<u64> {
    let mut missing: Vec<u64> = Vec::new();
    for id in wanted {
        if !existing.droplet_ids.contains(id) && !missing.contains(id) {
            missing.push(*id);
        }
    }
    missing
}

#[derive(Debug, PartialEq, Eq)]
enum RecordChange {
    Create,
    Update(ApiDnsRecord),
    Keep(ApiDnsRecord),
}

/// Prefer a record that already holds `value`; otherwise rewrite the first.
fn record_change(records: Vec<ApiDnsRecord>, value: &str) -> RecordChange {
    let mut first = None;
    for record in records {
        if record.data == value {
            return RecordChange::Keep(record);
        }
        first.get_or_insert(record);
    }
    first.map_or(RecordChange::Create, RecordChange::Update)
}

// ── Responses ─────────────────────────────────────────────────────────────────

/// Body of a 2xx response; anything else becomes an error carrying the API
/// message.
async fn successful_body(
    method: &str,
    path: &str,
    response: reqwest::Response,
) -> Result<String> {
    let status = response.status();
    let text = response
        .text()
        .await
        .with_context(|| format!("{method} {path}: reading body"))?;
    if !status.is_success() {
        let message = serde_json::from_str::<ApiError>(&text)
            .map(|e| e.message)
            .unwrap_or(text);
        anyhow::bail!("{method} {path}: HTTP {status}: {message}");
    }
    Ok(text)
}

async fn decode<T: DeserializeOwned>(
    method: &str,
    path: &str,
    response: reqwest::Response,
) -> Result<T> {
    let text = successful_body(method, path, response).await?;
    serde_json::from_str(&text).with_context(|| format!("{method} {path}: unexpected response"))
}

// ── Wire types ────────────────────────────────────────────────────────────────

/// Resource id as the API reports it: numeric for droplets, keys and
/// records, UUID strings elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
enum ApiId {
    Number(u64),
    Text(String),
}

impl std::fmt::Display for ApiId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SshKeyList {
    ssh_keys: Vec<ApiSshKey>,
}

#[derive(Debug, Deserialize)]
struct ApiSshKey {
    id: ApiId,
    name: String,
    #[serde(default)]
    fingerprint: String,
}

impl Named for ApiSshKey {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Deserialize)]
struct DomainEnvelope {
    domain: ApiDomain,
}

#[derive(Debug, Deserialize)]
struct ApiDomain {
    name: String,
}

#[derive(Debug, Deserialize)]
struct DropletList {
    droplets: Vec<ApiDroplet>,
}

#[derive(Debug, Deserialize)]
struct DropletEnvelope {
    droplet: ApiDroplet,
}

#[derive(Debug, Deserialize)]
struct ApiDroplet {
    id: ApiId,
    name: String,
    #[serde(default)]
    networks: Networks,
}

#[derive(Debug, Default, Deserialize)]
struct Networks {
    #[serde(default)]
    v4: Vec<NetworkV4>,
}

#[derive(Debug, Deserialize)]
struct NetworkV4 {
    ip_address: String,
    #[serde(rename = "type")]
    kind: String,
}

impl Named for ApiDroplet {
    fn name(&self) -> &str {
        &self.name
    }
}

impl ApiDroplet {
    fn public_ipv4(&self) -> Option<String> {
        self.networks
            .v4
            .iter()
            .find(|n| n.kind == "public")
            .map(|n| n.ip_address.clone())
    }
}

#[derive(Debug, Serialize)]
struct CreateDroplet<'a> {
    name: &'a str,
    region: &'a str,
    size: &'a str,
    image: &'a str,
    ssh_keys: &'a [String],
}

#[derive(Debug, Deserialize)]
struct CertificateList {
    certificates: Vec<ApiCertificate>,
}

#[derive(Debug, Deserialize)]
struct CertificateEnvelope {
    certificate: ApiCertificate,
}

#[derive(Debug, Deserialize)]
struct ApiCertificate {
    id: String,
    name: String,
}

impl Named for ApiCertificate {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Serialize)]
struct CreateCertificate<'a> {
    name: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
    dns_names: &'a [String],
}

#[derive(Debug, Deserialize)]
struct LoadBalancerList {
    load_balancers: Vec<ApiLoadBalancer>,
}

#[derive(Debug, Deserialize)]
struct LoadBalancerEnvelope {
    load_balancer: ApiLoadBalancer,
}

#[derive(Debug, Deserialize)]
struct ApiLoadBalancer {
    id: String,
    name: String,
    #[serde(default)]
    ip: Option<String>,
    #[serde(default)]
    droplet_ids: Vec<u64>,
}

impl Named for ApiLoadBalancer {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Serialize)]
struct CreateForwardingRule<'a> {
    entry_protocol: &'a str,
    entry_port: u16,
    target_protocol: &'a str,
    target_port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    certificate_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateLoadBalancer<'a> {
    name: &'a str,
    region: &'a str,
    forwarding_rules: Vec<CreateForwardingRule<'a>>,
    redirect_http_to_https: bool,
    disable_lets_encrypt_dns_records: bool,
    droplet_ids: &'a [u64],
}

#[derive(Debug, Serialize)]
struct AttachDroplets<'a> {
    droplet_ids: &'a [u64],
}

#[derive(Debug, Deserialize)]
struct DnsRecordList {
    domain_records: Vec<ApiDnsRecord>,
}

#[derive(Debug, Deserialize)]
struct DnsRecordEnvelope {
    domain_record: ApiDnsRecord,
}

#[derive(Debug, PartialEq, Eq, Deserialize)]
struct ApiDnsRecord {
    id: ApiId,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Serialize)]
struct CreateDnsRecord<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    name: &'a str,
    data: &'a str,
}
