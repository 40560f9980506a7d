//! Stack declaration: the droplet, certificate, load balancer and DNS record,
//! plus the remote chain that installs and starts the service.
//!
//! [`declare_stack`] only builds the plan; nothing is provisioned until the
//! plan runs. [`provision`] declares, runs and resolves the export table.

use std::collections::BTreeMap;
use std::path::Path;
use std::rc::Rc;

use crate::application::ports::{
    CloudProvider, KeySource, NetworkProbe, ProgressReporter, RemoteShell,
};
use crate::application::services::activation;
use crate::application::services::connection::open_connection;
use crate::domain::DeployError;
use crate::domain::config::DeployConfig;
use crate::domain::resource::{
    Certificate, CertificateKind, CertificateSpec, DnsRecord, DnsRecordSpec, Domain, Droplet,
    DropletSpec, ForwardingRule, LoadBalancer, LoadBalancerSpec, SshKey, fqdn, parse_droplet_id,
};
use crate::engine::{Deferred, Failure, Needs, Node, NodeKind, NodeStatus, Plan, Settled};

/// Name of the node looking up the account SSH key.
pub const SSH_KEY_NODE: &str = "ssh-key";
/// Name of the node looking up the DNS zone.
pub const DOMAIN_NODE: &str = "domain";
/// Name of the upload step for the unit file.
pub const COPY_STEP: &str = "copy-systemd-file";

/// Name of the DNS record node for `config`.
#[must_use]
pub fn dns_node_name(config: &DeployConfig) -> String {
    format!("{}-dns", config.dns.subdomain)
}

/// Declare the whole deployment.
///
/// The private key is read here, so a missing key fails before anything
/// is provisioned.
///
/// # Errors
///
/// Returns [`DeployError::CredentialUnavailable`] or a plan construction
/// error such as [`DeployError::DuplicateName`].
pub fn declare_stack<P, S, Q>(
    provider: &Rc<P>,
    shell: &Rc<S>,
    probe: &Rc<Q>,
    keys: &impl KeySource,
    config: &DeployConfig,
) -> Result<Plan, DeployError>
where
    P: CloudProvider + 'static,
    S: RemoteShell + 'static,
    Q: NetworkProbe + 'static,
{
    let mut plan = Plan::new();

    // ── Lookups ──

    let ssh_key: Node<SshKey> = {
        let provider = Rc::clone(provider);
        let name = config.droplet.ssh_key_name.clone();
        plan.declare(SSH_KEY_NODE, NodeKind::Lookup, Needs::none(), move || {
            find_ssh_key(provider, name)
        })?
    };

    let domain: Node<Domain> = {
        let provider = Rc::clone(provider);
        let name = config.dns.domain.clone();
        plan.declare(DOMAIN_NODE, NodeKind::Lookup, Needs::none(), move || {
            find_domain(provider, name)
        })?
    };

    // ── Resources ──

    let droplet: Node<Droplet> = {
        let provider = Rc::clone(provider);
        let spec = DropletSpec {
            name: config.droplet.name.clone(),
            image: config.droplet.image.clone(),
            region: config.provider.region.clone(),
            size: config.droplet.size.clone(),
            ssh_keys: Vec::new(),
        };
        let key = ssh_key.outputs().clone();
        plan.declare(
            &config.droplet.name,
            NodeKind::Resource,
            Needs::none().input(&key),
            move || create_droplet(provider, spec, key),
        )?
    };

    let certificate: Node<Certificate> = {
        let provider = Rc::clone(provider);
        let name = config.certificate.name.clone();
        let subdomain = config.dns.subdomain.clone();
        let host = domain.outputs().map(move |zone| fqdn(&subdomain, &zone.name));
        plan.declare(
            &config.certificate.name,
            NodeKind::Resource,
            Needs::none().input(&host),
            move || create_certificate(provider, name, host),
        )?
    };

    let load_balancer: Node<LoadBalancer> = {
        let provider = Rc::clone(provider);
        let droplet_id = droplet.outputs().try_map(|d| parse_droplet_id(&d.id));
        let cert_name = certificate.outputs().map(|c| c.name);
        let attachment = Deferred::combine(&droplet_id, &cert_name, |id, cert| (id, cert));
        let lb = &config.load_balancer;
        let template = LoadBalancerSpec {
            name: lb.name.clone(),
            region: config.provider.region.clone(),
            redirect_http_to_https: lb.redirect_http_to_https,
            disable_lets_encrypt_dns_records: true,
            forwarding_rules: vec![ForwardingRule::http(lb.http_port, lb.target_port)],
            droplet_ids: Vec::new(),
        };
        let target_port = lb.target_port;
        plan.declare(
            &lb.name,
            NodeKind::Resource,
            Needs::none().input(&attachment),
            move || create_load_balancer(provider, template, target_port, attachment),
        )?
    };

    let dns: Node<DnsRecord> = {
        let provider = Rc::clone(provider);
        let subdomain = config.dns.subdomain.clone();
        let record = Deferred::combine(
            domain.outputs(),
            &load_balancer.outputs().map(|lb| lb.ip),
            move |zone, ip| DnsRecordSpec {
                domain: zone.name,
                name: subdomain,
                record_type: "A".to_owned(),
                value: ip,
            },
        );
        plan.declare(
            dns_node_name(config),
            NodeKind::Resource,
            Needs::none().input(&record),
            move || create_dns_record(provider, record),
        )?
    };

    plan.export("address", droplet.outputs().map(|d| d.ipv4))?;
    plan.export("lb-address", load_balancer.outputs().map(|lb| lb.ip))?;
    plan.export("url", dns.outputs().map(|r| format!("https://{}", r.fqdn)))?;

    // ── Remote activation ──

    let connection = open_connection(keys, &config.ssh, &droplet)?;
    let settled = activation::settle(
        &mut plan,
        probe,
        &connection,
        config.settle.policy(),
        &droplet,
    )?;
    let copied = activation::copy_file(
        &mut plan,
        shell,
        &connection,
        COPY_STEP,
        Path::new(&config.service.local_path),
        config.service.remote_path(),
        &settled,
    )?;
    activation::activate(&mut plan, shell, &connection, &config.service, &copied)?;

    tracing::debug!(nodes = plan.len(), exports = plan.exports().len(), "stack declared");
    Ok(plan)
}

/// Declare and run the stack, returning the resolved export table.
///
/// # Errors
///
/// Returns the originating failure: a construction error, or the first node
/// that failed during the run.
pub async fn provision<P, S, Q>(
    provider: &Rc<P>,
    shell: &Rc<S>,
    probe: &Rc<Q>,
    keys: &impl KeySource,
    config: &DeployConfig,
    reporter: &impl ProgressReporter,
) -> Result<BTreeMap<String, String>, Failure>
where
    P: CloudProvider + 'static,
    S: RemoteShell + 'static,
    Q: NetworkProbe + 'static,
{
    let plan = declare_stack(provider, shell, probe, keys, config)?;
    reporter.step(&format!("provisioning {} nodes...", plan.len()));

    let deployment = plan
        .run_observed(|node, status| match status {
            NodeStatus::Succeeded => reporter.success(node),
            NodeStatus::Failed(cause) => reporter.warn(&format!("{node}: {cause}")),
            NodeStatus::Skipped(_) => reporter.warn(&format!("{node}: skipped")),
        })
        .await;
    deployment.into_outputs().await
}

// ── Node actions ──

async fn find_ssh_key<P: CloudProvider>(provider: Rc<P>, name: String) -> Settled<SshKey> {
    match provider.lookup_ssh_key(&name).await {
        Ok(Some(key)) => Ok(key),
        Ok(None) => Err(DeployError::Lookup {
            kind: "ssh key",
            name,
        }
        .into()),
        Err(e) => Err(provider_error(SSH_KEY_NODE, &e)),
    }
}

async fn find_domain<P: CloudProvider>(provider: Rc<P>, name: String) -> Settled<Domain> {
    match provider.lookup_domain(&name).await {
        Ok(Some(domain)) => Ok(domain),
        Ok(None) => Err(DeployError::Lookup {
            kind: "domain",
            name,
        }
        .into()),
        Err(e) => Err(provider_error(DOMAIN_NODE, &e)),
    }
}

async fn create_droplet<P: CloudProvider>(
    provider: Rc<P>,
    mut spec: DropletSpec,
    key: Deferred<SshKey>,
) -> Settled<Droplet> {
    spec.ssh_keys = vec![key.resolve().await?.id];
    provider
        .ensure_droplet(&spec)
        .await
        .map_err(|e| provider_error(&spec.name, &e))
}

async fn create_certificate<P: CloudProvider>(
    provider: Rc<P>,
    name: String,
    host: Deferred<String>,
) -> Settled<Certificate> {
    let spec = CertificateSpec {
        domains: vec![host.resolve().await?],
        name,
        kind: CertificateKind::LetsEncrypt,
    };
    provider
        .ensure_certificate(&spec)
        .await
        .map_err(|e| provider_error(&spec.name, &e))
}

async fn create_load_balancer<P: CloudProvider>(
    provider: Rc<P>,
    mut spec: LoadBalancerSpec,
    target_port: u16,
    attachment: Deferred<(u64, String)>,
) -> Settled<LoadBalancer> {
    let (droplet_id, cert_name) = attachment.resolve().await?;
    spec.droplet_ids = vec![droplet_id];
    spec.forwarding_rules
        .push(ForwardingRule::https(cert_name, target_port));
    provider
        .ensure_load_balancer(&spec)
        .await
        .map_err(|e| provider_error(&spec.name, &e))
}

async fn create_dns_record<P: CloudProvider>(
    provider: Rc<P>,
    record: Deferred<DnsRecordSpec>,
) -> Settled<DnsRecord> {
    let spec = record.resolve().await?;
    provider
        .ensure_dns_record(&spec)
        .await
        .map_err(|e| provider_error(&fqdn(&spec.name, &spec.domain), &e))
}

fn provider_error(resource: &str, err: &anyhow::Error) -> Failure {
    DeployError::Provider {
        resource: resource.to_owned(),
        message: format!("{err:#}"),
    }
    .into()
}
