//! End-to-end scenarios for the declared stack, run against fake adapters.

#![allow(clippy::unwrap_used)]

use std::time::Duration;

use stratus_cli::application::services::stack::{declare_stack, provision};
use stratus_cli::domain::DeployError;
use stratus_cli::engine::{Deployment, NodeStatus, Phase};

use crate::mocks::{
    DROPLET_IP, FakeKeys, FakeProvider, FakeShell, Journal, LB_IP, RecordingReporter, Rig,
    test_config,
};

const ACTIVATION: [&str; 4] = [
    "which docker",
    "ufw allow 80",
    "systemctl enable rocket.service",
    "systemctl start rocket.service",
];

async fn run(rig: &Rig) -> Deployment {
    let plan = declare_stack(
        &rig.provider,
        &rig.shell,
        &rig.probe,
        &FakeKeys::present(),
        &test_config(),
    )
    .unwrap();
    plan.run().await
}

// ── Happy path ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_provision_exports_addresses_url_and_step_output() {
    let rig = Rig::new();
    let reporter = RecordingReporter::default();

    let outputs = provision(
        &rig.provider,
        &rig.shell,
        &rig.probe,
        &FakeKeys::present(),
        &test_config(),
        &reporter,
    )
    .await
    .unwrap();

    assert_eq!(outputs["address"], DROPLET_IP);
    assert_eq!(outputs["lb-address"], LB_IP);
    assert_eq!(outputs["url"], "https://pulumi.example.com");
    assert_eq!(outputs["where-is-docker-stdout"], "/usr/bin/docker\n");
    assert_eq!(outputs["open-firewall-stdout"], "Rule added\n");
    assert_eq!(outputs["start-systemd-manifest-stderr"], "");
    assert_eq!(outputs.len(), 3 + 2 * ACTIVATION.len());
    assert!(reporter.lines.borrow()[0].starts_with("step provisioning"));
}

#[tokio::test]
async fn test_activation_commands_run_in_order_after_upload() {
    let rig = Rig::new();
    let deployment = run(&rig).await;
    assert!(deployment.report.succeeded());

    assert_eq!(rig.journal.with_prefix("exec:"), ACTIVATION);
    let copy = rig
        .journal
        .index_of("copy:/etc/systemd/system/rocket.service")
        .unwrap();
    let first_exec = rig.journal.index_of("exec:which docker").unwrap();
    let probe = rig.journal.index_of(&format!("probe:{DROPLET_IP}:22")).unwrap();
    let droplet = rig.journal.index_of("ensure_droplet").unwrap();
    assert!(droplet < probe && probe < copy && copy < first_exec);
    assert!(rig.shell.hosts.borrow().iter().all(|h| h == DROPLET_IP));
}

#[tokio::test]
async fn test_load_balancer_targets_parsed_droplet_id_and_certificate() {
    let rig = Rig::new();
    run(&rig).await;

    let specs = rig.provider.lb_specs.borrow();
    let lb = &specs[0];
    assert_eq!(lb.name, "rocket-lb");
    assert_eq!(lb.droplet_ids, vec![3_164_444]);
    assert!(lb.redirect_http_to_https);
    assert!(lb.disable_lets_encrypt_dns_records);
    assert_eq!(lb.forwarding_rules.len(), 2);
    assert_eq!(lb.forwarding_rules[0].entry_port, 80);
    assert_eq!(lb.forwarding_rules[1].entry_port, 443);
    assert_eq!(lb.forwarding_rules[1].certificate_name.as_deref(), Some("cert"));

    let dns = &rig.provider.dns_specs.borrow()[0];
    assert_eq!((dns.name.as_str(), dns.value.as_str()), ("pulumi", LB_IP));
    assert_eq!(rig.provider.droplet_specs.borrow()[0].ssh_keys, vec!["512190"]);
}

// ── Ordering ─────────────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_load_balancer_waits_for_droplet_and_certificate() {
    let journal = Journal::default();
    let rig = Rig::with(
        FakeProvider::new(&journal).delays(Duration::from_secs(5), Duration::from_secs(1)),
        FakeShell::new(&journal),
        journal,
    );
    let report = run(&rig).await.report;

    let lb_started = report.position("rocket-lb", Phase::Started).unwrap();
    assert!(lb_started > report.position("rust-web", Phase::Finished).unwrap());
    assert!(lb_started > report.position("cert", Phase::Finished).unwrap());
    // the certificate does not wait for the droplet
    assert!(
        report.position("cert", Phase::Finished).unwrap()
            < report.position("rust-web", Phase::Finished).unwrap()
    );
}

#[tokio::test(start_paused = true)]
async fn test_progress_lines_follow_settle_order() {
    let journal = Journal::default();
    let rig = Rig::with(
        FakeProvider::new(&journal).delays(Duration::from_secs(5), Duration::from_secs(1)),
        FakeShell::new(&journal),
        journal,
    );
    let reporter = RecordingReporter::default();

    provision(
        &rig.provider,
        &rig.shell,
        &rig.probe,
        &FakeKeys::present(),
        &test_config(),
        &reporter,
    )
    .await
    .unwrap();

    let lines = reporter.lines.borrow();
    let at = |line: &str| lines.iter().position(|l| l == line).unwrap();
    assert!(at("ok cert") < at("ok rust-web"));
    assert!(at("ok rust-web") < at("ok rocket-lb"));
    assert!(at("ok where-is-docker") < at("ok start-systemd-manifest"));
}

#[tokio::test]
async fn test_exports_are_empty_before_the_run() {
    let rig = Rig::new();
    let plan = declare_stack(
        &rig.provider,
        &rig.shell,
        &rig.probe,
        &FakeKeys::present(),
        &test_config(),
    )
    .unwrap();

    assert!(plan.exports().contains("url"));
    assert!(plan.exports().snapshot().is_empty());
    assert!(rig.journal.entries().is_empty(), "declaring must not call ports");
}

// ── Failures ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_unparseable_droplet_id_fails_load_balancer_before_provider_call() {
    let journal = Journal::default();
    let rig = Rig::with(
        FakeProvider::new(&journal).droplet_id("abc"),
        FakeShell::new(&journal),
        journal,
    );
    let deployment = run(&rig).await;
    let report = &deployment.report;

    let Some(NodeStatus::Failed(cause)) = report.status("rocket-lb") else {
        panic!("load balancer should fail: {:?}", report.status("rocket-lb"));
    };
    let cause = &cause.clone();
    assert!(matches!(cause.cause(), DeployError::Conversion { value, .. } if value == "abc"));
    assert!(!rig.journal.contains("ensure_load_balancer"));
    assert!(
        matches!(report.status("pulumi-dns"), Some(NodeStatus::Skipped(c)) if c.same_cause(cause))
    );

    let partial = deployment.exports.snapshot();
    assert_eq!(partial["address"], DROPLET_IP);
    assert!(!partial.contains_key("lb-address"));
    assert!(!partial.contains_key("url"));

    // the remote chain only depends on the droplet and keeps going
    assert_eq!(rig.journal.with_prefix("exec:"), ACTIVATION);

    let err = deployment.into_outputs().await.unwrap_err();
    assert!(err.same_cause(cause));
}

#[tokio::test]
async fn test_failed_step_stops_the_rest_of_the_chain() {
    let journal = Journal::default();
    let rig = Rig::with(
        FakeProvider::new(&journal),
        FakeShell::new(&journal).failing_on("ufw allow 80"),
        journal,
    );
    let reporter = RecordingReporter::default();

    let err = provision(
        &rig.provider,
        &rig.shell,
        &rig.probe,
        &FakeKeys::present(),
        &test_config(),
        &reporter,
    )
    .await
    .unwrap_err();

    assert!(
        matches!(err.cause(), DeployError::RemoteExec { step, message }
            if step == "open-firewall" && message.contains("permission denied"))
    );
    assert_eq!(
        rig.journal.with_prefix("exec:"),
        vec!["which docker", "ufw allow 80"]
    );
    let lines = reporter.lines.borrow();
    assert!(lines.contains(&"warn enable-systemd-manifest: skipped".to_owned()));
    assert!(lines.contains(&"warn start-systemd-manifest: skipped".to_owned()));
    assert!(lines.contains(&"ok where-is-docker".to_owned()));
}

#[tokio::test]
async fn test_missing_ssh_key_skips_droplet_but_not_certificate() {
    let journal = Journal::default();
    let rig = Rig::with(
        FakeProvider::new(&journal).without_ssh_key(),
        FakeShell::new(&journal),
        journal,
    );
    let report = run(&rig).await.report;

    assert!(matches!(
        report.status("ssh-key"),
        Some(NodeStatus::Failed(c)) if matches!(c.cause(), DeployError::Lookup { name, .. } if name == "laptop")
    ));
    assert!(matches!(report.status("rust-web"), Some(NodeStatus::Skipped(_))));
    assert!(matches!(report.status("cert"), Some(NodeStatus::Succeeded)));
    assert!(!rig.journal.contains("ensure_droplet"));
    assert!(rig.journal.contains("ensure_certificate"));
    assert!(rig.journal.with_prefix("exec:").is_empty());
    assert!(!report.started("settle"));
}

#[tokio::test]
async fn test_provider_error_names_the_resource() {
    let journal = Journal::default();
    let rig = Rig::with(
        FakeProvider::new(&journal).failing("ensure_certificate"),
        FakeShell::new(&journal),
        journal,
    );
    let err = run(&rig).await.into_outputs().await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "provisioning 'cert' failed: ensure_certificate: 422 Unprocessable Entity"
    );
}

// ── Construction errors ──────────────────────────────────────────────────────

#[test]
fn test_unreadable_private_key_fails_before_any_provider_call() {
    let rig = Rig::new();
    let err = declare_stack(
        &rig.provider,
        &rig.shell,
        &rig.probe,
        &FakeKeys::missing(),
        &test_config(),
    )
    .map(|_| ())
    .unwrap_err();

    assert!(matches!(err, DeployError::CredentialUnavailable { ref path, .. } if path == "~/.ssh/id_ed25519"));
    assert!(rig.journal.entries().is_empty());
}

#[test]
fn test_duplicate_resource_name_is_rejected_at_declaration() {
    let rig = Rig::new();
    let mut config = test_config();
    config.certificate.name = config.droplet.name.clone();

    let err = declare_stack(
        &rig.provider,
        &rig.shell,
        &rig.probe,
        &FakeKeys::present(),
        &config,
    )
    .map(|_| ())
    .unwrap_err();

    assert!(matches!(err, DeployError::DuplicateName(ref n) if n == "rust-web"));
    assert!(rig.journal.entries().is_empty());
}

#[test]
fn test_declared_graph_shape() {
    let rig = Rig::new();
    let plan = declare_stack(
        &rig.provider,
        &rig.shell,
        &rig.probe,
        &FakeKeys::present(),
        &test_config(),
    )
    .unwrap();

    assert_eq!(plan.predecessors("rust-web").unwrap(), vec!["ssh-key"]);
    assert_eq!(plan.predecessors("cert").unwrap(), vec!["domain"]);
    assert_eq!(plan.predecessors("rocket-lb").unwrap(), vec!["rust-web", "cert"]);
    assert_eq!(plan.predecessors("pulumi-dns").unwrap(), vec!["domain", "rocket-lb"]);
    assert_eq!(plan.predecessors("settle").unwrap(), vec!["rust-web"]);
    assert_eq!(
        plan.predecessors("copy-systemd-file").unwrap(),
        vec!["rust-web", "settle"]
    );
    assert_eq!(
        plan.predecessors("open-firewall").unwrap(),
        vec!["rust-web", "where-is-docker"]
    );
}
