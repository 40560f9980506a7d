//! Remote chain ordering and construction rules.

#![allow(clippy::unwrap_used)]

use std::rc::Rc;

use stratus_cli::application::ports::CommandOutput;
use stratus_cli::application::services::activation::{
    self, SETTLE_STEP, activation_commands,
};
use stratus_cli::application::services::connection::{Connection, open_connection};
use stratus_cli::domain::DeployError;
use stratus_cli::domain::config::{ServiceConfig, SshConfig};
use stratus_cli::domain::resource::Droplet;
use stratus_cli::engine::{Needs, Node, NodeKind, NodeStatus, Phase, Plan};

use crate::mocks::{DROPLET_IP, FakeKeys, FakeProbe, FakeShell, Journal};

fn machine(plan: &mut Plan) -> Node<Droplet> {
    plan.declare("vm", NodeKind::Resource, Needs::none(), || async {
        Ok(Droplet {
            id: "1".into(),
            ipv4: DROPLET_IP.into(),
        })
    })
    .unwrap()
}

fn connect(droplet: &Node<Droplet>) -> Connection {
    open_connection(&FakeKeys::present(), &SshConfig::default(), droplet).unwrap()
}

#[tokio::test]
async fn test_each_step_starts_after_the_previous_one_finishes() {
    let journal = Journal::default();
    let shell = Rc::new(FakeShell::new(&journal));
    let mut plan = Plan::new();
    let vm = machine(&mut plan);
    let conn = connect(&vm);

    let first = activation::chain(&mut plan, &shell, "first", "echo 1", &conn, &vm).unwrap();
    let second = activation::chain(&mut plan, &shell, "second", "echo 2", &conn, &first).unwrap();
    activation::chain(&mut plan, &shell, "third", "echo 3", &conn, &second).unwrap();

    let deployment = plan.run().await;
    let report = &deployment.report;
    for (before, after) in [("first", "second"), ("second", "third")] {
        assert!(
            report.position(before, Phase::Finished).unwrap()
                < report.position(after, Phase::Started).unwrap(),
            "{after} started before {before} finished"
        );
    }
    assert_eq!(journal.with_prefix("exec:"), ["echo 1", "echo 2", "echo 3"]);

    let outputs = deployment.into_outputs().await.unwrap();
    assert_eq!(
        outputs.keys().collect::<Vec<_>>(),
        [
            "first-stderr",
            "first-stdout",
            "second-stderr",
            "second-stdout",
            "third-stderr",
            "third-stdout"
        ]
    );
}

#[tokio::test]
async fn test_upload_failure_prevents_activation() {
    let journal = Journal::default();
    let shell = Rc::new(FakeShell::new(&journal));
    let mut plan = Plan::new();
    let vm = machine(&mut plan);
    let conn = connect(&vm);

    let copied = activation::copy_file(
        &mut plan,
        &shell,
        &conn,
        "upload",
        "unit.service",
        "/etc/systemd/system/unit.service",
        &vm,
    )
    .unwrap();
    let failing = plan
        .declare(
            "check",
            NodeKind::Remote,
            Needs::none().after(&copied),
            || async {
                Err::<CommandOutput, _>(
                    DeployError::RemoteExec {
                        step: "check".into(),
                        message: "exit 3".into(),
                    }
                    .into(),
                )
            },
        )
        .unwrap();
    activation::chain(&mut plan, &shell, "after", "true", &conn, &failing).unwrap();

    let report = plan.run().await.report;

    assert!(matches!(report.status("upload"), Some(NodeStatus::Succeeded)));
    assert!(matches!(report.status("after"), Some(NodeStatus::Skipped(_))));
    assert!(!journal.contains("exec:true"));
}

#[tokio::test]
async fn test_settle_probes_the_machine_before_the_first_step() {
    let journal = Journal::default();
    let shell = Rc::new(FakeShell::new(&journal));
    let probe = Rc::new(FakeProbe::new(&journal));
    let mut plan = Plan::new();
    let vm = machine(&mut plan);
    let conn = connect(&vm);

    let policy = stratus_cli::domain::config::SettleConfig::default().policy();
    let settled = activation::settle(&mut plan, &probe, &conn, policy, &vm).unwrap();
    activation::chain(&mut plan, &shell, "hello", "echo hi", &conn, &settled).unwrap();

    let report = plan.run().await.report;

    assert!(
        report.position(SETTLE_STEP, Phase::Finished).unwrap()
            < report.position("hello", Phase::Started).unwrap()
    );
    assert_eq!(
        journal.entries(),
        [format!("probe:{DROPLET_IP}:22"), "exec:echo hi".to_owned()]
    );
}

#[test]
fn test_step_outputs_collide_with_existing_exports() {
    let journal = Journal::default();
    let shell = Rc::new(FakeShell::new(&journal));
    let mut plan = Plan::new();
    let vm = machine(&mut plan);
    let conn = connect(&vm);
    plan.export("probe-stdout", vm.outputs().map(|d| d.ipv4))
        .unwrap();

    let err = activation::chain(&mut plan, &shell, "probe", "true", &conn, &vm).unwrap_err();

    assert!(matches!(err, DeployError::DuplicateExport(ref n) if n == "probe-stdout"));
    assert!(!plan.contains("probe"), "no node is declared on collision");
}

#[test]
fn test_remote_step_cannot_follow_two_remote_steps() {
    let journal = Journal::default();
    let shell = Rc::new(FakeShell::new(&journal));
    let mut plan = Plan::new();
    let vm = machine(&mut plan);
    let conn = connect(&vm);
    let left = activation::chain(&mut plan, &shell, "left", "true", &conn, &vm).unwrap();
    let right = activation::chain(&mut plan, &shell, "right", "true", &conn, &vm).unwrap();

    let err = plan
        .declare(
            "join",
            NodeKind::Remote,
            Needs::none().after(&left).after(&right),
            || async { Ok(CommandOutput::default()) },
        )
        .map(|_| ())
        .unwrap_err();

    match err {
        DeployError::ChainViolation { step, predecessors } => {
            assert_eq!(step, "join");
            assert_eq!(predecessors, ["left", "right"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_activation_commands_follow_service_config() {
    let service = ServiceConfig {
        unit: "web.service".into(),
        firewall_port: 8080,
        ..ServiceConfig::default()
    };
    let commands: Vec<(String, String)> = activation_commands(&service)
        .into_iter()
        .map(|c| (c.name, c.command))
        .collect();

    assert_eq!(
        commands,
        [
            ("where-is-docker".to_owned(), "which docker".to_owned()),
            ("open-firewall".to_owned(), "ufw allow 8080".to_owned()),
            (
                "enable-systemd-manifest".to_owned(),
                "systemctl enable web.service".to_owned()
            ),
            (
                "start-systemd-manifest".to_owned(),
                "systemctl start web.service".to_owned()
            ),
        ]
    );
}
