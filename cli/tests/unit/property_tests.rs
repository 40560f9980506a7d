//! Property-based tests for id conversion and chain ordering.

#![allow(clippy::unwrap_used)]

use std::rc::Rc;

use proptest::prelude::*;
use stratus_cli::application::services::activation;
use stratus_cli::application::services::connection::open_connection;
use stratus_cli::domain::DeployError;
use stratus_cli::domain::config::SshConfig;
use stratus_cli::domain::resource::{Droplet, parse_droplet_id};
use stratus_cli::engine::{Needs, NodeKind, Phase, Plan};

use crate::mocks::{DROPLET_IP, FakeKeys, FakeShell, Journal};

fn current_thread() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #[test]
    fn prop_parse_droplet_id_accepts_any_u64(id in any::<u64>()) {
        prop_assert_eq!(parse_droplet_id(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn prop_parse_droplet_id_rejects_non_digits(raw in "[a-z][a-z0-9-]{0,15}") {
        let err = parse_droplet_id(&raw).unwrap_err();
        let is_conversion = matches!(err, DeployError::Conversion { ref value, .. } if *value == raw);
        prop_assert!(is_conversion);
    }

    /// Whatever its length, a chain executes strictly in declaration order.
    #[test]
    fn prop_chain_runs_in_declaration_order(len in 1usize..12) {
        let journal = Journal::default();
        let report = current_thread().block_on(async {
            let shell = Rc::new(FakeShell::new(&journal));
            let mut plan = Plan::new();
            let vm = plan
                .declare("vm", NodeKind::Resource, Needs::none(), || async {
                    Ok(Droplet { id: "7".into(), ipv4: DROPLET_IP.into() })
                })
                .unwrap();
            let conn = open_connection(&FakeKeys::present(), &SshConfig::default(), &vm).unwrap();

            let mut last = activation::chain(&mut plan, &shell, "step-0", "echo 0", &conn, &vm).unwrap();
            for i in 1..len {
                last = activation::chain(
                    &mut plan,
                    &shell,
                    &format!("step-{i}"),
                    format!("echo {i}"),
                    &conn,
                    &last,
                )
                .unwrap();
            }
            plan.run().await.report
        });

        let expected: Vec<String> = (0..len).map(|i| format!("echo {i}")).collect();
        prop_assert_eq!(journal.with_prefix("exec:"), expected);
        for i in 1..len {
            let prev = report.position(&format!("step-{}", i - 1), Phase::Finished).unwrap();
            let next = report.position(&format!("step-{i}"), Phase::Started).unwrap();
            prop_assert!(prev < next);
        }
    }
}
