//! Full runs of the built-in tests against in-memory hosts

mod common;

use anyhow::Result;
use common::{context, Harness, MemorySink};
use perftest_config::ExpectedResultType;
use perftest_core::Level;
use serde_json::json;

fn levels(results: &perftest_core::ResultCollection) -> Vec<Level> {
    results.iter().map(|r| r.level()).collect()
}

#[tokio::test]
async fn test_enrollment_run_completes() -> Result<()> {
    let h = Harness::new();
    h.registered_hosts(3);
    let sink = MemorySink::stdout();

    let report = h
        .dispatcher()
        .dispatch(&context("EnrollmentTest", 2), &sink)
        .await?;

    assert_eq!(levels(&report.results), vec![Level::Success]);
    let result = report.results.iter().next().unwrap();
    assert_eq!(result.kw_str("msg"), Some("All clients enrolled successfully."));
    assert_eq!(result.source(), "perftest_plugins::enrollment");
    assert_eq!(report.exit_code(), 0);
    assert_eq!(report.failed_stage, None);

    // the whole stage sequence ran, in order
    assert_eq!(
        h.procedures.names(),
        vec!["ping", "server_config", "install-server", "count_hosts", "fetch_logs"]
    );
    let git = h.runner.calls();
    assert_eq!(git.len(), 1);
    assert_eq!(git[0].program, "git");

    let server = h.remote.commands_on("server");
    assert!(server[0].starts_with("nohup sar -o ~/saroutput"));
    assert!(server.iter().any(|c| c == "test -s ~/saroutput"));
    for client in ["client000", "client001"] {
        let commands = h.remote.commands_on(client);
        assert_eq!(commands.len(), 1);
        assert!(commands[0].contains("nameserver 192.168.3.2"));
        assert!(commands[0].contains("sleep $(( "));
        assert!(commands[0].ends_with(perftest_plugins::enrollment::INSTALL_CLIENT));
    }

    let returncodes = std::fs::read_to_string(h.sync_dir().join("returncodes"))?;
    assert_eq!(
        returncodes,
        "Host client000 returned 0\nHost client001 returned 0\n"
    );
    assert!(h.metadata_dir().join("inventory").exists());
    assert!(h.metadata_dir().join("ansible.cfg").exists());

    let archive = report.archive.expect("completed runs are archived");
    assert!(archive.exists());
    let name = archive.file_name().unwrap().to_string_lossy().into_owned();
    assert!(name.starts_with("EnrollmentTest-"));
    assert!(name.ends_with("-fedora-test-2clients-0fails.tar.gz"));

    // stdout variant of the JSON rendering ends with a newline
    assert!(sink.content().starts_with("[{\"source\": "));
    assert!(sink.content().ends_with("]\n"));
    Ok(())
}

#[tokio::test]
async fn test_partial_topology_warns_and_continues() -> Result<()> {
    let h = Harness::new().missing_hosts(2);
    h.registered_hosts(8);
    let sink = MemorySink::stdout();

    let report = h
        .dispatcher()
        .dispatch(&context("EnrollmentTest", 9), &sink)
        .await?;

    assert_eq!(levels(&report.results), vec![Level::Warning, Level::Success]);
    let warning = report.results.iter().next().unwrap();
    assert_eq!(
        warning.kw_str("msg"),
        Some("Number of hosts provisioned (8) does not match requested amount (10)")
    );
    assert_eq!(warning.kw()["provisioned"], json!(8));
    assert_eq!(warning.kw()["requested"], json!(10));

    // clients that never came up are not touched
    assert_eq!(h.remote.commands_on("client006").len(), 1);
    assert!(h.remote.commands_on("client007").is_empty());
    assert!(h.remote.commands_on("client008").is_empty());

    assert_eq!(report.exit_code(), 1);
    assert!(report.archive.is_some());
    Ok(())
}

#[tokio::test]
async fn test_zero_clients() -> Result<()> {
    let h = Harness::new();
    h.registered_hosts(1);
    let sink = MemorySink::stdout();

    let report = h
        .dispatcher()
        .dispatch(&context("EnrollmentTest", 0), &sink)
        .await?;

    assert_eq!(levels(&report.results), vec![Level::Success]);
    assert_eq!(report.exit_code(), 0);
    let returncodes = std::fs::read_to_string(h.sync_dir().join("returncodes"))?;
    assert!(returncodes.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_failed_client_install() -> Result<()> {
    let h = Harness::new();
    h.remote.fail_host("client001");
    h.registered_hosts(2);
    let sink = MemorySink::stdout();

    let report = h
        .dispatcher()
        .dispatch(&context("EnrollmentTest", 2), &sink)
        .await?;

    assert_eq!(levels(&report.results), vec![Level::Error]);
    let error = report.results.iter().next().unwrap();
    assert_eq!(
        error.kw_str("error"),
        Some("Client installs succeeded number (1) does not match host-find output (2).")
    );
    assert_eq!(error.kw()["failed"], json!(1));

    let returncodes = std::fs::read_to_string(h.sync_dir().join("returncodes"))?;
    assert!(returncodes.contains("Host client001 returned 1\n"));
    let archive = report.archive.unwrap();
    assert!(archive.to_string_lossy().ends_with("-2clients-1fails.tar.gz"));
    Ok(())
}

#[tokio::test]
async fn test_sequential_install_has_no_sync_sleep() -> Result<()> {
    let h = Harness::new();
    h.registered_hosts(3);
    let mut ctx = context("EnrollmentTest", 2);
    ctx.sequential = true;

    let report = h.dispatcher().dispatch(&ctx, &MemorySink::stdout()).await?;

    assert_eq!(report.exit_code(), 0);
    let installs: Vec<_> = h
        .remote
        .calls()
        .into_iter()
        .filter(|(host, _)| host.starts_with("client"))
        .collect();
    assert_eq!(installs.len(), 2);
    assert_eq!(installs[0].0, "client000");
    assert_eq!(installs[1].0, "client001");
    assert!(installs.iter().all(|(_, command)| !command.contains("sleep")));
    Ok(())
}

#[tokio::test]
async fn test_replicas_installed_tier_by_tier() -> Result<()> {
    let h = Harness::new();
    h.registered_hosts(7);
    let mut ctx = context("EnrollmentTest", 1);
    ctx.replicas = 5;

    let report = h.dispatcher().dispatch(&ctx, &MemorySink::stdout()).await?;
    assert_eq!(levels(&report.results), vec![Level::Success]);

    let names = h.procedures.names();
    for replica in 0..5 {
        assert!(names.contains(&format!("replica{}_config", replica)));
    }

    let limits: Vec<_> = h
        .procedures
        .calls()
        .into_iter()
        .filter(|p| p.name == "install-replica")
        .map(|p| p.limit)
        .collect();
    assert_eq!(
        limits,
        vec![
            Some("ipareplicas_tier0".to_string()),
            Some("ipareplicas_tier1".to_string())
        ]
    );

    let inventory = std::fs::read_to_string(h.metadata_dir().join("inventory"))?;
    assert!(inventory.contains("ipareplicas_tier0"));
    assert!(inventory.contains("ipareplicas_tier1"));
    Ok(())
}

#[tokio::test]
async fn test_group_size_run_with_threshold() -> Result<()> {
    let h = Harness::new();
    h.procedures.on_fetch(
        h.sync_dir().join("server").join("group_add_member.log"),
        "ipa group-add-member --users tuser1 allusers --no-members\nreal 4.20\nuser 0.90\nsys 0.10\n0\n",
    );
    let mut ctx = context("GroupSizeTest", 1);
    ctx.threads = Some(100);
    ctx.expected_result_type = Some(ExpectedResultType::Time);
    ctx.expected_result = Some(10.0);

    let report = h.dispatcher().dispatch(&ctx, &MemorySink::stdout()).await?;

    assert_eq!(levels(&report.results), vec![Level::Success, Level::Success]);
    assert_eq!(
        report.results.iter().next().unwrap().kw_str("msg"),
        Some("Total users 100, subgroups 0, time 4.20")
    );
    assert_eq!(report.exit_code(), 0);

    assert!(h
        .procedures
        .names()
        .contains(&"groupsize_server_config".to_string()));
    let server = h.remote.commands_on("server");
    assert!(server.contains(&"ipa user-add --first tim --last user tuser1".to_string()));
    assert!(server
        .iter()
        .any(|c| c.contains("/usr/bin/time -p ipa group-add-member --users tuser1 allusers")));

    let archive = report.archive.unwrap();
    assert!(archive
        .to_string_lossy()
        .ends_with("-fedora-test-100threads-Nonesizelimit-4.20real.tar.gz"));
    Ok(())
}

#[tokio::test]
async fn test_threshold_exceeded() -> Result<()> {
    let h = Harness::new();
    h.procedures.on_fetch(
        h.sync_dir().join("server").join("group_add_member.log"),
        "real 42.00\n0\n",
    );
    let mut ctx = context("GroupSizeTest", 1);
    ctx.threads = Some(10);
    ctx.expected_result_type = Some(ExpectedResultType::Time);
    ctx.expected_result = Some(10.0);

    let report = h.dispatcher().dispatch(&ctx, &MemorySink::stdout()).await?;

    assert_eq!(levels(&report.results), vec![Level::Success, Level::Error]);
    assert_eq!(report.exit_code(), 1);
    // a failed threshold is a result, not an aborted run
    assert!(report.archive.is_some());
    Ok(())
}
