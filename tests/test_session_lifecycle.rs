// ABOUTME: Integration tests for session creation, lookup and teardown
// Uses the fake spawner so no real processes are started

mod common;

use agents_mux::session::{Channel, EventKind, ProcessStatus, SessionCommand, SessionEvent};
use agents_mux::MuxError;
use common::{eventually, manager, next_event, SHELL};
use pretty_assertions::assert_eq;
use std::collections::HashMap;
use std::path::Path;

#[tokio::test]
async fn test_create_session_initial_state() {
    let (manager, spawner, _sink) = manager();

    let session = manager
        .create_session("/repo/wt1", SessionCommand::new("agent"))
        .unwrap();

    assert_eq!(session.workspace_path(), Path::new("/repo/wt1"));
    assert_eq!(session.mode(), Channel::Primary);
    assert!(!session.is_active());
    assert!(!session.has_secondary());
    assert!(session.history(Channel::Primary).is_empty());
    assert!(session.history(Channel::Secondary).is_empty());

    let agent = spawner.process("agent");
    assert_eq!(agent.spec.cwd, Path::new("/repo/wt1"));
    assert_eq!(agent.spec.size, manager.settings().initial_size);
    assert_eq!(spawner.spawns_of(SHELL).len(), 0);
}

#[tokio::test]
async fn test_command_args_and_env_reach_spawn() {
    let (manager, spawner, _sink) = manager();
    let mut command = SessionCommand::new("agent").with_args(["--resume", "--verbose"]);
    command.env = HashMap::from([("AGENT_MODE".to_string(), "fast".to_string())]);

    manager.create_session("/repo/wt1", command).unwrap();

    let agent = spawner.process("agent");
    assert_eq!(agent.spec.args, vec!["--resume".to_string(), "--verbose".to_string()]);
    assert_eq!(agent.spec.env.get("AGENT_MODE").map(String::as_str), Some("fast"));
}

#[tokio::test]
async fn test_duplicate_workspace_is_rejected() {
    let (manager, spawner, _sink) = manager();
    let first = manager
        .create_session("/repo/wt1", SessionCommand::new("agent"))
        .unwrap();

    let err = manager
        .create_session("/repo/wt1", SessionCommand::new("agent"))
        .unwrap_err();

    assert!(matches!(err, MuxError::SessionAlreadyExists(ref path) if path == Path::new("/repo/wt1")));
    assert_eq!(spawner.spawn_count(), 1);
    assert_eq!(manager.get_session("/repo/wt1").unwrap().id(), first.id());
}

#[tokio::test]
async fn test_spawn_failure_registers_nothing() {
    // BEHAVIOR: creation never partially succeeds; the path stays free for a retry
    let (manager, spawner, _sink) = manager();
    spawner.fail_program("missing-agent");

    let err = manager
        .create_session("/repo/wt1", SessionCommand::new("missing-agent"))
        .unwrap_err();

    assert!(err.is_spawn_failure());
    assert!(matches!(err, MuxError::ProcessSpawnFailure { channel: Channel::Primary, .. }));
    assert!(manager.get_session("/repo/wt1").is_none());
    assert!(manager.sessions().is_empty());

    manager
        .create_session("/repo/wt1", SessionCommand::new("agent"))
        .unwrap();
    assert!(manager.get_session("/repo/wt1").is_some());
}

#[tokio::test]
async fn test_lookup_of_unknown_workspace() {
    let (manager, _spawner, _sink) = manager();

    assert!(manager.get_session("/nowhere").is_none());
    assert!(matches!(
        manager.require_session("/nowhere"),
        Err(MuxError::SessionNotFound(_))
    ));
    assert!(manager.destroy_session("/nowhere").is_none());
    assert!(manager.resize_session("/nowhere", 100, 40).is_none());
    manager.set_session_active("/nowhere", true);
}

#[tokio::test]
async fn test_sessions_listing_is_sorted() {
    let (manager, _spawner, _sink) = manager();
    for path in ["/repo/wt2", "/repo/main", "/repo/wt1"] {
        manager
            .create_session(path, SessionCommand::new("agent"))
            .unwrap();
    }

    let paths: Vec<_> = manager
        .sessions()
        .into_iter()
        .map(|summary| summary.workspace_path)
        .collect();
    assert_eq!(paths, vec![Path::new("/repo/main"), Path::new("/repo/wt1"), Path::new("/repo/wt2")]);
}

#[tokio::test]
async fn test_destroy_without_secondary() {
    let (manager, spawner, _sink) = manager();
    manager
        .create_session("/repo/wt1", SessionCommand::new("agent"))
        .unwrap();

    let report = manager.destroy_session("/repo/wt1").unwrap();

    assert!(report.is_clean());
    assert_eq!(spawner.process("agent").kills(), 1);
    assert!(manager.get_session("/repo/wt1").is_none());
}

#[tokio::test]
async fn test_destroy_survives_failing_secondary_kill() {
    // BEHAVIOR: one dead handle must not stop the primary kill or the removal
    let (manager, spawner, _sink) = manager();
    let session = manager
        .create_session("/repo/wt1", SessionCommand::new("agent"))
        .unwrap();
    manager.toggle_mode(&session).unwrap();
    spawner.process(SHELL).fail_kill();

    let report = manager.destroy_session("/repo/wt1").unwrap();

    assert_eq!(report.session, session.id());
    assert_eq!(report.kill_failures.len(), 1);
    assert_eq!(report.kill_failures[0].0, Channel::Secondary);
    assert_eq!(spawner.process("agent").kills(), 1);
    assert_eq!(spawner.process(SHELL).kills(), 1);
    assert!(manager.get_session("/repo/wt1").is_none());
    assert!(!session.is_active());
}

#[tokio::test]
async fn test_destroy_survives_failing_primary_kill() {
    let (manager, spawner, _sink) = manager();
    let session = manager
        .create_session("/repo/wt1", SessionCommand::new("agent"))
        .unwrap();
    manager.toggle_mode(&session).unwrap();
    spawner.process("agent").fail_kill();

    let report = manager.destroy_session("/repo/wt1").unwrap();

    assert_eq!(report.kill_failures.len(), 1);
    assert_eq!(report.kill_failures[0].0, Channel::Primary);
    assert_eq!(spawner.process(SHELL).kills(), 1);
    assert!(manager.get_session("/repo/wt1").is_none());
}

#[tokio::test]
async fn test_recreate_after_destroy_gets_new_identity() {
    let (manager, _spawner, _sink) = manager();
    let first = manager
        .create_session("/repo/wt1", SessionCommand::new("agent"))
        .unwrap();
    manager.destroy_session("/repo/wt1");

    let second = manager
        .create_session("/repo/wt1", SessionCommand::new("agent"))
        .unwrap();

    assert_ne!(first.id(), second.id());
}

#[tokio::test]
async fn test_destroy_all_tears_everything_down() {
    let (manager, spawner, _sink) = manager();
    for path in ["/repo/a", "/repo/b"] {
        manager
            .create_session(path, SessionCommand::new("agent"))
            .unwrap();
    }

    let reports = manager.destroy_all();

    assert_eq!(reports.len(), 2);
    assert!(manager.sessions().is_empty());
    assert!(spawner.spawns_of("agent").iter().all(|p| p.kills() == 1));
}

#[tokio::test]
async fn test_primary_exit_keeps_session_registered() {
    // BEHAVIOR: exit is reported, never auto-destroys
    let (manager, spawner, _sink) = manager();
    let mut exits = manager.subscribe_to(&[EventKind::Exit]);
    let session = manager
        .create_session("/repo/wt1", SessionCommand::new("agent"))
        .unwrap();

    spawner.process("agent").exit(Some(3));

    let event = next_event(&mut exits).await;
    assert_eq!(
        event,
        SessionEvent::Exit {
            session: session.id(),
            workspace: "/repo/wt1".into(),
            channel: Channel::Primary,
            code: Some(3),
        }
    );
    assert_eq!(session.process_status(Channel::Primary), Some(ProcessStatus::Exited(Some(3))));
    assert!(manager.get_session("/repo/wt1").is_some());
    assert_eq!(manager.sessions()[0].indicator(), "✗");
}

#[tokio::test]
async fn test_primary_exit_deactivates_session() {
    let (manager, spawner, sink) = manager();
    let session = manager
        .create_session("/repo/wt1", SessionCommand::new("agent"))
        .unwrap();
    manager.set_session_active("/repo/wt1", true);
    sink.take();

    spawner.process("agent").exit(None);

    eventually(|| !session.is_active()).await;
    assert_eq!(sink.contents(), b"\x1b[?1004l".to_vec());
}

#[tokio::test]
async fn test_toggle_after_destroy_spawns_no_shell() {
    // BEHAVIOR: a handle kept past teardown cannot start an orphaned shell
    let (manager, spawner, _sink) = manager();
    let session = manager
        .create_session("/repo/wt1", SessionCommand::new("agent"))
        .unwrap();
    manager.destroy_session("/repo/wt1");

    let err = manager.toggle_mode(&session).unwrap_err();

    assert!(matches!(err, MuxError::SessionNotFound(ref path) if path == Path::new("/repo/wt1")));
    assert_eq!(spawner.spawns_of(SHELL).len(), 0);
    assert!(!session.has_secondary());
    assert_eq!(session.mode(), Channel::Primary);
}
