//! Participant registry under concurrent sessions.

use std::sync::Arc;

use fed_saml::handler::{InMemorySession, SessionStore};

use crate::common::{idp_session, TestEnv};

/// Concurrent registrations keep one entry per participant and session.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registration() -> anyhow::Result<()> {
    let env = TestEnv::new(false)?;
    let registry = env.registry.clone();

    let mut tasks = Vec::new();
    for session in 0..16 {
        for participant in 0..8 {
            let registry = registry.clone();
            tasks.push(tokio::spawn(async move {
                let session_id = format!("session-{session}");
                let logout_url = format!("https://sp{participant}.example.com/slo");
                registry.register(&session_id, &logout_url, participant % 2 == 0);
                registry.register(&session_id, &logout_url, participant % 2 == 0);
            }));
        }
    }
    for task in tasks {
        task.await?;
    }

    assert_eq!(registry.total_sessions(), 16);
    for session in 0..16 {
        assert_eq!(registry.participant_count(&format!("session-{session}")), 8);
    }
    assert_eq!(registry.binding("https://sp0.example.com/slo"), Some(true));
    assert_eq!(registry.binding("https://sp1.example.com/slo"), Some(false));
    Ok(())
}

/// Logins through the chain register participants that a global logout
/// can unwind in reverse order.
#[tokio::test]
async fn test_logins_register_participants() -> anyhow::Result<()> {
    let env = Arc::new(TestEnv::new(false)?);

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let env = env.clone();
        tasks.push(tokio::task::spawn_blocking(move || -> anyhow::Result<String> {
            let idp = idp_session(&["user"]);
            let sp = InMemorySession::new();
            env.login("alice", &idp, &sp)?;
            Ok(idp.id().to_string())
        }));
    }

    let mut session_ids = Vec::new();
    for task in tasks {
        session_ids.push(task.await??);
    }
    assert_eq!(env.registry.total_sessions(), session_ids.len());

    let session_id = &session_ids[0];
    assert_eq!(env.registry.participant_count(session_id), 1);
    assert!(env.registry.register_transit(session_id, "https://sp.example.com/acs"));
    assert!(!env.registry.register_transit(session_id, "https://sp.example.com/acs"));
    assert_eq!(env.registry.transit_count(session_id), 1);

    assert_eq!(env.registry.pop(session_id).as_deref(), Some("https://sp.example.com/acs"));
    assert!(env.registry.deregister_transit(session_id, "https://sp.example.com/acs"));
    assert_eq!(env.registry.binding("https://sp.example.com/acs"), None);

    env.registry.remove_session(session_id);
    assert_eq!(env.registry.total_sessions(), session_ids.len() - 1);
    Ok(())
}
