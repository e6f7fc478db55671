//! Integration tests for the session registry behind a shared lock.
//!
//! These drive the registry the way the server does: from many Tokio
//! tasks through one `Arc<Mutex<SessionRegistry>>`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use fourfold_grid::Mark;
use fourfold_protocol::{Identity, SessionStatus};
use fourfold_session::{RegistryConfig, SessionEvent, SessionRegistry};
use tokio::sync::Mutex;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_arrivals_pair_each_identity_once() {
    let (registry, _rx) = SessionRegistry::new(RegistryConfig::default());
    let registry = Arc::new(Mutex::new(registry));

    let mut handles = Vec::new();
    for i in 0..40 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            let identity = Identity::new(format!("player-{i}"));
            registry.lock().await.assign_participant(&identity)
        }));
    }
    let mut waiting = 0;
    for handle in handles {
        if handle.await.unwrap().waiting {
            waiting += 1;
        }
    }

    let reg = registry.lock().await;
    // 40 arrivals: every odd arrival pairs with the one before it.
    assert_eq!(waiting, 20);
    assert_eq!(reg.len(), 20);

    let mut seen: HashMap<Identity, usize> = HashMap::new();
    let mut sessions = HashSet::new();
    for i in 0..40 {
        let identity = Identity::new(format!("player-{i}"));
        let session = reg.session_for(&identity).expect("every identity paired");
        sessions.insert(session.id.clone());
        assert_ne!(
            session.seat(Mark::One).identity,
            session.seat(Mark::Two).identity
        );
        *seen.entry(identity).or_default() += 1;
    }
    assert_eq!(sessions.len(), 20);
    assert!(seen.values().all(|&n| n == 1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_moves_same_session_accept_exactly_one() {
    let (mut registry, _rx) = SessionRegistry::new(RegistryConfig::default());
    registry.assign_participant(&Identity::new("alice"));
    let session_id = registry
        .assign_participant(&Identity::new("bob"))
        .session
        .unwrap()
        .id;
    let registry = Arc::new(Mutex::new(registry));

    // Ten copies of alice's first move race each other; only one can be
    // her turn.
    let mut handles = Vec::new();
    for column in 0..10usize {
        let registry = Arc::clone(&registry);
        let session_id = session_id.clone();
        handles.push(tokio::spawn(async move {
            registry
                .lock()
                .await
                .handle_move(&Identity::new("alice"), &session_id, column % 7)
                .is_ok()
        }));
    }
    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            accepted += 1;
        }
    }

    assert_eq!(accepted, 1);
    let reg = registry.lock().await;
    assert_eq!(reg.session(&session_id).unwrap().turn, Mark::Two);
}

#[tokio::test(start_paused = true)]
async fn test_forfeit_through_event_channel_fires_once() {
    let (registry, mut rx) = SessionRegistry::new(RegistryConfig {
        reconnect_window_secs: 30,
        finished_retention_secs: 60,
    });
    let registry = Arc::new(Mutex::new(registry));
    {
        let mut reg = registry.lock().await;
        reg.assign_participant(&Identity::new("alice"));
        reg.assign_participant(&Identity::new("bob"));
        reg.mark_disconnected(&Identity::new("bob"));
    }

    tokio::time::advance(Duration::from_secs(31)).await;
    for _ in 0..3 {
        registry.lock().await.sweep_disconnects();
        tokio::time::advance(Duration::from_secs(5)).await;
    }

    let mut finished = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let SessionEvent::Finished(game) = event {
            finished.push(game);
        }
    }
    assert_eq!(finished.len(), 1);
    assert_eq!(finished[0].winner, Some(Identity::new("alice")));
    assert_eq!(finished[0].players.len(), 2);
}

#[tokio::test]
async fn test_fallback_match_plays_to_a_result() {
    let (mut reg, mut rx) = SessionRegistry::new(RegistryConfig::default());
    let alice = Identity::new("alice");
    reg.assign_participant(&alice);
    let session_id = reg.fallback_if_waiting(&alice).unwrap().id;

    // alice always plays the leftmost open column; the opponent answers
    // each move until someone wins or the grid fills.
    let mut guard = 0;
    loop {
        let session = reg.session(&session_id).unwrap();
        if session.is_finished() {
            break;
        }
        let column = session.grid().playable_columns().next().unwrap();
        reg.handle_move(&alice, &session_id, column).unwrap();
        reg.play_opponent_turn(&session_id);
        guard += 1;
        assert!(guard <= 21, "a match cannot last more than 21 rounds");
    }

    let session = reg.session(&session_id).unwrap();
    assert_eq!(session.status, SessionStatus::Finished);

    let mut finished = 0;
    let mut moves = 0;
    while let Ok(event) = rx.try_recv() {
        match event {
            SessionEvent::Finished(_) => finished += 1,
            SessionEvent::MovePlayed { .. } => moves += 1,
        }
    }
    assert_eq!(finished, 1);
    assert!(moves >= 7);
}
