//! Integration tests for StateManager with state change events
//!
//! These tests verify that the StateManager correctly:
//! - Emits state change events on mutations
//! - Supports multiple subscribers
//! - Handles concurrent access from multiple threads
//! - Rejects transitions atomically through try_update
//! - Reports a real scan job's lifecycle

use primescan::{
    ChannelSink, JobState, ScanError, ScanRange, ScanService, ScanState, StateChange,
    StateManager,
};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::broadcast::Receiver;
use tokio::time::{Duration, timeout};

async fn next_change(rx: &mut Receiver<StateChange>) -> StateChange {
    timeout(Duration::from_millis(100), rx.recv())
        .await
        .expect("Timeout waiting for event")
        .expect("Channel closed")
}

#[tokio::test]
async fn test_begin_job_emits_range_and_state_events() {
    let state = Arc::new(StateManager::new());
    let mut rx = state.subscribe();

    state.update(|s| {
        s.begin_job(ScanRange::new(1, 20));
    });

    assert_eq!(
        next_change(&mut rx).await,
        StateChange::RangeChanged {
            range: ScanRange::new(1, 20)
        }
    );
    assert_eq!(
        next_change(&mut rx).await,
        StateChange::JobStateChanged {
            job_id: 1,
            from: JobState::Idle,
            to: JobState::Running,
        }
    );
}

#[tokio::test]
async fn test_multiple_subscribers_receive_events() {
    let state = Arc::new(StateManager::new());
    let mut rx1 = state.subscribe();
    let mut rx2 = state.subscribe();
    let mut rx3 = state.subscribe();

    state.update(|s| s.record_prime(7));

    for rx in [&mut rx1, &mut rx2, &mut rx3] {
        assert_eq!(
            next_change(rx).await,
            StateChange::ProgressUpdated {
                primes_found: 1,
                last_prime: Some(7),
            }
        );
    }
}

#[tokio::test]
async fn test_pause_records_resume_position() {
    let state = Arc::new(StateManager::new());
    state.update(|s| {
        s.begin_job(ScanRange::new(1, 100));
    });
    let mut rx = state.subscribe();

    state.update(|s| {
        s.job_state = JobState::Paused;
        s.resume_at = Some(42);
    });

    assert!(matches!(
        next_change(&mut rx).await,
        StateChange::JobStateChanged {
            to: JobState::Paused,
            ..
        }
    ));
    assert_eq!(
        next_change(&mut rx).await,
        StateChange::ResumePositionRecorded { resume_at: 42 }
    );
}

#[tokio::test]
async fn test_reset_emits_state_reset() {
    let state = Arc::new(StateManager::new());
    state.update(|s| {
        s.begin_job(ScanRange::new(1, 10));
        s.job_state = JobState::Completed;
    });
    let mut rx = state.subscribe();

    let changes = state.update(ScanState::reset_job);

    assert_eq!(changes.last(), Some(&StateChange::StateReset));
    assert!(matches!(
        next_change(&mut rx).await,
        StateChange::JobStateChanged {
            from: JobState::Completed,
            to: JobState::Idle,
            ..
        }
    ));
    assert_eq!(next_change(&mut rx).await, StateChange::StateReset);
}

#[tokio::test]
async fn test_failed_transition_leaves_state_untouched() {
    let state = Arc::new(StateManager::new());
    let mut rx = state.subscribe();

    let result: Result<(), ScanError> = state.try_update(|s| {
        Err(ScanError::InvalidTransition {
            command: "pause",
            state: s.job_state,
        })
    });

    assert!(result.is_err());
    assert_eq!(state.snapshot(), Default::default());
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_concurrent_state_access() {
    let state = Arc::new(StateManager::new());
    let mut handles = vec![];

    for i in 0..10 {
        let state_clone = Arc::clone(&state);
        handles.push(tokio::spawn(async move {
            for j in 0..10 {
                state_clone.update(|s| s.record_prime(i * 10 + j));
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(state.read(|s| s.primes_found), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_scan_job_lifecycle_events() {
    let (sink, _events) = ChannelSink::channel();
    let service = ScanService::new(Arc::new(sink), Handle::current());
    let mut rx = service.state().subscribe();

    let job = service.start(ScanRange::new(1, 10)).unwrap();
    assert_eq!(
        timeout(Duration::from_secs(10), job.wait()).await.unwrap(),
        JobState::Completed
    );

    let mut transitions = Vec::new();
    let mut primes = Vec::new();
    while let Ok(change) = rx.try_recv() {
        match change {
            StateChange::JobStateChanged { from, to, .. } => transitions.push((from, to)),
            StateChange::ProgressUpdated {
                last_prime: Some(prime),
                ..
            } => primes.push(prime),
            _ => {}
        }
    }

    assert_eq!(
        transitions,
        vec![
            (JobState::Idle, JobState::Running),
            (JobState::Running, JobState::Completed),
            (JobState::Completed, JobState::Idle),
        ]
    );
    assert_eq!(primes, vec![2, 3, 5, 7]);
}
