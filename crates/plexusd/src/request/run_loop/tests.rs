//! Unit tests for the role branch of the run-loop.

use rstest::rstest;

use super::*;
use crate::forward::{CompletionState, PeerId, SubmitError};
use crate::property::builtin::{DEFAULT_QUERY_TIMEOUT_MS, QUERY_TIMEOUT};
use crate::response::ResponseMessage;
use crate::session::{SessionId, SessionLayer};
use crate::tests::support::{Captured, MockTransport, RunBench, request};

const WRITE: &str = "SET query-timeout=5";

fn default_timeout() -> String {
    DEFAULT_QUERY_TIMEOUT_MS.to_string()
}

#[rstest]
fn standalone_runs_the_body_directly() {
    let mut bench = RunBench::new(ProcessRole::Standalone);
    let transport = MockTransport::new();
    let mut request = request(1, SessionId::new(1), WRITE);

    let outcome = bench.run(ProcessRole::Standalone, &transport, &mut request);

    assert_eq!(outcome, Ok(RunOutcome::Done));
    assert_eq!(bench.value(QUERY_TIMEOUT), Some("5"));
    assert!(bench.sessions.is_served(request.id()));
    assert!(!request.forward_started());
}

#[rstest]
fn leader_fans_out_once_and_waits_for_every_replica() {
    let mut bench = RunBench::new(ProcessRole::Leader);
    let captured = Captured::default();
    let mut transport = MockTransport::new();
    transport
        .expect_followers()
        .once()
        .returning(|| vec![PeerId::new(1), PeerId::new(2)]);
    let sink = captured.clone();
    transport
        .expect_submit()
        .times(2)
        .returning(move |_, _, handle| {
            sink.push(handle);
            Ok(())
        });
    let mut request = request(1, SessionId::new(1), WRITE);

    assert_eq!(
        bench.run(ProcessRole::Leader, &transport, &mut request),
        Ok(RunOutcome::More)
    );
    assert!(request.forward_started());
    assert_eq!(bench.value(QUERY_TIMEOUT), Some(default_timeout().as_str()));

    assert_eq!(
        bench.run(ProcessRole::Leader, &transport, &mut request),
        Ok(RunOutcome::More)
    );

    captured.resolve_next(CompletionState::Served(Vec::new()));
    assert_eq!(
        bench.run(ProcessRole::Leader, &transport, &mut request),
        Ok(RunOutcome::More)
    );
    assert_eq!(bench.value(QUERY_TIMEOUT), Some(default_timeout().as_str()));

    captured.resolve_next(CompletionState::Failed("replica down".to_owned()));
    assert_eq!(bench.wakeups(), vec![request.id(), request.id()]);
    assert_eq!(
        bench.run(ProcessRole::Leader, &transport, &mut request),
        Ok(RunOutcome::Done)
    );
    assert_eq!(bench.value(QUERY_TIMEOUT), Some("5"));
    assert_eq!(request.responses(), [ResponseMessage::Ok { applied: 1 }]);
    assert!(bench.sessions.is_served(request.id()));
    assert_eq!(request.forward().child_count(), 0);
    assert!(request.forward_started());
}

#[rstest]
fn leader_holds_the_write_while_a_follower_inbox_is_full() {
    let mut bench = RunBench::new(ProcessRole::Leader);
    let captured = Captured::default();
    let mut transport = MockTransport::new();
    transport
        .expect_followers()
        .once()
        .returning(|| vec![PeerId::new(1)]);
    let sink = captured.clone();
    let mut offers = 0;
    transport
        .expect_submit()
        .times(2)
        .returning(move |target, _, handle| {
            offers += 1;
            if offers == 1 {
                return Err(SubmitError::Busy { peer: target });
            }
            sink.push(handle);
            Ok(())
        });
    let mut request = request(1, SessionId::new(1), WRITE);

    assert_eq!(
        bench.run(ProcessRole::Leader, &transport, &mut request),
        Ok(RunOutcome::More)
    );
    assert_eq!(captured.len(), 0);
    assert_eq!(bench.value(QUERY_TIMEOUT), Some(default_timeout().as_str()));

    assert_eq!(
        bench.run(ProcessRole::Leader, &transport, &mut request),
        Ok(RunOutcome::More)
    );
    assert_eq!(captured.len(), 1);
    assert!(request.forward().awaiting_room().is_empty());
    assert_eq!(bench.value(QUERY_TIMEOUT), Some(default_timeout().as_str()));

    captured.resolve_next(CompletionState::Served(Vec::new()));
    assert_eq!(
        bench.run(ProcessRole::Leader, &transport, &mut request),
        Ok(RunOutcome::Done)
    );
    assert_eq!(bench.value(QUERY_TIMEOUT), Some("5"));
}

#[rstest]
fn leader_without_followers_falls_through_immediately() {
    let mut bench = RunBench::new(ProcessRole::Leader);
    let mut transport = MockTransport::new();
    transport.expect_followers().once().returning(Vec::new);
    let mut request = request(1, SessionId::new(1), WRITE);

    let outcome = bench.run(ProcessRole::Leader, &transport, &mut request);

    assert_eq!(outcome, Ok(RunOutcome::Done));
    assert_eq!(bench.value(QUERY_TIMEOUT), Some("5"));
}

#[rstest]
fn leader_runs_reads_without_fan_out() {
    let mut bench = RunBench::new(ProcessRole::Leader);
    let transport = MockTransport::new();
    let mut request = request(1, SessionId::new(1), "SHOW smp-role");

    let outcome = bench.run(ProcessRole::Leader, &transport, &mut request);

    assert_eq!(outcome, Ok(RunOutcome::Done));
    assert!(!request.forward_started());
    assert_eq!(
        request.responses(),
        [ResponseMessage::Property {
            name: "smp-role".to_owned(),
            value: Some("leader".to_owned()),
        }]
    );
}

#[rstest]
fn follower_relays_client_requests_without_running_them() {
    let mut bench = RunBench::new(ProcessRole::Follower);
    bench.sessions.set_leader_session(SessionId::new(99));
    let captured = Captured::default();
    let mut transport = MockTransport::new();
    transport.expect_leader().returning(|| Some(PeerId::new(0)));
    let sink = captured.clone();
    transport
        .expect_submit()
        .once()
        .returning(move |_, _, handle| {
            sink.push(handle);
            Ok(())
        });
    let mut request = request(1, SessionId::new(1), WRITE);

    for _ in 0..3 {
        assert_eq!(
            bench.run(ProcessRole::Follower, &transport, &mut request),
            Ok(RunOutcome::More)
        );
    }
    assert_eq!(captured.len(), 1);

    captured.resolve_next(CompletionState::Served(vec![ResponseMessage::Ok {
        applied: 1,
    }]));
    assert_eq!(
        bench.run(ProcessRole::Follower, &transport, &mut request),
        Ok(RunOutcome::Done)
    );
    assert_eq!(request.responses(), [ResponseMessage::Ok { applied: 1 }]);
    assert_eq!(bench.value(QUERY_TIMEOUT), Some(default_timeout().as_str()));
    assert!(bench.sessions.is_served(request.id()));
}

#[rstest]
fn follower_suspends_while_leader_is_busy() {
    let mut bench = RunBench::new(ProcessRole::Follower);
    let captured = Captured::default();
    let mut transport = MockTransport::new();
    transport.expect_leader().returning(|| Some(PeerId::new(0)));
    let sink = captured.clone();
    let mut attempts = 0;
    transport
        .expect_submit()
        .times(2)
        .returning(move |target, _, handle| {
            attempts += 1;
            if attempts == 1 {
                return Err(SubmitError::Busy { peer: target });
            }
            sink.push(handle);
            Ok(())
        });
    let mut request = request(1, SessionId::new(1), WRITE);
    bench.sessions.mark_ready(request.id());

    assert_eq!(
        bench.run(ProcessRole::Follower, &transport, &mut request),
        Ok(RunOutcome::More)
    );
    assert!(bench.sessions.is_suspended(request.id()));
    assert_eq!(bench.sessions.ready_len(), 0);

    bench.sessions.mark_ready(request.id());
    assert!(!bench.sessions.is_suspended(request.id()));
    assert_eq!(
        bench.run(ProcessRole::Follower, &transport, &mut request),
        Ok(RunOutcome::More)
    );
    assert_eq!(captured.len(), 1);
}

#[rstest]
fn follower_applies_requests_from_the_leader_locally() {
    let mut bench = RunBench::new(ProcessRole::Follower);
    let leader_session = SessionId::new(99);
    bench.sessions.set_leader_session(leader_session);
    let transport = MockTransport::new();
    let mut request = request(1, leader_session, WRITE);

    let outcome = bench.run(ProcessRole::Follower, &transport, &mut request);

    assert_eq!(outcome, Ok(RunOutcome::Done));
    assert_eq!(bench.value(QUERY_TIMEOUT), Some("5"));
}

#[rstest]
fn follower_relays_reads_too() {
    let mut bench = RunBench::new(ProcessRole::Follower);
    let mut transport = MockTransport::new();
    transport.expect_leader().returning(|| Some(PeerId::new(0)));
    transport.expect_submit().once().returning(|_, _, _| Ok(()));
    let mut request = request(1, SessionId::new(1), "SHOW version");

    assert_eq!(
        bench.run(ProcessRole::Follower, &transport, &mut request),
        Ok(RunOutcome::More)
    );
    assert!(request.responses().is_empty());
}

#[rstest]
fn leader_failure_surfaces_as_upstream_fault() {
    let mut bench = RunBench::new(ProcessRole::Follower);
    let captured = Captured::default();
    let mut transport = MockTransport::new();
    transport.expect_leader().returning(|| Some(PeerId::new(0)));
    let sink = captured.clone();
    transport
        .expect_submit()
        .once()
        .returning(move |_, _, handle| {
            sink.push(handle);
            Ok(())
        });
    let mut request = request(1, SessionId::new(1), WRITE);
    bench
        .run(ProcessRole::Follower, &transport, &mut request)
        .expect("relay starts");

    captured.resolve_next(CompletionState::Failed("store full".to_owned()));
    let outcome = bench.run(ProcessRole::Follower, &transport, &mut request);

    assert!(matches!(outcome, Err(RunError::Upstream { .. })));
    assert!(!bench.sessions.is_served(request.id()));
}
