//! Out-of-order command admission and in-order draining (spec §8 scenario 2).

mod fixtures;

use fixtures::TestOp;
use pretty_assertions::assert_eq;
use raft_session::session::CommandAdmission;

#[tokio::test]
async fn commands_arriving_out_of_order_are_stashed_then_drained_in_sequence() {
    let cluster = fixtures::build_cluster(&[1], 1);
    let connection = fixtures::build_connection(cluster.clone(), 1, &[1]);
    let node = cluster.node(1).unwrap();
    let session_id = fixtures::open_session(&connection).await;

    // Sequence 1 is applied first, so command_sequence=1.
    connection
        .command(fixtures::command_request(session_id, 1, TestOp::Echo("a".into())))
        .await
        .unwrap()
        .unwrap();

    // Sequence 3 arrives before 2: it is stashed, command_sequence stays at 1.
    node.with_session(session_id, |ctx| {
        let admission = ctx.admit_command(3, TestOp::Echo("c".into()));
        assert!(matches!(admission, CommandAdmission::Deferred));
    });
    assert_eq!(
        node.with_session(session_id, |ctx| ctx.command_sequence()).unwrap(),
        1
    );

    // Now sequence 2 arrives through the real RPC path: applying it drains the
    // stashed 3 immediately after, in order.
    let response = connection
        .command(fixtures::command_request(session_id, 2, TestOp::Echo("b".into())))
        .await
        .expect("command should succeed")
        .expect("command should return a response");
    assert_eq!(response.result, "b");

    let command_sequence = node.with_session(session_id, |ctx| ctx.command_sequence()).unwrap();
    assert_eq!(command_sequence, 3, "draining the stashed sequence 3 advances command_sequence past it");

    let resubmission = node
        .with_session(session_id, |ctx| ctx.admit_command(3, TestOp::Echo("stale".into())))
        .unwrap();
    match resubmission {
        CommandAdmission::Cached(result) => assert_eq!(result, "c", "re-submitting an applied sequence returns the cached result, not a re-apply"),
        other => panic!("expected a cached result, got {:?}", other),
    }
}

#[tokio::test]
async fn a_command_at_or_below_the_applied_sequence_with_no_cached_result_is_expired() {
    let cluster = fixtures::build_cluster(&[1], 1);
    let connection = fixtures::build_connection(cluster.clone(), 1, &[1]);
    let node = cluster.node(1).unwrap();
    let session_id = fixtures::open_session(&connection).await;

    connection
        .command(fixtures::command_request(session_id, 1, TestOp::Echo("a".into())))
        .await
        .unwrap()
        .unwrap();

    node.with_session(session_id, |ctx| ctx.clear_results(1));

    let admission = node
        .with_session(session_id, |ctx| ctx.admit_command(1, TestOp::Echo("a".into())))
        .unwrap();
    assert!(matches!(admission, CommandAdmission::Expired));
}
