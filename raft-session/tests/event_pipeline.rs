//! Event publish, commit, and client-reset handling (spec §8 scenario 3, P3/P4).

mod fixtures;

use fixtures::TestOp;
use pretty_assertions::{assert_eq, assert_ne};

#[tokio::test]
async fn events_published_during_a_command_are_queued_sent_and_survive_a_stale_reset() {
    let cluster = fixtures::build_cluster(&[1], 1);
    let connection = fixtures::build_connection(cluster.clone(), 1, &[1]);
    let node = cluster.node(1).unwrap();
    let session_id = fixtures::open_session(&connection).await;
    let anchor = session_id.as_u64();

    // A plain command that publishes nothing, so the event-emitting command
    // below commits at an index distinct from the session's own anchor.
    connection
        .command(fixtures::command_request(session_id, 1, TestOp::Echo("warmup".into())))
        .await
        .unwrap()
        .unwrap();
    fixtures::settle().await;
    assert!(node.published().is_empty(), "no events published by a command that emits none");

    let response = connection
        .command(fixtures::command_request(
            session_id,
            2,
            TestOp::EchoAndEmit {
                value: "ok".into(),
                events: vec!["e1".into(), "e2".into()],
            },
        ))
        .await
        .expect("command should succeed")
        .expect("command should return a response");
    let committed_index = response.index;
    fixtures::settle().await;
    assert_ne!(committed_index, anchor, "the test is only meaningful if previous_index can differ from event_index");

    let published = node.published();
    assert_eq!(published.len(), 1, "one batch published for the one committed command");
    let (member, batch) = &published[0];
    assert_eq!(*member, 1);
    assert_eq!(batch.event_index, committed_index);
    assert_eq!(batch.previous_index, anchor, "previousIndex anchors to the session id with no prior batches");
    assert_eq!(batch.events, vec!["e1".to_string(), "e2".to_string()]);

    // A reset below the batch's event_index does nothing: the batch is resent,
    // unchanged (P4: clear_events removes exactly batches <= index).
    node.with_session(session_id, |ctx| ctx.clear_events(committed_index - 1));
    fixtures::settle().await;
    let republished = node.published();
    assert_eq!(republished.len(), 2, "the untouched batch is resent");
    assert_eq!(republished[1].1.event_index, committed_index);
    assert_eq!(republished[1].1.previous_index, anchor);

    let complete_index_before = node.with_session(session_id, |ctx| ctx.complete_index()).unwrap();
    assert_eq!(complete_index_before, committed_index - 1);

    // A reset at the batch's own index acknowledges it: the queue empties and
    // complete_index catches up to last_applied.
    node.with_session(session_id, |ctx| ctx.clear_events(committed_index));
    fixtures::settle().await;
    let (complete_index, last_applied, last_completed) = node
        .with_session(session_id, |ctx| (ctx.complete_index(), ctx.last_applied(), ctx.last_completed()))
        .unwrap();
    assert_eq!(complete_index, committed_index);
    assert_eq!(last_applied, committed_index);
    assert_eq!(last_completed, last_applied, "no queued batches left to hold compaction back");

    let republished_again = node.published();
    assert_eq!(republished_again.len(), 2, "an acknowledged batch is not resent again");
}

#[tokio::test]
async fn successive_batches_link_previous_index_to_the_prior_batchs_event_index() {
    let cluster = fixtures::build_cluster(&[1], 1);
    let connection = fixtures::build_connection(cluster.clone(), 1, &[1]);
    let node = cluster.node(1).unwrap();
    let session_id = fixtures::open_session(&connection).await;

    let first = connection
        .command(fixtures::command_request(
            session_id,
            1,
            TestOp::EchoAndEmit { value: "a".into(), events: vec!["e1".into()] },
        ))
        .await
        .unwrap()
        .unwrap();
    fixtures::settle().await;
    let second = connection
        .command(fixtures::command_request(
            session_id,
            2,
            TestOp::EchoAndEmit { value: "b".into(), events: vec!["e2".into()] },
        ))
        .await
        .unwrap()
        .unwrap();
    fixtures::settle().await;

    let published = node.published();
    assert_eq!(published.len(), 2);
    assert_eq!(published[0].1.event_index, first.index);
    assert_eq!(published[1].1.event_index, second.index);
    assert!(second.index > first.index);
    assert_eq!(
        published[1].1.previous_index, first.index,
        "the second batch links back to the first batch's event_index (P3)"
    );
}
